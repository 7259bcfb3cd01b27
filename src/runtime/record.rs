use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::class::Class;
use super::value::Value;

/// A dynamic map tied to a class. Backs both table literals and instances
/// of user-defined classes.
pub struct Record {
    class: Rc<Class>,
    fields: HashMap<Value, Value>,
}

impl Record {
    pub fn new(class: Rc<Class>) -> Record {
        Record {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    /// Absent keys read as null.
    pub fn get(&self, key: &Value) -> Value {
        self.fields.get(key).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, key: Value, value: Value) {
        self.fields.insert(key, value);
    }

    pub fn contains(&self, key: &Value) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.fields.keys()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("class", &self.class.name())
            .field("fields", &self.fields)
            .finish()
    }
}
