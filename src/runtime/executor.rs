//! Bytecode interpreter
//!
//! One [`Interpreter`] owns one operand stack. A language-level call runs
//! the callee in a fresh [`Frame`] by recursing into [`Interpreter::execute`],
//! so the host stack holds return addresses and a depth counter bounds the
//! recursion. Each call grows the host stack on demand with `stacker`, so
//! the depth limit is reached before the thread's stack runs out.
//!
//! Calling conventions, with `argc` arguments on top of the stack:
//!
//! - free call: `[.. callee arg0 .. argN]`, frame base at `arg0`
//! - method, super and constructor calls: `[.. receiver arg0 .. argN]`,
//!   frame base at the receiver
//!
//! When the callee finishes, the stack is cut back to the frame base; the
//! call site then replaces the callee slot (free calls) or pushes the
//! result. Natives never pop their own arguments.

use std::rc::Rc;

use tracing::trace;

use super::class::{Builtins, Class, Shape};
use super::config::Config;
use super::error::{ErrorKind, RuntimeError};
use super::frame::Frame;
use super::function::{Body, Function};
use super::linker::Linker;
use super::module::Module;
use super::ops::comparison::Ordering;
use super::ops::{access, bitwise, comparison, numeric};
use super::record::Record;
use super::stack::Stack;
use super::value::Value;
use crate::parser::module::ImportTarget;
use crate::parser::opcode::{Arith, Opcode};

/// Remaining host stack below which a call moves to a fresh segment
const STACK_RED_ZONE: usize = 256 * 1024;
/// Size of each new host stack segment
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

pub struct Interpreter {
    stack: Stack,
    linker: Rc<Linker>,
    config: Config,
    depth: usize,
}

impl Interpreter {
    pub fn new(linker: Rc<Linker>) -> Self {
        Self::with_config(linker, Config::default())
    }

    pub fn with_config(linker: Rc<Linker>, config: Config) -> Self {
        Interpreter {
            stack: Stack::with_capacity(config.stack_capacity),
            linker,
            config,
            depth: 0,
        }
    }

    pub fn linker(&self) -> &Rc<Linker> {
        &self.linker
    }

    pub fn builtins(&self) -> &Builtins {
        self.linker.builtins()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Argument `i` of a native call with frame base `base` (null if absent).
    pub fn argument(&self, base: usize, i: usize) -> Value {
        self.stack.get(base + i).cloned().unwrap_or_default()
    }

    // Linking -----------------------------------------------------------------

    /// Resolves a module by name, initializing it on first use.
    pub fn import(&mut self, name: &str) -> Result<Rc<Module>, RuntimeError> {
        let linker = Rc::clone(&self.linker);
        linker.resolve(name, self)
    }

    /// Binds a module's imports and runs its top-level code. Does nothing
    /// for a module that has already been initialized.
    pub fn initialize(&mut self, module: &Rc<Module>) -> Result<(), RuntimeError> {
        let pending = match module.take_pending() {
            Some(pending) => pending,
            None => return Ok(()),
        };

        for import in &pending.imports {
            let source = self.import(&import.path)?;
            match &import.target {
                ImportTarget::Alias(alias) => module.set(alias, Value::Module(source)),
                ImportTarget::Names(names) => {
                    for name in names {
                        let value = source.get(name).ok_or_else(|| {
                            RuntimeError::link(format!(
                                "module '{}' has no binding '{name}' to import into '{}'",
                                source.name(),
                                module.name()
                            ))
                        })?;
                        module.set(name, value);
                    }
                }
            }
        }

        let base = self.stack.depth();
        let frame = Frame::new(Rc::clone(module), None, pending.code, base);
        self.enter()?;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.execute(frame));
        self.depth -= 1;
        self.stack.truncate(base);
        result.map(|_| ())
    }

    // Calls -------------------------------------------------------------------

    /// Calls `function` from the host. Pass a receiver for methods. The
    /// stack is restored to its previous depth whether or not the call
    /// succeeds.
    pub fn call(
        &mut self,
        function: &Rc<Function>,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let mark = self.stack.depth();
        let argc = args.len();
        let is_method = receiver.is_some();
        self.stack
            .push(receiver.unwrap_or_else(|| Value::Function(Rc::clone(function))));
        for arg in args {
            self.stack.push(arg);
        }
        let result = self.invoke(function, argc, is_method);
        self.stack.truncate(mark);
        result
    }

    /// Looks up `name` on the receiver's class and calls it.
    pub fn call_method(
        &mut self,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let method = self.lookup_method(&receiver, name)?;
        self.call(&method, Some(receiver), args)
    }

    fn enter(&mut self) -> Result<(), RuntimeError> {
        if self.depth >= self.config.max_call_depth {
            return Err(ErrorKind::CallDepthExceeded(self.config.max_call_depth).into());
        }
        self.depth += 1;
        Ok(())
    }

    /// Runs `callee` over the top `argc` values (plus the receiver below
    /// them for methods) and cuts the stack back to the frame base.
    /// Errors leave with `callee` appended to their trace.
    fn invoke(
        &mut self,
        callee: &Rc<Function>,
        argc: usize,
        is_method: bool,
    ) -> Result<Value, RuntimeError> {
        self.invoke_unframed(callee, argc, is_method)
            .map_err(|err| err.with_frame(Rc::clone(callee)))
    }

    fn invoke_unframed(
        &mut self,
        callee: &Rc<Function>,
        argc: usize,
        is_method: bool,
    ) -> Result<Value, RuntimeError> {
        if callee.arity() != argc {
            return Err(ErrorKind::Arity {
                name: callee.name().to_string(),
                expected: callee.arity(),
                actual: argc,
            }
            .into());
        }
        let below = if is_method { argc + 1 } else { argc };
        let base = self
            .stack
            .depth()
            .checked_sub(below)
            .ok_or(ErrorKind::StackUnderflow)?;

        self.enter()?;
        trace!(function = %callee.name(), argc, depth = self.depth, "call");
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || match callee.body() {
            Body::Bytecode(code) => callee.owning_module().and_then(|module| {
                let frame = Frame::new(module, Some(Rc::clone(callee)), Rc::clone(code), base);
                self.execute(frame)
            }),
            Body::Native(native) => {
                let native = Rc::clone(native);
                native(self, base).map_err(RuntimeError::from_native)
            }
        });
        self.depth -= 1;
        self.stack.truncate(base);
        result
    }

    fn lookup_method(&self, receiver: &Value, name: &str) -> Result<Rc<Function>, RuntimeError> {
        let class = receiver.class(self.builtins()).ok_or_else(|| {
            RuntimeError::type_error(format!(
                "can't call method '{name}' on {}",
                receiver.type_name()
            ))
        })?;
        class.method(name).ok_or_else(|| {
            RuntimeError::dispatch(format!("{} object has no method '{name}'", class.name()))
        })
    }

    /// The target of `super.name(...)`: looked up in the class owning the
    /// running method (the receiver's class at module level). A method
    /// that class defines itself defers to its captured supermethod; an
    /// inherited one is already the parent's implementation.
    fn resolve_super(
        &self,
        frame: &Frame,
        argc: usize,
        name: &str,
    ) -> Result<Rc<Function>, RuntimeError> {
        let owner = match frame.function.as_ref().and_then(|f| f.class()) {
            Some(class) => class,
            None => {
                let receiver = self.stack.peek_at(argc)?;
                receiver.class(self.builtins()).ok_or_else(|| {
                    RuntimeError::type_error(format!(
                        "can't call super method '{name}' on {}",
                        receiver.type_name()
                    ))
                })?
            }
        };
        let entry = owner.method(name).ok_or_else(|| {
            RuntimeError::dispatch(format!("{} object has no method '{name}'", owner.name()))
        })?;
        let defined_here = entry
            .class()
            .map_or(false, |class| Rc::ptr_eq(&class, &owner));
        if !defined_here {
            return Ok(entry);
        }
        entry.supermethod().cloned().ok_or_else(|| {
            RuntimeError::dispatch(format!(
                "method '{name}' of class '{}' has no supermethod",
                owner.name()
            ))
        })
    }

    fn call_function(&mut self, argc: usize) -> Result<(), RuntimeError> {
        let callee = match self.stack.peek_at(argc)? {
            Value::Function(f) => Rc::clone(f),
            other => {
                return Err(RuntimeError::type_error(format!(
                    "can't call a {}",
                    other.type_name()
                )))
            }
        };
        let result = self.invoke(&callee, argc, false)?;
        self.stack.pop()?;
        self.stack.push(result);
        Ok(())
    }

    fn call_named(&mut self, argc: usize, name: &str) -> Result<(), RuntimeError> {
        let receiver = self.stack.peek_at(argc)?.clone();
        let method = self.lookup_method(&receiver, name)?;
        let result = self.invoke(&method, argc, true)?;
        self.stack.push(result);
        Ok(())
    }

    fn call_super(&mut self, frame: &Frame, argc: usize, name: &str) -> Result<(), RuntimeError> {
        let method = self.resolve_super(frame, argc, name)?;
        let result = self.invoke(&method, argc, true)?;
        self.stack.push(result);
        Ok(())
    }

    /// NEW: the class below the arguments is replaced by a fresh instance,
    /// `init` runs on it, and the instance is left on the stack.
    fn construct(&mut self, argc: usize) -> Result<(), RuntimeError> {
        let class = match self.stack.peek_at(argc)? {
            Value::Class(class) => Rc::clone(class),
            other => return Err(RuntimeError::mismatch("class", other.type_name())),
        };
        let instance = class.instantiate()?;
        let init = class.method("init").ok_or_else(|| {
            RuntimeError::dispatch(format!("class '{}' has no constructor", class.name()))
        })?;
        let slot = self.stack.depth() - argc - 1;
        self.stack.set(slot, instance.clone())?;
        self.invoke(&init, argc, true)?;
        self.stack.push(instance);
        Ok(())
    }

    // Definitions -------------------------------------------------------------

    fn enter_class(&mut self, frame: &mut Frame) -> Result<(), RuntimeError> {
        let name = frame.name()?;
        let parent = match self.stack.pop()? {
            Value::Null => None,
            Value::Class(parent) => {
                if matches!(parent.shape(), Shape::Array | Shape::String) {
                    return Err(RuntimeError::type_error(format!(
                        "can't extend native class '{}'",
                        parent.name()
                    )));
                }
                Some(parent)
            }
            other => {
                return Err(RuntimeError::type_error(format!(
                    "can't inherit from {} value",
                    other.type_name()
                )))
            }
        };
        frame.class = Some(Rc::new(Class::new(&name, parent)));
        Ok(())
    }

    fn exit_class(&mut self, frame: &mut Frame) -> Result<(), RuntimeError> {
        let class = frame
            .class
            .take()
            .ok_or_else(|| RuntimeError::type_error("not inside a class definition"))?;
        let name = class.name().to_string();
        frame.module.set(&name, Value::Class(class));
        Ok(())
    }

    fn define_function(&mut self, frame: &mut Frame) -> Result<(), RuntimeError> {
        let arity = frame.fetch_u8()? as usize;
        let name = frame.name()?;
        let len = frame.fetch_u32()? as usize;
        let body = Body::Bytecode(Rc::from(frame.fetch_slice(len)?));
        match &frame.class {
            Some(class) => {
                let supermethod = class.method(&name);
                let method =
                    Function::method(&name, arity, &frame.module, class, supermethod, body);
                class.define_method(Rc::new(method));
            }
            None => {
                let function = Function::free(&name, arity, &frame.module, body);
                frame
                    .module
                    .set(&name, Value::Function(Rc::new(function)));
            }
        }
        Ok(())
    }

    // Container literals ------------------------------------------------------

    fn open_array(&mut self, frame: &mut Frame) {
        let enclosing = frame.array.take().map_or(Value::Null, Value::Array);
        self.stack.push(enclosing);
        frame.array = Some(Rc::default());
    }

    fn close_array(&mut self, frame: &mut Frame) -> Result<(), RuntimeError> {
        let enclosing = self.stack.pop()?;
        let done = frame
            .array
            .take()
            .ok_or_else(|| RuntimeError::type_error("no array literal is open"))?;
        frame.array = match enclosing {
            Value::Null => None,
            Value::Array(array) => Some(array),
            other => return Err(RuntimeError::mismatch("array", other.type_name())),
        };
        self.stack.push(Value::Array(done));
        Ok(())
    }

    fn open_table(&mut self, frame: &mut Frame) {
        let enclosing = frame.record.take().map_or(Value::Null, Value::Record);
        self.stack.push(enclosing);
        let table = Record::new(Rc::clone(&self.builtins().table));
        frame.record = Some(Rc::new(table.into()));
    }

    fn close_table(&mut self, frame: &mut Frame) -> Result<(), RuntimeError> {
        let enclosing = self.stack.pop()?;
        let done = frame
            .record
            .take()
            .ok_or_else(|| RuntimeError::type_error("no table literal is open"))?;
        frame.record = match enclosing {
            Value::Null => None,
            Value::Record(record) => Some(record),
            other => return Err(RuntimeError::mismatch("record", other.type_name())),
        };
        self.stack.push(Value::Record(done));
        Ok(())
    }

    // Augmented updates -------------------------------------------------------

    fn fetch_arith(frame: &mut Frame) -> Result<Arith, RuntimeError> {
        let byte = frame.fetch_u8()?;
        Arith::from_byte(byte)
            .ok_or_else(|| RuntimeError::type_error(format!("unknown operation {byte}")))
    }

    fn update_index(&mut self, frame: &mut Frame) -> Result<(), RuntimeError> {
        let op = Self::fetch_arith(frame)?;
        let operand = self.stack.pop()?;
        let index = self.stack.pop()?;
        let target = self.stack.pop()?;
        let current = access::index_get(&target, &index)?;
        access::index_set(&target, index, numeric::update(op, &current, &operand)?)
    }

    fn update_field(&mut self, frame: &mut Frame) -> Result<(), RuntimeError> {
        let op = Self::fetch_arith(frame)?;
        let name = frame.name()?;
        let operand = self.stack.pop()?;
        let target = self.stack.pop()?;
        let current = access::field_get(&target, &name)?;
        access::field_set(&target, &name, numeric::update(op, &current, &operand)?)
    }

    fn update_static(&mut self, frame: &mut Frame) -> Result<(), RuntimeError> {
        let op = Self::fetch_arith(frame)?;
        let name = frame.name()?;
        let operand = self.stack.pop()?;
        let target = self.stack.pop()?;
        let current = access::static_get(&target, &name)?;
        access::static_set(&target, &name, numeric::update(op, &current, &operand)?)
    }

    // Instruction loop --------------------------------------------------------

    /// Runs `frame` until END or RETURN, leaving the stack cut back to the
    /// frame base.
    pub(crate) fn execute(&mut self, mut frame: Frame) -> Result<Value, RuntimeError> {
        loop {
            let byte = frame.fetch_u8()?;
            let op = Opcode::try_from(byte).map_err(ErrorKind::UnknownOpcode)?;
            match op {
                Opcode::End => {
                    self.stack.truncate(frame.base);
                    return Ok(Value::Null);
                }
                Opcode::Return => {
                    let result = self.stack.pop()?;
                    self.stack.truncate(frame.base);
                    return Ok(result);
                }

                // Literals and stack shape
                Opcode::Null => self.stack.push(Value::Null),
                Opcode::True => self.stack.push(Value::Bool(true)),
                Opcode::False => self.stack.push(Value::Bool(false)),
                Opcode::Zero => numeric::zero(&mut self.stack),
                Opcode::Const => {
                    let idx = frame.fetch_u16()?;
                    let value = frame.module.constant(idx)?.clone();
                    self.stack.push(value);
                }
                Opcode::Dup => {
                    let top = self.stack.peek()?.clone();
                    self.stack.push(top);
                }
                Opcode::Drop => {
                    self.stack.pop()?;
                }
                Opcode::Swap => self.stack.swap_top()?,
                Opcode::Exit => {
                    for _ in 0..frame.fetch_u8()? {
                        self.stack.pop()?;
                    }
                }

                // Arithmetic, comparison and logic
                Opcode::Mul => numeric::binary(&mut self.stack, Arith::Mul)?,
                Opcode::Div => numeric::binary(&mut self.stack, Arith::Div)?,
                Opcode::Mod => numeric::binary(&mut self.stack, Arith::Mod)?,
                Opcode::Add => numeric::binary(&mut self.stack, Arith::Add)?,
                Opcode::Sub => numeric::binary(&mut self.stack, Arith::Sub)?,
                Opcode::Neg => numeric::neg(&mut self.stack)?,
                Opcode::Lt => comparison::compare(&mut self.stack, Ordering::Lt)?,
                Opcode::Le => comparison::compare(&mut self.stack, Ordering::Le)?,
                Opcode::Gt => comparison::compare(&mut self.stack, Ordering::Gt)?,
                Opcode::Ge => comparison::compare(&mut self.stack, Ordering::Ge)?,
                Opcode::Eq => comparison::equals(&mut self.stack, false)?,
                Opcode::Ne => comparison::equals(&mut self.stack, true)?,
                Opcode::In => comparison::contains(&mut self.stack, false)?,
                Opcode::NotIn => comparison::contains(&mut self.stack, true)?,
                Opcode::Not => comparison::not(&mut self.stack)?,
                Opcode::BitAnd => bitwise::binary(&mut self.stack, bitwise::BitOp::And)?,
                Opcode::BitOr => bitwise::binary(&mut self.stack, bitwise::BitOp::Or)?,
                Opcode::BitXor => bitwise::binary(&mut self.stack, bitwise::BitOp::Xor)?,
                Opcode::Shl => bitwise::binary(&mut self.stack, bitwise::BitOp::Shl)?,
                Opcode::Shr => bitwise::binary(&mut self.stack, bitwise::BitOp::Shr)?,
                Opcode::BitNot => bitwise::not(&mut self.stack)?,

                // Control flow
                Opcode::If => {
                    if self.stack.pop()?.is_truthy() {
                        frame.skip_offset();
                    } else {
                        frame.jump_forward()?;
                    }
                }
                Opcode::Jump => frame.jump_forward()?,
                Opcode::Loop => frame.jump_backward()?,
                Opcode::Or => {
                    if self.stack.peek()?.is_truthy() {
                        frame.jump_forward()?;
                    } else {
                        self.stack.pop()?;
                        frame.skip_offset();
                    }
                }
                Opcode::And => {
                    if self.stack.peek()?.is_truthy() {
                        self.stack.pop()?;
                        frame.skip_offset();
                    } else {
                        frame.jump_forward()?;
                    }
                }

                // Locals and globals
                Opcode::Load => {
                    let slot = frame.local()?;
                    let value = self
                        .stack
                        .get(slot)
                        .cloned()
                        .ok_or(ErrorKind::LocalOutOfRange(slot))?;
                    self.stack.push(value);
                }
                Opcode::Store => {
                    let slot = frame.local()?;
                    let value = self.stack.pop()?;
                    self.stack.set(slot, value)?;
                }
                Opcode::Inc => numeric::inc(&mut self.stack, frame.local()?)?,
                Opcode::LoadGlobal => {
                    let name = frame.name()?;
                    let value = frame.module.get(&name).ok_or_else(|| {
                        RuntimeError::link(format!(
                            "unknown global '{name}' in module '{}'",
                            frame.module.name()
                        ))
                    })?;
                    self.stack.push(value);
                }
                Opcode::StoreGlobal | Opcode::Define => {
                    let name = frame.name()?;
                    let value = self.stack.pop()?;
                    frame.module.set(&name, value);
                }
                Opcode::DefineField => {
                    frame.fetch_u16()?;
                }
                Opcode::SelfRef => {
                    let value = self
                        .stack
                        .get(frame.base)
                        .cloned()
                        .ok_or(ErrorKind::LocalOutOfRange(frame.base))?;
                    self.stack.push(value);
                }

                // Fields, indexes and statics
                Opcode::GetField => {
                    let name = frame.name()?;
                    let target = self.stack.pop()?;
                    self.stack.push(access::field_get(&target, &name)?);
                }
                Opcode::GetFieldTop => {
                    let name = frame.name()?;
                    let value = access::field_get(self.stack.peek()?, &name)?;
                    self.stack.push(value);
                }
                Opcode::SetField => {
                    let name = frame.name()?;
                    let value = self.stack.pop()?;
                    let target = self.stack.pop()?;
                    access::field_set(&target, &name, value)?;
                }
                Opcode::GetIndex => access::get_index(&mut self.stack)?,
                Opcode::GetIndexTop => access::get_index_top(&mut self.stack)?,
                Opcode::SetIndex => access::set_index(&mut self.stack)?,
                Opcode::GetStatic => {
                    let name = frame.name()?;
                    let target = self.stack.pop()?;
                    self.stack.push(access::static_get(&target, &name)?);
                }
                Opcode::GetStaticTop => {
                    let name = frame.name()?;
                    let value = access::static_get(self.stack.peek()?, &name)?;
                    self.stack.push(value);
                }
                Opcode::SetStatic => {
                    let name = frame.name()?;
                    let value = self.stack.pop()?;
                    let target = self.stack.pop()?;
                    access::static_set(&target, &name, value)?;
                }
                Opcode::SetIndexAu => self.update_index(&mut frame)?,
                Opcode::SetFieldAu => self.update_field(&mut frame)?,
                Opcode::SetStaticAu => self.update_static(&mut frame)?,
                Opcode::GetSlice | Opcode::SetSlice => {
                    return Err(RuntimeError::type_error(format!(
                        "unsupported operation: {op:?}"
                    )))
                }

                // Classes and functions
                Opcode::EnterClass => self.enter_class(&mut frame)?,
                Opcode::ExitClass => self.exit_class(&mut frame)?,
                Opcode::Function => self.define_function(&mut frame)?,
                Opcode::NotImplemented => {
                    return Err(ErrorKind::NotImplemented(frame.function_name()).into())
                }

                // Calls and construction
                Opcode::FunctionCall => {
                    let argc = frame.fetch_u8()? as usize;
                    self.call_function(argc)?;
                }
                Opcode::MethodCall => {
                    let argc = frame.fetch_u8()? as usize;
                    let name = frame.name()?;
                    self.call_named(argc, &name)?;
                }
                Opcode::SuperCall => {
                    let argc = frame.fetch_u8()? as usize;
                    let name = frame.name()?;
                    self.call_super(&frame, argc, &name)?;
                }
                Opcode::New => {
                    let argc = frame.fetch_u8()? as usize;
                    self.construct(argc)?;
                }

                // Container literals
                Opcode::ArrayNew => self.open_array(&mut frame),
                Opcode::ArrayNewAppend => {
                    let value = self.stack.pop()?;
                    frame.array_literal()?.borrow_mut().push(value);
                }
                Opcode::ArrayClose => self.close_array(&mut frame)?,
                Opcode::TableNew => self.open_table(&mut frame),
                Opcode::TableNewInsert => {
                    let value = self.stack.pop()?;
                    let key = self.stack.pop()?;
                    frame.record_literal()?.borrow_mut().set(key, value);
                }
                Opcode::TableClose => self.close_table(&mut frame)?,
                Opcode::Insert => access::insert(&mut self.stack)?,
                Opcode::Append => access::append(&mut self.stack)?,

                // Introspection
                Opcode::SizeOf => access::size_of(&mut self.stack)?,
                Opcode::InstanceOf => access::instance_of(&mut self.stack, self.linker.builtins())?,
            }
        }
    }
}
