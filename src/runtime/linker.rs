//! Module registry and archive loader.
//!
//! # Registries
//!
//! - **recorded**: modules decoded from an archive whose top-level code
//!   has not run yet.
//! - **live**: modules that are initialized (or initializing) and may be
//!   referenced by importers.
//! - **archives**: archive name -> main module name, for every archive
//!   already read, so each file is read at most once.
//!
//! A name moves from recorded to live exactly once. It is promoted before
//! its code runs, so an import cycle sees the partially initialized module
//! instead of recursing forever. If initialization fails the module is
//! dropped from live and the error propagates.
//!
//! The linker is single-threaded: it lives behind an `Rc` shared by the
//! interpreters of one thread, and interior mutability is a `RefCell`
//! whose borrows never span the execution of module code.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::debug;

use super::class::Builtins;
use super::error::RuntimeError;
use super::executor::Interpreter;
use super::module::Module;
use crate::parser::module::ModuleImage;
use crate::parser::ArchiveReader;

#[derive(Debug, Default)]
struct LinkerState {
    import_paths: Vec<PathBuf>,
    recorded: HashMap<String, Rc<Module>>,
    live: HashMap<String, Rc<Module>>,
    archives: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct Linker {
    state: RefCell<LinkerState>,
    builtins: Builtins,
}

impl Linker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_import_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let linker = Linker::new();
        for path in paths {
            linker.add_import_path(path);
        }
        linker
    }

    /// Appends a directory to the archive search list. Duplicates are
    /// ignored.
    pub fn add_import_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut state = self.state.borrow_mut();
        if !state.import_paths.contains(&path) {
            state.import_paths.push(path);
        }
    }

    pub fn import_paths(&self) -> Vec<PathBuf> {
        self.state.borrow().import_paths.clone()
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Records a decoded module for later initialization. A name that is
    /// already live keeps its live module.
    pub fn record(&self, image: ModuleImage) -> Rc<Module> {
        let mut state = self.state.borrow_mut();
        if let Some(live) = state.live.get(&image.name) {
            return Rc::clone(live);
        }
        debug!(module = %image.name, "recording module");
        let name = image.name.clone();
        let module = Rc::new(Module::from_image(image));
        state.recorded.insert(name, Rc::clone(&module));
        module
    }

    /// Makes a fully formed module (typically native) available to
    /// importers immediately.
    pub fn register_native(&self, module: Rc<Module>) {
        debug!(module = %module.name(), "registering native module");
        let mut state = self.state.borrow_mut();
        state.recorded.remove(module.name());
        state.live.insert(module.name().to_string(), module);
    }

    pub fn live(&self, name: &str) -> Option<Rc<Module>> {
        self.state.borrow().live.get(name).cloned()
    }

    pub fn is_recorded(&self, name: &str) -> bool {
        self.state.borrow().recorded.contains_key(name)
    }

    /// Returns the live module `name`, running its initialization first if
    /// it is only recorded.
    pub fn resolve(&self, name: &str, interp: &mut Interpreter) -> Result<Rc<Module>, RuntimeError> {
        if let Some(module) = self.live(name) {
            return Ok(module);
        }
        let module = {
            let mut state = self.state.borrow_mut();
            let module = state
                .recorded
                .remove(name)
                .ok_or_else(|| RuntimeError::link(format!("can't find module '{name}'")))?;
            state.live.insert(name.to_string(), Rc::clone(&module));
            module
        };

        debug!(module = name, "initializing module");
        if let Err(err) = interp.initialize(&module) {
            self.state.borrow_mut().live.remove(name);
            return Err(err);
        }
        Ok(module)
    }

    /// Finds `name` in the import paths, reads it, and records its modules
    /// (and those of its dependencies). Returns the archive's main module
    /// name. Archives already read are not read again.
    pub fn load_archive(&self, name: &str) -> Result<String, RuntimeError> {
        if let Some(main) = self.cached_archive(name) {
            return Ok(main);
        }
        for root in self.import_paths() {
            let path = root.join(name);
            match fs::read(&path) {
                Ok(bytes) => {
                    debug!(archive = name, path = %path.display(), "reading archive");
                    return self.load_archive_bytes(name, bytes);
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(RuntimeError::host(err)),
            }
        }
        Err(RuntimeError::link(format!("can't find archive '{name}'")))
    }

    /// Like [`Linker::load_archive`] for an archive already in memory.
    pub fn load_archive_bytes(&self, name: &str, bytes: Vec<u8>) -> Result<String, RuntimeError> {
        if let Some(main) = self.cached_archive(name) {
            return Ok(main);
        }
        let mut reader = ArchiveReader::new(bytes);
        let header = reader.read_header()?;

        // Cached before dependencies load so archive cycles terminate.
        self.state
            .borrow_mut()
            .archives
            .insert(name.to_string(), header.main.clone());

        let result = self.load_contents(&header.dependencies, &mut reader);
        if let Err(err) = result {
            self.state.borrow_mut().archives.remove(name);
            return Err(err);
        }
        Ok(header.main)
    }

    fn load_contents(
        &self,
        dependencies: &[String],
        reader: &mut ArchiveReader,
    ) -> Result<(), RuntimeError> {
        for dependency in dependencies {
            self.load_archive(dependency)?;
        }
        while let Some(image) = reader.next_module()? {
            self.record(image);
        }
        Ok(())
    }

    fn cached_archive(&self, name: &str) -> Option<String> {
        self.state.borrow().archives.get(name).cloned()
    }
}
