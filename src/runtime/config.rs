//! Interpreter configuration
//!
//! [`Config`] collects the knobs a host sets before running an archive:
//! where to look for dependency archives, how deep calls may nest, and
//! which binding of the main module is the entry point.

use std::path::PathBuf;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;
pub const DEFAULT_ENTRY_POINT: &str = "main";
pub const DEFAULT_STACK_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directories searched, in order, for archives named by a dependency
    pub import_paths: Vec<PathBuf>,
    /// Nested calls allowed before a call fails with a depth error
    pub max_call_depth: usize,
    /// Main-module binding called with the command-line arguments
    pub entry_point: String,
    /// Initial operand stack allocation
    pub stack_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            import_paths: Vec::new(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            stack_capacity: DEFAULT_STACK_CAPACITY,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for creating a [`Config`]
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one archive search directory
    pub fn import_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.import_paths.push(path.into());
        self
    }

    /// Add several archive search directories
    pub fn import_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.config
            .import_paths
            .extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.config.max_call_depth = depth;
        self
    }

    pub fn entry_point(mut self, name: &str) -> Self {
        self.config.entry_point = name.to_string();
        self
    }

    pub fn stack_capacity(mut self, capacity: usize) -> Self {
        self.config.stack_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
