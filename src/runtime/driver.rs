//! Running an archive as a program.
//!
//! [`run_archive`] is what a command-line front end calls: it loads the
//! archive at a path, initializes its main module, and calls the entry
//! function with the program arguments. The outcome separates a missing
//! file, a malformed archive, and an uncaught runtime error; the exit
//! signal is a normal return carrying its status.

use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use super::config::Config;
use super::error::{ErrorKind, RuntimeError};
use super::executor::Interpreter;
use super::linker::Linker;
use super::system;
use super::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("can't open archive '{}': {source}", .path.display())]
    MissingArchive { path: PathBuf, source: io::Error },
    #[error("malformed archive: {0}")]
    Malformed(RuntimeError),
    #[error("{}", .0.report())]
    Runtime(RuntimeError),
}

/// Loads and runs the archive at `path`. Returns the process status.
pub fn run_archive(path: &Path, args: &[String], config: &Config) -> Result<i32, RunError> {
    let bytes = std::fs::read(path).map_err(|source| RunError::MissingArchive {
        path: path.to_path_buf(),
        source,
    })?;

    let linker = Rc::new(Linker::new());
    if let Some(dir) = path.parent() {
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        linker.add_import_path(dir);
    }
    for import_path in &config.import_paths {
        linker.add_import_path(import_path.clone());
    }
    linker.register_native(system::module());

    let archive_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let main = linker
        .load_archive_bytes(&archive_name, bytes)
        .map_err(|err| match err.kind() {
            ErrorKind::Decode(_) => RunError::Malformed(err),
            _ => RunError::Runtime(err),
        })?;
    debug!(archive = %archive_name, main = %main, "archive loaded");

    let mut interp = Interpreter::with_config(Rc::clone(&linker), config.clone());
    match run_main(&mut interp, &main, path, args) {
        Ok(()) => Ok(0),
        Err(err) => match err.exit_code() {
            Some(code) => Ok(code),
            None => Err(RunError::Runtime(err)),
        },
    }
}

fn run_main(
    interp: &mut Interpreter,
    main: &str,
    path: &Path,
    args: &[String],
) -> Result<(), RuntimeError> {
    let module = interp.import(main)?;
    let entry_point = interp.config().entry_point.clone();
    let entry = match module.get(&entry_point) {
        Some(Value::Function(entry)) => entry,
        _ => return Ok(()),
    };
    if entry.arity() != 1 {
        return Err(RuntimeError::dispatch(format!(
            "'{entry_point}' must take exactly one argument, not {}",
            entry.arity()
        )));
    }

    let mut argv = vec![Value::string(&path.display().to_string())];
    argv.extend(args.iter().map(|arg| Value::string(arg)));
    interp.call(&entry, None, vec![Value::array(argv)])?;
    Ok(())
}
