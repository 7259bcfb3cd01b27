//! shark - run a compiled shark archive
//!
//! Loads the archive, runs its main module, and calls the module's entry
//! function with the remaining command-line arguments.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use shark::parser;
use shark::runtime::{run_archive, Config, RunError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shark")]
#[command(about = "Run a compiled shark archive")]
struct Cli {
    /// Path to the main archive
    archive: PathBuf,

    /// Arguments passed to the entry function
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Extra directory to search for dependency archives (repeatable)
    #[arg(short = 'I', long = "import-path")]
    import_paths: Vec<PathBuf>,

    /// Maximum nesting of calls before execution fails
    #[arg(long)]
    max_call_depth: Option<usize>,

    /// Name of the entry function in the main module
    #[arg(long, default_value = "main")]
    entry: String,

    /// Print the decoded archive instead of running it
    #[arg(long)]
    dump: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.dump {
        return dump(&cli.archive);
    }

    let mut builder = Config::builder()
        .import_paths(cli.import_paths.iter().cloned())
        .entry_point(&cli.entry);
    if let Some(depth) = cli.max_call_depth {
        builder = builder.max_call_depth(depth);
    }
    let config = builder.build();

    info!(archive = %cli.archive.display(), "running");
    match run_archive(&cli.archive, &cli.args, &config) {
        Ok(code) => ExitCode::from(exit_status(code)),
        Err(RunError::Runtime(err)) => {
            eprintln!("{}", err.report());
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err}");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Process status for an exit code: the low byte, except that a non-zero
/// code never reports success.
fn exit_status(code: i32) -> u8 {
    match code as u8 {
        0 if code != 0 => 1,
        status => status,
    }
}

fn dump(path: &Path) -> ExitCode {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("can't open archive '{}': {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    match parser::read_archive(bytes) {
        Ok(archive) => {
            println!("main: {}", archive.header.main);
            for dependency in &archive.header.dependencies {
                println!("depends on: {dependency}");
            }
            for module in &archive.modules {
                println!("{module}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("malformed archive: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::exit_status;

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(0), 0);
        assert_eq!(exit_status(3), 3);
        assert_eq!(exit_status(255), 255);
        assert_eq!(exit_status(256), 1);
        assert_eq!(exit_status(512), 1);
        assert_eq!(exit_status(257), 1);
        assert_eq!(exit_status(-1), 255);
    }
}
