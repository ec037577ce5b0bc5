//! CLI entrypoint for the barlink indicator server.
//!
//! The binary delegates to [`barlink_cli::run`], which splits configuration
//! flags from the mode arguments, loads configuration, and dispatches the
//! selected mode.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    barlink_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
