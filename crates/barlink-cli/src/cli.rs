//! CLI argument definitions for the barlink tool.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line interface for the barlink indicator server.
#[derive(Parser, Debug)]
#[command(
    name = "barlink",
    about = "Serve trading-platform indicators over TCP",
    disable_help_subcommand = true
)]
pub(crate) struct Cli {
    /// What to do with the work directory.
    #[arg(value_enum, ignore_case = true, value_name = "MODE")]
    pub(crate) mode: Mode,
    /// Directory holding the model and collected data.
    #[arg(value_name = "WORK_PATH")]
    pub(crate) work_path: PathBuf,
}

/// Operating modes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum Mode {
    /// Serve the indicator and record every row to CSV.
    Collect,
    /// Train a model from collected data.
    Train,
    /// Serve the indicator backed by the trained model.
    Run,
    /// Delete collected data files.
    Clear,
    /// Generate synthetic training data.
    Generate,
    /// Calibrate a trained model.
    Calibrate,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Collect => "collect",
            Self::Train => "train",
            Self::Run => "run",
            Self::Clear => "clear",
            Self::Generate => "generate",
            Self::Calibrate => "calibrate",
        })
    }
}
