//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use barlink_config::WorkPathsError;
use barlink_server::LaunchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("mode '{mode}' requires the external training toolkit, which is not bundled")]
    Unsupported { mode: String },
    #[error("invalid work path: {0}")]
    WorkPath(#[from] WorkPathsError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl AppError {
    /// Status reported to the shell for this error.
    pub(crate) const fn exit_status(&self) -> u8 {
        match self {
            Self::CliUsage(_) | Self::Unsupported { .. } => 2,
            _ => 1,
        }
    }
}
