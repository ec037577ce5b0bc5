//! Doubles for configuration loading and server launch.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use barlink_config::{COLLECTED_PREFIX, COLLECTED_SUFFIX, Config};
use barlink_server::{BootstrapError, DrainReport, IndicatorMode, LaunchError, ModelError};

use crate::{AppError, ConfigLoader, IoStreams, Launcher, run_with};

/// Port reported to the CLI by [`RecordingLauncher`].
pub const FAKE_PORT: u16 = 5128;

/// Loader that returns defaults and records the arguments it was given.
#[derive(Default)]
pub struct RecordingLoader {
    pub arguments: RefCell<Vec<OsString>>,
}

impl ConfigLoader for RecordingLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        *self.arguments.borrow_mut() = args.to_vec();
        Ok(Config::default())
    }
}

/// One recorded launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCall {
    pub mode: IndicatorMode,
    pub work_dir: PathBuf,
}

/// Launcher that reports readiness immediately and returns a canned result.
#[derive(Default)]
pub struct RecordingLauncher {
    pub calls: RefCell<Vec<LaunchCall>>,
    fail_model_load: bool,
}

impl RecordingLauncher {
    /// A launcher whose launches fail as if the model were missing.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            calls: RefCell::default(),
            fail_model_load: true,
        }
    }
}

impl Launcher for RecordingLauncher {
    fn launch(
        &self,
        _config: Config,
        mode: IndicatorMode,
        work_dir: &Path,
        on_ready: &mut dyn FnMut(SocketAddr),
    ) -> Result<DrainReport, LaunchError> {
        self.calls.borrow_mut().push(LaunchCall {
            mode,
            work_dir: work_dir.to_path_buf(),
        });
        if self.fail_model_load {
            return Err(LaunchError::Bootstrap {
                source: BootstrapError::ModelLoad {
                    source: ModelError::NotFound {
                        path: work_dir.join("indicator-model.json"),
                    },
                },
            });
        }
        on_ready(SocketAddr::from(([127, 0, 0, 1], FAKE_PORT)));
        Ok(DrainReport {
            closed: 2,
            elapsed: Duration::ZERO,
        })
    }
}

/// Captured result of one CLI invocation.
pub struct Outcome {
    pub exit: ExitCode,
    pub stdout: String,
    pub stderr: String,
}

/// Runs the CLI with `args` (without the program name).
pub fn run_cli(args: &[&str], loader: &RecordingLoader, launcher: &RecordingLauncher) -> Outcome {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let argv = std::iter::once("barlink")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect::<Vec<_>>();
    let exit = {
        let mut io = IoStreams::new(&mut stdout, &mut stderr);
        run_with(argv, &mut io, loader, launcher)
    };
    Outcome {
        exit,
        stdout: String::from_utf8(stdout).expect("stdout utf8"),
        stderr: String::from_utf8(stderr).expect("stderr utf8"),
    }
}

/// Writes a collection file named for `connection` into `dir`.
pub fn write_collected(dir: &Path, connection: u64) -> PathBuf {
    let path = dir.join(format!("{COLLECTED_PREFIX}-1-{connection}{COLLECTED_SUFFIX}"));
    fs::write(&path, "1,2\n").expect("write collected file");
    path
}
