//! Command-line interface runtime for barlink.
//!
//! The module owns argument parsing, configuration bootstrapping, and mode
//! dispatch. `collect` and `run` serve the indicator until a termination
//! signal arrives; `clear` removes collected data; the training modes are
//! recognised but need an external toolkit. The runtime can be exercised from
//! the binary entrypoint or from tests where configuration loading, the
//! server launch, and IO streams are substituted.

use std::ffi::OsString;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;

use barlink_config::{Config, WorkPaths};
use barlink_server::{DrainReport, IndicatorMode, LaunchError};
use clap::Parser;

mod cli;
mod config;
mod errors;

use cli::{Cli, Mode};
use config::{ConfigArgumentSplit, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;

/// Bundles the IO streams provided to the CLI runtime.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self { stdout, stderr }
    }
}

/// Starts the indicator server and blocks until it has stopped.
pub(crate) trait Launcher {
    fn launch(
        &self,
        config: Config,
        mode: IndicatorMode,
        work_dir: &Path,
        on_ready: &mut dyn FnMut(SocketAddr),
    ) -> Result<DrainReport, LaunchError>;
}

/// Launcher that runs the real server and waits for a termination signal.
pub(crate) struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(
        &self,
        config: Config,
        mode: IndicatorMode,
        work_dir: &Path,
        on_ready: &mut dyn FnMut(SocketAddr),
    ) -> Result<DrainReport, LaunchError> {
        barlink_server::run_indicator(config, mode, work_dir, on_ready)
    }
}

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader, R: Launcher> {
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
    launcher: &'a R,
}

impl<'a, W, E, L, R> CliRunner<'a, W, E, L, R>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
    R: Launcher,
{
    fn new(io: &'a mut IoStreams<'a, W, E>, loader: &'a L, launcher: &'a R) -> Self {
        Self {
            io,
            loader,
            launcher,
        }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli_arguments = prepare_cli_arguments(&args, &split);

        let result = Cli::try_parse_from(cli_arguments)
            .map_err(AppError::CliUsage)
            .and_then(|cli| {
                self.loader
                    .load(&split.config_arguments)
                    .map(|config| (cli, config))
            })
            .and_then(|(cli, config)| self.dispatch(&cli, config));

        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(AppError::CliUsage(error)) if !error.use_stderr() => {
                let _ = write!(self.io.stdout, "{error}");
                ExitCode::SUCCESS
            }
            Err(error) => {
                let _ = writeln!(self.io.stderr, "{error}");
                ExitCode::from(error.exit_status())
            }
        }
    }

    fn dispatch(&mut self, cli: &Cli, config: Config) -> Result<(), AppError> {
        match cli.mode {
            Mode::Collect => self.serve(config, IndicatorMode::Collect, &cli.work_path),
            Mode::Run => self.serve(config, IndicatorMode::Run, &cli.work_path),
            Mode::Clear => self.clear(&config, &cli.work_path),
            Mode::Train | Mode::Generate | Mode::Calibrate => Err(AppError::Unsupported {
                mode: cli.mode.to_string(),
            }),
        }
    }

    fn serve(
        &mut self,
        config: Config,
        mode: IndicatorMode,
        work_path: &Path,
    ) -> Result<(), AppError> {
        let stdout = &mut *self.io.stdout;
        let mut announced = Ok(());
        let report = self
            .launcher
            .launch(config, mode, work_path, &mut |addr| {
                announced = announce_ready(&mut *stdout, mode, addr);
            })?;
        announced?;
        writeln!(
            stdout,
            "Server stopped; {} connection(s) closed.",
            report.closed
        )?;
        Ok(())
    }

    fn clear(&mut self, config: &Config, work_path: &Path) -> Result<(), AppError> {
        let removed = WorkPaths::from_config(work_path, config)?.clear_collected()?;
        writeln!(
            self.io.stdout,
            "Directory cleared of captured financial data."
        )?;
        writeln!(self.io.stdout, "Removed {removed} collected file(s).")?;
        Ok(())
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr);
    run_with(args, &mut io, &OrthoConfigLoader, &SystemLauncher)
}

/// Runs the CLI with a custom configuration loader and launcher.
#[must_use]
pub(crate) fn run_with<'a, I, W, E, L, R>(
    args: I,
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
    launcher: &'a R,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
    R: Launcher,
{
    CliRunner::new(io, loader, launcher).run(args)
}

fn prepare_cli_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    args.first()
        .into_iter()
        .chain(args.iter().skip(split.command_start))
        .cloned()
        .collect()
}

fn announce_ready<W: Write>(out: &mut W, mode: IndicatorMode, addr: SocketAddr) -> io::Result<()> {
    let banner = match mode {
        IndicatorMode::Collect => "Ready to collect data from remote indicator.",
        IndicatorMode::Run => "Indicator ready.",
    };
    writeln!(out, "{banner}")?;
    writeln!(out, "Waiting for connections on port {}", addr.port())?;
    out.flush()
}
