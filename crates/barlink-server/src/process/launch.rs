//! Supervises indicator server launch sequencing and shutdown.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use barlink_config::Config;
use tracing::info;

use crate::bootstrap::{ConfigLoader, IndicatorMode, StaticConfigLoader, bootstrap_with};
use crate::health::{ServerReporter, StructuredServerReporter};
use crate::model::{JsonModelStore, ModelStore};
use crate::observer::{ConnectionObserver, LoggingObserver};
use crate::server::DrainReport;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Process-level collaborators needed to control the server lifecycle.
pub(crate) struct ProcessControl<S> {
    pub(crate) mode: IndicatorMode,
    pub(crate) work_dir: PathBuf,
    pub(crate) shutdown: S,
}

/// Service dependencies required to construct the server.
pub(crate) struct ServiceDeps<L> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn ServerReporter>,
    pub(crate) store: Arc<dyn ModelStore>,
    pub(crate) observers: Vec<Arc<dyn ConnectionObserver>>,
}

/// Collaborators required to launch the indicator server.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) process: ProcessControl<S>,
    pub(crate) services: ServiceDeps<L>,
}

/// Serves `mode` from `work_dir` until a termination signal arrives.
///
/// `on_ready` runs once the listener is bound, with the address it bound to.
/// The server is then stopped gracefully and the drain summary returned.
///
/// # Errors
///
/// Returns [`LaunchError::Bootstrap`] when the work directory or model is
/// unusable (nothing is bound in that case), [`LaunchError::Server`] when
/// binding fails or connections outlive the drain deadline, and
/// [`LaunchError::Shutdown`] when signal handlers cannot be installed.
/// Handlers are registered before bootstrap; a signal received during
/// startup stops the server as soon as it is listening.
pub fn run_indicator<F>(
    config: Config,
    mode: IndicatorMode,
    work_dir: &Path,
    on_ready: F,
) -> Result<DrainReport, LaunchError>
where
    F: FnOnce(SocketAddr),
{
    let shutdown = SystemShutdownSignal::install(config.drain_timeout())?;
    let plan = LaunchPlan {
        process: ProcessControl {
            mode,
            work_dir: work_dir.to_path_buf(),
            shutdown,
        },
        services: ServiceDeps {
            loader: StaticConfigLoader::new(config),
            reporter: Arc::new(StructuredServerReporter::new()),
            store: Arc::new(JsonModelStore),
            observers: vec![Arc::new(LoggingObserver) as Arc<dyn ConnectionObserver>],
        },
    };
    run_indicator_with(plan, on_ready)
}

/// Runs the indicator server with injected collaborators.
pub(crate) fn run_indicator_with<L, S, F>(
    plan: LaunchPlan<L, S>,
    on_ready: F,
) -> Result<DrainReport, LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
    F: FnOnce(SocketAddr),
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl {
        mode,
        work_dir,
        mut shutdown,
    } = process;
    let ServiceDeps {
        loader,
        reporter,
        store,
        observers,
    } = services;

    let bootstrapped = bootstrap_with(&loader, Arc::clone(&reporter), &work_dir)?;
    let telemetry = bootstrapped.telemetry();
    info!(
        target: PROCESS_TARGET,
        %mode,
        work_dir = %bootstrapped.paths().work_dir().display(),
        log_format = %telemetry.format(),
        subscriber_reused = !telemetry.installed_now(),
        "starting indicator runtime"
    );
    let server = bootstrapped.build_server(mode, store.as_ref())?;
    for observer in observers {
        server.add_listener(observer)?;
    }

    let running = server.start()?;
    let local_addr = running.local_addr();
    reporter.listening(mode, local_addr);
    on_ready(local_addr);

    let waited = shutdown.wait();
    reporter.stopping();
    let stopped = running.stop();
    match &stopped {
        Ok(report) => reporter.stopped(report),
        Err(error) => reporter.stop_failed(error),
    }
    waited?;
    let report = stopped?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(report)
}
