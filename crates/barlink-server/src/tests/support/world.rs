//! BDD test world: owns the work directory, the launched server thread, and
//! a protocol client for step functions.

use std::cell::RefCell;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use barlink_config::{Config, WorkPaths};
use barlink_protocol::Message;
use ortho_config::OrthoError;
use tempfile::TempDir;

use crate::bootstrap::{ConfigLoader, IndicatorMode};
use crate::model::JsonModelStore;
use crate::observer::ConnectionObserver;
use crate::process::LaunchError;
use crate::process::launch::{LaunchPlan, ProcessControl, ServiceDeps, run_indicator_with};
use crate::server::DrainReport;

use super::client::TestClient;
use super::config_loader::{
    FailingConfigLoader, TestConfigLoader, work_dir, write_corrupt_model, write_sum_model,
};
use super::observer::RecordingObserver;
use super::reporter::RecordingServerReporter;
use super::shutdown::{ShutdownTrigger, shutdown_pair};

type LaunchOutcome = Result<DrainReport, LaunchError>;

#[derive(Clone)]
struct SharedLoader(Arc<dyn ConfigLoader>);

impl ConfigLoader for SharedLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        self.0.load()
    }
}

struct Launched {
    addr: SocketAddr,
    trigger: ShutdownTrigger,
    thread: JoinHandle<LaunchOutcome>,
}

/// Scenario world shared across BDD steps.
pub struct LaunchWorld {
    work_dir: TempDir,
    config: TestConfigLoader,
    loader: SharedLoader,
    pub reporter: Arc<RecordingServerReporter>,
    pub observer: Arc<RecordingObserver>,
    launched: Option<Launched>,
    outcome: Option<LaunchOutcome>,
    client: Option<TestClient>,
    pub last_reply: Option<Message>,
}

impl LaunchWorld {
    #[must_use]
    pub fn new() -> Self {
        let config = TestConfigLoader::new();
        Self {
            work_dir: work_dir(),
            loader: SharedLoader(Arc::new(config.clone())),
            config,
            reporter: Arc::new(RecordingServerReporter::default()),
            observer: Arc::new(RecordingObserver::default()),
            launched: None,
            outcome: None,
            client: None,
            last_reply: None,
        }
    }

    pub fn use_failing_loader(&mut self) {
        self.loader = SharedLoader(Arc::new(FailingConfigLoader));
    }

    pub fn use_input_window(&mut self, window: usize) {
        self.config = self.config.clone().with_input_window(window);
        self.loader = SharedLoader(Arc::new(self.config.clone()));
    }

    pub fn install_sum_model(&self, width: usize) {
        write_sum_model(self.work_dir.path(), self.config.config(), width);
    }

    pub fn install_corrupt_model(&self) {
        write_corrupt_model(self.work_dir.path(), self.config.config());
    }

    /// Runs the launch sequence on a background thread and waits until the
    /// listener is bound or the launch fails.
    pub fn launch(&mut self, mode: IndicatorMode) {
        let (shutdown, trigger) = shutdown_pair();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let plan = LaunchPlan {
            process: ProcessControl {
                mode,
                work_dir: self.work_dir.path().to_path_buf(),
                shutdown,
            },
            services: ServiceDeps {
                loader: self.loader.clone(),
                reporter: self.reporter.clone(),
                store: Arc::new(JsonModelStore),
                observers: vec![self.observer.clone() as Arc<dyn ConnectionObserver>],
            },
        };
        let thread = thread::spawn(move || {
            run_indicator_with(plan, move |addr| {
                let _ = ready_tx.send(addr);
            })
        });
        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(addr) => {
                self.launched = Some(Launched {
                    addr,
                    trigger,
                    thread,
                });
            }
            Err(_) => {
                self.outcome = Some(thread.join().expect("launch thread panicked"));
            }
        }
    }

    /// Address of the running server.
    #[must_use]
    pub fn addr(&self) -> Option<SocketAddr> {
        self.launched.as_ref().map(|launched| launched.addr)
    }

    pub fn connect(&mut self) {
        let addr = self.addr().expect("server is not running");
        self.client = Some(TestClient::connect(addr));
    }

    pub fn send(&mut self, message: &Message) {
        self.client
            .as_mut()
            .expect("no client connected")
            .send(message);
    }

    pub fn request(&mut self, message: &Message) {
        let reply = self
            .client
            .as_mut()
            .expect("no client connected")
            .request(message);
        self.last_reply = Some(reply);
    }

    /// Fires the shutdown signal and collects the launch result.
    pub fn shut_down(&mut self) {
        if let Some(launched) = self.launched.take() {
            launched.trigger.fire();
            self.outcome = Some(launched.thread.join().expect("launch thread panicked"));
        }
    }

    /// Result of the finished launch, if it has finished.
    #[must_use]
    pub fn outcome(&self) -> Option<&LaunchOutcome> {
        self.outcome.as_ref()
    }

    /// Contents of each collection file in the work directory.
    #[must_use]
    pub fn collected_contents(&self) -> Vec<String> {
        let paths = WorkPaths::from_config(self.work_dir.path(), self.config.config())
            .expect("work paths");
        paths
            .collected_files()
            .expect("list collected files")
            .iter()
            .map(|path| fs::read_to_string(path).expect("read collected file"))
            .collect()
    }
}

impl Default for LaunchWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LaunchWorld {
    fn drop(&mut self) {
        if let Some(launched) = self.launched.take() {
            launched.trigger.fire();
            let _ = launched.thread.join();
        }
    }
}

/// Default test world fixture.
pub fn world() -> RefCell<LaunchWorld> {
    RefCell::new(LaunchWorld::new())
}
