//! Shared doubles and fixtures for the server test suites.

mod client;
mod config_loader;
mod observer;
mod reporter;
mod shutdown;
mod stream;
mod world;

pub use client::TestClient;
pub use config_loader::{
    FailingConfigLoader, TestConfigLoader, work_dir, write_corrupt_model, write_sum_model,
};
pub use observer::RecordingObserver;
pub use reporter::{RecordingServerReporter, ServerEvent};
pub use shutdown::{ChannelShutdown, ShutdownTrigger, shutdown_pair};
pub use stream::ScriptedStream;
pub use world::{LaunchWorld, world};
