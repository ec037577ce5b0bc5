//! Shutdown signal driven by the test thread.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::process::{ShutdownError, ShutdownSignal};

/// Releases `wait` once the paired [`ShutdownTrigger`] fires or is dropped.
pub struct ChannelShutdown {
    receiver: Receiver<()>,
}

/// Test-side half of [`ChannelShutdown`].
#[derive(Clone)]
pub struct ShutdownTrigger {
    sender: Sender<()>,
}

impl ShutdownTrigger {
    pub fn fire(&self) {
        let _ = self.sender.send(());
    }
}

/// Builds a connected shutdown pair.
#[must_use]
pub fn shutdown_pair() -> (ChannelShutdown, ShutdownTrigger) {
    let (sender, receiver) = unbounded();
    (ChannelShutdown { receiver }, ShutdownTrigger { sender })
}

impl ShutdownSignal for ChannelShutdown {
    fn wait(&mut self) -> Result<(), ShutdownError> {
        let _ = self.receiver.recv();
        Ok(())
    }
}
