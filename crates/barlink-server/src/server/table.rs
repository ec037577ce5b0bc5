//! Bookkeeping for live connections.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use super::SERVER_TARGET;
use crate::observer::Link;

/// Why a connection was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// The connection limit is reached.
    Busy,
    /// The server is stopping.
    Closing,
}

#[derive(Default)]
struct TableState {
    closing: bool,
    next_id: u64,
    live: HashMap<u64, TcpStream>,
}

/// Tracks a socket clone per live connection so `stop` can unblock them.
pub(crate) struct ConnectionTable {
    limit: usize,
    state: Mutex<TableState>,
    drained: Condvar,
}

impl ConnectionTable {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            state: Mutex::new(TableState::default()),
            drained: Condvar::new(),
        }
    }

    pub(crate) const fn limit(&self) -> usize {
        self.limit
    }

    /// Admits a connection and assigns it an id.
    pub(crate) fn register(&self, peer: SocketAddr, socket: TcpStream) -> Result<Link, Admission> {
        let mut state = self.lock();
        if state.closing {
            return Err(Admission::Closing);
        }
        if state.live.len() >= self.limit {
            return Err(Admission::Busy);
        }
        state.next_id += 1;
        let id = state.next_id;
        state.live.insert(id, socket);
        Ok(Link::new(id, peer))
    }

    pub(crate) fn deregister(&self, id: u64) {
        let mut state = self.lock();
        state.live.remove(&id);
        if state.live.is_empty() {
            self.drained.notify_all();
        }
    }

    /// Refuses further registrations and shuts down every live socket.
    ///
    /// Returns how many connections were live.
    pub(crate) fn close_all(&self) -> usize {
        let mut state = self.lock();
        state.closing = true;
        for (id, socket) in &state.live {
            if let Err(error) = socket.shutdown(Shutdown::Both)
                && error.kind() != io::ErrorKind::NotConnected
            {
                debug!(
                    target: SERVER_TARGET,
                    connection = id,
                    error = %error,
                    "failed to shut down connection socket"
                );
            }
        }
        state.live.len()
    }

    /// Waits until no connection is live or `timeout` elapses.
    ///
    /// Returns the number of connections still live.
    pub(crate) fn wait_drained(&self, timeout: Duration) -> usize {
        let state = self.lock();
        let (state, _) = self
            .drained
            .wait_timeout_while(state, timeout, |state| !state.live.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        state.live.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().live.len()
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes a connection from the table when dropped.
pub(crate) struct Registration<'table> {
    table: &'table ConnectionTable,
    id: u64,
}

impl<'table> Registration<'table> {
    pub(crate) const fn new(table: &'table ConnectionTable, id: u64) -> Self {
        Self { table, id }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.table.deregister(self.id);
    }
}
