//! Indicator server: registry, listener and connection lifecycle.
//!
//! An [`IndicatorServer`] collects indicator factories and observers, then
//! [`IndicatorServer::start`] binds the listener and returns a
//! [`RunningServer`]. Each accepted connection runs a session on its own
//! thread. [`RunningServer::stop`] stops accepting, shuts down every live
//! socket, waits for the sessions to finish within the drain deadline, and
//! finally flushes pending observer notifications before that same deadline.

mod table;

use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use barlink_config::{Config, ListenEndpoint};
use thiserror::Error;
use tracing::{debug, info, warn};

use self::table::{Admission, ConnectionTable, Registration};
use crate::observer::{ConnectionObserver, ObserverHub};
use crate::registry::{IndicatorFactory, RegistryBuilder, RegistryError};
use crate::session::{Session, SessionContext, SessionError, reject_busy};
use crate::transport::{ConnectionHandler, ListenerError, ListenerHandle, SocketListener};

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Runtime settings for an [`IndicatorServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Address to listen on.
    pub endpoint: ListenEndpoint,
    /// Maximum number of concurrently served connections.
    pub max_connections: usize,
    /// Idle bound between accept and the first data row; `None` disables it.
    pub handshake_timeout: Option<Duration>,
    /// How long `stop` waits for connections to finish.
    pub drain_timeout: Duration,
    /// Capacity of each observer's event queue.
    pub observer_queue_capacity: usize,
    /// Longest accepted frame in bytes.
    pub max_frame_bytes: usize,
}

impl ServerSettings {
    /// Derives settings from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let handshake_timeout = config.handshake_timeout();
        Self {
            endpoint: config.listen_endpoint(),
            max_connections: config.max_connections,
            handshake_timeout: (!handshake_timeout.is_zero()).then_some(handshake_timeout),
            drain_timeout: config.drain_timeout(),
            observer_queue_capacity: config.observer_queue_capacity,
            max_frame_bytes: config.max_frame_bytes,
        }
    }

    /// Replaces the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: ListenEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Errors surfaced by the server API.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or running the listener failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// Registering an indicator failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// An observer delivery thread could not be started.
    #[error("failed to start observer delivery thread: {source}")]
    ObserverSpawn {
        /// Underlying spawn error.
        #[source]
        source: io::Error,
    },
    /// Connections were still live when the drain deadline passed.
    #[error("{remaining} connection(s) still open after {timeout:?}")]
    DrainTimeout {
        /// Connections abandoned at the deadline.
        remaining: usize,
        /// Configured drain deadline.
        timeout: Duration,
    },
}

/// Summary of a clean shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Connections that were live when `stop` began.
    pub closed: usize,
    /// Time spent stopping.
    pub elapsed: Duration,
}

/// Server under construction.
pub struct IndicatorServer {
    settings: ServerSettings,
    registry: RegistryBuilder,
    observers: Arc<ObserverHub>,
}

impl IndicatorServer {
    /// Creates a server with no indicators or observers.
    #[must_use]
    pub fn new(settings: ServerSettings) -> Self {
        let observers = Arc::new(ObserverHub::new(settings.observer_queue_capacity));
        Self {
            settings,
            registry: RegistryBuilder::new(),
            observers,
        }
    }

    /// Settings the server was created with.
    #[must_use]
    pub const fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Registers `factory` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Registry`] for duplicate or empty names.
    pub fn add_indicator_factory(
        &mut self,
        name: impl Into<String>,
        factory: impl IndicatorFactory + 'static,
    ) -> Result<(), ServerError> {
        self.registry.register(name, Arc::new(factory))?;
        Ok(())
    }

    /// Registers an observer of connection lifecycle events.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ObserverSpawn`] when its delivery thread cannot
    /// be started.
    pub fn add_listener(&self, observer: Arc<dyn ConnectionObserver>) -> Result<(), ServerError> {
        self.observers
            .add(observer)
            .map_err(|source| ServerError::ObserverSpawn { source })
    }

    /// Binds the endpoint and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Listener`] when the endpoint cannot be bound or
    /// the accept thread cannot be started.
    pub fn start(self) -> Result<RunningServer, ServerError> {
        let Self {
            settings,
            registry,
            observers,
        } = self;
        let listener = SocketListener::bind(&settings.endpoint)?;
        let local_addr = listener.local_addr();
        let table = Arc::new(ConnectionTable::new(settings.max_connections));
        let registry = registry.freeze();
        let indicators: Vec<String> = registry.names().into_iter().map(str::to_owned).collect();
        let handler = Arc::new(ServerHandler {
            context: SessionContext {
                registry,
                observers: Arc::clone(&observers),
                max_frame_bytes: settings.max_frame_bytes,
                handshake_timeout: settings.handshake_timeout,
            },
            table: Arc::clone(&table),
        });
        let listener = listener.start(handler)?;
        info!(
            target: SERVER_TARGET,
            local_addr = %local_addr,
            indicators = ?indicators,
            max_connections = settings.max_connections,
            "indicator server started"
        );
        Ok(RunningServer {
            local_addr,
            listener: Some(listener),
            table,
            observers,
            drain_timeout: settings.drain_timeout,
        })
    }
}

/// Handle to a started server.
pub struct RunningServer {
    local_addr: SocketAddr,
    listener: Option<ListenerHandle>,
    table: Arc<ConnectionTable>,
    observers: Arc<ObserverHub>,
    drain_timeout: Duration,
}

impl RunningServer {
    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Registers an observer while the server is running.
    ///
    /// The observer only sees events for transitions after registration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ObserverSpawn`] when its delivery thread cannot
    /// be started.
    pub fn add_listener(&self, observer: Arc<dyn ConnectionObserver>) -> Result<(), ServerError> {
        self.observers
            .add(observer)
            .map_err(|source| ServerError::ObserverSpawn { source })
    }

    /// Number of connections currently being served.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.table.len()
    }

    /// Stops accepting, closes every connection, and waits for them to drain.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::DrainTimeout`] when connections are still live
    /// at the deadline, or [`ServerError::Listener`] when the accept thread
    /// panicked. Observer queues are flushed in both cases, within the same
    /// deadline; observers still busy when it passes are detached.
    pub fn stop(mut self) -> Result<DrainReport, ServerError> {
        let started = Instant::now();
        info!(target: SERVER_TARGET, local_addr = %self.local_addr, "stopping indicator server");
        let listener_result = match self.listener.take() {
            Some(listener) => {
                listener.shutdown();
                listener.join()
            }
            None => Ok(()),
        };

        let deadline = started + self.drain_timeout;
        let closed = self.table.close_all();
        let remaining = self
            .table
            .wait_drained(deadline.saturating_duration_since(Instant::now()));
        self.observers.close(deadline);
        listener_result?;

        if remaining > 0 {
            warn!(
                target: SERVER_TARGET,
                remaining,
                timeout = ?self.drain_timeout,
                "abandoning connections that did not close in time"
            );
            return Err(ServerError::DrainTimeout {
                remaining,
                timeout: self.drain_timeout,
            });
        }
        let report = DrainReport {
            closed,
            elapsed: started.elapsed(),
        };
        info!(
            target: SERVER_TARGET,
            closed = report.closed,
            elapsed = ?report.elapsed,
            "indicator server stopped"
        );
        Ok(report)
    }
}

struct ServerHandler {
    context: SessionContext,
    table: Arc<ConnectionTable>,
}

impl ConnectionHandler for ServerHandler {
    fn handle(&self, mut stream: TcpStream, peer: SocketAddr) {
        let tracked = match stream.try_clone() {
            Ok(tracked) => tracked,
            Err(error) => {
                warn!(
                    target: SERVER_TARGET,
                    peer = %peer,
                    error = %error,
                    "failed to clone connection socket; dropping connection"
                );
                return;
            }
        };
        let link = match self.table.register(peer, tracked) {
            Ok(link) => link,
            Err(Admission::Busy) => {
                warn!(
                    target: SERVER_TARGET,
                    peer = %peer,
                    limit = self.table.limit(),
                    "connection limit reached; rejecting connection"
                );
                reject_busy(&mut stream, self.table.limit());
                if let Err(error) = stream.shutdown(Shutdown::Both) {
                    debug!(
                        target: SERVER_TARGET,
                        peer = %peer,
                        error = %error,
                        "failed to shut down rejected connection"
                    );
                }
                return;
            }
            Err(Admission::Closing) => {
                debug!(
                    target: SERVER_TARGET,
                    peer = %peer,
                    "server stopping; dropping connection"
                );
                return;
            }
        };
        let _registration = Registration::new(&self.table, link.id());
        debug!(target: SERVER_TARGET, connection = %link, "connection accepted");

        match Session::new(stream, link, &self.context).run() {
            Ok(end) => debug!(
                target: SERVER_TARGET,
                connection = %link,
                end = ?end,
                "session finished"
            ),
            Err(error @ (SessionError::Transport(_) | SessionError::IdleTimeout { .. })) => {
                debug!(
                    target: SERVER_TARGET,
                    connection = %link,
                    error = %error,
                    "session ended by transport"
                );
            }
            Err(error) => warn!(
                target: SERVER_TARGET,
                connection = %link,
                error = %error,
                "session failed"
            ),
        }
    }
}
