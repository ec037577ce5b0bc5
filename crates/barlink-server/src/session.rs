//! Per-connection protocol state machine.
//!
//! A session moves from awaiting the handshake, to active, to closed. The
//! transition into active publishes an `opened` lifecycle event and the
//! matching `closed` event is published when the active state is left, on
//! every path out of it.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use barlink_protocol::{
    CodecError, DecodeOutcome, ErrorCode, FrameDecoder, MalformedFrame, Message, encode,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::capability::IndicatorCapability;
use crate::observer::{Link, ObserverHub};
use crate::registry::{IndicatorRegistry, RegistryError};

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");
const READ_CHUNK_BYTES: usize = 4096;

/// Byte stream a session runs over.
pub(crate) trait SessionIo: Read + Write {
    /// Bounds how long a single read may block; `None` removes the bound.
    fn set_idle_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

impl SessionIo for TcpStream {
    fn set_idle_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)
    }
}

/// Connection-fatal session failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The peer sent a message that is not valid in the current state.
    #[error("protocol violation: {reason}")]
    ProtocolViolation {
        /// Description sent to the peer.
        reason: String,
    },
    /// The handshake named an indicator nobody registered.
    #[error("unknown indicator '{name}'")]
    UnknownIndicator {
        /// Requested name.
        name: String,
    },
    /// The peer sent bytes that do not decode as a message.
    #[error("malformed frame: {0}")]
    Malformed(#[from] MalformedFrame),
    /// No data row arrived before the idle bound expired.
    #[error("connection idle for longer than {timeout:?} before the first data row")]
    IdleTimeout {
        /// Configured bound.
        timeout: Duration,
    },
    /// Reading from or writing to the socket failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    /// A reply could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl SessionError {
    /// Wire code sent to the peer before closing, when one applies.
    #[must_use]
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::ProtocolViolation { .. } | Self::Malformed(_) => {
                Some(ErrorCode::ProtocolViolation)
            }
            Self::UnknownIndicator { .. } => Some(ErrorCode::UnknownIndicator),
            Self::IdleTimeout { .. } | Self::Transport(_) | Self::Codec(_) => None,
        }
    }
}

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer sent `close` and received the acknowledgement.
    Closed,
    /// The peer disconnected.
    Disconnected,
}

/// Shared, read-only state every session needs.
pub(crate) struct SessionContext {
    pub(crate) registry: IndicatorRegistry,
    pub(crate) observers: Arc<ObserverHub>,
    pub(crate) max_frame_bytes: usize,
    pub(crate) handshake_timeout: Option<Duration>,
}

/// Drives the protocol for one connection.
pub(crate) struct Session<'ctx, S> {
    stream: S,
    link: Link,
    context: &'ctx SessionContext,
    decoder: FrameDecoder,
    chunk: Box<[u8]>,
    idle_bound: Option<Duration>,
}

impl<'ctx, S: SessionIo> Session<'ctx, S> {
    pub(crate) fn new(stream: S, link: Link, context: &'ctx SessionContext) -> Self {
        Self {
            stream,
            link,
            context,
            decoder: FrameDecoder::new(context.max_frame_bytes),
            chunk: vec![0_u8; READ_CHUNK_BYTES].into_boxed_slice(),
            idle_bound: None,
        }
    }

    /// Runs the session to completion.
    ///
    /// Fatal errors are reported to the peer with a best-effort `error`
    /// message before being returned.
    pub(crate) fn run(&mut self) -> Result<SessionEnd, SessionError> {
        let outcome = self.drive();
        if let Err(error) = &outcome
            && let Some(code) = error.code()
        {
            self.send_best_effort(&Message::error(code, error.to_string()));
        }
        outcome
    }

    fn drive(&mut self) -> Result<SessionEnd, SessionError> {
        self.set_idle_bound(self.context.handshake_timeout)?;
        let Some(message) = self.next_message()? else {
            debug!(
                target: SESSION_TARGET,
                connection = self.link.id(),
                "peer disconnected before handshake"
            );
            return Ok(SessionEnd::Disconnected);
        };
        let Message::Handshake { indicator } = message else {
            return Err(SessionError::ProtocolViolation {
                reason: format!("expected handshake, received {}", message.kind()),
            });
        };
        let capability = self
            .context
            .registry
            .resolve(&indicator, &self.link)
            .map_err(|error| match error {
                RegistryError::UnknownIndicator { name } => SessionError::UnknownIndicator { name },
                other => SessionError::ProtocolViolation {
                    reason: other.to_string(),
                },
            })?;
        debug!(
            target: SESSION_TARGET,
            connection = self.link.id(),
            indicator = %indicator,
            capability = capability.kind(),
            "handshake accepted"
        );

        let context = self.context;
        let _active = ActiveGuard::enter(&context.observers, self.link);
        self.serve(capability)
    }

    fn serve(
        &mut self,
        mut capability: Box<dyn IndicatorCapability>,
    ) -> Result<SessionEnd, SessionError> {
        loop {
            let Some(message) = self.next_message()? else {
                return Ok(SessionEnd::Disconnected);
            };
            match message {
                Message::DataRow { fields } => {
                    if self.idle_bound.is_some() {
                        self.set_idle_bound(None)?;
                    }
                    let reply = match capability.consume(&fields) {
                        Ok(value) => Message::Result { value },
                        Err(error) => {
                            debug!(
                                target: SESSION_TARGET,
                                connection = self.link.id(),
                                error = %error,
                                "row rejected"
                            );
                            Message::error(error.code(), error.to_string())
                        }
                    };
                    self.send(&reply)?;
                }
                Message::Close => {
                    self.send(&Message::Close)?;
                    return Ok(SessionEnd::Closed);
                }
                other => {
                    return Err(SessionError::ProtocolViolation {
                        reason: format!("unexpected {} after handshake", other.kind()),
                    });
                }
            }
        }
    }

    fn next_message(&mut self) -> Result<Option<Message>, SessionError> {
        loop {
            if let DecodeOutcome::Complete(message) = self.decoder.decode()? {
                return Ok(Some(message));
            }
            let read = self.read_chunk()?;
            if read == 0 {
                if !self.decoder.is_empty() {
                    debug!(
                        target: SESSION_TARGET,
                        connection = self.link.id(),
                        "peer disconnected mid-frame"
                    );
                }
                return Ok(None);
            }
            self.decoder.extend(&self.chunk[..read]);
        }
    }

    fn read_chunk(&mut self) -> Result<usize, SessionError> {
        loop {
            match self.stream.read(&mut self.chunk) {
                Ok(read) => return Ok(read),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error)
                    if matches!(
                        error.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(match self.idle_bound {
                        Some(timeout) => SessionError::IdleTimeout { timeout },
                        None => SessionError::Transport(error),
                    });
                }
                Err(error) => return Err(SessionError::Transport(error)),
            }
        }
    }

    fn send(&mut self, message: &Message) -> Result<(), SessionError> {
        let bytes = encode(message)?;
        self.stream.write_all(&bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    fn send_best_effort(&mut self, message: &Message) {
        if let Err(error) = self.send(message) {
            debug!(
                target: SESSION_TARGET,
                connection = self.link.id(),
                error = %error,
                "failed to report error to peer"
            );
        }
    }

    fn set_idle_bound(&mut self, timeout: Option<Duration>) -> Result<(), SessionError> {
        self.stream.set_idle_timeout(timeout)?;
        self.idle_bound = timeout;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn into_stream(self) -> S {
        self.stream
    }
}

/// Publishes `opened` on creation and `closed` on drop.
struct ActiveGuard<'hub> {
    observers: &'hub ObserverHub,
    link: Link,
}

impl<'hub> ActiveGuard<'hub> {
    fn enter(observers: &'hub ObserverHub, link: Link) -> Self {
        observers.publish(&link, true);
        Self { observers, link }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.observers.publish(&self.link, false);
    }
}

/// Writes a single `server_busy` error to a connection the server will not serve.
pub(crate) fn reject_busy(stream: &mut impl Write, limit: usize) {
    let message = Message::error(
        ErrorCode::ServerBusy,
        format!("server is at its limit of {limit} connections"),
    );
    let written = encode(&message)
        .map_err(io::Error::other)
        .and_then(|bytes| stream.write_all(&bytes))
        .and_then(|()| stream.flush());
    if let Err(error) = written {
        warn!(
            target: SESSION_TARGET,
            error = %error,
            "failed to notify rejected connection"
        );
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
