use std::fmt;

use serde::{Deserialize, Serialize};

/// TCP endpoint the indicator server binds to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenEndpoint {
    /// Host name or literal address.
    pub host: String,
    /// TCP port; `0` asks the OS for an ephemeral port.
    pub port: u16,
}

impl ListenEndpoint {
    /// Builds an endpoint from its parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Loopback endpoint on an ephemeral port, mainly for tests.
    #[must_use]
    pub fn ephemeral_loopback() -> Self {
        Self::new("127.0.0.1", 0)
    }
}

impl fmt::Display for ListenEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "tcp://{}:{}", self.host, self.port)
    }
}
