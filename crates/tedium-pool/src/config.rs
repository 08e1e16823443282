//! Pool configuration.

use std::time::Duration;

use crate::error::PoolError;

/// Pool sizing and timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Idle sessions are never trimmed below this count (except while
    /// draining).
    pub min_connections: u32,

    /// Upper bound on live sessions, counting ones still connecting.
    pub max_connections: u32,

    /// How long a session may sit idle before it is trimmed. Also the
    /// period of the background trim.
    pub idle_timeout: Duration,

    /// How long `acquire` may wait for a session. `None` waits forever.
    pub connection_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 0,
            max_connections: 20,
            idle_timeout: Duration::from_secs(30),
            connection_timeout: None,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum number of sessions kept through trimming.
    #[must_use]
    pub fn min_connections(mut self, count: u32) -> Self {
        self.min_connections = count;
        self
    }

    /// Set the maximum number of sessions.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.max_connections = count;
        self
    }

    /// Set the idle timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Bound how long `acquire` waits.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Check the configuration for consistency.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_connections == 0 {
            return Err(PoolError::Configuration(
                "max_connections must be at least 1".into(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(PoolError::Configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        if self.idle_timeout.is_zero() {
            return Err(PoolError::Configuration(
                "idle_timeout must be positive".into(),
            ));
        }
        if self.connection_timeout.is_some_and(|t| t.is_zero()) {
            return Err(PoolError::Configuration(
                "connection_timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}
