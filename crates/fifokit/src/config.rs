//! Channel configuration
//!
//! [`ChannelConfig`] carries everything a [`PipeChannel`](crate::PipeChannel)
//! needs besides its path. It is serde-friendly so hosts can keep channel
//! defaults in a config file; durations travel as milliseconds.

use crate::error::{FifoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default pause between worker turns when there is nothing to do.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(250);

/// Default size of a single read from the pipe.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Concurrency mode of a channel, fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Reads and writes perform the pipe operation on the caller's thread.
    Blocking,
    /// A background worker services the pipe; callers only touch buffers.
    #[default]
    NonBlocking,
}

impl Mode {
    /// Check if this is the background-worker mode
    pub fn is_non_blocking(&self) -> bool {
        matches!(self, Mode::NonBlocking)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Blocking => write!(f, "blocking"),
            Mode::NonBlocking => write!(f, "non-blocking"),
        }
    }
}

/// Current duty of a channel's background worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Nothing to do; the worker sleeps between checks
    Idle,
    /// Drain the pipe into the read buffer
    #[default]
    Reading,
    /// Flush the write buffer into the pipe
    Writing,
    /// Terminal: the worker has exited or is about to
    Stopped,
}

impl Role {
    /// Check if this is the terminal role
    pub fn is_stopped(&self) -> bool {
        matches!(self, Role::Stopped)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Idle => write!(f, "idle"),
            Role::Reading => write!(f, "reading"),
            Role::Writing => write!(f, "writing"),
            Role::Stopped => write!(f, "stopped"),
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Diagnostic name, used in logs and the worker thread name
    pub name: String,
    /// Blocking or background-worker mode
    pub mode: Mode,
    /// Role the worker starts in
    pub initial_role: Role,
    /// Pause between turns, and the upper bound on how long the worker
    /// takes to notice a role change while no peer is attached
    #[serde(with = "duration_ms", rename = "idle_interval_ms")]
    pub idle_interval: Duration,
    /// Bytes requested per read from the pipe
    pub read_chunk_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "fifo".to_string(),
            mode: Mode::NonBlocking,
            initial_role: Role::Reading,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl ChannelConfig {
    /// Create a configuration with the given name and defaults otherwise.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Reject settings the worker cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.initial_role.is_stopped() {
            return Err(FifoError::configuration(
                "initial role cannot be `stopped`",
            ));
        }
        if self.idle_interval.is_zero() {
            return Err(FifoError::configuration("idle interval must be non-zero"));
        }
        if self.read_chunk_size == 0 {
            return Err(FifoError::configuration("read chunk size must be non-zero"));
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.mode, Mode::NonBlocking);
        assert_eq!(config.initial_role, Role::Reading);
        assert_eq!(config.idle_interval, DEFAULT_IDLE_INTERVAL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = ChannelConfig::named("bad");
        config.initial_role = Role::Stopped;
        assert!(matches!(config.validate(), Err(FifoError::Configuration(_))));

        let mut config = ChannelConfig::named("bad");
        config.idle_interval = Duration::ZERO;
        assert!(matches!(config.validate(), Err(FifoError::Configuration(_))));

        let mut config = ChannelConfig::named("bad");
        config.read_chunk_size = 0;
        assert!(matches!(config.validate(), Err(FifoError::Configuration(_))));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::json!({
            "name": "bridge",
            "mode": "blocking",
            "initial_role": "writing",
            "idle_interval_ms": 50
        });
        let config: ChannelConfig = serde_json::from_value(json).unwrap();

        assert_eq!(config.name, "bridge");
        assert_eq!(config.mode, Mode::Blocking);
        assert_eq!(config.initial_role, Role::Writing);
        assert_eq!(config.idle_interval, Duration::from_millis(50));
        assert_eq!(config.read_chunk_size, DEFAULT_READ_CHUNK_SIZE);

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["idle_interval_ms"], 50);
        assert_eq!(back["mode"], "blocking");
    }

    #[test]
    fn test_display() {
        assert_eq!(Mode::NonBlocking.to_string(), "non-blocking");
        assert_eq!(Role::Writing.to_string(), "writing");
    }
}
