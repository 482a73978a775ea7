//! Error types shared by the bus boundary and the config store.
//!
//! None of these ever escape the polling loop: the discovery and fetch
//! wrappers log them and degrade, and the config store falls back to
//! defaults. They surface to callers only through the setter API, where a
//! zero value is refused.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a remote call against the sensor bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The transport itself failed (object vanished, I/O error, peer gone).
    #[error("transport error: {0}")]
    Transport(String),

    /// The call did not complete within its deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The peer answered, but with something that is not the expected shape.
    #[error("malformed reply: {0}")]
    MalformedReply(String),

    /// The registry answered with no objects for the requested interface.
    #[error("empty response for interface {0}")]
    EmptyResponse(String),
}

/// Failure while loading, validating or persisting the tunables.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A tunable was zero. Both interval and time-frame must be positive.
    #[error("{field} must be greater than zero")]
    InvalidValue { field: &'static str },
}

/// Result alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_error_messages_carry_context() {
        let err = BusError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "call timed out after 5s");

        let err = BusError::EmptyResponse("xyz.openbmc_project.Sensor.Value".into());
        assert!(err.to_string().contains("Sensor.Value"));
    }

    #[test]
    fn invalid_value_names_the_field() {
        let err = ConfigError::InvalidValue { field: "interval" };
        assert_eq!(err.to_string(), "interval must be greater than zero");
    }
}
