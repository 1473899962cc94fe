//! Typed errors for amplifier transport and startup configuration.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failure talking to a single amplifier. Always recoverable: the device is
/// retried on the next decision tick.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out after {timeout:?} while {action} {addr}")]
    Timeout {
        addr: String,
        action: &'static str,
        timeout: Duration,
    },

    #[error("failed to send {command:?} to {addr}: {source}")]
    Send {
        addr: String,
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("connection to {addr} closed")]
    Closed { addr: String },
}

/// Invalid or missing settings, detected before the sample loop starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no amplifier addresses configured (use --amps or \"amps\" in the settings file)")]
    NoAmps,

    #[error("invalid amplifier address {0:?}")]
    BadAddress(String),

    #[error("{name} must be greater than zero")]
    NotPositive { name: &'static str },

    #[error("{name} must be at most {max}")]
    TooLarge { name: &'static str, max: u64 },

    #[error("variance threshold must be a finite, non-negative number (got {0})")]
    BadThreshold(String),
}
