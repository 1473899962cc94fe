//! Amplifier control: power states, the transport seam, and the actuator.
//!
//! A transport only knows how to open a connection and push opaque command
//! tokens down it. Which tokens make up a power transition lives here.

pub mod actuator;
pub mod denon;
pub mod registry;

#[cfg(test)]
pub mod mock;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::TransportError;

pub use actuator::{Actuator, Dispatch};
pub use denon::DenonTransport;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Target power state for an amplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Power {
    On,
    Standby,
}

impl Power {
    /// Ordered command tokens that drive a device into this state.
    pub fn commands(self) -> &'static [&'static str] {
        match self {
            Self::On => &["ZMON", "PWON"],
            Self::Standby => &["ZMOFF", "PWSTANDBY"],
        }
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => write!(f, "on"),
            Self::Standby => write!(f, "standby"),
        }
    }
}

/// Opens connections to amplifiers (dyn-compatible).
pub trait AmpTransport: Send + Sync {
    fn connect<'a>(
        &'a self,
        addr: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn AmpConnection>, TransportError>>;
}

/// One open connection to an amplifier.
pub trait AmpConnection: Send {
    /// Send a single command token.
    fn send<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<(), TransportError>>;

    /// Close the connection. Errors are not interesting at this point.
    fn close(self: Box<Self>) -> BoxFuture<'static, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_sequences() {
        assert_eq!(Power::On.commands(), &["ZMON", "PWON"]);
        assert_eq!(Power::Standby.commands(), &["ZMOFF", "PWSTANDBY"]);
        assert_eq!(Power::Standby.to_string(), "standby");
    }
}
