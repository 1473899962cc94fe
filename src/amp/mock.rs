//! Scripted in-memory transport for tests.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{AmpConnection, AmpTransport, BoxFuture};
use crate::error::TransportError;

#[derive(Debug, Default)]
struct AmpScript {
    connects: usize,
    sent: Vec<String>,
    failing_connects: usize,
    failing_commands: HashSet<String>,
}

type Scripts = Arc<Mutex<HashMap<String, AmpScript>>>;

/// Records every connect and accepted command per address. Failures are
/// injected per address.
#[derive(Debug, Default)]
pub struct MockTransport {
    amps: Scripts,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `count` connects to `addr`.
    pub fn fail_connects(&self, addr: &str, count: usize) {
        self.amps.lock().entry(addr.to_string()).or_default().failing_connects = count;
    }

    /// Fail every send of `command` to `addr`.
    pub fn fail_command(&self, addr: &str, command: &str) {
        self.amps
            .lock()
            .entry(addr.to_string())
            .or_default()
            .failing_commands
            .insert(command.to_string());
    }

    pub fn clear_failures(&self, addr: &str) {
        if let Some(script) = self.amps.lock().get_mut(addr) {
            script.failing_connects = 0;
            script.failing_commands.clear();
        }
    }

    pub fn connects(&self, addr: &str) -> usize {
        self.amps.lock().get(addr).map_or(0, |s| s.connects)
    }

    /// Commands that were accepted, in order.
    pub fn sent(&self, addr: &str) -> Vec<String> {
        self.amps
            .lock()
            .get(addr)
            .map(|s| s.sent.clone())
            .unwrap_or_default()
    }

    /// Accepted commands across all amps.
    pub fn total_sent(&self) -> usize {
        self.amps.lock().values().map(|s| s.sent.len()).sum()
    }

    /// Number of times `addr` accepted `command`.
    pub fn count_command(&self, addr: &str, command: &str) -> usize {
        self.sent(addr).iter().filter(|c| *c == command).count()
    }
}

impl AmpTransport for MockTransport {
    fn connect<'a>(
        &'a self,
        addr: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn AmpConnection>, TransportError>> {
        Box::pin(async move {
            let mut amps = self.amps.lock();
            let script = amps.entry(addr.to_string()).or_default();
            if script.failing_connects > 0 {
                script.failing_connects -= 1;
                return Err(TransportError::Connect {
                    addr: addr.to_string(),
                    source: io::Error::from(io::ErrorKind::ConnectionRefused),
                });
            }
            script.connects += 1;
            Ok(Box::new(MockConnection {
                addr: addr.to_string(),
                amps: self.amps.clone(),
            }) as Box<dyn AmpConnection>)
        })
    }
}

struct MockConnection {
    addr: String,
    amps: Scripts,
}

impl AmpConnection for MockConnection {
    fn send<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            let mut amps = self.amps.lock();
            let script = amps.entry(self.addr.clone()).or_default();
            if script.failing_commands.contains(command) {
                return Err(TransportError::Send {
                    addr: self.addr.clone(),
                    command: command.to_string(),
                    source: io::Error::from(io::ErrorKind::BrokenPipe),
                });
            }
            script.sent.push(command.to_string());
            Ok(())
        })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}
