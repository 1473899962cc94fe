//! Denon AVR network control.
//!
//! The receiver listens on a telnet-style TCP port (23). Every command is an
//! ASCII token terminated by `\r`; the receiver may answer with a status line
//! terminated the same way, but plenty of commands get no reply at all.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::{AmpConnection, AmpTransport, BoxFuture};
use crate::error::TransportError;

/// Default Denon control port.
pub const DEFAULT_PORT: u16 = 23;

/// Upper bound on how long we linger for a status line after a command.
const REPLY_WAIT: Duration = Duration::from_millis(200);

/// Append the default port when `addr` has none. Returns `None` for an empty
/// host or a port that does not parse.
pub fn normalize_addr(addr: &str) -> Option<String> {
    let addr = addr.trim();
    if addr.is_empty() {
        return None;
    }
    match addr.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() || port.parse::<u16>().is_err() {
                None
            } else {
                Some(addr.to_string())
            }
        }
        None => Some(format!("{addr}:{DEFAULT_PORT}")),
    }
}

/// TCP transport for Denon receivers.
#[derive(Debug, Clone)]
pub struct DenonTransport {
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl DenonTransport {
    pub fn new(connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            command_timeout,
        }
    }
}

impl AmpTransport for DenonTransport {
    fn connect<'a>(
        &'a self,
        addr: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn AmpConnection>, TransportError>> {
        Box::pin(async move {
            let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
                .await
                .map_err(|_| TransportError::Timeout {
                    addr: addr.to_string(),
                    action: "connecting to",
                    timeout: self.connect_timeout,
                })?
                .map_err(|source| TransportError::Connect {
                    addr: addr.to_string(),
                    source,
                })?;
            // Commands are tiny; don't let Nagle hold them back.
            let _ = stream.set_nodelay(true);
            debug!(amp = %addr, "Connected");

            Ok(Box::new(DenonConnection {
                addr: addr.to_string(),
                stream: BufReader::new(stream),
                command_timeout: self.command_timeout,
            }) as Box<dyn AmpConnection>)
        })
    }
}

struct DenonConnection {
    addr: String,
    stream: BufReader<TcpStream>,
    command_timeout: Duration,
}

impl DenonConnection {
    async fn write_command(&mut self, command: &str) -> std::io::Result<()> {
        let line = format!("{command}\r");
        let writer = self.stream.get_mut();
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await
    }
}

impl AmpConnection for DenonConnection {
    fn send<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            match timeout(self.command_timeout, self.write_command(command)).await {
                Err(_) => {
                    return Err(TransportError::Timeout {
                        addr: self.addr.clone(),
                        action: "sending to",
                        timeout: self.command_timeout,
                    })
                }
                Ok(Err(source)) => {
                    return Err(TransportError::Send {
                        addr: self.addr.clone(),
                        command: command.to_string(),
                        source,
                    })
                }
                Ok(Ok(())) => {}
            }

            let mut reply = Vec::new();
            let wait = self.command_timeout.min(REPLY_WAIT);
            match timeout(wait, self.stream.read_until(b'\r', &mut reply)).await {
                Ok(Ok(0)) => Err(TransportError::Closed {
                    addr: self.addr.clone(),
                }),
                Ok(Ok(_)) => {
                    let text = String::from_utf8_lossy(&reply);
                    debug!(amp = %self.addr, command, reply = %text.trim_end(), "Amp replied");
                    Ok(())
                }
                Ok(Err(source)) => Err(TransportError::Send {
                    addr: self.addr.clone(),
                    command: command.to_string(),
                    source,
                }),
                // Silence is a normal answer for many commands.
                Err(_) => Ok(()),
            }
        })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let addr = self.addr;
            let mut stream = self.stream.into_inner();
            let _ = stream.shutdown().await;
            debug!(amp = %addr, "Disconnected");
        })
    }
}
