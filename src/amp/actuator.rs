//! Drives every configured amplifier towards the desired power state.
//!
//! `set_desired_state` is called from the sampling thread once per decision
//! tick. It must stay cheap: the settled check is a lock and a compare, and
//! anything needing the network is spawned onto the runtime and not awaited.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::registry::{DeviceRegistry, DeviceSlot, FlightGuard};
use super::{AmpTransport, Power};

/// How a single device actuation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuationOutcome {
    /// Every command went through; the state is now authoritative.
    Confirmed(Power),
    /// Dry run: connected, nothing sent, state recorded as if it had been.
    Simulated(Power),
    /// Could not connect. State left unauthoritative.
    ConnectFailed,
    /// A command in the sequence failed. Previous state kept, unauthoritative.
    CommandFailed { command: &'static str },
}

impl fmt::Display for ActuationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed(p) => write!(f, "confirmed {p}"),
            Self::Simulated(p) => write!(f, "simulated {p}"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::CommandFailed { command } => write!(f, "command {command} failed"),
        }
    }
}

/// Tasks launched for one decision. The sampling loop drops this; tests join it.
#[derive(Debug, Default)]
pub struct Dispatch {
    pub tasks: Vec<JoinHandle<ActuationOutcome>>,
}

impl Dispatch {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every launched actuation. Panicked tasks are dropped.
    #[cfg(test)]
    pub async fn join(self) -> Vec<ActuationOutcome> {
        futures_util::future::join_all(self.tasks)
            .await
            .into_iter()
            .filter_map(Result::ok)
            .collect()
    }
}

pub struct Actuator {
    amps: Vec<String>,
    transport: Arc<dyn AmpTransport>,
    registry: Arc<DeviceRegistry>,
    runtime: Handle,
    dry_run: bool,
}

impl Actuator {
    /// `runtime` is where actuation tasks run; the caller may itself be a
    /// plain blocking thread.
    pub fn new(
        amps: Vec<String>,
        transport: Arc<dyn AmpTransport>,
        runtime: Handle,
        dry_run: bool,
    ) -> Self {
        let registry = DeviceRegistry::new();
        for addr in &amps {
            registry.slot(addr);
        }
        Self {
            amps,
            transport,
            registry,
            runtime,
            dry_run,
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Launch an actuation for every device not already settled in `target`.
    pub fn set_desired_state(&self, target: Power) -> Dispatch {
        let pending: Vec<(&String, Arc<DeviceSlot>)> = self
            .amps
            .iter()
            .map(|addr| (addr, self.registry.slot(addr)))
            .filter(|(_, slot)| !slot.state().is_settled(target))
            .collect();

        let mut dispatch = Dispatch::default();
        for (addr, slot) in pending {
            let Some(flight) = slot.try_begin() else {
                debug!(amp = %addr, "Previous actuation still in flight, skipping");
                continue;
            };
            let transport = self.transport.clone();
            let addr = addr.clone();
            let dry_run = self.dry_run;
            dispatch.tasks.push(self.runtime.spawn(async move {
                let outcome =
                    actuate(transport.as_ref(), &addr, &slot, flight, target, dry_run).await;
                debug!(amp = %addr, power = %target, outcome = %outcome, "Actuation finished");
                outcome
            }));
        }

        if !dispatch.is_empty() {
            let amps = dispatch.tasks.len();
            match target {
                Power::On => info!(amps, dry_run = self.dry_run, "Turning amps ON"),
                Power::Standby => info!(amps, dry_run = self.dry_run, "Turning amps OFF"),
            }
        }
        dispatch
    }
}

async fn actuate(
    transport: &dyn AmpTransport,
    addr: &str,
    slot: &DeviceSlot,
    flight: FlightGuard,
    target: Power,
    dry_run: bool,
) -> ActuationOutcome {
    let mut conn = match transport.connect(addr).await {
        Ok(conn) => conn,
        Err(e) => {
            warn!(amp = %addr, power = %target, error = %e, "Connect failed, will retry");
            slot.invalidate(&flight);
            return ActuationOutcome::ConnectFailed;
        }
    };

    if dry_run {
        conn.close().await;
        slot.confirm(target, &flight);
        info!(amp = %addr, power = %target, "Dry run: amp would be set");
        return ActuationOutcome::Simulated(target);
    }

    for &command in target.commands() {
        debug!(amp = %addr, command, "Sending command");
        if let Err(e) = conn.send(command).await {
            warn!(amp = %addr, command, error = %e, "Command failed, will retry");
            conn.close().await;
            slot.invalidate(&flight);
            return ActuationOutcome::CommandFailed { command };
        }
    }
    conn.close().await;

    slot.confirm(target, &flight);
    info!(amp = %addr, power = %target, "Amp successfully set");
    ActuationOutcome::Confirmed(target)
}
