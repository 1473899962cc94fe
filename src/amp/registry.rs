//! Per-device cached power state.
//!
//! The registry is shared between the sampling thread (which only reads, to
//! decide whether anything needs doing) and the actuation tasks (which write
//! the outcome). Each device also carries a single-flight guard so that two
//! actuations for the same amplifier never overlap.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::Power;

/// Last known state of one amplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceState {
    /// Last state we believe the device is in. `None` until the first
    /// successful actuation.
    pub power: Option<Power>,
    /// Whether `power` was confirmed by a fully transmitted command sequence
    /// and nothing has failed since.
    pub authoritative: bool,
}

impl DeviceState {
    /// True when the device is known to already be in `target`.
    pub fn is_settled(&self, target: Power) -> bool {
        self.authoritative && self.power == Some(target)
    }

    /// The confirmed state, or `None` if the device is in the unknown state.
    #[cfg(test)]
    pub fn confirmed(&self) -> Option<Power> {
        if self.authoritative {
            self.power
        } else {
            None
        }
    }
}

/// Registry entry for one amplifier.
#[derive(Debug, Default)]
pub struct DeviceSlot {
    state: Mutex<DeviceState>,
    in_flight: Arc<AsyncMutex<()>>,
}

impl DeviceSlot {
    pub fn state(&self) -> DeviceState {
        *self.state.lock()
    }

    /// Claim the single-flight guard without waiting. `None` means an
    /// actuation for this device is still running.
    pub fn try_begin(&self) -> Option<FlightGuard> {
        self.in_flight
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| FlightGuard { _guard: guard })
    }

    /// Record a fully transmitted transition.
    pub fn confirm(&self, power: Power, _flight: &FlightGuard) {
        *self.state.lock() = DeviceState {
            power: Some(power),
            authoritative: true,
        };
    }

    /// Record a failed transition: keep the previous state, drop authority.
    pub fn invalidate(&self, _flight: &FlightGuard) {
        self.state.lock().authoritative = false;
    }
}

/// Proof that the holder owns the device's single-flight slot.
#[derive(Debug)]
pub struct FlightGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Map from device address to its slot.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Mutex<HashMap<String, Arc<DeviceSlot>>>,
}

impl DeviceRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fetch the slot for `addr`, creating an unknown-state entry on first use.
    pub fn slot(&self, addr: &str) -> Arc<DeviceSlot> {
        let mut devices = self.devices.lock();
        if let Some(slot) = devices.get(addr) {
            return slot.clone();
        }
        let slot = Arc::new(DeviceSlot::default());
        devices.insert(addr.to_string(), slot.clone());
        slot
    }

    /// Snapshot of `addr`'s state; unknown if never seen.
    #[cfg(test)]
    pub fn state(&self, addr: &str) -> DeviceState {
        self.devices
            .lock()
            .get(addr)
            .map(|slot| slot.state())
            .unwrap_or_default()
    }
}
