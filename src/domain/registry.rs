//! Device Registry
//!
//! Insertion-ordered set of [`DeviceRecord`]s keyed by address. `upsert` is the
//! only way records enter the registry and nothing ever removes them.

use crate::domain::models::{DeviceRecord, PairingState};
use std::collections::HashMap;
use std::time::SystemTime;
use tracing::{debug, trace};

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    records: Vec<DeviceRecord>,
    index: HashMap<String, usize>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new device or refresh a known one.
    ///
    /// New devices start as `Discovered`, or `Paired` when `paired_hint` is set.
    /// Known devices get their name updated (if `name` is non-empty) and their
    /// last-seen time refreshed; their pairing state is never touched here.
    pub fn upsert(&mut self, address: &str, name: &str, paired_hint: bool) -> &DeviceRecord {
        if let Some(&i) = self.index.get(address) {
            let record = &mut self.records[i];
            if !name.is_empty() {
                record.name = name.to_string();
            }
            record.last_seen = SystemTime::now();
            trace!("Refreshed device {} ({})", address, record.state);
            return &self.records[i];
        }

        let state = if paired_hint {
            PairingState::Paired
        } else {
            PairingState::Discovered
        };
        debug!("New device {} {:?} as {}", address, name, state);

        self.index.insert(address.to_string(), self.records.len());
        self.records
            .push(DeviceRecord::new(address.to_string(), name.to_string(), state));
        &self.records[self.records.len() - 1]
    }

    /// Set the pairing state of a known device.
    ///
    /// Returns false for unknown addresses and when the state is unchanged.
    pub fn set_state(&mut self, address: &str, new_state: PairingState) -> bool {
        let Some(&i) = self.index.get(address) else {
            debug!("Ignoring state {} for unknown device {}", new_state, address);
            return false;
        };

        let record = &mut self.records[i];
        if record.state == new_state {
            return false;
        }
        debug!("Device {}: {} -> {}", address, record.state, new_state);
        record.state = new_state;
        true
    }

    pub fn get(&self, address: &str) -> Option<&DeviceRecord> {
        self.index.get(address).map(|&i| &self.records[i])
    }

    pub fn contains(&self, address: &str) -> bool {
        self.index.contains_key(address)
    }

    pub fn state_of(&self, address: &str) -> Option<PairingState> {
        self.get(address).map(DeviceRecord::state)
    }

    /// All devices in insertion order
    pub fn all(&self) -> &[DeviceRecord] {
        &self.records
    }

    /// Devices in `Paired` or `Connected` state
    pub fn paired(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.records.iter().filter(|r| r.state.is_bonded())
    }

    /// Devices that are not bonded yet (`Discovered` or `Bonding`)
    pub fn available(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.records.iter().filter(|r| !r.state.is_bonded())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
