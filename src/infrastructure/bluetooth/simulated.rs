//! In-process radio
//!
//! Implements [`RadioAdapter`] without hardware. Clones share state, so a
//! test can hand one clone to the gateway and keep another to script native
//! callbacks and inspect the requests the gateway issued.

use crate::domain::error::RadioError;
use crate::domain::models::{BondedDevice, ChannelHandle};
use crate::infrastructure::bluetooth::radio::{bond_code, EventSink, RadioAdapter, RawEvent};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Count of each native request issued against the radio
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadioCalls {
    pub enable: u32,
    pub start_discovery: u32,
    pub cancel_discovery: u32,
    pub create_bond: u32,
    pub connect: u32,
    pub close_channel: u32,
    pub register_listener: u32,
    pub unregister_listener: u32,
}

#[derive(Default)]
struct SimState {
    enabled: bool,
    discovering: bool,
    bonded: Vec<BondedDevice>,
    nearby: Vec<(Option<String>, Option<String>)>,
    sink: Option<EventSink>,
    auto_confirm_bonds: bool,
    fail_enable: bool,
    fail_start_discovery: bool,
    fail_cancel_discovery: bool,
    fail_bond: bool,
    unreachable: HashSet<String>,
    next_channel: u64,
    open_channels: HashMap<ChannelHandle, String>,
    bond_requests: Vec<String>,
    calls: RadioCalls,
}

#[derive(Clone)]
pub struct SimulatedRadio {
    inner: Arc<Mutex<SimState>>,
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRadio {
    /// An enabled radio with no bonded or nearby devices
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                enabled: true,
                next_channel: 1,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn disabled(self) -> Self {
        self.state().enabled = false;
        self
    }

    pub fn with_bonded(self, devices: Vec<BondedDevice>) -> Self {
        self.state().bonded = devices;
        self
    }

    /// Devices reported through device-found events whenever discovery starts
    pub fn with_nearby(self, devices: Vec<(&str, &str)>) -> Self {
        self.state().nearby = devices
            .into_iter()
            .map(|(name, address)| (Some(name.to_string()), Some(address.to_string())))
            .collect();
        self
    }

    /// Answer every accepted bond request with bonding and bonded events
    pub fn with_auto_confirm_bonds(self) -> Self {
        self.state().auto_confirm_bonds = true;
        self
    }

    pub fn fail_enable(&self, fail: bool) {
        self.state().fail_enable = fail;
    }

    pub fn fail_start_discovery(&self, fail: bool) {
        self.state().fail_start_discovery = fail;
    }

    pub fn fail_cancel_discovery(&self, fail: bool) {
        self.state().fail_cancel_discovery = fail;
    }

    pub fn fail_bond(&self, fail: bool) {
        self.state().fail_bond = fail;
    }

    /// Make connect requests to `address` fail
    pub fn set_unreachable(&self, address: &str) {
        self.state().unreachable.insert(address.to_string());
    }

    /// Deliver a native broadcast as the platform would.
    ///
    /// Returns false when no listener is registered.
    pub fn inject(&self, event: RawEvent) -> bool {
        match &self.state().sink {
            Some(sink) => sink.deliver(event),
            None => false,
        }
    }

    pub fn confirm_bond(&self, address: &str) -> bool {
        self.inject(RawEvent::bond_state_changed(address, bond_code::BONDED))
    }

    pub fn calls(&self) -> RadioCalls {
        self.state().calls.clone()
    }

    pub fn bond_requests(&self) -> Vec<String> {
        self.state().bond_requests.clone()
    }

    pub fn open_channels(&self) -> usize {
        self.state().open_channels.len()
    }

    pub fn is_listening(&self) -> bool {
        self.state().sink.is_some()
    }
}

impl RadioAdapter for SimulatedRadio {
    fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    fn enable(&mut self) -> Result<(), RadioError> {
        let mut state = self.state();
        state.calls.enable += 1;
        if state.fail_enable {
            return Err(RadioError::Rejected("enable refused".to_string()));
        }
        state.enabled = true;
        Ok(())
    }

    fn is_discovering(&self) -> bool {
        self.state().discovering
    }

    fn start_discovery(&mut self) -> Result<(), RadioError> {
        let mut state = self.state();
        state.calls.start_discovery += 1;
        if !state.enabled {
            return Err(RadioError::Disabled);
        }
        if state.fail_start_discovery {
            return Err(RadioError::Rejected("start discovery refused".to_string()));
        }
        state.discovering = true;

        if let Some(sink) = &state.sink {
            for (name, address) in &state.nearby {
                sink.deliver(RawEvent::device_found(name.as_deref(), address.as_deref()));
            }
        }
        Ok(())
    }

    fn cancel_discovery(&mut self) -> Result<(), RadioError> {
        let mut state = self.state();
        state.calls.cancel_discovery += 1;
        if state.fail_cancel_discovery {
            return Err(RadioError::Rejected("cancel discovery refused".to_string()));
        }
        state.discovering = false;
        Ok(())
    }

    fn bonded_devices(&self) -> Result<Vec<BondedDevice>, RadioError> {
        let state = self.state();
        if !state.enabled {
            return Err(RadioError::Disabled);
        }
        Ok(state.bonded.clone())
    }

    fn create_bond(&mut self, address: &str) -> Result<(), RadioError> {
        let mut state = self.state();
        state.calls.create_bond += 1;
        if state.fail_bond {
            return Err(RadioError::Rejected(format!("bond with {} refused", address)));
        }
        state.bond_requests.push(address.to_string());

        if state.auto_confirm_bonds {
            if let Some(sink) = &state.sink {
                sink.deliver(RawEvent::bond_state_changed(address, bond_code::BONDING));
                sink.deliver(RawEvent::bond_state_changed(address, bond_code::BONDED));
            }
        }
        Ok(())
    }

    fn connect(&mut self, address: &str) -> Result<ChannelHandle, RadioError> {
        let mut state = self.state();
        state.calls.connect += 1;
        if state.unreachable.contains(address) {
            return Err(RadioError::ConnectionFailed(format!("{} unreachable", address)));
        }

        let handle = ChannelHandle(state.next_channel);
        state.next_channel += 1;
        state.open_channels.insert(handle, address.to_string());
        debug!("Simulated channel {:?} open to {}", handle, address);
        Ok(handle)
    }

    fn close_channel(&mut self, channel: ChannelHandle) {
        let mut state = self.state();
        state.calls.close_channel += 1;
        state.open_channels.remove(&channel);
    }

    fn register_listener(&mut self, sink: EventSink) -> Result<(), RadioError> {
        let mut state = self.state();
        state.calls.register_listener += 1;
        state.sink = Some(sink);
        Ok(())
    }

    fn unregister_listener(&mut self) {
        let mut state = self.state();
        state.calls.unregister_listener += 1;
        state.sink = None;
    }
}
