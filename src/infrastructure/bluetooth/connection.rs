//! Pairing and connection
//!
//! Drives devices through the transition table in [`crate::domain::pairing`].
//! A state only changes after the radio accepted the request (or reported
//! the outcome); a failed native call leaves the device where it was.

use crate::domain::error::GatewayError;
use crate::domain::models::{BondOutcome, ChannelHandle, PairingState};
use crate::domain::pairing::PairingTrigger;
use crate::domain::registry::DeviceRegistry;
use crate::infrastructure::bluetooth::radio::RadioAdapter;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// What a bond state event did to the registry
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BondProgress {
    /// The device changed state
    pub changed: bool,
    /// The bond we requested completed; the device should be connected now
    pub connect_next: bool,
}

/// Pairing/connection state machine plus the channels it opened
#[derive(Debug, Default)]
pub struct PairingController {
    channels: HashMap<String, ChannelHandle>,
    /// Addresses we asked to bond with and have no outcome for yet
    pending: HashSet<String>,
}

impl PairingController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a bond with a discovered device.
    ///
    /// Returns `Ok(false)` if the device is not in a state that can pair.
    pub fn pair(
        &mut self,
        radio: &mut dyn RadioAdapter,
        registry: &mut DeviceRegistry,
        address: &str,
    ) -> Result<bool, GatewayError> {
        let state = current_state(registry, address)?;
        let Some(next) = state.next(PairingTrigger::PairRequested) else {
            debug!("Not pairing {}: device is {}", address, state);
            return Ok(false);
        };

        info!("Requesting bond with {}", address);
        radio
            .create_bond(address)
            .map_err(|e| GatewayError::native("create bond", e))?;

        self.pending.insert(address.to_string());
        Ok(registry.set_state(address, next))
    }

    /// Open a channel to a discovered or paired device.
    pub fn connect(
        &mut self,
        radio: &mut dyn RadioAdapter,
        registry: &mut DeviceRegistry,
        address: &str,
    ) -> Result<bool, GatewayError> {
        let state = current_state(registry, address)?;
        let Some(next) = state.next(PairingTrigger::ConnectEstablished) else {
            debug!("Not connecting {}: device is {}", address, state);
            return Ok(false);
        };

        info!("Connecting to {}", address);
        let channel = radio
            .connect(address)
            .map_err(|e| GatewayError::native("connect", e))?;

        // Connected is terminal, so an address never holds two channels
        self.channels.insert(address.to_string(), channel);
        info!("Connected to {} ({:?})", address, channel);
        Ok(registry.set_state(address, next))
    }

    /// Apply a bond state reported by the radio.
    ///
    /// Only a bond requested through [`Self::pair`] asks for a follow-up
    /// connect; a peer-initiated bond just records the new state.
    pub fn on_bond_state(
        &mut self,
        registry: &mut DeviceRegistry,
        address: &str,
        outcome: BondOutcome,
    ) -> Result<BondProgress, GatewayError> {
        let state = current_state(registry, address)?;
        let Some(next) = state.next(PairingTrigger::from(outcome)) else {
            debug!("Bond state {:?} for {} ignored in {}", outcome, address, state);
            return Ok(BondProgress::default());
        };

        let changed = registry.set_state(address, next);
        let requested = match next {
            PairingState::Paired | PairingState::Discovered => self.pending.remove(address),
            _ => false,
        };
        let connect_next = changed && requested && next == PairingState::Paired;
        if connect_next {
            info!("Bond with {} confirmed", address);
        }
        Ok(BondProgress {
            changed,
            connect_next,
        })
    }

    /// Close every open channel and forget pending bonds. Devices keep their state.
    pub fn release_all(&mut self, radio: &mut dyn RadioAdapter) -> usize {
        self.pending.clear();
        let count = self.channels.len();
        for (address, channel) in self.channels.drain() {
            debug!("Closing channel {:?} to {}", channel, address);
            radio.close_channel(channel);
        }
        count
    }

    pub fn channel(&self, address: &str) -> Option<ChannelHandle> {
        self.channels.get(address).copied()
    }

    pub fn open_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn is_pending(&self, address: &str) -> bool {
        self.pending.contains(address)
    }
}

fn current_state(registry: &DeviceRegistry, address: &str) -> Result<PairingState, GatewayError> {
    registry
        .state_of(address)
        .ok_or_else(|| GatewayError::UnknownDeviceReference(address.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::simulated::SimulatedRadio;

    fn setup() -> (PairingController, SimulatedRadio, DeviceRegistry) {
        let mut registry = DeviceRegistry::new();
        registry.upsert("11:22", "Speaker", false);
        registry.upsert("AA:BB", "Phone", true);
        (PairingController::new(), SimulatedRadio::new(), registry)
    }

    #[test]
    fn test_pair_moves_to_bonding() {
        let (mut pairing, mut radio, mut registry) = setup();
        assert!(pairing.pair(&mut radio, &mut registry, "11:22").unwrap());
        assert_eq!(registry.state_of("11:22"), Some(PairingState::Bonding));
        assert_eq!(radio.bond_requests(), vec!["11:22".to_string()]);
    }

    #[test]
    fn test_pair_unknown_device_issues_no_request() {
        let (mut pairing, mut radio, mut registry) = setup();
        let err = pairing.pair(&mut radio, &mut registry, "FF:FF").unwrap_err();
        assert_eq!(err, GatewayError::UnknownDeviceReference("FF:FF".to_string()));
        assert_eq!(radio.calls().create_bond, 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_pair_already_paired_is_noop() {
        let (mut pairing, mut radio, mut registry) = setup();
        assert!(!pairing.pair(&mut radio, &mut registry, "AA:BB").unwrap());
        assert_eq!(radio.calls().create_bond, 0);
    }

    #[test]
    fn test_failed_bond_keeps_state() {
        let (mut pairing, mut radio, mut registry) = setup();
        radio.fail_bond(true);
        let err = pairing.pair(&mut radio, &mut registry, "11:22").unwrap_err();
        assert!(matches!(err, GatewayError::NativeOperationFailure { operation: "create bond", .. }));
        assert_eq!(registry.state_of("11:22"), Some(PairingState::Discovered));
    }

    #[test]
    fn test_bond_confirmation_requests_connect() {
        let (mut pairing, mut radio, mut registry) = setup();
        pairing.pair(&mut radio, &mut registry, "11:22").unwrap();

        let progress = pairing.on_bond_state(&mut registry, "11:22", BondOutcome::Bonded).unwrap();
        assert_eq!(progress, BondProgress { changed: true, connect_next: true });
        assert_eq!(registry.state_of("11:22"), Some(PairingState::Paired));
    }

    #[test]
    fn test_unrequested_bond_does_not_connect() {
        let (mut pairing, _radio, mut registry) = setup();
        let progress = pairing.on_bond_state(&mut registry, "11:22", BondOutcome::Bonded).unwrap();
        assert_eq!(progress, BondProgress { changed: true, connect_next: false });
        assert_eq!(registry.state_of("11:22"), Some(PairingState::Paired));
    }

    #[test]
    fn test_peer_initiated_bond_does_not_connect() {
        let (mut pairing, _radio, mut registry) = setup();
        let progress = pairing.on_bond_state(&mut registry, "11:22", BondOutcome::Bonding).unwrap();
        assert_eq!(progress, BondProgress { changed: true, connect_next: false });
        assert_eq!(registry.state_of("11:22"), Some(PairingState::Bonding));

        let progress = pairing.on_bond_state(&mut registry, "11:22", BondOutcome::Bonded).unwrap();
        assert_eq!(progress, BondProgress { changed: true, connect_next: false });
        assert_eq!(registry.state_of("11:22"), Some(PairingState::Paired));
    }

    #[test]
    fn test_bond_outcome_clears_pending() {
        let (mut pairing, mut radio, mut registry) = setup();
        pairing.pair(&mut radio, &mut registry, "11:22").unwrap();
        assert!(pairing.is_pending("11:22"));

        pairing.on_bond_state(&mut registry, "11:22", BondOutcome::Bonding).unwrap();
        assert!(pairing.is_pending("11:22"));

        // Rejected, then the peer bonds by itself later
        pairing.on_bond_state(&mut registry, "11:22", BondOutcome::None).unwrap();
        assert!(!pairing.is_pending("11:22"));
        pairing.on_bond_state(&mut registry, "11:22", BondOutcome::Bonding).unwrap();
        let progress = pairing.on_bond_state(&mut registry, "11:22", BondOutcome::Bonded).unwrap();
        assert!(!progress.connect_next);
    }

    #[test]
    fn test_bond_failure_returns_to_discovered() {
        let (mut pairing, mut radio, mut registry) = setup();
        pairing.pair(&mut radio, &mut registry, "11:22").unwrap();
        let progress = pairing.on_bond_state(&mut registry, "11:22", BondOutcome::None).unwrap();
        assert!(progress.changed);
        assert_eq!(registry.state_of("11:22"), Some(PairingState::Discovered));

        // A paired device ignores a stray "none"
        let progress = pairing.on_bond_state(&mut registry, "AA:BB", BondOutcome::None).unwrap();
        assert!(!progress.changed);
        assert_eq!(registry.state_of("AA:BB"), Some(PairingState::Paired));
    }

    #[test]
    fn test_connect_paired_device() {
        let (mut pairing, mut radio, mut registry) = setup();
        assert!(pairing.connect(&mut radio, &mut registry, "AA:BB").unwrap());
        assert_eq!(registry.state_of("AA:BB"), Some(PairingState::Connected));
        assert!(pairing.channel("AA:BB").is_some());

        // Connected has no way out
        assert!(!pairing.connect(&mut radio, &mut registry, "AA:BB").unwrap());
        assert_eq!(radio.calls().connect, 1);
    }

    #[test]
    fn test_connect_while_bonding_is_noop() {
        let (mut pairing, mut radio, mut registry) = setup();
        pairing.pair(&mut radio, &mut registry, "11:22").unwrap();
        assert!(!pairing.connect(&mut radio, &mut registry, "11:22").unwrap());
        assert_eq!(radio.calls().connect, 0);
    }

    #[test]
    fn test_failed_connect_keeps_state() {
        let (mut pairing, mut radio, mut registry) = setup();
        radio.set_unreachable("AA:BB");
        assert!(pairing.connect(&mut radio, &mut registry, "AA:BB").is_err());
        assert_eq!(registry.state_of("AA:BB"), Some(PairingState::Paired));
        assert_eq!(pairing.open_channels(), 0);
    }

    #[test]
    fn test_release_all_closes_channels() {
        let (mut pairing, mut radio, mut registry) = setup();
        pairing.connect(&mut radio, &mut registry, "AA:BB").unwrap();
        pairing.connect(&mut radio, &mut registry, "11:22").unwrap();
        assert_eq!(radio.open_channels(), 2);

        assert_eq!(pairing.release_all(&mut radio), 2);
        assert_eq!(radio.open_channels(), 0);
        assert_eq!(pairing.release_all(&mut radio), 0);
    }
}
