use serde::Serialize;
use std::fmt;
use std::time::SystemTime;

/// Pairing/connection state of a known peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PairingState {
    /// Seen via scan, not bonded
    Discovered,
    /// Bond requested, waiting for the radio to confirm
    Bonding,
    /// Bonded, no open channel
    Paired,
    /// Channel open
    Connected,
}

impl PairingState {
    /// Paired and Connected devices belong to the "paired" view.
    pub fn is_bonded(self) -> bool {
        matches!(self, Self::Paired | Self::Connected)
    }
}

impl fmt::Display for PairingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Discovered => "discovered",
            Self::Bonding => "bonding",
            Self::Paired => "paired",
            Self::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// A peer device known to the registry.
///
/// The address is fixed at creation; only the registry mutates the other
/// fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    address: String,
    pub(crate) name: String,
    pub(crate) state: PairingState,
    pub(crate) last_seen: SystemTime,
}

impl DeviceRecord {
    pub(crate) fn new(address: String, name: String, state: PairingState) -> Self {
        Self {
            address,
            name,
            state,
            last_seen: SystemTime::now(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Display name, empty when the radio did not report one
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    pub fn last_seen(&self) -> SystemTime {
        self.last_seen
    }
}

/// A bonded device as reported by the radio's enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondedDevice {
    pub name: Option<String>,
    pub address: String,
}

impl BondedDevice {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }
}

/// Bond state reported by the radio, reduced to the outcomes the gateway cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondOutcome {
    None,
    Bonding,
    Bonded,
}

/// Typed native event produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    DeviceFound { name: String, address: String },
    BondStateChanged { address: String, outcome: BondOutcome },
}

/// Opaque handle to an open data channel, owned by the gateway until teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(pub u64);

/// Notification sent to subscribers after any registry mutation.
///
/// Carries no payload; subscribers re-read the device views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceListChanged;

/// Normalize a hardware address into its registry key form.
pub fn normalize_address(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
