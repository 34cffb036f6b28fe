//! Native radio seam
//!
//! [`RadioAdapter`] is everything the gateway needs from the platform
//! Bluetooth stack. Platform callbacks never touch gateway state: the binding
//! turns each callback into a [`RawEvent`] and hands it to the [`EventSink`]
//! it was given at registration, which queues it for the owner task.

use crate::domain::error::RadioError;
use crate::domain::models::{BondedDevice, ChannelHandle};
use tokio::sync::mpsc;
use tracing::trace;

/// Broadcast action for a device seen during discovery. Payload: `name|address`.
pub const ACTION_FOUND: &str = "android.bluetooth.device.action.FOUND";

/// Broadcast action for a bond state change. Payload: `address|code`.
pub const ACTION_BOND_STATE_CHANGED: &str = "android.bluetooth.device.action.BOND_STATE_CHANGED";

/// Native bond state codes
pub mod bond_code {
    pub const NONE: i32 = 10;
    pub const BONDING: i32 = 11;
    pub const BONDED: i32 = 12;
}

/// Delimiter between payload fields
pub const FIELD_DELIMITER: char = '|';

/// Sentinel the native side uses for an absent field
pub const NULL_FIELD: &str = "null";

/// An unparsed native broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub action: String,
    pub payload: String,
}

impl RawEvent {
    pub fn new(action: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            payload: payload.into(),
        }
    }

    pub fn device_found(name: Option<&str>, address: Option<&str>) -> Self {
        let payload = format!(
            "{}{}{}",
            name.unwrap_or(NULL_FIELD),
            FIELD_DELIMITER,
            address.unwrap_or(NULL_FIELD)
        );
        Self::new(ACTION_FOUND, payload)
    }

    pub fn bond_state_changed(address: &str, code: i32) -> Self {
        Self::new(
            ACTION_BOND_STATE_CHANGED,
            format!("{}{}{}", address, FIELD_DELIMITER, code),
        )
    }
}

/// Messages consumed by the gateway owner task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Native(RawEvent),
    ScanTimeout(u64),
}

/// Queue end handed to the native binding.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::UnboundedSender<Inbound>,
}

impl EventSink {
    pub fn new(sender: mpsc::UnboundedSender<Inbound>) -> Self {
        Self { sender }
    }

    /// Queue a native event. Returns false once the gateway is gone.
    pub fn deliver(&self, event: RawEvent) -> bool {
        trace!("Queueing native event {}", event.action);
        self.sender.send(Inbound::Native(event)).is_ok()
    }
}

/// The platform Bluetooth adapter.
///
/// Every request returns as soon as it has been issued; outcomes of bonding
/// arrive later through the registered [`EventSink`].
pub trait RadioAdapter: Send {
    fn is_enabled(&self) -> bool;

    fn enable(&mut self) -> Result<(), RadioError>;

    fn is_discovering(&self) -> bool;

    fn start_discovery(&mut self) -> Result<(), RadioError>;

    fn cancel_discovery(&mut self) -> Result<(), RadioError>;

    /// Devices already bonded with this adapter
    fn bonded_devices(&self) -> Result<Vec<BondedDevice>, RadioError>;

    fn create_bond(&mut self, address: &str) -> Result<(), RadioError>;

    fn connect(&mut self, address: &str) -> Result<ChannelHandle, RadioError>;

    fn close_channel(&mut self, channel: ChannelHandle);

    /// Subscribe to device-found and bond-state broadcasts
    fn register_listener(&mut self, sink: EventSink) -> Result<(), RadioError>;

    fn unregister_listener(&mut self);
}
