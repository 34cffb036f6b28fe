//! Bluetooth peer gateway
//!
//! Keeps a deduplicated, query-able list of nearby and bonded peers on top of
//! an asynchronous native radio stack, and drives pairing and connection to a
//! selected peer.

pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::error::{Diagnostics, GatewayError, RadioError};
pub use domain::models::{DeviceListChanged, DeviceRecord, PairingState};
pub use domain::settings::{GatewayConfig, Settings, SettingsService};
pub use infrastructure::bluetooth::{GatewayClient, GatewayHandle, RadioAdapter, SimulatedRadio};
