//! Bluetooth Module
//!
//! Coordinates peer discovery, pairing and connection on top of a native
//! radio stack.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    GatewayHandle                         │
//! │  (Owner of all device state - public API)                │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Scanner  │  │ Connection │  │ Protocol │
//! │           │  │            │  │          │
//! │ - Scan    │  │ - Bonding  │  │ - Native │
//! │   session │  │ - Channels │  │   events │
//! └─────┬─────┘  └─────┬──────┘  └────▲─────┘
//!       │              │              │
//!       ▼              ▼              │
//! ┌─────────────────────────────────────────────────────────┐
//! │              RadioAdapter  ──EventSink──▶ inbox          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`radio`] - Native radio trait and the event sink handed to it
//! - [`protocol`] - Native event payload parsing
//! - [`scanner`] - Scan sessions and bonded device enumeration
//! - [`connection`] - Bonding and connection state machine
//! - [`service`] - Gateway facade and owner loop
//! - [`client`] - Command handle for other tasks
//! - [`simulated`] - In-process radio

pub mod client;
pub mod connection;
pub mod protocol;
pub mod radio;
pub mod scanner;
pub mod service;
pub mod simulated;

pub use client::{GatewayClient, GatewayCommand};
pub use radio::{EventSink, RadioAdapter, RawEvent};
pub use service::GatewayHandle;
pub use simulated::SimulatedRadio;
