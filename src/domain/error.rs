//! Error taxonomy for the gateway.
//!
//! None of these cross the gateway facade: they are logged and counted in
//! [`Diagnostics`] and the caller only learns whether the device list changed.

use serde::Serialize;
use thiserror::Error;

/// Errors reported by a native radio adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    #[error("Radio is disabled")]
    Disabled,

    #[error("Request rejected by radio: {0}")]
    Rejected(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Listener error: {0}")]
    Listener(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Malformed native event {payload:?}: {reason}")]
    MalformedEvent { payload: String, reason: String },

    #[error("Unknown device {0}")]
    UnknownDeviceReference(String),

    #[error("Native {operation} failed: {source}")]
    NativeOperationFailure {
        operation: &'static str,
        #[source]
        source: RadioError,
    },
}

impl GatewayError {
    pub fn malformed(payload: &str, reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            payload: payload.to_string(),
            reason: reason.into(),
        }
    }

    pub fn native(operation: &'static str, source: RadioError) -> Self {
        Self::NativeOperationFailure { operation, source }
    }
}

/// Counters for conditions the gateway handled locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub malformed_events: u64,
    pub ignored_events: u64,
    pub unknown_device_references: u64,
    pub native_failures: u64,
    pub adapter_unavailable_reported: bool,
}

impl Diagnostics {
    /// Count an error. Returns false for an AdapterUnavailable that was already reported.
    pub fn record(&mut self, error: &GatewayError) -> bool {
        match error {
            GatewayError::AdapterUnavailable(_) => {
                if self.adapter_unavailable_reported {
                    return false;
                }
                self.adapter_unavailable_reported = true;
            }
            GatewayError::MalformedEvent { .. } => self.malformed_events += 1,
            GatewayError::UnknownDeviceReference(_) => self.unknown_device_references += 1,
            GatewayError::NativeOperationFailure { .. } => self.native_failures += 1,
        }
        true
    }
}
