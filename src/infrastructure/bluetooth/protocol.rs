//! Native event protocol
//!
//! Parses the raw broadcasts delivered by the platform binding into
//! [`NativeEvent`]s.
//!
//! # Payload formats
//!
//! ```text
//! FOUND               : <name>|<address>
//! BOND_STATE_CHANGED  : <address>|<code>      code: 10 none, 11 bonding, 12 bonded
//! ```
//!
//! A field equal to `null` means the native side had no value. For
//! device-found that rejects the whole event; an empty name is accepted.

use crate::domain::error::GatewayError;
use crate::domain::models::{normalize_address, BondOutcome, NativeEvent};
use crate::infrastructure::bluetooth::radio::{
    bond_code, RawEvent, ACTION_BOND_STATE_CHANGED, ACTION_FOUND, FIELD_DELIMITER, NULL_FIELD,
};
use tracing::trace;

/// Parse a raw native event.
///
/// Returns `Ok(None)` for actions the gateway does not listen to.
pub fn normalize(event: &RawEvent) -> Result<Option<NativeEvent>, GatewayError> {
    match event.action.as_str() {
        ACTION_FOUND => parse_device_found(&event.payload).map(Some),
        ACTION_BOND_STATE_CHANGED => parse_bond_state(&event.payload).map(Some),
        other => {
            trace!("Ignoring native action {}", other);
            Ok(None)
        }
    }
}

/// Parse a `name|address` payload
pub fn parse_device_found(payload: &str) -> Result<NativeEvent, GatewayError> {
    // Names may contain the delimiter, addresses never do
    let (name, address) = payload
        .rsplit_once(FIELD_DELIMITER)
        .ok_or_else(|| GatewayError::malformed(payload, "missing delimiter"))?;

    if name.trim() == NULL_FIELD {
        return Err(GatewayError::malformed(payload, "name is null"));
    }
    let address = parse_address(payload, address)?;

    Ok(NativeEvent::DeviceFound {
        name: name.trim().to_string(),
        address,
    })
}

/// Parse an `address|code` payload
pub fn parse_bond_state(payload: &str) -> Result<NativeEvent, GatewayError> {
    let (address, code) = payload
        .split_once(FIELD_DELIMITER)
        .ok_or_else(|| GatewayError::malformed(payload, "missing delimiter"))?;

    let address = parse_address(payload, address)?;
    let code: i32 = code
        .trim()
        .parse()
        .map_err(|_| GatewayError::malformed(payload, "bond state is not a number"))?;
    let outcome = bond_outcome(code)
        .ok_or_else(|| GatewayError::malformed(payload, format!("unknown bond state {}", code)))?;

    Ok(NativeEvent::BondStateChanged { address, outcome })
}

/// Map a native bond state code
pub fn bond_outcome(code: i32) -> Option<BondOutcome> {
    match code {
        bond_code::NONE => Some(BondOutcome::None),
        bond_code::BONDING => Some(BondOutcome::Bonding),
        bond_code::BONDED => Some(BondOutcome::Bonded),
        _ => None,
    }
}

fn parse_address(payload: &str, field: &str) -> Result<String, GatewayError> {
    let address = normalize_address(field);
    if field.trim() == NULL_FIELD {
        return Err(GatewayError::malformed(payload, "address is null"));
    }
    if address.is_empty() {
        return Err(GatewayError::malformed(payload, "address is empty"));
    }
    Ok(address)
}
