//! Console rendering of the device list
//!
//! Two sections, paired and available, each with a placeholder line when
//! empty. Stands in for a real UI in the demo binary.

use crate::domain::models::DeviceRecord;
use std::fmt::Write;

const UNKNOWN_NAME: &str = "Unknown";

fn render_section<'a>(
    out: &mut String,
    title: &str,
    empty_text: &str,
    devices: impl Iterator<Item = &'a DeviceRecord>,
) {
    let _ = writeln!(out, "{}", title);
    let mut any = false;
    for device in devices {
        any = true;
        let name = if device.name().is_empty() {
            UNKNOWN_NAME
        } else {
            device.name()
        };
        let _ = writeln!(out, "  {:<24} {} [{}]", name, device.address(), device.state());
    }
    if !any {
        let _ = writeln!(out, "  {}", empty_text);
    }
}

pub fn render(devices: &[DeviceRecord]) -> String {
    let mut out = String::new();
    render_section(
        &mut out,
        "Paired devices",
        "No paired devices",
        devices.iter().filter(|d| d.state().is_bonded()),
    );
    render_section(
        &mut out,
        "Available devices",
        "No available devices",
        devices.iter().filter(|d| !d.state().is_bonded()),
    );
    out
}
