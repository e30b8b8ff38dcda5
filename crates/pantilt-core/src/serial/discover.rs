//! Candidate serial device discovery
//!
//! Enumeration only; the data path always goes through [`super::Port`].

use serialport::SerialPortType;
#[cfg(target_os = "linux")]
use std::fs;

/// A device path that may host the pan-tilt unit
#[derive(Debug, Clone)]
pub struct PortCandidate {
    /// Device path (e.g. "/dev/ttyUSB0")
    pub name: String,
    /// USB vendor/product ids, when the port is a USB adapter
    pub usb_ids: Option<(u16, u16)>,
    /// Product string reported by the adapter
    pub product: Option<String>,
}

/// Ordering class: USB CDC-ACM adapters first, then USB-serial converters,
/// then everything else.
fn class_of(name: &str) -> (u8, usize) {
    let base = name.rsplit('/').next().unwrap_or(name);
    for (class, prefix) in [(0u8, "ttyACM"), (1, "ttyUSB")] {
        if let Some(suffix) = base.strip_prefix(prefix) {
            return (class, suffix.parse().unwrap_or(usize::MAX));
        }
    }
    (2, 0)
}

/// List candidate serial devices, deterministically ordered.
///
/// Merges the `serialport` enumeration with a /dev scan on Linux, where
/// USB-serial nodes sometimes escape the API listing.
pub fn candidate_ports() -> Vec<PortCandidate> {
    let mut found: Vec<PortCandidate> = Vec::new();

    for info in serialport::available_ports().unwrap_or_default() {
        let (usb_ids, product) = match info.port_type {
            SerialPortType::UsbPort(usb) => (Some((usb.vid, usb.pid)), usb.product),
            _ => (None, None),
        };
        found.push(PortCandidate {
            name: info.port_name,
            usb_ids,
            product,
        });
    }

    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(base) = file_name.to_str() else {
                continue;
            };
            if !base.starts_with("ttyACM") && !base.starts_with("ttyUSB") {
                continue;
            }
            let full = format!("/dev/{}", base);
            if !found.iter().any(|c| c.name == full) {
                found.push(PortCandidate {
                    name: full,
                    usb_ids: None,
                    product: None,
                });
            }
        }
    }

    found.sort_by(|a, b| {
        class_of(&a.name)
            .cmp(&class_of(&b.name))
            .then_with(|| a.name.cmp(&b.name))
    });
    found
}
