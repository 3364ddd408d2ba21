//! eternity-protocol - Eternity bootloader protocol support
//!
//! This crate implements the host side of the Eternity bootloader protocol:
//! a small ASCII command language with binary page payloads, spoken over a
//! USB CDC serial link.
//!
//! # Protocol Overview
//!
//! Every command is a single ASCII line terminated by an EOT byte (`0x04`):
//!
//! | Command              | Response                                      |
//! |----------------------|-----------------------------------------------|
//! | `read 0x<addr>`      | 256 raw bytes, no acknowledgment              |
//! | `write 0x<addr>`     | `ack` line, then the host sends 256 raw bytes |
//! | `erase 0x<addr>`     | `ack` line once the 4 KiB sector is erased    |
//! | `info`               | one line with six space-separated fields      |
//! | `jump` / `reset`     | nothing, the device reboots                   |
//!
//! Any line not starting with `ack` is a negative acknowledgment and carries
//! the device's diagnostic text (e.g. `err address not aligned`).
//!
//! # Example
//!
//! ```no_run
//! use eternity_protocol::{ProtocolClient, SerialTransport};
//! use eternity_protocol::protocol::{BOOTLOADER_PID, BOOTLOADER_VID};
//!
//! let port = eternity_protocol::discover(BOOTLOADER_VID, BOOTLOADER_PID)?;
//! let transport = SerialTransport::open(&port, None)?;
//! let mut client = ProtocolClient::new(transport);
//!
//! let info = client.info()?;
//! println!("{}", info);
//!
//! // Leave the bootloader and start the main program
//! client.jump()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-exports
pub use client::{ProtocolClient, SessionEnded};
pub use error::{ProtocolError, Result};
pub use protocol::{Acknowledgment, Command, DeviceInfo};
pub use transport::Transport;

#[cfg(feature = "serial")]
pub use transport::serial::{discover, list_devices, SerialTransport, UsbSerialDevice};
