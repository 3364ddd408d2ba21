//! Opening a bootloader session
//!
//! Resolves the connection parameters to a transport (discovered serial
//! port, explicit port or in-memory emulator) and hands it to a client.

use eternity_protocol::protocol::{BOOTLOADER_PID, BOOTLOADER_VID};
use eternity_protocol::{ProtocolClient, ProtocolError, SerialTransport, Transport};

/// Boxed transport type for dynamic dispatch
pub type BoxedTransport = Box<dyn Transport + Send>;

/// A client over a type-erased transport
pub type Session = ProtocolClient<BoxedTransport>;

/// How to reach the bootloader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Serial port path; discovered by USB ID if not given
    pub port: Option<String>,
    /// Baud rate (None for the default)
    pub baud: Option<u32>,
    /// USB vendor ID used for discovery
    pub vendor_id: u16,
    /// USB product ID used for discovery
    pub product_id: u16,
    /// Use the in-memory emulator instead of hardware
    pub dummy: bool,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: None,
            baud: None,
            vendor_id: BOOTLOADER_VID,
            product_id: BOOTLOADER_PID,
            dummy: false,
        }
    }
}

/// Open a session with the bootloader
pub fn open_bootloader(params: &ConnectionParams) -> Result<Session, ProtocolError> {
    let transport: BoxedTransport = if params.dummy {
        open_dummy()?
    } else {
        let port = match &params.port {
            Some(port) => port.clone(),
            None => eternity_protocol::discover(params.vendor_id, params.product_id)?,
        };
        Box::new(SerialTransport::open(&port, params.baud)?)
    };

    Ok(ProtocolClient::new(transport))
}

#[cfg(feature = "dummy")]
fn open_dummy() -> Result<BoxedTransport, ProtocolError> {
    log::info!("Using in-memory dummy bootloader");
    Ok(Box::new(eternity_dummy::DummyBootloader::new_default()))
}

#[cfg(not(feature = "dummy"))]
fn open_dummy() -> Result<BoxedTransport, ProtocolError> {
    Err(ProtocolError::Io(
        "dummy bootloader support not compiled in".into(),
    ))
}
