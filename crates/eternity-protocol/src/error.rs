//! Error types for bootloader protocol operations

use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// No serial port with a matching USB identifier pair
    #[error("No Eternity bootloader found (VID 0x{vendor_id:04X}, PID 0x{product_id:04X})")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// Address is not a multiple of the operation's block size
    #[error("Address 0x{address:08X} is not aligned to {alignment} bytes")]
    InvalidAlignment { address: u32, alignment: u32 },

    /// Payload does not have the size the command requires
    #[error("Invalid payload length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Device answered with something other than `ack`
    #[error("Device refused command: {0:?}")]
    ProtocolNack(String),

    /// Fewer bytes than expected arrived before the read timeout
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// A structured response could not be parsed
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// I/O error during communication
    #[error("I/O error: {0}")]
    Io(String),

    /// Serial port error
    #[cfg(feature = "serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Result type for protocol operations
pub type Result<T> = core::result::Result<T, ProtocolError>;

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        ProtocolError::Io(e.to_string())
    }
}
