//! Error types for flashing operations

use eternity_protocol::ProtocolError;
use thiserror::Error;

/// Errors from multi-step flash operations
///
/// Unit indices are zero-based and relative to the start of the operation.
#[derive(Debug, Error)]
pub enum FlashError {
    /// The device refused to erase a sector
    #[error("Erase failed on sector {sector} (address 0x{address:08X}): {reason:?}")]
    EraseFailed {
        sector: usize,
        address: u32,
        reason: String,
    },

    /// The device refused to write a page
    #[error("Write failed on page {page} (address 0x{address:08X}): {reason:?}")]
    WriteFailed {
        page: usize,
        address: u32,
        reason: String,
    },

    /// A page read returned the wrong number of bytes
    #[error("Read failed on page {page} (address 0x{address:08X}): got {received} bytes")]
    ReadFailed {
        page: usize,
        address: u32,
        received: usize,
    },

    /// The requested range runs past the 32-bit address space
    #[error("Address range overflows at unit {index}")]
    AddressOverflow { index: usize },

    /// Protocol or transport error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Local I/O error (e.g. writing the read-back file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for flash operations
pub type Result<T> = core::result::Result<T, FlashError>;

/// Errors from the image merge tool
#[derive(Debug, Error)]
pub enum MergeError {
    /// The first image extends past the offset of the second
    #[error("Offset 0x{offset:X} is too small: first image is {first_len} bytes")]
    Overlap { first_len: usize, offset: usize },

    /// Reading an input or writing the output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
