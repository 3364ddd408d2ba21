//! Error types for the shell

use eternity_flash::FlashError;
use thiserror::Error;

/// Errors that can occur in the shell
#[derive(Error, Debug)]
pub enum ShellError {
    /// I/O error (reading/writing stdin/stdout or local files)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line editor error
    #[error("Line editor error: {0}")]
    Readline(String),

    /// Device operation error
    #[error("{0}")]
    Flash(#[from] FlashError),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<eternity_flash::ProtocolError> for ShellError {
    fn from(e: eternity_flash::ProtocolError) -> Self {
        ShellError::Flash(e.into())
    }
}
