//! Shell command implementation

use crate::progress::IndicatifProgress;
use eternity_flash::{open_bootloader, ConnectionParams};
use eternity_shell::Shell;

/// Open a session and run the interactive shell on it
pub fn run_shell(params: &ConnectionParams) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_bootloader(params)?;
    Shell::new(session, IndicatifProgress::new()).run()?;
    Ok(())
}
