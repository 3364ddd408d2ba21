//! Bootloader protocol client
//!
//! `ProtocolClient` owns the transport for the lifetime of a session. All
//! operations are strictly sequential: a command is sent, then its response
//! is drained before control returns. The client never retries.

use crate::error::{ProtocolError, Result};
use crate::protocol::{
    check_alignment, Acknowledgment, Command, DeviceInfo, PAGE_SIZE, SECTOR_SIZE, SETTLE_DELAY,
};
use crate::transport::Transport;

/// Marker returned once `jump` or `reset` has ended the session
///
/// The client is consumed by these operations, so no further command can be
/// issued on the closed transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEnded {
    command: Command,
}

impl SessionEnded {
    /// The terminal command that ended the session
    pub fn command(&self) -> Command {
        self.command
    }
}

/// Eternity bootloader client
pub struct ProtocolClient<T: Transport> {
    transport: T,
}

impl<T: Transport> ProtocolClient<T> {
    /// Create a client owning the given transport
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Write one page at `address`
    ///
    /// `address` must be page aligned and `data` exactly one page long; the
    /// caller pads short pages. On a negative acknowledgment the payload is
    /// not sent and the acknowledgment is returned as-is.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<Acknowledgment> {
        check_alignment(address, PAGE_SIZE)?;
        if data.len() != PAGE_SIZE {
            return Err(ProtocolError::InvalidLength {
                expected: PAGE_SIZE,
                actual: data.len(),
            });
        }

        self.send_command(Command::Write(address))?;

        let ack = self.read_ack()?;
        if !ack.is_ack() {
            log::warn!("write 0x{:08X} refused: {:?}", address, ack.line());
            return Ok(ack);
        }

        self.transport.write_all(data)?;
        self.transport.flush()?;
        Ok(ack)
    }

    /// Read one page at `address`
    ///
    /// There is no acknowledgment step and no alignment check here: the
    /// device answers with the raw page, or with an error line if it rejects
    /// the address. Whatever arrives before the timeout is returned, so the
    /// caller must treat anything but `PAGE_SIZE` bytes as a failed read.
    pub fn read(&mut self, address: u32) -> Result<Vec<u8>> {
        self.send_command(Command::Read(address))?;

        let mut page = vec![0u8; PAGE_SIZE];
        let n = self.transport.read_up_to(&mut page)?;
        if n != PAGE_SIZE {
            log::debug!("read 0x{:08X}: got {} of {} bytes", address, n, PAGE_SIZE);
        }
        page.truncate(n);
        Ok(page)
    }

    /// Read one page and require it to arrive complete
    ///
    /// Same wire exchange as [`read`](Self::read); anything but `PAGE_SIZE`
    /// bytes is a [`ProtocolError::ShortRead`].
    pub fn read_page(&mut self, address: u32) -> Result<Vec<u8>> {
        let page = self.read(address)?;
        if page.len() != PAGE_SIZE {
            return Err(ProtocolError::ShortRead {
                expected: PAGE_SIZE,
                actual: page.len(),
            });
        }
        Ok(page)
    }

    /// Erase the sector at `address`
    pub fn erase(&mut self, address: u32) -> Result<Acknowledgment> {
        check_alignment(address, SECTOR_SIZE)?;

        self.send_command(Command::Erase(address))?;

        let ack = self.read_ack()?;
        if !ack.is_ack() {
            log::warn!("erase 0x{:08X} refused: {:?}", address, ack.line());
        }
        Ok(ack)
    }

    /// Query device information
    pub fn info(&mut self) -> Result<DeviceInfo> {
        self.send_command(Command::Info)?;
        let line = self.transport.read_line()?;
        line.parse()
    }

    /// Leave the bootloader and start the main program
    ///
    /// Ends the session: the transport is closed and the client consumed.
    pub fn jump(self) -> Result<SessionEnded> {
        self.end_session(Command::Jump)
    }

    /// Reboot the device back into the bootloader
    ///
    /// Ends the session: the transport is closed and the client consumed.
    pub fn reset(self) -> Result<SessionEnded> {
        self.end_session(Command::Reset)
    }

    fn end_session(mut self, command: Command) -> Result<SessionEnded> {
        self.send_command(command)?;
        // The device reboots without answering; give the command time to land
        std::thread::sleep(SETTLE_DELAY);
        self.transport.close()?;
        log::info!("Session ended by {}", command);
        Ok(SessionEnded { command })
    }

    fn send_command(&mut self, command: Command) -> Result<()> {
        log::trace!("-> {}", command);
        self.transport.write_all(&command.encode())?;
        self.transport.flush()
    }

    fn read_ack(&mut self) -> Result<Acknowledgment> {
        let line = self.transport.read_line()?;
        log::trace!("<- {:?}", line);
        Ok(Acknowledgment::new(line))
    }
}
