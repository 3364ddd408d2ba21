//! Eternity bootloader protocol definitions
//!
//! Wire constants, command framing, acknowledgment classification and the
//! `info` response parser.

use crate::error::{ProtocolError, Result};
use chrono::NaiveDateTime;
use core::fmt;
use core::str::FromStr;
use std::time::Duration;

// ---- Device identification ----

/// USB vendor ID the bootloader enumerates with
pub const BOOTLOADER_VID: u16 = 0xCAFE;
/// USB product ID the bootloader enumerates with
pub const BOOTLOADER_PID: u16 = 0x6940;

// ---- Transport parameters ----

/// Default baud rate (ignored by USB CDC, but required to open the port)
pub const DEFAULT_BAUD: u32 = 115_200;
/// Per-read timeout of the serial session
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);
/// Time given to `jump`/`reset` to reach the device before the port closes
pub const SETTLE_DELAY: Duration = Duration::from_millis(10);

// ---- Framing ----

/// End of transmission, terminates every command
pub const EOT: u8 = 0x04;
/// Prefix of a positive acknowledgment line
pub const ACK_TOKEN: &str = "ack";

// ---- Flash geometry ----

/// Write/read unit
pub const PAGE_SIZE: usize = 256;
/// Erase unit
pub const SECTOR_SIZE: usize = 4096;
/// Pages per erase sector
pub const PAGES_PER_SECTOR: usize = SECTOR_SIZE / PAGE_SIZE;
/// Value of erased flash, used to pad partial pages
pub const FILL_BYTE: u8 = 0xFF;

/// Format of the `build_date` field of the `info` response
pub const BUILD_DATE_FORMAT: &str = "%Y-%m-%d,%H:%M:%S";

/// Longest response line accepted, newline included
///
/// The firmware's longest line is the `info` response, built in a 128-byte
/// buffer.
pub const MAX_LINE_LEN: usize = 256;

/// Number of space-separated fields in the `info` response
pub const INFO_FIELD_COUNT: usize = 6;

/// Check that `address` is a multiple of `alignment`
pub fn check_alignment(address: u32, alignment: usize) -> Result<()> {
    if address as usize % alignment != 0 {
        return Err(ProtocolError::InvalidAlignment {
            address,
            alignment: alignment as u32,
        });
    }
    Ok(())
}

/// A bootloader command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Read one page
    Read(u32),
    /// Write one page
    Write(u32),
    /// Erase one sector
    Erase(u32),
    /// Query device information
    Info,
    /// Start the main program
    Jump,
    /// Reboot into the bootloader
    Reset,
}

impl Command {
    /// Command verb as sent on the wire
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Read(_) => "read",
            Command::Write(_) => "write",
            Command::Erase(_) => "erase",
            Command::Info => "info",
            Command::Jump => "jump",
            Command::Reset => "reset",
        }
    }

    /// Address argument, if the command takes one
    pub fn address(&self) -> Option<u32> {
        match *self {
            Command::Read(addr) | Command::Write(addr) | Command::Erase(addr) => Some(addr),
            Command::Info | Command::Jump | Command::Reset => None,
        }
    }

    /// Encode the command as it goes on the wire, EOT included
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = self.to_string().into_bytes();
        frame.push(EOT);
        frame
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address() {
            Some(addr) => write!(f, "{} {:#x}", self.verb(), addr),
            None => f.write_str(self.verb()),
        }
    }
}

/// A response line read after a command
///
/// Negative acknowledgments are not errors at this level: the caller decides
/// what to do with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    line: String,
}

impl Acknowledgment {
    /// Wrap a response line
    pub fn new(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }

    /// True if the device accepted the command
    pub fn is_ack(&self) -> bool {
        self.line.starts_with(ACK_TOKEN)
    }

    /// Raw response text
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Convert a negative acknowledgment into [`ProtocolError::ProtocolNack`]
    pub fn into_result(self) -> Result<String> {
        if self.is_ack() {
            Ok(self.line)
        } else {
            Err(ProtocolError::ProtocolNack(self.line))
        }
    }
}

/// Device information returned by `info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device name (e.g. "eternity")
    pub device_name: String,
    /// Git commit the bootloader was built from
    pub git_commit_sha: String,
    /// Protocol version string
    pub protocol_version: String,
    /// Bootloader build timestamp
    pub build_date: NaiveDateTime,
    /// Total flash size in bytes
    pub flash_size: u32,
    /// Space reserved for the bootloader in bytes
    pub bootloader_size: u32,
}

impl DeviceInfo {
    /// Flash space available to the main program
    pub fn program_space(&self) -> u32 {
        self.flash_size.saturating_sub(self.bootloader_size)
    }
}

fn parse_size(field: &str, name: &str) -> Result<u32> {
    field
        .parse()
        .map_err(|_| ProtocolError::MalformedResponse(format!("invalid {}: {:?}", name, field)))
}

impl FromStr for DeviceInfo {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split(' ').collect();
        if fields.len() != INFO_FIELD_COUNT {
            return Err(ProtocolError::MalformedResponse(format!(
                "expected {} info fields, got {}: {:?}",
                INFO_FIELD_COUNT,
                fields.len(),
                line
            )));
        }
        if fields.iter().any(|f| f.is_empty()) {
            return Err(ProtocolError::MalformedResponse(format!(
                "empty info field: {:?}",
                line
            )));
        }

        let build_date = NaiveDateTime::parse_from_str(fields[3], BUILD_DATE_FORMAT).map_err(
            |e| ProtocolError::MalformedResponse(format!("invalid build date {:?}: {}", fields[3], e)),
        )?;

        Ok(DeviceInfo {
            device_name: fields[0].to_string(),
            git_commit_sha: fields[1].to_string(),
            protocol_version: fields[2].to_string(),
            build_date,
            flash_size: parse_size(fields[4], "flash size")?,
            bootloader_size: parse_size(fields[5], "bootloader size")?,
        })
    }
}

/// Formats the info line exactly as the device sends it
impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.device_name,
            self.git_commit_sha,
            self.protocol_version,
            self.build_date.format(BUILD_DATE_FORMAT),
            self.flash_size,
            self.bootloader_size
        )
    }
}
