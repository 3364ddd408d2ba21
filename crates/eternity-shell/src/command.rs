//! Shell command parsing

use crate::error::ShellError;
use std::path::PathBuf;

/// A parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// Flash a binary as the new main program
    Write { file: PathBuf },
    /// Read pages into a file
    Read {
        address: u32,
        pages: usize,
        file: PathBuf,
    },
    /// Erase consecutive sectors
    Erase { address: u32, sectors: usize },
    /// Show device information
    Info,
    /// Start the main program and leave the shell
    Jump,
    /// Reboot into the bootloader and leave the shell
    Reset,
    /// Show help
    Help,
    /// Leave the shell
    Exit,
}

/// Usage lines, one per command
pub const USAGE: &[(&str, &str)] = &[
    ("write <file>", "Upload a new main program to the device"),
    (
        "read <address> <pages> <file>",
        "Download pages starting at a page-aligned address",
    ),
    (
        "erase <address> <sectors>",
        "Erase sectors starting at a sector-aligned address",
    ),
    ("info", "Get information about the device"),
    ("jump", "Jump to the main program (ends the session)"),
    ("reset", "Reset the device to the bootloader (ends the session)"),
    ("help", "Show this help"),
    ("exit | quit", "Exit the shell"),
];

/// Parse a hex (`0x` prefix) or decimal number
pub fn parse_number(s: &str) -> Result<u64, ShellError> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse::<u64>()
    };
    parsed.map_err(|_| ShellError::InvalidArgument(format!("not a number: {:?}", s)))
}

fn parse_address(s: &str) -> Result<u32, ShellError> {
    u32::try_from(parse_number(s)?)
        .map_err(|_| ShellError::InvalidArgument(format!("address out of range: {}", s)))
}

fn parse_count(s: &str) -> Result<usize, ShellError> {
    usize::try_from(parse_number(s)?)
        .map_err(|_| ShellError::InvalidArgument(format!("count out of range: {}", s)))
}

fn usage(verb: &str) -> ShellError {
    let line = USAGE
        .iter()
        .find(|(cmd, _)| cmd.split(' ').next() == Some(verb))
        .map(|(cmd, _)| *cmd)
        .unwrap_or(verb);
    ShellError::InvalidArgument(format!("usage: {}", line))
}

impl ShellCommand {
    /// Parse an input line; `Ok(None)` for a blank line
    pub fn parse(line: &str) -> Result<Option<Self>, ShellError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, args)) = parts.split_first() else {
            return Ok(None);
        };

        let cmd = match (verb, args) {
            ("write", [file]) => ShellCommand::Write {
                file: PathBuf::from(file),
            },
            ("read", [address, pages, file]) => ShellCommand::Read {
                address: parse_address(address)?,
                pages: parse_count(pages)?,
                file: PathBuf::from(file),
            },
            ("erase", [address, sectors]) => ShellCommand::Erase {
                address: parse_address(address)?,
                sectors: parse_count(sectors)?,
            },
            ("info", []) => ShellCommand::Info,
            ("jump", []) => ShellCommand::Jump,
            ("reset", []) => ShellCommand::Reset,
            ("help" | "?", []) => ShellCommand::Help,
            ("exit" | "quit", []) => ShellCommand::Exit,
            ("write" | "read" | "erase" | "info" | "jump" | "reset", _) => {
                return Err(usage(verb))
            }
            _ => {
                return Err(ShellError::InvalidArgument(format!(
                    "unknown command: {} (try help)",
                    verb
                )))
            }
        };
        Ok(Some(cmd))
    }
}
