//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use eternity_flash::ConnectionParams;
use eternity_protocol::protocol::{BOOTLOADER_PID, BOOTLOADER_VID, FILL_BYTE};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal u16
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let value = parse_hex_u32(s)?;
    u16::try_from(value).map_err(|_| format!("Value out of range: {}", s))
}

/// Parse a string as a hex or decimal byte
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let value = parse_hex_u32(s)?;
    u8::try_from(value).map_err(|_| format!("Value out of range: {}", s))
}

#[derive(Parser)]
#[command(name = "eternity-flasher")]
#[command(author, version, about = "Eternity bootloader flashing tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options selecting the device, shared across commands
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Serial port of the bootloader (discovered by USB ID if omitted)
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// Baud rate
    #[arg(short, long, global = true)]
    pub baud: Option<u32>,

    /// USB vendor ID used for discovery
    #[arg(long, global = true, value_parser = parse_hex_u16, default_value_t = BOOTLOADER_VID)]
    pub vid: u16,

    /// USB product ID used for discovery
    #[arg(long, global = true, value_parser = parse_hex_u16, default_value_t = BOOTLOADER_PID)]
    pub pid: u16,

    /// Talk to an in-memory emulated bootloader instead of hardware
    #[arg(long, global = true, hide = true)]
    pub dummy: bool,
}

impl ConnectionArgs {
    /// Connection parameters for opening a session
    pub fn params(&self) -> ConnectionParams {
        ConnectionParams {
            port: self.port.clone(),
            baud: self.baud,
            vendor_id: self.vid,
            product_id: self.pid,
            dummy: self.dummy,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Flash a binary as the new main program, then start it
    Flash {
        /// Binary image to flash
        input: PathBuf,

        /// Stay in the bootloader after flashing
        #[arg(long)]
        no_jump: bool,
    },

    /// Read flash pages to a file
    Read {
        /// Start address (page aligned, hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        address: u32,

        /// Number of 256-byte pages to read
        pages: usize,

        /// Output file path
        output: PathBuf,
    },

    /// Erase flash sectors
    Erase {
        /// Start address (sector aligned, hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        address: u32,

        /// Number of 4 KiB sectors to erase
        sectors: usize,
    },

    /// Show device information
    Info,

    /// Start the main program
    Jump,

    /// Reboot the device into the bootloader
    Reset,

    /// List USB serial devices
    List,

    /// Start an interactive shell
    Shell,

    /// Merge two images into one flash image (offline)
    Merge {
        /// Image placed at offset 0 (e.g. the bootloader)
        first: PathBuf,

        /// Image placed at OFFSET (e.g. the main program)
        second: PathBuf,

        /// Offset of the second image (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        offset: u32,

        /// Output file path
        output: PathBuf,

        /// Byte used to fill the gap between the images
        #[arg(long, value_parser = parse_hex_u8, default_value_t = FILL_BYTE)]
        fill: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_hex_u32("0x100000"), Ok(0x100000));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert_eq!(parse_hex_u16("0xCAFE"), Ok(0xCAFE));
        assert!(parse_hex_u16("0x10000").is_err());
        assert_eq!(parse_hex_u8("0x00"), Ok(0));
        assert!(parse_hex_u8("256").is_err());
    }

    #[test]
    fn test_merge_args() {
        let cli = Cli::try_parse_from([
            "eternity-flasher",
            "merge",
            "boot.bin",
            "app.bin",
            "0x10000",
            "out.bin",
        ])
        .unwrap();
        match cli.command {
            Commands::Merge { offset, fill, .. } => {
                assert_eq!(offset, 0x10000);
                assert_eq!(fill, 0xFF);
            }
            _ => panic!("expected merge"),
        }
    }

    #[test]
    fn test_global_connection_args() {
        let cli = Cli::try_parse_from([
            "eternity-flasher",
            "read",
            "0x100",
            "4",
            "dump.bin",
            "--port",
            "/dev/ttyACM0",
            "--vid",
            "0x1234",
        ])
        .unwrap();
        let params = cli.connection.params();
        assert_eq!(params.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(params.vendor_id, 0x1234);
        assert_eq!(params.product_id, BOOTLOADER_PID);
        assert!(!params.dummy);
    }
}
