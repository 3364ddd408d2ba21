//! eternity-flasher - Host tool for the Eternity bootloader
//!
//! Flashes, reads back and erases the program area of a device running the
//! Eternity bootloader over its USB serial link, and merges images offline.
//!
//! # Architecture
//!
//! The binary only parses arguments and renders progress. Device work is
//! done by `eternity-flash`, which drives the `eternity-protocol` client:
//! - **flash**: erase every sector the image touches, write it page by page,
//!   then start the main program
//! - **read / erase**: page read-back and sector erase loops
//! - **info / jump / reset**: single protocol commands

mod cli;
mod commands;
mod progress;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let params = cli.connection.params();

    match cli.command {
        Commands::Flash { input, no_jump } => commands::run_flash(&params, &input, no_jump),
        Commands::Read {
            address,
            pages,
            output,
        } => commands::run_read(&params, address, pages, &output),
        Commands::Erase { address, sectors } => commands::run_erase(&params, address, sectors),
        Commands::Info => commands::run_info(&params),
        Commands::Jump => commands::run_jump(&params),
        Commands::Reset => commands::run_reset(&params),
        Commands::List => commands::list_devices(),
        Commands::Shell => commands::run_shell(&params),
        Commands::Merge {
            first,
            second,
            offset,
            output,
            fill,
        } => commands::run_merge(&first, &second, offset, &output, fill),
    }
}
