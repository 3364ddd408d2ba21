//! High-level flashing operations for the Eternity bootloader
//!
//! This crate drives a [`ProtocolClient`] through multi-step jobs: erasing
//! and rewriting the whole program area from an image, erasing a sector
//! range and reading pages back. It also hosts the offline image merge tool.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                CLI / shell (eternity-flasher)                │
//! │  - Renders progress, parses arguments                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   eternity-flash (this crate)                │
//! │  - flash_image / erase_sectors / read_pages                  │
//! │  - Progress observer, image geometry, merge tool             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │    eternity-protocol     │   │     eternity-dummy       │
//! │  - ProtocolClient        │   │  - In-memory bootloader  │
//! │  - SerialTransport       │   │    (Transport impl)      │
//! └──────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! Every operation stops at the first failure and reports the sector or page
//! it failed on. Nothing is retried or rolled back; the device is left in the
//! state produced by the last successful command.
//!
//! # Example
//!
//! ```no_run
//! use eternity_flash::{flash_image, open_bootloader, ConnectionParams, NoProgress};
//!
//! let image = std::fs::read("firmware.bin")?;
//! let mut client = open_bootloader(&ConnectionParams::default())?;
//! let stats = flash_image(&mut client, &image, &mut NoProgress)?;
//! println!("Wrote {} pages", stats.pages_written);
//! client.jump()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod connect;
pub mod error;
pub mod geometry;
pub mod merge;
pub mod operations;
pub mod progress;

pub use connect::{open_bootloader, BoxedTransport, ConnectionParams, Session};
pub use error::{FlashError, MergeError, Result};
pub use geometry::ImageGeometry;
pub use merge::{merge_files, merge_images};
pub use operations::{erase_sectors, flash_image, read_pages, FlashStats};
pub use progress::{NoProgress, Phase, Progress};

// Re-export protocol types the front ends need
pub use eternity_protocol::{DeviceInfo, ProtocolClient, ProtocolError, SessionEnded, Transport};
