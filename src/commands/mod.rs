//! CLI command implementations
//!
//! Device commands open one session each. `jump` and `reset` consume it;
//! every other command drops it, which closes the port.

mod device;
mod list;
mod merge;
mod shell;

pub use device::{run_erase, run_flash, run_info, run_jump, run_read, run_reset};
pub use list::list_devices;
pub use merge::run_merge;
pub use shell::run_shell;
