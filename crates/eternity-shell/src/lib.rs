//! Interactive shell for the Eternity bootloader
//!
//! A thin command dispatcher over `eternity-flash`: every command maps to
//! one operation on the open session.
//!
//! # Example Session
//!
//! ```text
//! Eternity> info
//! Device Name:       eternity
//! Protocol version:  1
//! ...
//! Eternity> write app.bin
//! Program app.bin uploaded to device
//! Eternity> jump
//! Goodbye!
//! ```

mod command;
mod error;

pub use command::{parse_number, ShellCommand, USAGE};
pub use error::ShellError;

use colored::Colorize;
use directories::ProjectDirs;
use eternity_flash::{erase_sectors, flash_image, read_pages, ProtocolClient, Progress, Transport};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

/// Whether the shell keeps running after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command
    Continue,
    /// Leave the shell
    Exit,
}

/// Get the history file path
fn get_history_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "eternity-flasher") {
        let mut path = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&path).ok();
        path.push("shell_history");
        path
    } else {
        PathBuf::from(".eternity_history")
    }
}

fn connected<T: Transport>(
    session: &mut Option<ProtocolClient<T>>,
) -> Result<&mut ProtocolClient<T>, ShellError> {
    session
        .as_mut()
        .ok_or_else(|| ShellError::InvalidArgument("session has ended".into()))
}

/// Shell state: the open session and the progress renderer
pub struct Shell<T: Transport, P: Progress> {
    session: Option<ProtocolClient<T>>,
    progress: P,
}

impl<T: Transport, P: Progress> Shell<T, P> {
    /// Create a shell over an open session
    pub fn new(session: ProtocolClient<T>, progress: P) -> Self {
        Self {
            session: Some(session),
            progress,
        }
    }

    /// True while the session is usable
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn end_session(&mut self) -> Result<ProtocolClient<T>, ShellError> {
        self.session
            .take()
            .ok_or_else(|| ShellError::InvalidArgument("session has ended".into()))
    }

    /// Execute a single command
    pub fn execute(&mut self, cmd: ShellCommand) -> Result<Flow, ShellError> {
        match cmd {
            ShellCommand::Write { file } => {
                let image = std::fs::read(&file).map_err(|e| {
                    ShellError::InvalidArgument(format!("cannot read {}: {}", file.display(), e))
                })?;
                println!(
                    "{}",
                    format!(
                        "Uploading {} ({} bytes) as a new main program...",
                        file.display(),
                        image.len()
                    )
                    .yellow()
                );
                let session = connected(&mut self.session)?;
                flash_image(session, &image, &mut self.progress)?;
                println!(
                    "{}",
                    format!("Program {} uploaded to device", file.display()).green()
                );
            }
            ShellCommand::Read {
                address,
                pages,
                file,
            } => {
                let session = connected(&mut self.session)?;
                let mut sink = BufWriter::new(File::create(&file)?);
                read_pages(session, address, pages, &mut sink, &mut self.progress)?;
                println!(
                    "{}",
                    format!("Data downloaded to file {}", file.display()).green()
                );
            }
            ShellCommand::Erase { address, sectors } => {
                let session = connected(&mut self.session)?;
                erase_sectors(session, address, sectors, &mut self.progress)?;
                println!("{}", "Data erased".green());
            }
            ShellCommand::Info => {
                let info = connected(&mut self.session)?.info()?;
                let field = |name: &str, value: String| {
                    println!("{} {}", format!("{:<18}", name).yellow(), value.red());
                };
                field("Device Name:", info.device_name.clone());
                field("Protocol version:", info.protocol_version.clone());
                field("Git SHA:", info.git_commit_sha.clone());
                field("Build date:", info.build_date.to_string());
                field("Flash size:", format!("{} KiB", info.flash_size / 1024));
                field(
                    "Bootloader size:",
                    format!("{} KiB", info.bootloader_size / 1024),
                );
            }
            ShellCommand::Jump => {
                self.end_session()?.jump()?;
                return Ok(Flow::Exit);
            }
            ShellCommand::Reset => {
                self.end_session()?.reset()?;
                return Ok(Flow::Exit);
            }
            ShellCommand::Help => print_help(),
            ShellCommand::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    /// Run the interactive loop until exit, EOF or a terminal command
    pub fn run(mut self) -> Result<(), ShellError> {
        let mut rl = DefaultEditor::new().map_err(|e| ShellError::Readline(e.to_string()))?;

        // Load history
        let history_path = get_history_path();
        if rl.load_history(&history_path).is_err() {
            // History file doesn't exist yet, that's fine
        }

        println!(
            "Type {} for available commands, {} to leave.",
            "help".bright_cyan(),
            "exit".bright_cyan()
        );

        let prompt = format!("{} ", "Eternity>".bright_cyan().bold());

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let cmd = match ShellCommand::parse(&line) {
                        Ok(Some(cmd)) => cmd,
                        Ok(None) => continue,
                        Err(e) => {
                            eprintln!("{}: {}", "Error".bright_red().bold(), e);
                            continue;
                        }
                    };
                    let _ = rl.add_history_entry(line.as_str());

                    match self.execute(cmd) {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Exit) => break,
                        Err(e) => {
                            log::debug!("command failed: {:?}", e);
                            eprintln!("{}: {}", "Error".bright_red().bold(), e);
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    break;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".bright_red().bold(), err);
                    break;
                }
            }
        }

        println!("{}", "Goodbye!".bright_cyan().bold());

        // Save history
        if let Err(e) = rl.save_history(&history_path) {
            eprintln!("{}: Failed to save history: {}", "Warning".bright_yellow(), e);
        }

        Ok(())
    }
}

/// Print help message
fn print_help() {
    for (usage, description) in USAGE {
        println!("    {:<32} -- {}", usage.bright_cyan(), description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eternity_dummy::{DeviceState, DummyBootloader};
    use eternity_flash::NoProgress;

    fn shell(dummy: &DummyBootloader) -> Shell<DummyBootloader, NoProgress> {
        Shell::new(ProtocolClient::new(dummy.clone()), NoProgress)
    }

    #[test]
    fn test_write_then_read_back() {
        let dummy = DummyBootloader::new_default();
        let mut shell = shell(&dummy);
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("app.bin");
        let dump_path = dir.path().join("dump.bin");
        let image: Vec<u8> = (0..600).map(|i| (i % 256) as u8).collect();
        std::fs::write(&image_path, &image).unwrap();

        let flow = shell
            .execute(ShellCommand::Write {
                file: image_path.clone(),
            })
            .unwrap();
        assert_eq!(flow, Flow::Continue);

        shell
            .execute(ShellCommand::Read {
                address: 0,
                pages: 3,
                file: dump_path.clone(),
            })
            .unwrap();

        let dump = std::fs::read(&dump_path).unwrap();
        assert_eq!(dump.len(), 768);
        assert_eq!(&dump[..600], &image[..]);
        assert!(dump[600..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_missing_file_sends_nothing() {
        let dummy = DummyBootloader::new_default();
        let mut shell = shell(&dummy);

        let err = shell
            .execute(ShellCommand::Write {
                file: "/nonexistent/app.bin".into(),
            })
            .unwrap_err();
        assert!(matches!(err, ShellError::InvalidArgument(_)));
        assert!(dummy.commands().is_empty());
    }

    #[test]
    fn test_erase_unaligned_is_error() {
        let dummy = DummyBootloader::new_default();
        let mut shell = shell(&dummy);
        let err = shell
            .execute(ShellCommand::Erase {
                address: 0x100,
                sectors: 1,
            })
            .unwrap_err();
        assert!(matches!(err, ShellError::Flash(_)));
        assert!(shell.is_connected());
    }

    #[test]
    fn test_jump_ends_session() {
        let dummy = DummyBootloader::new_default();
        let mut shell = shell(&dummy);

        assert_eq!(shell.execute(ShellCommand::Info).unwrap(), Flow::Continue);
        assert_eq!(shell.execute(ShellCommand::Jump).unwrap(), Flow::Exit);
        assert!(!shell.is_connected());
        assert_eq!(dummy.state(), DeviceState::MainProgram);

        assert!(shell.execute(ShellCommand::Info).is_err());
    }

    #[test]
    fn test_reset_ends_session() {
        let dummy = DummyBootloader::new_default();
        let mut shell = shell(&dummy);
        assert_eq!(shell.execute(ShellCommand::Reset).unwrap(), Flow::Exit);
        assert_eq!(dummy.state(), DeviceState::Rebooted);
    }
}
