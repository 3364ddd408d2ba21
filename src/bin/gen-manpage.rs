//! Man page generator for eternity-flasher
//!
//! Writes `eternity-flasher.1` plus one `eternity-flasher-<command>.1` page
//! per subcommand into the given directory (default: `man`).

use clap::CommandFactory;
use clap_mangen::Man;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
mod cli;

const BIN_NAME: &str = "eternity-flasher";

/// Render `cmd` as a section 1 page titled `title` into `dir`
fn write_page(dir: &Path, title: &str, cmd: clap::Command) -> io::Result<PathBuf> {
    let mut buffer = Vec::new();
    Man::new(cmd).title(title).section("1").render(&mut buffer)?;

    let path = dir.join(format!("{}.1", title));
    fs::write(&path, buffer)?;
    Ok(path)
}

/// Write the top-level page and one page per visible subcommand
fn write_pages(dir: &Path) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut cmd = cli::Cli::command();
    cmd.build();

    let mut written = vec![write_page(dir, BIN_NAME, cmd.clone())?];
    for sub in cmd
        .get_subcommands()
        .filter(|sub| !sub.is_hide_set() && sub.get_name() != "help")
    {
        let title = format!("{}-{}", BIN_NAME, sub.get_name());
        written.push(write_page(dir, &title, sub.clone())?);
    }
    Ok(written)
}

fn main() -> io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));

    let written = write_pages(&output_dir)?;
    for path in &written {
        println!("{}", path.display());
    }
    eprintln!("{} man pages written to {}", written.len(), output_dir.display());
    Ok(())
}
