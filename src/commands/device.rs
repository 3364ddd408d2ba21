//! Commands that talk to the bootloader

use crate::progress::IndicatifProgress;
use eternity_flash::{
    erase_sectors, flash_image, open_bootloader, read_pages, ConnectionParams, DeviceInfo,
    ImageGeometry,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Run the flash command
pub fn run_flash(params: &ConnectionParams, input: &Path, no_jump: bool) -> CmdResult {
    let image = std::fs::read(input)
        .map_err(|e| format!("Failed to read {}: {}", input.display(), e))?;
    let geometry = ImageGeometry::new(image.len());

    let mut session = open_bootloader(params)?;

    println!(
        "Uploading {} ({} bytes, across {} pages) as a new main program...",
        input.display(),
        geometry.size,
        geometry.page_count
    );

    let mut progress = IndicatifProgress::new();
    let stats = flash_image(&mut session, &image, &mut progress)?;
    drop(progress);

    println!(
        "Program {} uploaded to device ({} sectors erased, {} pages written, {:.2} KB/s)",
        input.display(),
        stats.sectors_erased,
        stats.pages_written,
        stats.average_throughput() / 1024.0
    );

    if no_jump {
        log::info!("Staying in the bootloader");
    } else {
        session.jump()?;
        println!("Started main program");
    }
    Ok(())
}

/// Run the read command
pub fn run_read(params: &ConnectionParams, address: u32, pages: usize, output: &Path) -> CmdResult {
    let mut session = open_bootloader(params)?;
    let mut sink = BufWriter::new(File::create(output)?);

    let mut progress = IndicatifProgress::new();
    let bytes = read_pages(&mut session, address, pages, &mut sink, &mut progress)?;
    drop(progress);

    println!("Wrote {} bytes to {:?}", bytes, output);
    Ok(())
}

/// Run the erase command
pub fn run_erase(params: &ConnectionParams, address: u32, sectors: usize) -> CmdResult {
    let mut session = open_bootloader(params)?;

    let mut progress = IndicatifProgress::new();
    erase_sectors(&mut session, address, sectors, &mut progress)?;
    drop(progress);

    println!(
        "Erased {} sectors starting at 0x{:08X}",
        sectors, address
    );
    Ok(())
}

/// Run the info command
pub fn run_info(params: &ConnectionParams) -> CmdResult {
    let mut session = open_bootloader(params)?;
    let info = session.info()?;
    print_device_info(&info);
    Ok(())
}

/// Run the jump command
pub fn run_jump(params: &ConnectionParams) -> CmdResult {
    open_bootloader(params)?.jump()?;
    println!("Started main program");
    Ok(())
}

/// Run the reset command
pub fn run_reset(params: &ConnectionParams) -> CmdResult {
    open_bootloader(params)?.reset()?;
    println!("Device reset to bootloader");
    Ok(())
}

fn print_device_info(info: &DeviceInfo) {
    println!("Device Information");
    println!("==================");
    println!();
    println!("Device name:      {}", info.device_name);
    println!("Protocol version: {}", info.protocol_version);
    println!("Git SHA:          {}", info.git_commit_sha);
    println!("Build date:       {}", info.build_date);
    println!(
        "Flash size:       {} bytes ({} KiB)",
        info.flash_size,
        info.flash_size / 1024
    );
    println!(
        "Bootloader size:  {} bytes ({} KiB)",
        info.bootloader_size,
        info.bootloader_size / 1024
    );
    println!(
        "Program space:    {} bytes ({} KiB)",
        info.program_space(),
        info.program_space() / 1024
    );
}
