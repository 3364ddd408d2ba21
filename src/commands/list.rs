//! List command implementation

use eternity_protocol::list_devices as usb_serial_devices;

/// List USB serial devices, marking Eternity bootloaders
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = usb_serial_devices()?;
    if devices.is_empty() {
        println!("No USB serial devices found");
        return Ok(());
    }

    println!("{:<24} {:>9} {:<12} {}", "Port", "VID:PID", "Type", "Product");
    println!("{}", "-".repeat(60));

    for dev in &devices {
        let kind = if dev.is_bootloader() {
            "bootloader"
        } else {
            "-"
        };
        println!(
            "{:<24} {:04X}:{:04X} {:<12} {}",
            dev.port_name,
            dev.vid,
            dev.pid,
            kind,
            dev.product.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
