//! Erase, flash and read-back loops
//!
//! Each loop issues its commands strictly in ascending address order and
//! aborts on the first unit the device refuses.

use crate::error::{FlashError, Result};
use crate::geometry::{padded_page, ImageGeometry};
use crate::progress::{throughput, Phase, Progress};
use eternity_protocol::protocol::{check_alignment, PAGE_SIZE, SECTOR_SIZE};
use eternity_protocol::{ProtocolClient, ProtocolError, Transport};
use std::io::Write;
use std::time::{Duration, Instant};

/// Statistics of a completed flash run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlashStats {
    /// Image size in bytes
    pub image_size: usize,
    /// Sectors erased
    pub sectors_erased: usize,
    /// Pages written
    pub pages_written: usize,
    /// Time spent in the write phase
    pub write_time: Duration,
}

impl FlashStats {
    /// Bytes sent in page payloads, padding included
    pub fn bytes_written(&self) -> usize {
        self.pages_written * PAGE_SIZE
    }

    /// Average write throughput in bytes per second
    pub fn average_throughput(&self) -> f64 {
        throughput(self.bytes_written(), self.write_time)
    }
}

/// Address of unit `index` of `unit_size` bytes starting at `base`
fn unit_address(base: u32, index: usize, unit_size: usize) -> Result<u32> {
    index
        .checked_mul(unit_size)
        .and_then(|offset| u32::try_from(offset).ok())
        .and_then(|offset| base.checked_add(offset))
        .ok_or(FlashError::AddressOverflow { index })
}

/// Erase `count` consecutive sectors starting at `address`
///
/// `address` must be sector aligned.
pub fn erase_sectors<T: Transport, P: Progress + ?Sized>(
    client: &mut ProtocolClient<T>,
    address: u32,
    count: usize,
    progress: &mut P,
) -> Result<()> {
    check_alignment(address, SECTOR_SIZE)?;

    log::debug!("Erasing {} sectors from 0x{:08X}", count, address);
    progress.begin(Phase::Erase, count);

    for sector in 0..count {
        let sector_addr = unit_address(address, sector, SECTOR_SIZE)?;

        let start = Instant::now();
        let ack = client.erase(sector_addr)?;
        let elapsed = start.elapsed();

        if !ack.is_ack() {
            return Err(FlashError::EraseFailed {
                sector,
                address: sector_addr,
                reason: ack.line().to_string(),
            });
        }
        progress.on_progress(
            Phase::Erase,
            sector + 1,
            count,
            throughput(SECTOR_SIZE, elapsed),
        );
    }

    progress.finish(Phase::Erase);
    Ok(())
}

/// Replace the program area with `image`
///
/// Erases every sector the image touches, then writes it page by page from
/// address 0. The last page is padded with `0xFF` in the transmitted buffer
/// only.
pub fn flash_image<T: Transport, P: Progress + ?Sized>(
    client: &mut ProtocolClient<T>,
    image: &[u8],
    progress: &mut P,
) -> Result<FlashStats> {
    let geometry = ImageGeometry::new(image.len());
    log::info!(
        "Flashing {} bytes ({} pages, {} sectors)",
        geometry.size,
        geometry.page_count,
        geometry.sector_count
    );

    erase_sectors(client, 0, geometry.sector_count, progress)?;

    progress.begin(Phase::Write, geometry.page_count);
    let write_start = Instant::now();

    for page in 0..geometry.page_count {
        let address = unit_address(0, page, PAGE_SIZE)?;
        let data = padded_page(image, page);

        let start = Instant::now();
        let ack = client.write(address, &data)?;
        let elapsed = start.elapsed();

        if !ack.is_ack() {
            return Err(FlashError::WriteFailed {
                page,
                address,
                reason: ack.line().to_string(),
            });
        }

        progress.on_progress(
            Phase::Write,
            page + 1,
            geometry.page_count,
            throughput(PAGE_SIZE, elapsed),
        );
    }

    progress.finish(Phase::Write);

    let stats = FlashStats {
        image_size: geometry.size,
        sectors_erased: geometry.sector_count,
        pages_written: geometry.page_count,
        write_time: write_start.elapsed(),
    };
    log::info!(
        "Wrote {} pages in {:.2?} ({:.2} KiB/s)",
        stats.pages_written,
        stats.write_time,
        stats.average_throughput() / 1024.0
    );
    Ok(stats)
}

/// Read `page_count` pages starting at `address` into `sink`
///
/// `address` must be page aligned. Every page must arrive complete; the
/// first short read aborts the loop. Returns the number of bytes written to
/// `sink`.
pub fn read_pages<T: Transport, W: Write + ?Sized, P: Progress + ?Sized>(
    client: &mut ProtocolClient<T>,
    address: u32,
    page_count: usize,
    sink: &mut W,
    progress: &mut P,
) -> Result<usize> {
    check_alignment(address, PAGE_SIZE)?;

    log::debug!("Reading {} pages from 0x{:08X}", page_count, address);
    progress.begin(Phase::Read, page_count);

    for page in 0..page_count {
        let page_addr = unit_address(address, page, PAGE_SIZE)?;

        let start = Instant::now();
        let data = match client.read_page(page_addr) {
            Ok(data) => data,
            Err(ProtocolError::ShortRead { actual, .. }) => {
                return Err(FlashError::ReadFailed {
                    page,
                    address: page_addr,
                    received: actual,
                })
            }
            Err(e) => return Err(e.into()),
        };
        let elapsed = start.elapsed();

        sink.write_all(&data)?;

        progress.on_progress(
            Phase::Read,
            page + 1,
            page_count,
            throughput(PAGE_SIZE, elapsed),
        );
    }

    sink.flush()?;
    progress.finish(Phase::Read);
    Ok(page_count * PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use eternity_dummy::{DummyBootloader, Fault};
    use eternity_protocol::protocol::{Command, FILL_BYTE};

    /// Records every progress callback
    #[derive(Default)]
    struct RecordingProgress {
        events: Vec<(Phase, usize, usize, f64)>,
        begun: Vec<(Phase, usize)>,
        finished: Vec<Phase>,
    }

    impl Progress for RecordingProgress {
        fn begin(&mut self, phase: Phase, units_total: usize) {
            self.begun.push((phase, units_total));
        }

        fn on_progress(&mut self, phase: Phase, done: usize, total: usize, tp: f64) {
            self.events.push((phase, done, total, tp));
        }

        fn finish(&mut self, phase: Phase) {
            self.finished.push(phase);
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 253) as u8).collect()
    }

    #[test]
    fn test_flash_image_round_trip() {
        let dummy = DummyBootloader::new_default();
        dummy.load(0, &[0x00; 8192]);
        let mut client = ProtocolClient::new(dummy.clone());
        let image = pattern(4097);

        let stats = flash_image(&mut client, &image, &mut NoProgress).unwrap();
        assert_eq!(stats.sectors_erased, 2);
        assert_eq!(stats.pages_written, 17);
        assert_eq!(stats.bytes_written(), 17 * 256);

        let flash = dummy.flash();
        assert_eq!(&flash[..4097], &image[..]);
        // Padding of the last page, then untouched erased flash
        assert!(flash[4097..8192].iter().all(|&b| b == FILL_BYTE));
    }

    #[test]
    fn test_flash_command_sequence() {
        let dummy = DummyBootloader::new_default();
        let mut client = ProtocolClient::new(dummy.clone());

        flash_image(&mut client, &pattern(4097), &mut NoProgress).unwrap();

        let mut expected = vec!["erase 0x0".to_string(), "erase 0x1000".to_string()];
        expected.extend((0..17).map(|p| format!("write {:#x}", p * 256)));
        assert_eq!(dummy.commands(), expected);
    }

    #[test]
    fn test_last_page_padding_on_wire() {
        let dummy = DummyBootloader::new_default();
        let mut client = ProtocolClient::new(dummy.clone());
        let image = pattern(300);

        flash_image(&mut client, &image, &mut NoProgress).unwrap();

        let flash = dummy.flash();
        assert_eq!(&flash[256..300], &image[256..]);
        assert!(flash[300..512].iter().all(|&b| b == FILL_BYTE));
    }

    #[test]
    fn test_erase_failure_stops_sequence() {
        let dummy = DummyBootloader::new_default();
        dummy.inject(Command::Erase(0), Fault::Refuse("err flash locked".into()));
        let mut client = ProtocolClient::new(dummy.clone());

        let err = flash_image(&mut client, &pattern(5000), &mut NoProgress).unwrap_err();
        match err {
            FlashError::EraseFailed {
                sector,
                address,
                reason,
            } => {
                assert_eq!(sector, 0);
                assert_eq!(address, 0);
                assert_eq!(reason, "err flash locked");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(dummy.commands(), vec!["erase 0x0".to_string()]);
    }

    #[test]
    fn test_write_failure_reports_page() {
        let dummy = DummyBootloader::new_default();
        dummy.inject(Command::Write(0x300), Fault::Refuse("err timeout".into()));
        let mut client = ProtocolClient::new(dummy.clone());

        let err = flash_image(&mut client, &pattern(2048), &mut NoProgress).unwrap_err();
        match err {
            FlashError::WriteFailed { page, reason, .. } => {
                assert_eq!(page, 3);
                assert_eq!(reason, "err timeout");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // No write after the refused one
        assert_eq!(dummy.commands().last().map(String::as_str), Some("write 0x300"));
        assert_eq!(dummy.commands().len(), 1 + 4);
    }

    #[test]
    fn test_flash_progress_events() {
        let dummy = DummyBootloader::new_default();
        let mut client = ProtocolClient::new(dummy);
        let mut progress = RecordingProgress::default();

        flash_image(&mut client, &pattern(4097), &mut progress).unwrap();

        assert_eq!(progress.begun, vec![(Phase::Erase, 2), (Phase::Write, 17)]);
        assert_eq!(progress.finished, vec![Phase::Erase, Phase::Write]);
        assert_eq!(progress.events.len(), 2 + 17);

        let units: Vec<_> = progress
            .events
            .iter()
            .map(|&(phase, done, total, _)| (phase, done, total))
            .collect();
        let mut expected = vec![(Phase::Erase, 1, 2), (Phase::Erase, 2, 2)];
        expected.extend((1..=17).map(|done| (Phase::Write, done, 17)));
        assert_eq!(units, expected);

        // Every sector and page reports the rate of its own command
        for &(phase, done, _, tp) in &progress.events {
            assert!(tp > 0.0 && tp.is_finite(), "{} unit {}: {}", phase, done, tp);
        }
    }

    #[test]
    fn test_empty_image_sends_nothing() {
        let dummy = DummyBootloader::new_default();
        let mut client = ProtocolClient::new(dummy.clone());

        let stats = flash_image(&mut client, &[], &mut NoProgress).unwrap();
        assert_eq!(stats.pages_written, 0);
        assert!(dummy.commands().is_empty());
    }

    #[test]
    fn test_erase_sectors_range() {
        let dummy = DummyBootloader::new_default();
        dummy.load(0, &[0u8; 0x4000]);
        let mut client = ProtocolClient::new(dummy.clone());

        erase_sectors(&mut client, 0x1000, 2, &mut NoProgress).unwrap();

        assert_eq!(
            dummy.commands(),
            vec!["erase 0x1000".to_string(), "erase 0x2000".to_string()]
        );
        let flash = dummy.flash();
        assert!(flash[..0x1000].iter().all(|&b| b == 0));
        assert!(flash[0x1000..0x3000].iter().all(|&b| b == 0xFF));
        assert!(flash[0x3000..0x4000].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_erase_sectors_rejects_unaligned() {
        let dummy = DummyBootloader::new_default();
        let mut client = ProtocolClient::new(dummy.clone());

        let err = erase_sectors(&mut client, 0x800, 1, &mut NoProgress).unwrap_err();
        assert!(matches!(
            err,
            FlashError::Protocol(ProtocolError::InvalidAlignment { address: 0x800, .. })
        ));
        assert!(dummy.commands().is_empty());
    }

    #[test]
    fn test_read_pages() {
        let dummy = DummyBootloader::new_default();
        let content = pattern(1024);
        dummy.load(0x200, &content);
        let mut client = ProtocolClient::new(dummy.clone());
        let mut progress = RecordingProgress::default();

        let mut out = Vec::new();
        let n = read_pages(&mut client, 0x200, 4, &mut out, &mut progress).unwrap();

        assert_eq!(n, 1024);
        assert_eq!(out, content);
        assert_eq!(
            dummy.commands(),
            vec!["read 0x200", "read 0x300", "read 0x400", "read 0x500"]
        );
        assert_eq!(progress.events.len(), 4);
        assert_eq!(progress.events[3].1, 4);
    }

    #[test]
    fn test_read_pages_short_read() {
        let dummy = DummyBootloader::new_default();
        dummy.inject(Command::Read(0x100), Fault::ShortRead(100));
        let mut client = ProtocolClient::new(dummy.clone());

        let mut out = Vec::new();
        let err = read_pages(&mut client, 0, 3, &mut out, &mut NoProgress).unwrap_err();
        assert!(matches!(
            err,
            FlashError::ReadFailed {
                page: 1,
                address: 0x100,
                received: 100
            }
        ));
        // Only the first page reached the sink
        assert_eq!(out.len(), 256);
        assert_eq!(dummy.commands().len(), 2);
    }

    #[test]
    fn test_read_pages_rejected_address() {
        let dummy = DummyBootloader::new_default();
        let mut client = ProtocolClient::new(dummy);

        // Past the end of the program area the device answers with an error
        // line, which is not a full page
        let mut out = Vec::new();
        let err = read_pages(&mut client, 0x0800_0000, 1, &mut out, &mut NoProgress).unwrap_err();
        assert!(matches!(err, FlashError::ReadFailed { page: 0, .. }));
    }

    #[test]
    fn test_read_pages_rejects_unaligned() {
        let mut client = ProtocolClient::new(DummyBootloader::new_default());
        let mut out = Vec::new();
        assert!(matches!(
            read_pages(&mut client, 0x10, 1, &mut out, &mut NoProgress),
            Err(FlashError::Protocol(ProtocolError::InvalidAlignment { .. }))
        ));
    }

    #[test]
    fn test_unit_address_overflow() {
        assert_eq!(unit_address(0x1000, 2, SECTOR_SIZE).unwrap(), 0x3000);
        assert!(matches!(
            unit_address(0xFFFF_FF00, 1, PAGE_SIZE),
            Err(FlashError::AddressOverflow { index: 1 })
        ));
    }
}
