//! Offline image merge tool
//!
//! Joins a bootloader image and a program image into a single flash image,
//! with the program placed at a fixed offset. No device is involved.

use crate::error::MergeError;
use std::path::Path;

/// Place `first` at offset 0 and `second` at `offset`
///
/// The gap between the two is filled with `fill`. The output is exactly
/// `offset + second.len()` bytes long.
pub fn merge_images(
    first: &[u8],
    second: &[u8],
    offset: usize,
    fill: u8,
) -> Result<Vec<u8>, MergeError> {
    if first.len() > offset {
        return Err(MergeError::Overlap {
            first_len: first.len(),
            offset,
        });
    }

    let mut output = vec![fill; offset + second.len()];
    output[..first.len()].copy_from_slice(first);
    output[offset..].copy_from_slice(second);
    Ok(output)
}

/// Merge two image files into `output`
///
/// Returns the size of the written image.
pub fn merge_files(
    first: &Path,
    second: &Path,
    offset: usize,
    output: &Path,
    fill: u8,
) -> Result<usize, MergeError> {
    let first_data = std::fs::read(first)?;
    let second_data = std::fs::read(second)?;

    let merged = merge_images(&first_data, &second_data, offset, fill)?;
    std::fs::write(output, &merged)?;

    log::info!(
        "Merged {:?} ({} bytes) and {:?} ({} bytes at 0x{:X}) into {:?}",
        first,
        first_data.len(),
        second,
        second_data.len(),
        offset,
        output
    );
    Ok(merged.len())
}
