//! Page and sector arithmetic for images

use eternity_protocol::protocol::{FILL_BYTE, PAGE_SIZE, SECTOR_SIZE};

/// How an image maps onto pages and sectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageGeometry {
    /// Image size in bytes
    pub size: usize,
    /// Pages needed to write the image
    pub page_count: usize,
    /// Sectors needed to hold the image
    pub sector_count: usize,
}

impl ImageGeometry {
    /// Compute the geometry of an image of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            size,
            page_count: size.div_ceil(PAGE_SIZE),
            sector_count: size.div_ceil(SECTOR_SIZE),
        }
    }

    /// Number of fill bytes appended to the last page
    pub fn padding(&self) -> usize {
        self.page_count * PAGE_SIZE - self.size
    }
}

/// Page `index` of `image`, padded with the fill byte if it is the last one
///
/// # Panics
///
/// Panics if `index` is beyond the last page of the image.
pub fn padded_page(image: &[u8], index: usize) -> [u8; PAGE_SIZE] {
    let start = index * PAGE_SIZE;
    let end = (start + PAGE_SIZE).min(image.len());
    assert!(start < end, "page {} is outside the image", index);

    let mut page = [FILL_BYTE; PAGE_SIZE];
    page[..end - start].copy_from_slice(&image[start..end]);
    page
}
