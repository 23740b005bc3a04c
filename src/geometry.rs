//! Device geometry and the page/byte address codec.
//!
//! The AT45DB081 in its default configuration uses 264-byte pages. A byte
//! offset inside such a page needs 9 bits, so the page number sits one bit
//! higher in the 24-bit command address than it would with 256-byte pages.

/// Bytes per page.
pub const PAGE_SIZE: usize = 264;
/// Number of pages on the 8 Mbit part.
pub const TOTAL_PAGES: u16 = 4096;
/// Pages covered by one sector erase.
pub const PAGES_PER_SECTOR: u16 = 256;
/// Number of sectors.
pub const SECTOR_COUNT: u8 = (TOTAL_PAGES / PAGES_PER_SECTOR) as u8;
/// Total number of bytes addressable through the page/byte scheme.
pub const CAPACITY: u32 = PAGE_SIZE as u32 * TOTAL_PAGES as u32;

/// A logical location: page number plus byte offset inside the page.
///
/// Nothing here validates the range. Values past the geometry alias onto
/// other locations once encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Address {
    pub page: u16,
    pub offset: u16,
}

impl Address {
    pub const fn new(page: u16, offset: u16) -> Self {
        Self { page, offset }
    }

    /// Splits a linear byte address into page and offset.
    pub const fn from_linear(addr: u32) -> Self {
        Self {
            page: (addr / PAGE_SIZE as u32) as u16,
            offset: (addr % PAGE_SIZE as u32) as u16,
        }
    }

    /// Linear byte address of this location.
    pub const fn to_linear(self) -> u32 {
        self.page as u32 * PAGE_SIZE as u32 + self.offset as u32
    }

    pub const fn encode(self) -> [u8; 3] {
        encode_address(self.page, self.offset)
    }
}

/// Encodes `(page, offset)` into the 3 address bytes that follow an opcode.
///
/// Layout: `[page >> 7, (page << 1) | (offset >> 8), offset]`.
pub const fn encode_address(page: u16, offset: u16) -> [u8; 3] {
    [
        (page >> 7) as u8,
        ((page << 1) | (offset >> 8)) as u8,
        offset as u8,
    ]
}

/// First page of `sector`.
pub const fn sector_start_page(sector: u8) -> u16 {
    sector as u16 * PAGES_PER_SECTOR
}
