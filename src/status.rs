use bitflags::bitflags;

bitflags! {
    /// Status register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        /// **R**ea**DY**: set once the device accepts new commands.
        const READY = 1 << 7;
        /// Result of the last memory page to buffer compare.
        const COMP = 1 << 6;
        /// The 4 density bits, `1001` on the 8 Mbit part.
        const DENSITY = 0b0011_1100;
        /// Software sector protection is enabled.
        const PROTECT = 1 << 1;
        /// Device is configured for 256-byte ("power of 2") pages.
        const PAGE_SIZE_256 = 1 << 0;
    }
}

impl Status {
    /// Bits checked by the self test: everything except READY and COMP.
    pub const SIGNATURE_MASK: u8 = 0b0011_1111;
    /// 8 Mbit density, no protection, 264-byte pages.
    pub const EXPECTED_SIGNATURE: u8 = 0b0010_0100;

    pub fn is_ready(self) -> bool {
        self.contains(Status::READY)
    }

    pub fn density(self) -> u8 {
        (self & Status::DENSITY).bits() >> 2
    }

    pub fn matches_expected(self) -> bool {
        self.bits() & Self::SIGNATURE_MASK == Self::EXPECTED_SIGNATURE
    }
}

#[cfg(feature = "defmt-03")]
impl defmt::Format for Status {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Status({=u8:#b})", self.bits())
    }
}
