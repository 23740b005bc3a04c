/// DataFlash command set. Only part of it is used by the driver, the rest is
/// listed so the full instruction table lives in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum Opcode {
    /// Manufacturer and device ID.
    ReadDeviceId = 0x9F,
    /// Status register read.
    ReadStatus = 0xD7,
    PageErase = 0x81,
    SectorErase = 0x7C,
    /// First byte of the 4-byte chip erase sequence.
    ChipErase = 0xC7,
    /// Continuous array read, needs one dummy byte after the address.
    ArrayRead = 0x0B,
    Buffer1Write = 0x84,
    Buffer2Write = 0x87,
    /// Buffer 1 to main memory page, with built-in erase.
    Buffer1ToPageWithErase = 0x83,
    Buffer2ToPageWithErase = 0x86,
    Buffer1ToPageNoErase = 0x88,
    Buffer2ToPageNoErase = 0x89,
    /// Main memory page to buffer 1 transfer.
    PageToBuffer1 = 0x53,
    PageToBuffer2 = 0x55,
    DeepPowerDown = 0xB9,
    ResumeFromPowerDown = 0xAB,
    ReadSecurityRegister = 0x77,
}

/// The full chip erase instruction is four bytes long.
pub const CHIP_ERASE_SEQUENCE: [u8; 4] = [Opcode::ChipErase as u8, 0x94, 0x80, 0x9A];

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}
