//! Storage view with linear byte addresses.
//!
//! Address `addr` maps to page `addr / 264`, offset `addr % 264`.

pub trait HardwareFlashDevice {
    type Error;

    /// Reads flash contents into `buf`, starting at `addr`.
    fn read(&mut self, addr: u32, data: &mut [u8]) -> Result<(), Self::Error>;

    /// Erases the 256-page sector containing `addr` to all 1s (FFh).
    /// Addresses inside sector 0 are ignored.
    fn sector_erase(&mut self, addr: u32) -> Result<(), Self::Error>;

    /// Programs `data` at `addr`, keeping the other bytes of every page it
    /// touches. No prior erase is needed.
    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error>;

    /// Sets the whole device, sector 0 included, to all 1s (FFh).
    fn chip_erase(&mut self) -> Result<(), Self::Error>;
}

#[allow(async_fn_in_trait)]
pub trait AsyncHardwareFlashDevice {
    type Error;

    /// Reads flash contents into `buf`, starting at `addr`.
    async fn read(&mut self, addr: u32, data: &mut [u8]) -> Result<(), Self::Error>;

    /// See [`HardwareFlashDevice::sector_erase`].
    async fn sector_erase(&mut self, addr: u32) -> Result<(), Self::Error>;

    /// See [`HardwareFlashDevice::page_program`].
    async fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error>;

    async fn chip_erase(&mut self) -> Result<(), Self::Error>;
}
