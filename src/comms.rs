//! Refer to datasheet:
//! https://www.adestotech.com/wp-content/uploads/doc3596.pdf (AT45DB081D)
use crate::config::Config;
use crate::error::Error;
use crate::geometry::{encode_address, sector_start_page, Address, PAGES_PER_SECTOR, PAGE_SIZE};
use crate::identification::{DeviceId, Diagnosis};
use crate::opcode::{Opcode, CHIP_ERASE_SEQUENCE};
use crate::session::{ReadSession, WriteSession};
use crate::status::Status;
use crate::traits::HardwareFlashDevice;
use core::fmt::{Debug, Write};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Operation, SpiDevice};

/// Blocking DataFlash driver.
///
/// Every command runs as one [`SpiDevice`] transaction, so chip select is
/// handled by the device and the bus may be shared. `WP` and `RST` are the
/// active-low write protect and reset lines. The driver keeps write protect
/// asserted except while `write`/`modify` run.
pub struct DataFlash<SPI, WP, RST, D> {
    spi: SPI,
    wp: WP,
    rst: RST,
    delay: D,
    config: Config,
}

impl<SPI, WP, RST, D> Debug for DataFlash<SPI, WP, RST, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DataFlash")
            .field("config", &self.config)
            .finish()
    }
}

impl<SPI, WP, RST, D, P> DataFlash<SPI, WP, RST, D>
where
    SPI: SpiDevice,
    WP: OutputPin<Error = P>,
    RST: OutputPin<Error = P>,
    D: DelayNs,
{
    pub fn new(spi: SPI, wp: WP, rst: RST, delay: D) -> Self {
        Self::with_config(spi, wp, rst, delay, Config::default())
    }

    pub fn with_config(spi: SPI, wp: WP, rst: RST, delay: D, config: Config) -> Self {
        Self {
            spi,
            wp,
            rst,
            delay,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gives back the owned handles.
    pub fn release(self) -> (SPI, WP, RST, D) {
        (self.spi, self.wp, self.rst, self.delay)
    }

    /// Asserts write protect and pulses the reset line.
    ///
    /// Must run once before any other operation. Afterwards the device is
    /// idle and write protected.
    pub fn init(&mut self) -> Result<(), Error<SPI::Error, P>> {
        self.protect()?;
        self.rst.set_low().map_err(Error::Pin)?;
        self.delay.delay_ms(self.config.reset_pulse_ms);
        self.rst.set_high().map_err(Error::Pin)?;
        debug!("DataFlash reset done");
        Ok(())
    }

    /// Reads the status register.
    pub fn read_status(&mut self) -> Result<Status, Error<SPI::Error, P>> {
        let mut response = [0u8; 1];
        self.command_with_response(&[Opcode::ReadStatus as u8], &mut response)?;
        Ok(Status::from_bits_retain(response[0]))
    }

    pub fn is_ready(&mut self) -> Result<bool, Error<SPI::Error, P>> {
        Ok(self.read_status()?.is_ready())
    }

    /// Polls the status register until the device reports ready.
    ///
    /// Commands sent while the device is busy are silently dropped, so every
    /// mutating or session-opening operation goes through here first. Gives
    /// up with [`Error::Unresponsive`] after `Config::ready_timeout_us`.
    pub fn wait_until_ready(&mut self) -> Result<(), Error<SPI::Error, P>> {
        self.wait_ready_within(self.config.ready_timeout_us)
    }

    fn wait_ready_within(&mut self, timeout_us: u32) -> Result<(), Error<SPI::Error, P>> {
        let budget = self.config.poll_budget(timeout_us);
        let mut polls = 0;
        loop {
            let status = self.read_status()?;
            if status.is_ready() {
                return Ok(());
            }
            if polls >= budget {
                warn!("DataFlash busy for {=u32} us: {}", timeout_us, status);
                return Err(Error::Unresponsive);
            }
            polls += 1;
            self.delay.delay_us(self.config.poll_interval_us);
        }
    }

    /// Page erase (81h). Sets all bytes of `page` to FFh.
    pub fn erase_page(&mut self, page: u16) -> Result<(), Error<SPI::Error, P>> {
        self.wait_until_ready()?;
        debug!("erasing page {=u16}", page);
        self.command_at(Opcode::PageErase, page, 0)
    }

    /// Sector erase (7Ch).
    ///
    /// Sector 0 holds the boot data and is never erased: the call returns
    /// without touching the bus.
    pub fn erase_sector(&mut self, sector: u8) -> Result<(), Error<SPI::Error, P>> {
        if sector == 0 {
            warn!("refusing to erase sector 0");
            return Ok(());
        }
        self.wait_until_ready()?;
        debug!("erasing sector {=u8}", sector);
        self.command_at(Opcode::SectorErase, sector_start_page(sector), 0)
    }

    /// Chip erase (C7h 94h 80h 9Ah). Unlike `erase_sector` this includes
    /// sector 0. Blocks until the erase has finished.
    pub fn chip_erase(&mut self) -> Result<(), Error<SPI::Error, P>> {
        self.wait_until_ready()?;
        debug!("erasing whole chip");
        self.command(&CHIP_ERASE_SEQUENCE)?;
        self.wait_ready_within(self.config.chip_erase_timeout_us)
    }

    /// Writes `data` to consecutive pages starting at `start_page`.
    ///
    /// Every page is staged in buffer 1 and committed with built-in erase, so
    /// no separate erase is needed. When `data.len()` is not a multiple of
    /// [`PAGE_SIZE`] the tail of the last page receives whatever the buffer
    /// held before. Write protect is released for the whole call and
    /// asserted again once the last page has been programmed, or after the
    /// first failure.
    pub fn write(&mut self, data: &[u8], start_page: u16) -> Result<(), Error<SPI::Error, P>> {
        self.unprotect()?;
        let written = self.write_pages(data, start_page);
        let protected = self.protect();
        written?;
        protected
    }

    fn write_pages(&mut self, data: &[u8], start_page: u16) -> Result<(), Error<SPI::Error, P>> {
        let mut page = start_page;
        for chunk in data.chunks(PAGE_SIZE) {
            self.fill_buffer(0, chunk)?;
            self.commit_buffer(page)?;
            page = page.wrapping_add(1);
        }
        self.wait_until_ready()
    }

    /// Read-modify-write of `data` at `(page, offset)`.
    ///
    /// Each touched page is first copied into buffer 1 so the bytes around
    /// `data` survive the commit. Same write protect handling as `write`.
    pub fn modify(
        &mut self,
        page: u16,
        offset: u16,
        data: &[u8],
    ) -> Result<(), Error<SPI::Error, P>> {
        self.unprotect()?;
        let written = self.modify_pages(page, offset, data);
        let protected = self.protect();
        written?;
        protected
    }

    fn modify_pages(
        &mut self,
        page: u16,
        offset: u16,
        data: &[u8],
    ) -> Result<(), Error<SPI::Error, P>> {
        // offsets past the page end continue on the next page
        let Address {
            mut page,
            mut offset,
        } = Address::from_linear(Address::new(page, 0).to_linear() + offset as u32);
        let mut data = data;
        while !data.is_empty() {
            let room = PAGE_SIZE - offset as usize;
            let (chunk, rest) = data.split_at(room.min(data.len()));

            self.wait_until_ready()?;
            self.command_at(Opcode::PageToBuffer1, page, 0)?;
            self.fill_buffer(offset, chunk)?;
            self.commit_buffer(page)?;

            data = rest;
            page = page.wrapping_add(1);
            offset = 0;
        }
        self.wait_until_ready()
    }

    /// Continuous array read (0Bh) of `buf.len()` bytes from `(page, offset)`.
    ///
    /// Reading runs on across page boundaries.
    pub fn read(
        &mut self,
        buf: &mut [u8],
        page: u16,
        offset: u16,
    ) -> Result<(), Error<SPI::Error, P>> {
        self.wait_until_ready()?;
        let session = ReadSession::at(page, offset);
        self.spi
            .transaction(&mut session.stream(buf))
            .map_err(Error::Spi)
    }

    /// Self test: reads the device id and status register and checks both
    /// against the AT45DB081 signature.
    ///
    /// A mismatch is not an error, it is reported through the returned
    /// [`Diagnosis`] which always carries the raw id.
    pub fn diagnose(&mut self) -> Result<Diagnosis, Error<SPI::Error, P>> {
        let mut id = [0u8; 4];
        self.command_with_response(&[Opcode::ReadDeviceId as u8], &mut id)?;
        let status = self.read_status()?;
        let diagnosis = Diagnosis {
            id: DeviceId(id),
            status,
        };
        if !diagnosis.is_ok() {
            warn!("DataFlash self test failed: {}", diagnosis);
        }
        Ok(diagnosis)
    }

    /// Writes a hex dump of `page` to `out`, 32 bytes per line.
    pub fn dump_page<W: Write>(
        &mut self,
        page: u16,
        out: &mut W,
    ) -> Result<(), Error<SPI::Error, P>> {
        let mut data = [0u8; PAGE_SIZE];
        self.read(&mut data, page, 0)?;
        for (line, bytes) in data.chunks(32).enumerate() {
            write!(out, "0x{:02X}:\t", line * 32)?;
            for byte in bytes {
                write!(out, "{:02X}", byte)?;
            }
            out.write_char('\n')?;
        }
        Ok(())
    }

    /// Fills buffer 1 with FFh. Only useful while debugging, readers must
    /// cope with arbitrary bytes in unused page tails anyway.
    pub fn clear_buffer(&mut self) -> Result<(), Error<SPI::Error, P>> {
        self.fill_buffer(0, &[0xFF; PAGE_SIZE])
    }

    /// Deep power-down (B9h). Only `resume` is accepted afterwards.
    pub fn power_down(&mut self) -> Result<(), Error<SPI::Error, P>> {
        self.wait_until_ready()?;
        self.command(&[Opcode::DeepPowerDown as u8])
    }

    /// Resume from deep power-down (ABh).
    pub fn resume(&mut self) -> Result<(), Error<SPI::Error, P>> {
        self.command(&[Opcode::ResumeFromPowerDown as u8])?;
        self.delay.delay_us(self.config.resume_delay_us);
        Ok(())
    }

    /// Buffer 1 write (84h) of `data` from buffer offset `offset`.
    fn fill_buffer(&mut self, offset: u16, data: &[u8]) -> Result<(), Error<SPI::Error, P>> {
        self.wait_until_ready()?;
        let session = WriteSession::at(offset);
        self.spi
            .transaction(&mut session.fill(data))
            .map_err(Error::Spi)
    }

    /// Buffer 1 to main memory page program with built-in erase (83h).
    fn commit_buffer(&mut self, page: u16) -> Result<(), Error<SPI::Error, P>> {
        self.wait_until_ready()?;
        trace!("committing buffer 1 to page {=u16}", page);
        self.command_at(Opcode::Buffer1ToPageWithErase, page, 0)
    }

    fn protect(&mut self) -> Result<(), Error<SPI::Error, P>> {
        self.wp.set_low().map_err(Error::Pin)
    }

    fn unprotect(&mut self) -> Result<(), Error<SPI::Error, P>> {
        self.wp.set_high().map_err(Error::Pin)
    }

    /// Writes a command to the SPI bus
    fn command(&mut self, bytes: &[u8]) -> Result<(), Error<SPI::Error, P>> {
        self.spi
            .transaction(&mut [Operation::Write(bytes)])
            .map_err(Error::Spi)
    }

    fn command_at(
        &mut self,
        opcode: Opcode,
        page: u16,
        offset: u16,
    ) -> Result<(), Error<SPI::Error, P>> {
        let [a0, a1, a2] = encode_address(page, offset);
        self.command(&[opcode as u8, a0, a1, a2])
    }

    /// Writes a command to the SPI bus and reads the response in the same
    /// transaction
    fn command_with_response(
        &mut self,
        instruction: &[u8],
        response: &mut [u8],
    ) -> Result<(), Error<SPI::Error, P>> {
        self.spi
            .transaction(&mut [Operation::Write(instruction), Operation::Read(response)])
            .map_err(Error::Spi)
    }
}

impl<SPI, WP, RST, D, P> HardwareFlashDevice for DataFlash<SPI, WP, RST, D>
where
    SPI: SpiDevice,
    WP: OutputPin<Error = P>,
    RST: OutputPin<Error = P>,
    D: DelayNs,
{
    type Error = Error<SPI::Error, P>;

    fn read(&mut self, addr: u32, data: &mut [u8]) -> Result<(), Self::Error> {
        let Address { page, offset } = Address::from_linear(addr);
        DataFlash::read(self, data, page, offset)
    }

    fn sector_erase(&mut self, addr: u32) -> Result<(), Self::Error> {
        let sector = Address::from_linear(addr).page / PAGES_PER_SECTOR;
        self.erase_sector(sector as u8)
    }

    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error> {
        let Address { page, offset } = Address::from_linear(addr);
        self.modify(page, offset, data)
    }

    fn chip_erase(&mut self) -> Result<(), Self::Error> {
        DataFlash::chip_erase(self)
    }
}
