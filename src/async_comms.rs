//! Refer to datasheet:
//! https://www.adestotech.com/wp-content/uploads/doc3596.pdf (AT45DB081D)
use core::fmt::Debug;

use crate::config::Config;
use crate::error::Error;
use crate::geometry::{encode_address, sector_start_page, Address, PAGES_PER_SECTOR, PAGE_SIZE};
use crate::identification::{DeviceId, Diagnosis};
use crate::opcode::{Opcode, CHIP_ERASE_SEQUENCE};
use crate::session::{ReadSession, WriteSession};
use crate::status::Status;
use crate::traits::AsyncHardwareFlashDevice;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::{Operation, SpiDevice};

/// Async counterpart of [`crate::comms::DataFlash`].
pub struct AsyncDataFlash<SPI, WP, RST, D> {
    spi: SPI,
    wp: WP,
    rst: RST,
    delay: D,
    config: Config,
}

impl<SPI, WP, RST, D> Debug for AsyncDataFlash<SPI, WP, RST, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AsyncDataFlash").finish()
    }
}

impl<SPI, WP, RST, D, P> AsyncDataFlash<SPI, WP, RST, D>
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

    pub fn release(self) -> (SPI, WP, RST, D) {
        (self.spi, self.wp, self.rst, self.delay)
    }

    /// Asserts write protect and pulses reset.
    pub async fn init(&mut self) -> Result<(), Error<SPI::Error, P>> {
        self.wp.set_low().map_err(Error::Pin)?;
        self.rst.set_low().map_err(Error::Pin)?;
        self.delay.delay_ms(self.config.reset_pulse_ms).await;
        self.rst.set_high().map_err(Error::Pin)?;
        debug!("DataFlash reset done");
        Ok(())
    }

    /// Reads the status register.
    pub async fn read_status(&mut self) -> Result<Status, Error<SPI::Error, P>> {
        let mut response = [0u8; 1];
        self.command_with_response(&[Opcode::ReadStatus as u8], &mut response)
            .await?;
        Ok(Status::from_bits_retain(response[0]))
    }

    pub async fn is_ready(&mut self) -> Result<bool, Error<SPI::Error, P>> {
        Ok(self.read_status().await?.is_ready())
    }

    /// Polls until ready, sleeping `poll_interval_us` between polls.
    pub async fn wait_until_ready(&mut self) -> Result<(), Error<SPI::Error, P>> {
        self.wait_ready_within(self.config.ready_timeout_us).await
    }

    async fn wait_ready_within(&mut self, timeout_us: u32) -> Result<(), Error<SPI::Error, P>> {
        let budget = self.config.poll_budget(timeout_us);
        let mut polls = 0;
        loop {
            let status = self.read_status().await?;
            if status.is_ready() {
                return Ok(());
            }
            if polls >= budget {
                warn!("DataFlash busy for {=u32} us: {}", timeout_us, status);
                return Err(Error::Unresponsive);
            }
            polls += 1;
            self.delay.delay_us(self.config.poll_interval_us).await;
        }
    }

    pub async fn erase_page(&mut self, page: u16) -> Result<(), Error<SPI::Error, P>> {
        self.wait_until_ready().await?;
        debug!("erasing page {=u16}", page);
        self.command_at(Opcode::PageErase, page, 0).await
    }

    /// Sector 0 is never erased, the call returns without bus traffic.
    pub async fn erase_sector(&mut self, sector: u8) -> Result<(), Error<SPI::Error, P>> {
        if sector == 0 {
            warn!("refusing to erase sector 0");
            return Ok(());
        }
        self.wait_until_ready().await?;
        debug!("erasing sector {=u8}", sector);
        self.command_at(Opcode::SectorErase, sector_start_page(sector), 0)
            .await
    }

    pub async fn chip_erase(&mut self) -> Result<(), Error<SPI::Error, P>> {
        self.wait_until_ready().await?;
        debug!("erasing whole chip");
        self.command(&CHIP_ERASE_SEQUENCE).await?;
        self.wait_ready_within(self.config.chip_erase_timeout_us)
            .await
    }

    /// Writes `data` to consecutive pages from `start_page`, one buffer fill
    /// and one commit-with-erase per page. See [`crate::comms::DataFlash::write`].
    pub async fn write(
        &mut self,
        data: &[u8],
        start_page: u16,
    ) -> Result<(), Error<SPI::Error, P>> {
        self.wp.set_high().map_err(Error::Pin)?;
        let written = self.write_pages(data, start_page).await;
        let protected = self.wp.set_low().map_err(Error::Pin);
        written?;
        protected
    }

    async fn write_pages(
        &mut self,
        data: &[u8],
        start_page: u16,
    ) -> Result<(), Error<SPI::Error, P>> {
        let mut page = start_page;
        for chunk in data.chunks(PAGE_SIZE) {
            self.fill_buffer(0, chunk).await?;
            self.commit_buffer(page).await?;
            page = page.wrapping_add(1);
        }
        self.wait_until_ready().await
    }

    /// Read-modify-write, see [`crate::comms::DataFlash::modify`].
    pub async fn modify(
        &mut self,
        page: u16,
        offset: u16,
        data: &[u8],
    ) -> Result<(), Error<SPI::Error, P>> {
        self.wp.set_high().map_err(Error::Pin)?;
        let written = self.modify_pages(page, offset, data).await;
        let protected = self.wp.set_low().map_err(Error::Pin);
        written?;
        protected
    }

    async fn modify_pages(
        &mut self,
        page: u16,
        offset: u16,
        data: &[u8],
    ) -> Result<(), Error<SPI::Error, P>> {
        let Address {
            mut page,
            mut offset,
        } = Address::from_linear(Address::new(page, 0).to_linear() + offset as u32);
        let mut data = data;
        while !data.is_empty() {
            let room = PAGE_SIZE - offset as usize;
            let (chunk, rest) = data.split_at(room.min(data.len()));

            self.wait_until_ready().await?;
            self.command_at(Opcode::PageToBuffer1, page, 0).await?;
            self.fill_buffer(offset, chunk).await?;
            self.commit_buffer(page).await?;

            data = rest;
            page = page.wrapping_add(1);
            offset = 0;
        }
        self.wait_until_ready().await
    }

    /// Continuous array read (0Bh) of `buf.len()` bytes from `(page, offset)`.
    pub async fn read(
        &mut self,
        buf: &mut [u8],
        page: u16,
        offset: u16,
    ) -> Result<(), Error<SPI::Error, P>> {
        self.wait_until_ready().await?;
        let session = ReadSession::at(page, offset);
        self.spi
            .transaction(&mut session.stream(buf))
            .await
            .map_err(Error::Spi)
    }

    pub async fn diagnose(&mut self) -> Result<Diagnosis, Error<SPI::Error, P>> {
        let mut id = [0u8; 4];
        self.command_with_response(&[Opcode::ReadDeviceId as u8], &mut id)
            .await?;
        let status = self.read_status().await?;
        let diagnosis = Diagnosis {
            id: DeviceId(id),
            status,
        };
        if !diagnosis.is_ok() {
            warn!("DataFlash self test failed: {}", diagnosis);
        }
        Ok(diagnosis)
    }

    /// Deep power-down (B9h). Only `resume` is accepted afterwards.
    pub async fn power_down(&mut self) -> Result<(), Error<SPI::Error, P>> {
        self.wait_until_ready().await?;
        self.command(&[Opcode::DeepPowerDown as u8]).await
    }

    /// Resume from deep power-down (ABh).
    pub async fn resume(&mut self) -> Result<(), Error<SPI::Error, P>> {
        self.command(&[Opcode::ResumeFromPowerDown as u8]).await?;
        self.delay.delay_us(self.config.resume_delay_us).await;
        Ok(())
    }

    /// Buffer 1 write (84h) of `data` from buffer offset `offset`.
    async fn fill_buffer(&mut self, offset: u16, data: &[u8]) -> Result<(), Error<SPI::Error, P>> {
        self.wait_until_ready().await?;
        let session = WriteSession::at(offset);
        self.spi
            .transaction(&mut session.fill(data))
            .await
            .map_err(Error::Spi)
    }

    async fn commit_buffer(&mut self, page: u16) -> Result<(), Error<SPI::Error, P>> {
        self.wait_until_ready().await?;
        trace!("committing buffer 1 to page {=u16}", page);
        self.command_at(Opcode::Buffer1ToPageWithErase, page, 0)
            .await
    }

    /// Writes a command to the SPI bus
    async fn command(&mut self, bytes: &[u8]) -> Result<(), Error<SPI::Error, P>> {
        self.spi
            .transaction(&mut [Operation::Write(bytes)])
            .await
            .map_err(Error::Spi)
    }

    async fn command_at(
        &mut self,
        opcode: Opcode,
        page: u16,
        offset: u16,
    ) -> Result<(), Error<SPI::Error, P>> {
        let [a0, a1, a2] = encode_address(page, offset);
        self.command(&[opcode as u8, a0, a1, a2]).await
    }

    /// Writes a command to the SPI bus and reads the response in the same
    /// transaction
    async fn command_with_response(
        &mut self,
        instruction: &[u8],
        response: &mut [u8],
    ) -> Result<(), Error<SPI::Error, P>> {
        self.spi
            .transaction(&mut [Operation::Write(instruction), Operation::Read(response)])
            .await
            .map_err(Error::Spi)
    }
}

impl<SPI, WP, RST, D, P> AsyncHardwareFlashDevice for AsyncDataFlash<SPI, WP, RST, D>
where
    SPI: SpiDevice,
    WP: OutputPin<Error = P>,
    RST: OutputPin<Error = P>,
    D: DelayNs,
{
    type Error = Error<SPI::Error, P>;

    async fn read(&mut self, addr: u32, data: &mut [u8]) -> Result<(), Self::Error> {
        let Address { page, offset } = Address::from_linear(addr);
        AsyncDataFlash::read(self, data, page, offset).await
    }

    async fn sector_erase(&mut self, addr: u32) -> Result<(), Self::Error> {
        let sector = Address::from_linear(addr).page / PAGES_PER_SECTOR;
        self.erase_sector(sector as u8).await
    }

    async fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error> {
        let Address { page, offset } = Address::from_linear(addr);
        self.modify(page, offset, data).await
    }

    async fn chip_erase(&mut self) -> Result<(), Self::Error> {
        AsyncDataFlash::chip_erase(self).await
    }
}
