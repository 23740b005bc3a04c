//! Simulated AT45DB081 behind `embedded-hal` handles.
#![allow(dead_code)]

use std::cell::{Cell, RefCell, RefMut};
use std::convert::Infallible;
use std::rc::Rc;

use adesto_at45_dataflash_rs::geometry::{PAGES_PER_SECTOR, PAGE_SIZE, TOTAL_PAGES};
use adesto_at45_dataflash_rs::{AsyncDataFlash, Config, DataFlash};
use embedded_hal::spi::Operation;

pub const ID: [u8; 4] = [0x1F, 0x25, 0x00, 0x01];
/// 8 Mbit density, 264-byte pages, not protected.
pub const STATUS_SIGNATURE: u8 = 0x24;

pub struct SimChip {
    pub memory: Vec<u8>,
    pub buffer1: [u8; PAGE_SIZE],
    pub id: [u8; 4],
    pub status_bits: u8,
    /// Status reads that still report busy.
    pub busy_polls: u32,
    /// `busy_polls` loaded after every erase/program/transfer.
    pub busy_after_op: u32,
    /// Never becomes ready.
    pub dead: bool,
    pub powered_down: bool,
    /// Write protect line level, low means protected.
    pub wp_high: bool,
    pub wp_history: Vec<bool>,
    pub reset_pulses: usize,
    /// Commits executed while write protect was asserted.
    pub protected_commits: usize,
    /// Write protect asserted while an erase, program or transfer was
    /// still running.
    pub protected_while_busy: usize,
    /// Everything clocked in, one entry per transaction.
    pub transactions: Vec<Vec<u8>>,
    /// Commands dropped because the chip was busy or powered down.
    pub ignored: Vec<Vec<u8>>,
    pub selects: usize,
    pub exchanges: usize,
    selected: bool,
    ignoring: bool,
    command: Vec<u8>,
}

impl SimChip {
    fn new() -> Self {
        Self {
            memory: vec![0x00; PAGE_SIZE * TOTAL_PAGES as usize],
            buffer1: [0xA5; PAGE_SIZE],
            id: ID,
            status_bits: STATUS_SIGNATURE,
            busy_polls: 0,
            busy_after_op: 2,
            dead: false,
            powered_down: false,
            wp_high: true,
            wp_history: Vec::new(),
            reset_pulses: 0,
            protected_commits: 0,
            protected_while_busy: 0,
            transactions: Vec::new(),
            ignored: Vec::new(),
            selects: 0,
            exchanges: 0,
            selected: false,
            ignoring: false,
            command: Vec::new(),
        }
    }

    pub fn page(&self, page: u16) -> &[u8] {
        let start = page as usize * PAGE_SIZE;
        &self.memory[start..start + PAGE_SIZE]
    }

    pub fn page_mut(&mut self, page: u16) -> &mut [u8] {
        let start = page as usize * PAGE_SIZE;
        &mut self.memory[start..start + PAGE_SIZE]
    }

    /// Completed transactions that started with `opcode`.
    pub fn commands(&self, opcode: u8) -> Vec<Vec<u8>> {
        self.transactions
            .iter()
            .filter(|t| t.first() == Some(&opcode))
            .cloned()
            .collect()
    }

    pub fn forget_traffic(&mut self) {
        self.transactions.clear();
        self.selects = 0;
        self.exchanges = 0;
    }

    fn busy(&self) -> bool {
        self.dead || self.busy_polls > 0
    }

    fn select(&mut self) {
        if self.selected {
            return;
        }
        self.selected = true;
        self.selects += 1;
        self.command.clear();
        self.ignoring = false;
    }

    fn deselect(&mut self) {
        if !self.selected {
            return;
        }
        self.selected = false;
        let command = std::mem::take(&mut self.command);
        self.transactions.push(command.clone());
        if self.ignoring {
            self.ignored.push(command);
            return;
        }
        self.execute(&command);
    }

    fn exchange(&mut self, byte: u8) -> u8 {
        if !self.selected {
            return 0xFF;
        }
        self.exchanges += 1;
        let index = self.command.len();
        self.command.push(byte);
        if index == 0 {
            self.ignoring = (self.powered_down && byte != 0xAB)
                || (!self.powered_down && self.busy() && byte != 0xD7);
        }
        if self.ignoring {
            return 0x00;
        }

        let opcode = self.command[0];
        match opcode {
            0xD7 if index >= 1 => self.status(),
            0x9F if (1..=4).contains(&index) => self.id[index - 1],
            // opcode, 3 address bytes, 1 dummy byte
            0x0B if index >= 5 => {
                let (page, offset) = decode(&self.command[1..4]);
                let start = page as usize * PAGE_SIZE + offset as usize;
                self.memory[(start + index - 5) % self.memory.len()]
            }
            0x84 if index >= 4 => {
                let (_, offset) = decode(&self.command[1..4]);
                self.buffer1[(offset as usize + index - 4) % PAGE_SIZE] = byte;
                0x00
            }
            _ => 0x00,
        }
    }

    fn status(&mut self) -> u8 {
        let ready = !self.busy();
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
        }
        (if ready { 0x80 } else { 0x00 }) | self.status_bits
    }

    fn execute(&mut self, command: &[u8]) {
        match command {
            [0x81, a @ ..] if a.len() >= 3 => {
                let (page, _) = decode(a);
                self.page_mut(page).fill(0xFF);
                self.busy_polls = self.busy_after_op;
            }
            [0x7C, a @ ..] if a.len() >= 3 => {
                let (page, _) = decode(a);
                let first = page / PAGES_PER_SECTOR * PAGES_PER_SECTOR;
                for p in first..first + PAGES_PER_SECTOR {
                    self.page_mut(p).fill(0xFF);
                }
                self.busy_polls = self.busy_after_op;
            }
            [0xC7, 0x94, 0x80, 0x9A] => {
                self.memory.fill(0xFF);
                self.busy_polls = self.busy_after_op * 10;
            }
            [0x83, a @ ..] if a.len() >= 3 => {
                let (page, _) = decode(a);
                if !self.wp_high {
                    self.protected_commits += 1;
                }
                let buffer = self.buffer1;
                self.page_mut(page).copy_from_slice(&buffer);
                self.busy_polls = self.busy_after_op;
            }
            [0x53, a @ ..] if a.len() >= 3 => {
                let (page, _) = decode(a);
                let mut buffer = [0u8; PAGE_SIZE];
                buffer.copy_from_slice(self.page(page));
                self.buffer1 = buffer;
                self.busy_polls = self.busy_after_op;
            }
            [0xB9] => self.powered_down = true,
            [0xAB] => self.powered_down = false,
            _ => {}
        }
    }
}

/// Inverse of the driver's address encoding.
pub fn decode(a: &[u8]) -> (u16, u16) {
    let page = ((a[0] as u16) << 7) | ((a[1] as u16) >> 1);
    let offset = (((a[1] & 1) as u16) << 8) | a[2] as u16;
    (page, offset)
}

#[derive(Clone)]
pub struct Sim {
    chip: Rc<RefCell<SimChip>>,
    slept_ns: Rc<Cell<u64>>,
}

impl Sim {
    pub fn new() -> Self {
        Self {
            chip: Rc::new(RefCell::new(SimChip::new())),
            slept_ns: Rc::new(Cell::new(0)),
        }
    }

    pub fn chip(&self) -> RefMut<'_, SimChip> {
        self.chip.borrow_mut()
    }

    pub fn slept_ns(&self) -> u64 {
        self.slept_ns.get()
    }

    pub fn device(&self) -> SimDevice {
        SimDevice(self.chip.clone())
    }

    pub fn pin(&self, line: Line) -> SimPin {
        SimPin {
            chip: self.chip.clone(),
            line,
        }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay(self.slept_ns.clone())
    }

    /// Blocking driver with default timings, already initialised.
    pub fn flash(&self) -> SimFlash {
        self.flash_with(Config::default())
    }

    pub fn flash_with(&self, config: Config) -> SimFlash {
        let mut flash = DataFlash::with_config(
            self.device(),
            self.pin(Line::WriteProtect),
            self.pin(Line::Reset),
            self.delay(),
            config,
        );
        flash.init().unwrap();
        flash
    }

    /// Async driver, not initialised yet.
    pub fn async_flash(&self) -> AsyncSimFlash {
        AsyncDataFlash::new(
            self.device(),
            self.pin(Line::WriteProtect),
            self.pin(Line::Reset),
            self.delay(),
        )
    }
}

pub type SimFlash = DataFlash<SimDevice, SimPin, SimPin, SimDelay>;
pub type AsyncSimFlash = AsyncDataFlash<SimDevice, SimPin, SimPin, SimDelay>;

/// One chip select window per transaction, like a real `SpiDevice`.
pub struct SimDevice(Rc<RefCell<SimChip>>);

impl embedded_hal::spi::ErrorType for SimDevice {
    type Error = Infallible;
}

impl embedded_hal::spi::SpiDevice for SimDevice {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        let mut chip = self.0.borrow_mut();
        chip.select();
        for operation in operations.iter_mut() {
            match operation {
                Operation::Read(words) => {
                    for w in words.iter_mut() {
                        *w = chip.exchange(0x00);
                    }
                }
                Operation::Write(words) => {
                    for &w in words.iter() {
                        chip.exchange(w);
                    }
                }
                Operation::Transfer(read, write) => {
                    for i in 0..read.len().max(write.len()) {
                        let out = chip.exchange(write.get(i).copied().unwrap_or(0x00));
                        if let Some(r) = read.get_mut(i) {
                            *r = out;
                        }
                    }
                }
                Operation::TransferInPlace(words) => {
                    for w in words.iter_mut() {
                        *w = chip.exchange(*w);
                    }
                }
                Operation::DelayNs(_) => {}
            }
        }
        chip.deselect();
        Ok(())
    }
}

impl embedded_hal_async::spi::SpiDevice for SimDevice {
    async fn transaction(
        &mut self,
        operations: &mut [Operation<'_, u8>],
    ) -> Result<(), Infallible> {
        embedded_hal::spi::SpiDevice::transaction(self, operations)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    WriteProtect,
    Reset,
}

pub struct SimPin {
    chip: Rc<RefCell<SimChip>>,
    line: Line,
}

impl SimPin {
    fn drive(&mut self, high: bool) {
        let mut chip = self.chip.borrow_mut();
        match self.line {
            Line::WriteProtect => {
                if !high && chip.busy() {
                    chip.protected_while_busy += 1;
                }
                chip.wp_high = high;
                chip.wp_history.push(high);
            }
            Line::Reset if high => {}
            Line::Reset => {
                chip.reset_pulses += 1;
                chip.busy_polls = 0;
            }
        }
    }
}

impl embedded_hal::digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.drive(true);
        Ok(())
    }
}

pub struct SimDelay(Rc<Cell<u64>>);

impl embedded_hal::delay::DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.set(self.0.get() + ns as u64);
    }
}

impl embedded_hal_async::delay::DelayNs for SimDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.set(self.0.get() + ns as u64);
    }
}

/// Deterministic, page-distinguishable test data.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}
