//! Driver for Adesto AT45-series serial DataFlash (AT45DB081, 264-byte pages).
//!
//! Pages are addressed as `(page, byte offset)`. Writes go through the chip's
//! SRAM buffer 1 and are committed with the "program with built-in erase"
//! command, so callers never erase before writing. Reads use continuous
//! array read and run across page boundaries.
//!
//! [`comms::DataFlash`] is the blocking driver over an `embedded-hal`
//! `SpiDevice`, [`async_comms::AsyncDataFlash`] is the same driver on
//! `embedded-hal-async`. Each command or session is one SPI transaction.
#![no_std]

#[macro_use]
mod log;

pub mod async_comms;
pub mod comms;
pub mod config;
pub mod error;
pub mod geometry;
pub mod identification;
pub mod opcode;
pub mod session;
pub mod status;
pub mod traits;

pub use async_comms::AsyncDataFlash;
pub use comms::DataFlash;
pub use config::Config;
pub use error::Error;
pub use geometry::{encode_address, Address, PAGE_SIZE, TOTAL_PAGES};
pub use identification::{DeviceId, Diagnosis};
pub use status::Status;
pub use traits::{AsyncHardwareFlashDevice, HardwareFlashDevice};
