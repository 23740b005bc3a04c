//! Buffer fill and array read sessions.
//!
//! A session is a single `SpiDevice` transaction: the header (opcode, address
//! and dummy bytes) followed by the payload, with chip select held across
//! both. The device releases chip select when the transaction ends, on error
//! paths as well, so a session can never be left open.

use crate::geometry::encode_address;
use crate::opcode::Opcode;
use embedded_hal::spi::Operation;

/// Buffer 1 open for sequential fill.
///
/// Bytes land at consecutive buffer offsets starting at the one given to
/// `at`. Nothing reaches the array until the buffer is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSession {
    header: [u8; 4],
}

impl WriteSession {
    pub fn at(offset: u16) -> Self {
        let [a0, a1, a2] = encode_address(0, offset);
        Self {
            header: [Opcode::Buffer1Write as u8, a0, a1, a2],
        }
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Operations that stream `data` into the buffer.
    pub fn fill<'a>(&'a self, data: &'a [u8]) -> [Operation<'a, u8>; 2] {
        [Operation::Write(&self.header), Operation::Write(data)]
    }
}

/// Continuous array read. The chip advances its address on every byte,
/// crossing page boundaries on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSession {
    header: [u8; 5],
}

impl ReadSession {
    pub fn at(page: u16, offset: u16) -> Self {
        let [a0, a1, a2] = encode_address(page, offset);
        // one dummy byte before data starts coming out
        Self {
            header: [Opcode::ArrayRead as u8, a0, a1, a2, 0x00],
        }
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Operations that clock `buf.len()` bytes out of the array.
    pub fn stream<'a>(&'a self, buf: &'a mut [u8]) -> [Operation<'a, u8>; 2] {
        [Operation::Write(&self.header), Operation::Read(buf)]
    }
}
