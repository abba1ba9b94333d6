//! # Transfer buffer
//!
//! Fixed-capacity staging area for the words of one burst.
//!
//! Cell 0 is reserved. Its first byte is never sent and the remaining three
//! bytes carry the addressing prefix, so the burst handed to the peripheral
//! starts at byte offset 1 of the buffer:
//!
//! ```text
//!  cell 0          cell 1          cell 2
//! +---+---+---+---+---+---+---+---+---+---+---+---+
//! | x | p0| p1| p2| payload word  | payload word  | ...
//! +---+---+---+---+---+---+---+---+---+---+---+---+
//!     ^ burst start
//! ```

use core::{mem, slice};

use embedded_dma::ReadBuffer;

use crate::Error;

/// Number of 32-bit cells in the default buffer (4100 bytes).
pub const DEFAULT_CAPACITY: usize = 1025;

/// Cells reserved in front of the payload.
pub const PREFIX_CELLS: usize = 1;

/// Bytes of cell 0 that are transmitted ahead of the payload.
pub const PREFIX_LEN: usize = 3;

const WORD: usize = mem::size_of::<u32>();

/// Builds the memory-write addressing prefix for `address`.
///
/// The address is truncated to 22 bits, sent big-endian, with bit 23 set to
/// mark a write.
pub const fn write_prefix(address: u32) -> [u8; PREFIX_LEN] {
    let address = address & 0x003f_ffff;
    [
        ((address >> 16) as u8) | 0x80,
        (address >> 8) as u8,
        address as u8,
    ]
}

pub struct TransferBuffer<const N: usize = DEFAULT_CAPACITY> {
    words: [u32; N],
    cursor: usize,
}

impl<const N: usize> TransferBuffer<N> {
    const HAS_PAYLOAD_ROOM: () = assert!(N > PREFIX_CELLS, "buffer needs room past the prefix cell");

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::HAS_PAYLOAD_ROOM;
        TransferBuffer {
            words: [0; N],
            cursor: PREFIX_CELLS,
        }
    }

    /// Total number of cells, prefix included
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of cells holding valid data, prefix included
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Drops all queued payload. The prefix bytes are kept.
    pub fn reset(&mut self) {
        self.cursor = PREFIX_CELLS;
    }

    pub fn append(&mut self, word: u32) -> Result<(), Error> {
        if self.cursor == N {
            return Err(Error::BufferFull);
        }
        self.words[self.cursor] = word;
        self.cursor += 1;
        Ok(())
    }

    /// Appends all of `words` or, if they do not fit, none of them.
    pub fn extend_from_slice(&mut self, words: &[u32]) -> Result<(), Error> {
        if words.len() > self.remaining() {
            return Err(Error::BufferFull);
        }
        let end = self.cursor + words.len();
        self.words[self.cursor..end].copy_from_slice(words);
        self.cursor = end;
        Ok(())
    }

    /// Free cells left for payload
    pub fn remaining(&self) -> usize {
        N - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor <= PREFIX_CELLS
    }

    /// Queued payload size, prefix excluded.
    pub fn length_in_bytes(&self) -> usize {
        self.cursor.saturating_sub(PREFIX_CELLS) * WORD
    }

    pub fn set_prefix(&mut self, prefix: [u8; PREFIX_LEN]) {
        let [p0, p1, p2] = prefix;
        self.words[0] = u32::from_ne_bytes([0, p0, p1, p2]);
    }

    pub fn prefix(&self) -> [u8; PREFIX_LEN] {
        let [_, p0, p1, p2] = self.words[0].to_ne_bytes();
        [p0, p1, p2]
    }

    /// Queued payload words
    pub fn payload(&self) -> &[u32] {
        &self.words[PREFIX_CELLS..self.cursor]
    }

    /// The bytes the next burst will put on the wire.
    pub fn burst(&self) -> Burst<'_> {
        Burst {
            cells: &self.words[..self.cursor],
        }
    }
}

impl<const N: usize> Default for TransferBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view of one burst: the prefix bytes followed by the payload.
#[derive(Clone, Copy)]
pub struct Burst<'a> {
    cells: &'a [u32],
}

impl<'a> Burst<'a> {
    /// Whole burst, starting at byte 1 of the prefix cell.
    pub fn as_bytes(&self) -> &'a [u8] {
        // NOTE(unsafe) any `u32` is a valid sequence of four `u8`s and the
        // slice stays inside `cells`
        let bytes = unsafe {
            slice::from_raw_parts(self.cells.as_ptr().cast::<u8>(), self.cells.len() * WORD)
        };
        &bytes[WORD - PREFIX_LEN..]
    }

    /// Burst length in bytes, `cursor * 4 - 1`.
    pub fn len(&self) -> usize {
        self.cells.len() * WORD - (WORD - PREFIX_LEN)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.len() <= PREFIX_CELLS
    }

    /// The three unaligned prefix bytes.
    ///
    /// Targets whose DMA cannot start at an unaligned address push these by
    /// hand and DMA only [`Burst::payload_bytes`].
    pub fn prefix(&self) -> &'a [u8] {
        &self.as_bytes()[..PREFIX_LEN]
    }

    /// Word-aligned payload, starting at cell 1.
    pub fn payload_bytes(&self) -> &'a [u8] {
        &self.as_bytes()[PREFIX_LEN..]
    }

    pub fn payload_words(&self) -> &'a [u32] {
        &self.cells[PREFIX_CELLS..]
    }
}

unsafe impl ReadBuffer for Burst<'_> {
    type Word = u8;

    unsafe fn read_buffer(&self) -> (*const u8, usize) {
        let bytes = self.as_bytes();
        (bytes.as_ptr(), bytes.len())
    }
}
