//! RAM-cached persistent cells.
//!
//! Mirrors an EEPROM: a handful of 32-bit cells addressed by index, reading
//! back all-ones (-1) until written. The whole table serialises into one
//! small blob so the embedded side can keep it in a single flash record.
//!
//! Blob layout: `[count][addr, b0, b1, b2, b3]...`, values little-endian.
//! Only written cells are serialised.

use crate::config::PERSISTED_CELLS;
use crate::error::Error;
use crate::io::Persistence;

/// Bit pattern of a never-written cell.
const ERASED: u32 = 0xFFFF_FFFF;

/// Bytes per serialised cell.
const CELL_RECORD_SIZE: usize = 5;

/// Largest blob [`CellStore::serialize`] can produce.
pub const MAX_BLOB_SIZE: usize = 1 + PERSISTED_CELLS * CELL_RECORD_SIZE;

/// In-memory cell table with a dirty flag.
#[derive(Clone, Debug)]
pub struct CellStore {
    cells: [u32; PERSISTED_CELLS],
    /// True if the cache differs from what was last loaded or saved.
    dirty: bool,
}

impl CellStore {
    pub const fn new() -> Self {
        Self {
            cells: [ERASED; PERSISTED_CELLS],
            dirty: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the cache as matching the backing store.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn write_raw(&mut self, address: u8, value: u32) {
        match self.cells.get_mut(usize::from(address)) {
            Some(cell) if *cell != value => {
                *cell = value;
                self.dirty = true;
            }
            Some(_) => {}
            None => warn!("Cell {} out of range - write ignored", address),
        }
    }

    fn read_raw(&self, address: u8) -> u32 {
        self.cells
            .get(usize::from(address))
            .copied()
            .unwrap_or(ERASED)
    }

    /// Serialise all written cells into `buf`. Returns bytes used.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let written: usize = self.cells.iter().filter(|c| **c != ERASED).count();
        let total = 1 + written * CELL_RECORD_SIZE;
        if buf.len() < total {
            return Err(Error::BufferOverflow);
        }

        buf[0] = written as u8;
        let mut offset = 1;
        for (address, value) in self.cells.iter().enumerate() {
            if *value == ERASED {
                continue;
            }
            buf[offset] = address as u8;
            buf[offset + 1..offset + CELL_RECORD_SIZE].copy_from_slice(&value.to_le_bytes());
            offset += CELL_RECORD_SIZE;
        }
        Ok(offset)
    }

    /// Replace the cache with the cells in `data`. Malformed blobs leave
    /// the store erased.
    pub fn deserialize(&mut self, data: &[u8]) -> Result<(), Error> {
        *self = Self::new();

        let Some((&count, mut rest)) = data.split_first() else {
            return Err(Error::Storage);
        };

        for _ in 0..count {
            if rest.len() < CELL_RECORD_SIZE {
                *self = Self::new();
                return Err(Error::Storage);
            }
            let (record, tail) = rest.split_at(CELL_RECORD_SIZE);
            let value = u32::from_le_bytes([record[1], record[2], record[3], record[4]]);
            if let Some(cell) = self.cells.get_mut(usize::from(record[0])) {
                *cell = value;
            }
            rest = tail;
        }
        Ok(())
    }
}

impl Default for CellStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistence for CellStore {
    fn read_int(&self, address: u8) -> i32 {
        self.read_raw(address) as i32
    }

    fn write_int(&mut self, address: u8, value: i32) {
        self.write_raw(address, value as u32);
    }

    fn read_float(&self, address: u8) -> f32 {
        f32::from_bits(self.read_raw(address))
    }

    fn write_float(&mut self, address: u8, value: f32) {
        self.write_raw(address, value.to_bits());
    }
}
