// WireSim - SPI Peripheral Simulation Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod fifo;
pub mod registers;
pub mod signals;
pub mod slave;
pub mod spi;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Unmapped bus access at {0:#x}")]
    UnmappedAccess(u64),
    #[error("A slave device is already attached")]
    SlaveAlreadyAttached,
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait representing a memory-mapped peripheral with width-specific bus
/// entry points.
///
/// The doubleword accessors are the primary interface; narrower widths are
/// derived from them. Entry points take `&self` so one instance can be
/// shared between simulated bus masters (CPU core, DMA engine);
/// implementations serialize access internally.
pub trait BusPeripheral: std::fmt::Debug + Send + Sync {
    fn read_dword(&self, offset: u64) -> u32;
    fn write_dword(&self, offset: u64, value: u32);

    /// Window size in bytes occupied on the system bus.
    fn size(&self) -> u64;

    /// Return the peripheral to its power-on state.
    fn reset(&self);

    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Word access always delegates to the doubleword path at the same
    /// offset; the upper half is discarded on read and zero-extended on
    /// write. No alignment check is performed.
    fn read_word(&self, offset: u64) -> u16 {
        self.read_dword(offset) as u16
    }

    fn write_word(&self, offset: u64, value: u16) {
        self.write_dword(offset, u32::from(value));
    }

    /// The byte interface exists for DMA engines and is only honored at
    /// doubleword-aligned offsets, where it carries the low byte. Other
    /// offsets read as 0 and drop writes.
    fn read_byte(&self, offset: u64) -> u8 {
        if offset % 4 == 0 {
            return self.read_dword(offset) as u8;
        }
        tracing::warn!("Unhandled byte read at offset {:#x}", offset);
        0
    }

    fn write_byte(&self, offset: u64, value: u8) {
        if offset % 4 == 0 {
            self.write_dword(offset, u32::from(value));
        } else {
            tracing::warn!(
                "Unhandled byte write at offset {:#x} (value {:#04x})",
                offset,
                value
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every doubleword access it receives.
    #[derive(Debug, Default)]
    struct Probe {
        ops: Mutex<Vec<(u64, Option<u32>)>>,
    }

    impl BusPeripheral for Probe {
        fn read_dword(&self, offset: u64) -> u32 {
            self.ops.lock().unwrap().push((offset, None));
            0xA5A5_5A5A
        }

        fn write_dword(&self, offset: u64, value: u32) {
            self.ops.lock().unwrap().push((offset, Some(value)));
        }

        fn size(&self) -> u64 {
            0x400
        }

        fn reset(&self) {}
    }

    #[test]
    fn test_word_access_delegates_unchecked() {
        let p = Probe::default();
        // Even a misaligned word offset is passed straight through.
        assert_eq!(p.read_word(0x06), 0x5A5A);
        p.write_word(0x06, 0x1234);

        let ops = p.ops.lock().unwrap();
        assert_eq!(*ops, vec![(0x06, None), (0x06, Some(0x1234))]);
    }

    #[test]
    fn test_byte_access_only_at_dword_offsets() {
        let p = Probe::default();
        assert_eq!(p.read_byte(0x04), 0x5A);
        assert_eq!(p.read_byte(0x05), 0);
        p.write_byte(0x08, 0xAB);
        p.write_byte(0x09, 0xCD);

        let ops = p.ops.lock().unwrap();
        assert_eq!(*ops, vec![(0x04, None), (0x08, Some(0xAB))]);
    }

    #[test]
    fn test_byte_write_zero_extends() {
        let p = Probe::default();
        p.write_byte(0x00, 0xFF);
        let ops = p.ops.lock().unwrap();
        // The byte is written as a full doubleword, not merged.
        assert_eq!(*ops, vec![(0x00, Some(0x0000_00FF))]);
    }
}
