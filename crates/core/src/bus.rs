// WireSim - SPI Peripheral Simulation Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::Arc;

use crate::{BusPeripheral, SimResult, SimulationError};

/// One mapped address window. The window length comes from the device
/// itself, so a window can never disagree with the peripheral behind it.
#[derive(Debug, Clone)]
pub struct BusWindow {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Arc<dyn BusPeripheral>,
}

/// Address decoder for memory-mapped peripherals.
///
/// Windows are scanned in mapping order and the first hit claims the
/// access, so overlaps resolve deterministically. An access is routed by
/// its starting address at the device's native width; the bus never
/// splits an access into byte lanes.
#[derive(Debug, Default)]
pub struct PeripheralBus {
    windows: Vec<BusWindow>,
}

impl PeripheralBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, name: &str, base: u64, dev: Arc<dyn BusPeripheral>) {
        let size = dev.size();
        tracing::debug!("Mapping {} at {:#x} (size {:#x})", name, base, size);
        self.windows.push(BusWindow {
            name: name.to_string(),
            base,
            size,
            dev,
        });
    }

    pub fn windows(&self) -> &[BusWindow] {
        &self.windows
    }

    fn route(&self, addr: u64) -> SimResult<(&BusWindow, u64)> {
        for window in &self.windows {
            if addr >= window.base && addr < window.base + window.size {
                return Ok((window, addr - window.base));
            }
        }
        Err(SimulationError::UnmappedAccess(addr))
    }

    pub fn read_u32(&self, addr: u64) -> SimResult<u32> {
        let (window, offset) = self.route(addr)?;
        Ok(window.dev.read_dword(offset))
    }

    pub fn write_u32(&self, addr: u64, value: u32) -> SimResult<()> {
        let (window, offset) = self.route(addr)?;
        window.dev.write_dword(offset, value);
        Ok(())
    }

    pub fn read_u16(&self, addr: u64) -> SimResult<u16> {
        let (window, offset) = self.route(addr)?;
        Ok(window.dev.read_word(offset))
    }

    pub fn write_u16(&self, addr: u64, value: u16) -> SimResult<()> {
        let (window, offset) = self.route(addr)?;
        window.dev.write_word(offset, value);
        Ok(())
    }

    pub fn read_u8(&self, addr: u64) -> SimResult<u8> {
        let (window, offset) = self.route(addr)?;
        Ok(window.dev.read_byte(offset))
    }

    pub fn write_u8(&self, addr: u64, value: u8) -> SimResult<()> {
        let (window, offset) = self.route(addr)?;
        window.dev.write_byte(offset, value);
        Ok(())
    }

    /// Reset every mapped device. Mappings themselves survive.
    pub fn reset(&self) {
        for window in &self.windows {
            window.dev.reset();
        }
    }

    /// Snapshot of every mapped device, keyed by window name.
    pub fn snapshot(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for window in &self.windows {
            map.insert(window.name.clone(), window.dev.snapshot());
        }
        serde_json::Value::Object(map)
    }
}
