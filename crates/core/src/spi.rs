// WireSim - SPI Peripheral Simulation Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::fifo::ReceiveFifo;
use crate::registers::{Register, RegisterBank};
use crate::signals::{LineProbe, SignalLine};
use crate::slave::SpiSlave;
use crate::{BusPeripheral, SimResult, SimulationError};

/// Register offsets within the controller window.
pub mod regs {
    pub const CONTROL1: u64 = 0x00;
    pub const CONTROL2: u64 = 0x04;
    pub const STATUS: u64 = 0x08;
    pub const DATA: u64 = 0x0C;
    pub const CRC_POLYNOMIAL: u64 = 0x10;
    pub const RECEIVED_CRC: u64 = 0x14;
    pub const TRANSMITTED_CRC: u64 = 0x18;
    pub const I2S_CONFIGURATION: u64 = 0x1C;
    pub const I2S_PRESCALER: u64 = 0x20;
}

bitflags::bitflags! {
    /// Control1 bits the model acts on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control1: u32 {
        const MSTR = 1 << 2;
        const SPE = 1 << 6;
    }

    /// Control2 bits the model acts on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control2: u32 {
        const RXDMAEN = 1 << 0;
        const TXDMAEN = 1 << 1;
        const RXNEIE = 1 << 6;
        const TXEIE = 1 << 7;
    }

    /// Status bits computed by the model.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u32 {
        const RXNE = 1 << 0;
        const TXE = 1 << 1;
    }
}

/// I2SConfiguration bit that would enable I2S mode; pinned low.
const I2S_ENABLE: u32 = 1 << 10;

pub const DEFAULT_BUFFER_CAPACITY: usize = 4;
pub const WINDOW_SIZE: u64 = 0x400;

fn register_map() -> RegisterBank {
    RegisterBank::new(vec![
        Register::new(regs::CONTROL1, "control1")
            .flag(0, "CPHA")
            .flag(1, "CPOL")
            .flag(2, "MSTR")
            .value(3, 3, "BR")
            .flag(6, "SPE")
            .flag(7, "LSBFIRST")
            .flag(8, "SSI")
            .flag(9, "SSM")
            .tagged_flag(10, "RXONLY")
            .tagged_flag(11, "DFF")
            .tagged_flag(12, "CRCNEXT")
            .tagged_flag(13, "CRCEN")
            .tagged_flag(14, "BIDIOE")
            .tagged_flag(15, "BIDIMODE")
            .reserved(16, 16),
        Register::new(regs::CONTROL2, "control2")
            .flag(0, "RXDMAEN")
            .flag(1, "TXDMAEN")
            .flag(2, "SSOE")
            .reserved(3, 1)
            .flag(4, "FRF")
            .flag(5, "ERRIE")
            .flag(6, "RXNEIE")
            .flag(7, "TXEIE")
            // Vendor-reserved bits some RTOS drivers write; stored
            // read/write rather than masked.
            .value(8, 5, "RESERVED_RW")
            .reserved(13, 19),
        Register::new(regs::STATUS, "status")
            .reset_value(0x0002)
            .read_only_flag(0, "RXNE")
            .read_only_flag(1, "TXE")
            .tagged_read_only_flag(2, "CHSIDE")
            .tagged_read_only_flag(3, "UDR")
            .tagged_read_only_flag(4, "CRCERR")
            .tagged_read_only_flag(5, "MODF")
            .tagged_read_only_flag(6, "OVR")
            .tagged_read_only_flag(7, "BSY")
            .tagged_read_only_flag(8, "FRE")
            .reserved(9, 23),
        Register::new(regs::DATA, "data")
            .value(0, 16, "DR")
            .reserved(16, 16),
        Register::new(regs::CRC_POLYNOMIAL, "crc_polynomial")
            .reset_value(0x0007)
            .tagged_value(0, 16, "CRCPOLY")
            .reserved(16, 16),
        Register::new(regs::RECEIVED_CRC, "received_crc")
            .tagged_read_only_value(0, 16, "RXCRC")
            .reserved(16, 16),
        Register::new(regs::TRANSMITTED_CRC, "transmitted_crc")
            .tagged_read_only_value(0, 16, "TXCRC")
            .reserved(16, 16),
        Register::new(regs::I2S_CONFIGURATION, "i2s_configuration")
            .tagged_flag(0, "CHLEN")
            .tagged_value(1, 2, "DATLEN")
            .tagged_flag(3, "CKPOL")
            .tagged_value(4, 2, "I2SSTD")
            .reserved(6, 1)
            .tagged_flag(7, "PCMSYNC")
            .tagged_value(8, 2, "I2SCFG")
            .w1c_flag(10, "I2SE")
            .tagged_flag(11, "I2SMOD")
            .reserved(12, 20),
        Register::new(regs::I2S_PRESCALER, "i2s_prescaler")
            .reset_value(0x0002)
            .tagged_value(0, 8, "I2SDIV")
            .tagged_flag(8, "ODD")
            .tagged_flag(9, "MCKOE")
            .reserved(10, 22),
    ])
}

#[derive(Debug, serde::Serialize)]
struct SpiState {
    registers: RegisterBank,
    receive_buffer: ReceiveFifo,
    irq: SignalLine,
    dma_receive: SignalLine,
    dma_transmit: SignalLine,
    #[serde(skip)]
    slave: Option<Box<dyn SpiSlave>>,
}

impl SpiState {
    fn control2(&self) -> Control2 {
        Control2::from_bits_truncate(self.registers.stored(regs::CONTROL2).unwrap_or(0))
    }

    fn read_register(&mut self, offset: u64) -> u32 {
        match offset {
            regs::DATA => self.handle_data_read(),
            regs::STATUS => self.read_status(),
            _ => match self.registers.read(offset) {
                Some(value) => value,
                None => {
                    tracing::warn!("Unhandled read at offset {:#x}", offset);
                    0
                }
            },
        }
    }

    fn write_register(&mut self, offset: u64, value: u32) {
        match offset {
            regs::DATA => self.handle_data_write(value),
            regs::CONTROL1 => self.write_control1(value),
            regs::CONTROL2 => self.write_control2(value),
            regs::I2S_CONFIGURATION => self.write_i2s_configuration(value),
            _ => {
                if self.registers.write(offset, value).is_none() {
                    tracing::warn!("Unhandled write at offset {:#x} (value {:#x})", offset, value);
                }
            }
        }
    }

    fn handle_data_read(&mut self) -> u32 {
        self.irq.deassert();
        match self.receive_buffer.pop() {
            Some(value) => {
                self.reconcile_lines();
                value as u32
            }
            // Empty reads are silent: polling drivers hit this path
            // constantly.
            None => 0,
        }
    }

    fn handle_data_write(&mut self, value: u32) {
        tracing::debug!("Data register write: {:#06x}", value & 0xFFFF);
        self.irq.deassert();

        let Some(slave) = self.slave.as_mut() else {
            tracing::warn!("SPI transmission while no slave device is attached");
            self.receive_buffer.push(0x0);
            return;
        };

        // Consume any pending transmit request before issuing a new one.
        self.dma_transmit.deassert();
        let response = slave.exchange(value as u8);
        self.receive_buffer.push(response);
        if self.control2().contains(Control2::RXDMAEN) {
            // Edge notification: the memory-bound half of the DMA
            // transfer should happen now.
            self.dma_receive.pulse();
        }
        tracing::trace!("Transmitted {:#04x}, received {:#04x}", value as u8, response);
        self.reconcile_lines();
    }

    /// Recompute line levels from buffer occupancy and the interrupt/DMA
    /// enables. The transmit request line is refreshed (deassert then
    /// assert) only while it is not already high.
    fn reconcile_lines(&mut self) {
        let control2 = self.control2();

        if control2.contains(Control2::TXDMAEN) {
            if !self.dma_transmit.is_asserted() {
                self.dma_transmit.deassert();
                self.dma_transmit.assert();
            }
        } else {
            self.dma_transmit.deassert();
        }

        let rx_pending = !self.receive_buffer.is_empty() && control2.contains(Control2::RXNEIE);
        self.irq
            .set_level(control2.contains(Control2::TXEIE) || rx_pending);
    }

    // Control1 writes never reconcile the lines; dropping SPE is the only
    // side effect.
    fn write_control1(&mut self, value: u32) {
        if !Control1::from_bits_truncate(value).contains(Control1::MSTR) {
            tracing::warn!("Slave mode is not supported");
        }
        let Some(outcome) = self.registers.write(regs::CONTROL1, value) else {
            return;
        };
        let was_enabled = Control1::from_bits_truncate(outcome.previous).contains(Control1::SPE);
        let now_enabled = Control1::from_bits_truncate(outcome.value).contains(Control1::SPE);
        if was_enabled && !now_enabled {
            self.irq.deassert();
        }
    }

    fn write_control2(&mut self, value: u32) {
        self.registers.write(regs::CONTROL2, value);
        self.reconcile_lines();
    }

    fn write_i2s_configuration(&mut self, value: u32) {
        if value & I2S_ENABLE != 0 {
            tracing::warn!("I2S mode is not supported");
        }
        self.registers.write(regs::I2S_CONFIGURATION, value);
    }

    fn read_status(&self) -> u32 {
        let stored = self.registers.read(regs::STATUS).unwrap_or(0);
        let mut status = stored & !(Status::RXNE | Status::TXE).bits();
        // Transfers are instantaneous, so the transmit side is always
        // ready.
        status |= Status::TXE.bits();
        if !self.receive_buffer.is_empty() {
            status |= Status::RXNE.bits();
        }
        status
    }
}

/// STM32-style SPI master controller.
///
/// Transfers are instantaneous: writing the data register exchanges one
/// byte with the attached slave and queues the response in the receive
/// buffer. Interrupt and DMA request lines are recomputed after each
/// completed transfer and each Control2 write.
#[derive(Debug)]
pub struct SpiController {
    inner: Mutex<SpiState>,
}

impl SpiController {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let controller = Self {
            inner: Mutex::new(SpiState {
                registers: register_map(),
                receive_buffer: ReceiveFifo::new(capacity),
                irq: SignalLine::new(),
                dma_receive: SignalLine::new(),
                dma_transmit: SignalLine::new(),
                slave: None,
            }),
        };
        controller.reset();
        controller
    }

    fn state(&self) -> MutexGuard<'_, SpiState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach the device on the far side of the link. At most one slave
    /// can be attached at a time; absence is a legal configuration.
    pub fn attach_slave(&self, slave: Box<dyn SpiSlave>) -> SimResult<()> {
        let mut state = self.state();
        if state.slave.is_some() {
            return Err(SimulationError::SlaveAlreadyAttached);
        }
        state.slave = Some(slave);
        Ok(())
    }

    pub fn detach_slave(&self) -> Option<Box<dyn SpiSlave>> {
        self.state().slave.take()
    }

    pub fn irq(&self) -> LineProbe {
        self.state().irq.probe()
    }

    pub fn dma_receive(&self) -> LineProbe {
        self.state().dma_receive.probe()
    }

    pub fn dma_transmit(&self) -> LineProbe {
        self.state().dma_transmit.probe()
    }

    /// Bytes currently waiting in the receive buffer.
    pub fn occupancy(&self) -> usize {
        self.state().receive_buffer.len()
    }

    /// Stored register value without data-path side effects. Debug
    /// introspection, not a bus access.
    pub fn peek_register(&self, offset: u64) -> Option<u32> {
        self.state().registers.read(offset)
    }
}

impl Default for SpiController {
    fn default() -> Self {
        Self::new()
    }
}

impl BusPeripheral for SpiController {
    fn read_dword(&self, offset: u64) -> u32 {
        self.state().read_register(offset)
    }

    fn write_dword(&self, offset: u64, value: u32) {
        self.state().write_register(offset, value);
    }

    fn size(&self) -> u64 {
        WINDOW_SIZE
    }

    fn reset(&self) {
        let mut state = self.state();
        state.irq.reset();
        state.dma_receive.reset();
        state.dma_transmit.reset();
        state.receive_buffer.clear();
        state.registers.reset();
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(&*self.state()).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slave::LoopbackSlave;

    #[test]
    fn test_reset_defaults() {
        let c = SpiController::new();
        assert_eq!(c.peek_register(regs::CONTROL1), Some(0));
        assert_eq!(c.peek_register(regs::CONTROL2), Some(0));
        assert_eq!(c.read_dword(regs::STATUS), 0x0002);
        assert_eq!(c.peek_register(regs::CRC_POLYNOMIAL), Some(0x0007));
        assert_eq!(c.peek_register(regs::I2S_PRESCALER), Some(0x0002));
        assert_eq!(c.occupancy(), 0);
        assert!(!c.irq().asserted);
    }

    #[test]
    fn test_mstr_written_false_still_stores() {
        let c = SpiController::new();
        // MSTR=0 warns but the stored value reflects the write.
        c.write_dword(regs::CONTROL1, 0x0001);
        assert_eq!(c.peek_register(regs::CONTROL1), Some(0x0001));
        c.write_dword(regs::CONTROL1, 0x0004);
        assert_eq!(c.peek_register(regs::CONTROL1), Some(0x0004));
    }

    #[test]
    fn test_spe_clear_deasserts_irq_without_reconcile() {
        let c = SpiController::new();
        c.write_dword(regs::CONTROL1, 0x44); // SPE | MSTR
        c.write_dword(regs::CONTROL2, 0x80); // TXEIE
        assert!(c.irq().asserted);

        c.write_dword(regs::CONTROL1, 0x04); // SPE falls
        // TXEIE is still set, but Control1 writes do not reconcile.
        assert!(!c.irq().asserted);
        assert_eq!(c.peek_register(regs::CONTROL2), Some(0x80));
    }

    #[test]
    fn test_control1_write_does_not_reconcile() {
        let c = SpiController::new();
        c.write_dword(regs::CONTROL2, 0x80); // TXEIE
        assert!(c.irq().asserted);

        // An empty data read drops the interrupt without reconciling.
        assert_eq!(c.read_dword(regs::DATA), 0);
        assert!(!c.irq().asserted);

        c.write_dword(regs::CONTROL1, 0x04);
        assert!(!c.irq().asserted);

        c.write_dword(regs::CONTROL2, 0x80);
        assert!(c.irq().asserted);
    }

    #[test]
    fn test_unattached_write_skips_reconciliation() {
        let c = SpiController::new();
        c.write_dword(regs::CONTROL2, 0x40); // RXNEIE
        assert!(!c.irq().asserted);

        c.write_dword(regs::DATA, 0xAB);
        assert_eq!(c.occupancy(), 1);
        // A zero byte was queued but no transfer completed, so the
        // interrupt stays down until the next reconciliation.
        assert!(!c.irq().asserted);

        c.write_dword(regs::CONTROL2, 0x40);
        assert!(c.irq().asserted);
    }

    #[test]
    fn test_unattached_write_leaves_transmit_request() {
        let c = SpiController::new();
        c.write_dword(regs::CONTROL2, 0x02); // TXDMAEN
        let before = c.dma_transmit();
        assert!(before.asserted);

        c.write_dword(regs::DATA, 0x55);
        assert_eq!(c.dma_transmit(), before);
    }

    #[test]
    fn test_dma_receive_pulse_gated_by_rxdmaen() {
        let c = SpiController::new();
        c.attach_slave(Box::new(LoopbackSlave)).unwrap();

        c.write_dword(regs::DATA, 0x11);
        assert_eq!(c.dma_receive().rising_edges, 0);

        c.write_dword(regs::CONTROL2, 0x01); // RXDMAEN
        c.write_dword(regs::DATA, 0x22);
        let probe = c.dma_receive();
        assert!(!probe.asserted);
        assert_eq!(probe.rising_edges, 1);
    }

    #[test]
    fn test_status_tracks_occupancy() {
        let c = SpiController::new();
        c.attach_slave(Box::new(LoopbackSlave)).unwrap();
        assert_eq!(c.read_dword(regs::STATUS), 0x0002);

        c.write_dword(regs::DATA, 0xAB);
        assert_eq!(c.read_dword(regs::STATUS), 0x0003);

        assert_eq!(c.read_dword(regs::DATA), 0xAB);
        assert_eq!(c.read_dword(regs::STATUS), 0x0002);
    }

    #[test]
    fn test_data_write_uses_low_byte_only() {
        let c = SpiController::new();
        c.attach_slave(Box::new(LoopbackSlave)).unwrap();
        c.write_dword(regs::DATA, 0x1234_ABCD);
        assert_eq!(c.read_dword(regs::DATA), 0xCD);
    }

    #[test]
    fn test_misaligned_byte_access_is_inert() {
        let c = SpiController::new();
        c.attach_slave(Box::new(LoopbackSlave)).unwrap();
        c.write_dword(regs::DATA, 0xAB);
        assert_eq!(c.occupancy(), 1);

        assert_eq!(c.read_byte(regs::DATA + 1), 0);
        assert_eq!(c.occupancy(), 1);

        assert_eq!(c.read_byte(regs::DATA), 0xAB);
        assert_eq!(c.occupancy(), 0);
    }

    #[test]
    fn test_i2s_enable_pinned_low() {
        let c = SpiController::new();
        c.write_dword(regs::I2S_CONFIGURATION, I2S_ENABLE | 0x0F);
        let stored = c.peek_register(regs::I2S_CONFIGURATION).unwrap();
        assert_eq!(stored & I2S_ENABLE, 0);
        // The surrounding tagged bits store normally.
        assert_eq!(stored & 0x0F, 0x0F);
    }

    #[test]
    fn test_attach_detach_cycle() {
        let c = SpiController::new();
        c.attach_slave(Box::new(LoopbackSlave)).unwrap();
        assert!(matches!(
            c.attach_slave(Box::new(LoopbackSlave)),
            Err(SimulationError::SlaveAlreadyAttached)
        ));
        assert!(c.detach_slave().is_some());
        assert!(c.attach_slave(Box::new(LoopbackSlave)).is_ok());
    }

    #[test]
    fn test_snapshot_shape() {
        let c = SpiController::new();
        let snap = c.snapshot();
        assert_eq!(snap["registers"]["crc_polynomial"], 7);
        assert_eq!(snap["receive_buffer"]["capacity"], 4);
        assert_eq!(snap["irq"]["asserted"], false);
    }

    #[test]
    fn test_reset_restores_power_on_snapshot() {
        let c = SpiController::new();
        let fresh = c.snapshot();

        c.attach_slave(Box::new(LoopbackSlave)).unwrap();
        c.write_dword(regs::CONTROL2, 0xC3);
        c.write_dword(regs::DATA, 0x5A);
        c.reset();

        assert_eq!(c.snapshot(), fresh);
    }
}
