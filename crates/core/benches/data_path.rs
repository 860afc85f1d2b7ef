// WireSim - SPI Peripheral Simulation Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use wiresim_core::bus::PeripheralBus;
use wiresim_core::slave::LoopbackSlave;
use wiresim_core::spi::{regs, SpiController};
use wiresim_core::BusPeripheral;

fn bench_data_roundtrip(c: &mut Criterion) {
    let spi = SpiController::new();
    spi.attach_slave(Box::new(LoopbackSlave)).unwrap();

    c.bench_function("data_roundtrip", |b| {
        b.iter(|| {
            spi.write_dword(regs::DATA, 0xA5);
            spi.read_dword(regs::DATA)
        });
    });
}

fn bench_routed_roundtrip(c: &mut Criterion) {
    let spi = Arc::new(SpiController::new());
    spi.attach_slave(Box::new(LoopbackSlave)).unwrap();
    let mut bus = PeripheralBus::new();
    bus.map("spi1", 0x4001_3000, spi);

    c.bench_function("routed_roundtrip", |b| {
        b.iter(|| {
            bus.write_u32(0x4001_300C, 0xA5).unwrap();
            bus.read_u32(0x4001_300C).unwrap()
        });
    });
}

criterion_group!(benches, bench_data_roundtrip, bench_routed_roundtrip);
criterion_main!(benches);
