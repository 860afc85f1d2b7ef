// WireSim - SPI Peripheral Simulation Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::{Arc, Mutex};

/// A device on the far side of the serial link.
///
/// `exchange` models one full-duplex frame: the argument is the byte
/// shifted out by the master, the return value is the byte shifted back.
/// It is called synchronously while the controller holds its internal
/// lock, so implementations must not call back into the controller and
/// must not block.
pub trait SpiSlave: std::fmt::Debug + Send {
    fn exchange(&mut self, value: u8) -> u8;
}

/// Echoes every byte straight back.
#[derive(Debug, Default)]
pub struct LoopbackSlave;

impl SpiSlave for LoopbackSlave {
    fn exchange(&mut self, value: u8) -> u8 {
        value
    }
}

/// Replies from a fixed response sequence, cycling when exhausted. An
/// optional sink collects every byte the master sent, for inspection
/// after the slave has been attached.
#[derive(Debug, Default)]
pub struct PatternSlave {
    response: Vec<u8>,
    cursor: usize,
    sink: Option<Arc<Mutex<Vec<u8>>>>,
}

impl PatternSlave {
    pub fn new(response: Vec<u8>) -> Self {
        Self {
            response,
            cursor: 0,
            sink: None,
        }
    }

    pub fn set_sink(&mut self, sink: Option<Arc<Mutex<Vec<u8>>>>) {
        self.sink = sink;
    }
}

impl SpiSlave for PatternSlave {
    fn exchange(&mut self, value: u8) -> u8 {
        if let Some(sink) = &self.sink {
            if let Ok(mut guard) = sink.lock() {
                guard.push(value);
            }
        }

        if self.response.is_empty() {
            return 0;
        }
        let out = self.response[self.cursor];
        self.cursor = (self.cursor + 1) % self.response.len();
        out
    }
}
