// WireSim - SPI Peripheral Simulation Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// Point-in-time view of a signal line, for host integration and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LineProbe {
    pub asserted: bool,
    pub rising_edges: u64,
}

/// A level-holding output line that also counts rising edges.
///
/// The edge counter makes momentary transitions observable: a [`pulse`]
/// leaves the level low but bumps the counter, so edge-triggered
/// consumers (DMA request inputs) can be modeled without scheduling.
///
/// [`pulse`]: SignalLine::pulse
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SignalLine {
    asserted: bool,
    rising_edges: u64,
}

impl SignalLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assert(&mut self) {
        self.set_level(true);
    }

    pub fn deassert(&mut self) {
        self.set_level(false);
    }

    pub fn set_level(&mut self, level: bool) {
        if level && !self.asserted {
            self.rising_edges += 1;
        }
        self.asserted = level;
    }

    /// Assert immediately followed by deassert within the same call. The
    /// steady level is unchanged afterwards; only the edge is observable.
    pub fn pulse(&mut self) {
        self.set_level(true);
        self.set_level(false);
    }

    pub fn is_asserted(&self) -> bool {
        self.asserted
    }

    pub fn rising_edges(&self) -> u64 {
        self.rising_edges
    }

    pub fn probe(&self) -> LineProbe {
        LineProbe {
            asserted: self.asserted,
            rising_edges: self.rising_edges,
        }
    }

    /// Drop the level and clear the edge counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
