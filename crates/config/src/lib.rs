// WireSim - SPI Peripheral Simulation Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_base_address() -> u64 {
    0x4001_3000
}

fn default_buffer_capacity() -> usize {
    4
}

/// The device wired to the far side of the SPI link.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlaveConfig {
    #[default]
    None,
    Loopback,
    Pattern {
        response: Vec<u8>,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    #[serde(default = "default_base_address")]
    pub base_address: u64,
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_address: default_base_address(),
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

/// Topology of one simulated bench: a controller window and the slave
/// behind it.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BenchManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub slave: SlaveConfig,
}

impl BenchManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open bench manifest at {:?}", path.as_ref()))?;
        let manifest: Self =
            serde_yaml::from_reader(f).context("Failed to parse Bench Manifest YAML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.name.trim().is_empty() {
            anyhow::bail!("Bench 'name' cannot be empty");
        }

        if self.controller.buffer_capacity == 0 {
            anyhow::bail!("Controller 'buffer_capacity' must be greater than zero");
        }

        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LineName {
    Irq,
    DmaReceive,
    DmaTransmit,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct WriteAccess {
    pub offset: u64,
    pub value: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReadAccess {
    pub offset: u64,
    #[serde(default)]
    pub expect: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LineExpectation {
    pub line: LineName,
    #[serde(default)]
    pub asserted: Option<bool>,
    #[serde(default)]
    pub min_rising_edges: Option<u64>,
}

/// Stored register value, observed without data-path side effects.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegisterExpectation {
    pub offset: u64,
    pub value: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct WriteDwordStep {
    pub write_dword: WriteAccess,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct WriteWordStep {
    pub write_word: WriteAccess,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct WriteByteStep {
    pub write_byte: WriteAccess,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReadDwordStep {
    pub read_dword: ReadAccess,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReadWordStep {
    pub read_word: ReadAccess,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReadByteStep {
    pub read_byte: ReadAccess,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ExpectLineStep {
    pub expect_line: LineExpectation,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ExpectRegisterStep {
    pub expect_register: RegisterExpectation,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ResetStep {
    pub reset: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum ScenarioStep {
    WriteDword(WriteDwordStep),
    WriteWord(WriteWordStep),
    WriteByte(WriteByteStep),
    ReadDword(ReadDwordStep),
    ReadWord(ReadWordStep),
    ReadByte(ReadByteStep),
    ExpectLine(ExpectLineStep),
    ExpectRegister(ExpectRegisterStep),
    Reset(ResetStep),
}

/// Driver script replayed against a bench. Offsets are relative to the
/// controller's base address.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioScript {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

impl ScenarioScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open scenario script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse Scenario Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        for (index, step) in self.steps.iter().enumerate() {
            match step {
                ScenarioStep::WriteWord(s) if s.write_word.value > 0xFFFF => {
                    anyhow::bail!(
                        "Step {}: word write value {:#x} exceeds 16 bits",
                        index,
                        s.write_word.value
                    );
                }
                ScenarioStep::WriteByte(s) if s.write_byte.value > 0xFF => {
                    anyhow::bail!(
                        "Step {}: byte write value {:#x} exceeds 8 bits",
                        index,
                        s.write_byte.value
                    );
                }
                ScenarioStep::ReadWord(s) if s.read_word.expect.is_some_and(|v| v > 0xFFFF) => {
                    anyhow::bail!("Step {}: word read expectation exceeds 16 bits", index);
                }
                ScenarioStep::ReadByte(s) if s.read_byte.expect.is_some_and(|v| v > 0xFF) => {
                    anyhow::bail!("Step {}: byte read expectation exceeds 8 bits", index);
                }
                ScenarioStep::ExpectLine(s) => {
                    let e = &s.expect_line;
                    if e.asserted.is_none() && e.min_rising_edges.is_none() {
                        anyhow::bail!(
                            "Step {}: expect_line must constrain 'asserted' or 'min_rising_edges'",
                            index
                        );
                    }
                }
                ScenarioStep::Reset(s) if !s.reset => {
                    anyhow::bail!("Step {}: 'reset' must be true", index);
                }
                _ => {}
            }
        }

        Ok(())
    }
}
