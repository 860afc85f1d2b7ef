// WireSim - SPI Peripheral Simulation Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// How a field participates in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single functional bit read by the model.
    Flag,
    /// Functional multi-bit value.
    Value,
    /// Stored and read back for driver compatibility, never acted upon.
    Tagged,
    /// Reads as 0, ignores writes.
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccess {
    ReadWrite,
    /// Writes leave the stored bits untouched.
    ReadOnly,
    /// Writing 1 clears the bit; writing 0 leaves it.
    WriteOneToClear,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub lsb: u8,
    pub width: u8,
    pub kind: FieldKind,
    pub access: FieldAccess,
}

impl Field {
    pub fn mask(&self) -> u32 {
        let width_mask = if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        };
        width_mask << self.lsb
    }
}

/// Declarative register description: offset, reset value and bit fields.
/// Built fluently, decoded/encoded by the owning [`RegisterBank`].
#[derive(Debug, Clone)]
pub struct Register {
    pub name: &'static str,
    pub offset: u64,
    pub reset: u32,
    pub fields: Vec<Field>,
}

impl Register {
    pub fn new(offset: u64, name: &'static str) -> Self {
        Self {
            name,
            offset,
            reset: 0,
            fields: Vec::new(),
        }
    }

    pub fn reset_value(mut self, reset: u32) -> Self {
        self.reset = reset;
        self
    }

    fn with_field(
        mut self,
        name: &'static str,
        lsb: u8,
        width: u8,
        kind: FieldKind,
        access: FieldAccess,
    ) -> Self {
        self.fields.push(Field {
            name,
            lsb,
            width,
            kind,
            access,
        });
        self
    }

    pub fn flag(self, bit: u8, name: &'static str) -> Self {
        self.with_field(name, bit, 1, FieldKind::Flag, FieldAccess::ReadWrite)
    }

    pub fn read_only_flag(self, bit: u8, name: &'static str) -> Self {
        self.with_field(name, bit, 1, FieldKind::Flag, FieldAccess::ReadOnly)
    }

    pub fn w1c_flag(self, bit: u8, name: &'static str) -> Self {
        self.with_field(name, bit, 1, FieldKind::Flag, FieldAccess::WriteOneToClear)
    }

    pub fn value(self, lsb: u8, width: u8, name: &'static str) -> Self {
        self.with_field(name, lsb, width, FieldKind::Value, FieldAccess::ReadWrite)
    }

    pub fn tagged_flag(self, bit: u8, name: &'static str) -> Self {
        self.with_field(name, bit, 1, FieldKind::Tagged, FieldAccess::ReadWrite)
    }

    pub fn tagged_read_only_flag(self, bit: u8, name: &'static str) -> Self {
        self.with_field(name, bit, 1, FieldKind::Tagged, FieldAccess::ReadOnly)
    }

    pub fn tagged_value(self, lsb: u8, width: u8, name: &'static str) -> Self {
        self.with_field(name, lsb, width, FieldKind::Tagged, FieldAccess::ReadWrite)
    }

    pub fn tagged_read_only_value(self, lsb: u8, width: u8, name: &'static str) -> Self {
        self.with_field(name, lsb, width, FieldKind::Tagged, FieldAccess::ReadOnly)
    }

    pub fn reserved(self, lsb: u8, width: u8) -> Self {
        self.with_field("RESERVED", lsb, width, FieldKind::Reserved, FieldAccess::ReadOnly)
    }

    /// Union of the masks of all non-reserved fields; the bits a read
    /// exposes.
    fn visible_mask(&self) -> u32 {
        self.fields
            .iter()
            .filter(|f| f.kind != FieldKind::Reserved)
            .fold(0, |acc, f| acc | f.mask())
    }
}

/// Stored value before and after a write was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub previous: u32,
    pub value: u32,
}

/// Register storage decoded against the declared field table. One generic
/// routine applies per-field access rules; offsets without a declared
/// register return `None` so the caller can log the unhandled access.
#[derive(Debug)]
pub struct RegisterBank {
    registers: Vec<Register>,
    values: Vec<u32>,
}

impl RegisterBank {
    pub fn new(registers: Vec<Register>) -> Self {
        let values = registers.iter().map(|r| r.reset).collect();
        Self { registers, values }
    }

    fn index_of(&self, offset: u64) -> Option<usize> {
        self.registers.iter().position(|r| r.offset == offset)
    }

    pub fn register(&self, offset: u64) -> Option<&Register> {
        self.index_of(offset).map(|idx| &self.registers[idx])
    }

    /// Stored value masked to the declared, non-reserved bits.
    pub fn read(&self, offset: u64) -> Option<u32> {
        let idx = self.index_of(offset)?;
        Some(self.values[idx] & self.registers[idx].visible_mask())
    }

    /// Raw stored value, reserved positions included.
    pub fn stored(&self, offset: u64) -> Option<u32> {
        self.index_of(offset).map(|idx| self.values[idx])
    }

    pub fn flag(&self, offset: u64, bit: u8) -> bool {
        self.stored(offset).is_some_and(|v| v & (1u32 << bit) != 0)
    }

    pub fn write(&mut self, offset: u64, value: u32) -> Option<WriteOutcome> {
        let idx = self.index_of(offset)?;
        let previous = self.values[idx];
        let mut next = previous;
        for field in &self.registers[idx].fields {
            if field.kind == FieldKind::Reserved {
                continue;
            }
            let mask = field.mask();
            match field.access {
                FieldAccess::ReadWrite => next = (next & !mask) | (value & mask),
                FieldAccess::ReadOnly => {}
                FieldAccess::WriteOneToClear => next &= !(value & mask),
            }
        }
        self.values[idx] = next;
        Some(WriteOutcome {
            previous,
            value: next,
        })
    }

    pub fn reset(&mut self) {
        for (idx, reg) in self.registers.iter().enumerate() {
            self.values[idx] = reg.reset;
        }
    }
}

impl serde::Serialize for RegisterBank {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.registers.len()))?;
        for (reg, value) in self.registers.iter().zip(&self.values) {
            map.serialize_entry(reg.name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> RegisterBank {
        RegisterBank::new(vec![
            Register::new(0x00, "control")
                .flag(0, "EN")
                .value(1, 3, "DIV")
                .tagged_flag(4, "LEGACY")
                .reserved(5, 27),
            Register::new(0x04, "status")
                .reset_value(0x2)
                .read_only_flag(0, "BUSY")
                .read_only_flag(1, "READY")
                .reserved(2, 30),
            Register::new(0x08, "latch")
                .reset_value(0x1)
                .w1c_flag(0, "PENDING")
                .reserved(1, 31),
        ])
    }

    #[test]
    fn test_write_applies_declared_fields_only() {
        let mut b = bank();
        let outcome = b.write(0x00, 0xFFFF_FFFF).unwrap();
        assert_eq!(outcome.previous, 0);
        // EN + DIV + LEGACY land, reserved bits do not.
        assert_eq!(outcome.value, 0x1F);
        assert_eq!(b.read(0x00), Some(0x1F));
    }

    #[test]
    fn test_read_only_fields_ignore_writes() {
        let mut b = bank();
        let outcome = b.write(0x04, 0xFFFF_FFFF).unwrap();
        assert_eq!(outcome.value, 0x2);
        assert_eq!(b.read(0x04), Some(0x2));
    }

    #[test]
    fn test_write_one_to_clear() {
        let mut b = bank();
        assert!(b.flag(0x08, 0));
        // Writing 0 leaves the bit, writing 1 clears it.
        b.write(0x08, 0x0).unwrap();
        assert!(b.flag(0x08, 0));
        b.write(0x08, 0x1).unwrap();
        assert!(!b.flag(0x08, 0));
        // Once cleared it cannot be written back to 1.
        b.write(0x08, 0x1).unwrap();
        assert!(!b.flag(0x08, 0));
    }

    #[test]
    fn test_unknown_offset_is_none() {
        let mut b = bank();
        assert_eq!(b.read(0x40), None);
        assert!(b.write(0x40, 0x1).is_none());
    }

    #[test]
    fn test_reset_restores_declared_defaults() {
        let mut b = bank();
        b.write(0x00, 0x1F).unwrap();
        b.write(0x08, 0x1).unwrap();
        b.reset();
        assert_eq!(b.read(0x00), Some(0));
        assert_eq!(b.read(0x04), Some(0x2));
        assert_eq!(b.read(0x08), Some(0x1));
    }

    #[test]
    fn test_snapshot_maps_names_to_values() {
        let mut b = bank();
        b.write(0x00, 0x3).unwrap();
        let snap = serde_json::to_value(&b).unwrap();
        assert_eq!(snap["control"], 0x3);
        assert_eq!(snap["status"], 0x2);
    }
}
