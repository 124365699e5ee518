//! CPU state snapshots.
//!
//! Import is sparse (a map of memory overrides applied to a zeroed image),
//! export is full (the whole 64 KiB image). [`ExecutionState::diff`] compares
//! only the addresses the expected state lists, so either form can be used as
//! the expectation.

use std::collections::BTreeMap;
use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::cpu::Cpu;
use crate::error::StateError;
use crate::memory::{Memory, MEMORY_SIZE};
use crate::status::MODELED_FLAGS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryView {
    /// Overrides on a zero-filled image.
    Sparse(BTreeMap<u16, u8>),
    /// Every byte, index = address.
    Full(Vec<u8>),
}

impl MemoryView {
    pub fn get(&self, address: u16) -> u8 {
        match self {
            MemoryView::Sparse(map) => map.get(&address).copied().unwrap_or(0),
            MemoryView::Full(bytes) => bytes.get(address as usize).copied().unwrap_or(0),
        }
    }

    /// Addresses this view makes a claim about, with their values.
    pub fn entries(&self) -> Box<dyn Iterator<Item = (u16, u8)> + '_> {
        match self {
            MemoryView::Sparse(map) => Box::new(map.iter().map(|(&a, &v)| (a, v))),
            MemoryView::Full(bytes) => Box::new(
                bytes
                    .iter()
                    .take(MEMORY_SIZE)
                    .enumerate()
                    .map(|(a, &v)| (a as u16, v)),
            ),
        }
    }
}

impl Default for MemoryView {
    fn default() -> Self {
        MemoryView::Sparse(BTreeMap::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub pc: u16,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub s: u8,
    pub p: u8,
    pub memory: MemoryView,
}

impl ExecutionState {
    /// Registers only, with an empty sparse memory view.
    pub fn registers(pc: u16, a: u8, x: u8, y: u8, s: u8, p: u8) -> Self {
        ExecutionState {
            pc,
            a,
            x,
            y,
            s,
            p,
            memory: MemoryView::default(),
        }
    }

    /// Adds a memory override. On a full view the byte is written in place.
    pub fn with_byte(mut self, address: u16, value: u8) -> Self {
        match &mut self.memory {
            MemoryView::Sparse(map) => {
                map.insert(address, value);
            }
            MemoryView::Full(bytes) => {
                if let Some(slot) = bytes.get_mut(address as usize) {
                    *slot = value;
                }
            }
        }
        self
    }

    /// Human-readable mismatches between `self` (expected) and `actual`.
    /// P is compared on the seven modeled flags; memory on the addresses `self` lists.
    pub fn diff(&self, actual: &ExecutionState) -> Vec<String> {
        let mut mismatches = Vec::new();

        if self.pc != actual.pc {
            mismatches.push(format!("PC: expected {:04X}, got {:04X}", self.pc, actual.pc));
        }
        for (name, expected, got) in [
            ("A", self.a, actual.a),
            ("X", self.x, actual.x),
            ("Y", self.y, actual.y),
            ("S", self.s, actual.s),
        ] {
            if expected != got {
                mismatches.push(format!("{}: expected {:02X}, got {:02X}", name, expected, got));
            }
        }
        if self.p & MODELED_FLAGS != actual.p & MODELED_FLAGS {
            mismatches.push(format!(
                "P: expected {:02X}, got {:02X}",
                self.p & MODELED_FLAGS,
                actual.p & MODELED_FLAGS
            ));
        }
        for (address, expected) in self.memory.entries() {
            let got = actual.memory.get(address);
            if got != expected {
                mismatches.push(format!(
                    "[{:04X}]: expected {:02X}, got {:02X}",
                    address, expected, got
                ));
            }
        }
        mismatches
    }

    pub fn matches(&self, actual: &ExecutionState) -> bool {
        self.diff(actual).is_empty()
    }

    /// JSON-friendly form. Full memory is written as its non-zero bytes.
    pub fn to_raw(&self) -> RawCpuState {
        let ram = self
            .memory
            .entries()
            .filter(|&(_, value)| value != 0 || matches!(self.memory, MemoryView::Sparse(_)))
            .map(|(address, value)| (address as u64, value as u64))
            .collect();
        RawCpuState {
            pc: Some(self.pc as u64),
            a: Some(self.a as u64),
            x: Some(self.x as u64),
            y: Some(self.y as u64),
            s: Some(self.s as u64),
            p: Some(self.p as u64),
            ram,
        }
    }
}

/// Unvalidated state in the SingleStepTests JSON layout:
/// `{"pc": 1234, "s": 253, "a": 0, "x": 0, "y": 0, "p": 36, "ram": [[1234, 169], ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCpuState {
    #[serde(default)]
    pub pc: Option<u64>,
    #[serde(default, alias = "sp")]
    pub s: Option<u64>,
    #[serde(default)]
    pub a: Option<u64>,
    #[serde(default)]
    pub x: Option<u64>,
    #[serde(default)]
    pub y: Option<u64>,
    #[serde(default)]
    pub p: Option<u64>,
    #[serde(default)]
    pub ram: Vec<(u64, u64)>,
}

fn field(value: Option<u64>, name: &'static str, bits: u8) -> Result<u64, StateError> {
    let value = value.ok_or(StateError::MissingField(name))?;
    if value >> bits != 0 {
        return Err(StateError::ValueOutOfRange {
            field: name.to_string(),
            value,
            bits,
        });
    }
    Ok(value)
}

impl TryFrom<&RawCpuState> for ExecutionState {
    type Error = StateError;

    fn try_from(raw: &RawCpuState) -> Result<Self, Self::Error> {
        let mut memory = BTreeMap::new();
        for &(address, value) in &raw.ram {
            if address > 0xFFFF {
                return Err(StateError::AddressOutOfRange(address));
            }
            if value > 0xFF {
                return Err(StateError::ValueOutOfRange {
                    field: format!("ram[{:#06X}]", address),
                    value,
                    bits: 8,
                });
            }
            memory.insert(address as u16, value as u8);
        }

        Ok(ExecutionState {
            pc: field(raw.pc, "pc", 16)? as u16,
            a: field(raw.a, "a", 8)? as u8,
            x: field(raw.x, "x", 8)? as u8,
            y: field(raw.y, "y", 8)? as u8,
            s: field(raw.s, "s", 8)? as u8,
            p: field(raw.p, "p", 8)? as u8,
            memory: MemoryView::Sparse(memory),
        })
    }
}

impl TryFrom<RawCpuState> for ExecutionState {
    type Error = StateError;

    fn try_from(raw: RawCpuState) -> Result<Self, Self::Error> {
        ExecutionState::try_from(&raw)
    }
}

impl Cpu {
    /// Builds an instance from a snapshot: registers set verbatim, memory overrides
    /// applied to a zeroed image. No reset side effects.
    pub fn from_state(state: &ExecutionState) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.apply_state(state);
        cpu
    }

    /// Validates `raw` and replaces this instance's registers and memory with it.
    /// On error nothing is changed.
    pub fn import_state(&mut self, raw: &RawCpuState) -> Result<(), StateError> {
        let state = ExecutionState::try_from(raw)?;
        self.apply_state(&state);
        Ok(())
    }

    pub(crate) fn apply_state(&mut self, state: &ExecutionState) {
        self.reset(state.pc);
        *self.memory_mut() = Memory::new();
        for (address, value) in state.memory.entries() {
            self.memory_mut().write(address, value);
        }
        self.load_registers(state.pc, state.a, state.x, state.y, state.s, state.p);
    }

    /// Live registers and the full memory image.
    pub fn get_state(&self) -> ExecutionState {
        ExecutionState {
            pc: self.get_pc(),
            a: self.get_register_a(),
            x: self.get_register_x(),
            y: self.get_register_y(),
            s: self.get_sp(),
            p: self.get_status(),
            memory: MemoryView::Full(self.memory().as_slice().to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::StepResult;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawCpuState {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_from_state_sets_registers_verbatim() {
        // A=0 with Z clear: a reset or setter would force Z
        let state = ExecutionState::registers(0x1234, 0x00, 0x80, 0x01, 0x7F, 0xC3)
            .with_byte(0x1234, 0xEA)
            .with_byte(0xFFFF, 0x01);
        let cpu = Cpu::from_state(&state);

        assert_eq!(cpu.get_pc(), 0x1234);
        assert_eq!(cpu.get_register_a(), 0x00);
        assert_eq!(cpu.get_register_x(), 0x80);
        assert_eq!(cpu.get_sp(), 0x7F);
        assert_eq!(cpu.get_status(), 0xC3);
        assert_eq!(cpu.memory().read(0x1234), 0xEA);
        assert_eq!(cpu.memory().read(0xFFFF), 0x01);
        assert_eq!(cpu.memory().read(0x1235), 0x00);
    }

    #[test]
    fn test_get_state_is_full() {
        let cpu = Cpu::from_state(&ExecutionState::registers(0, 0, 0, 0, 0xFF, 0).with_byte(0x10, 7));
        let state = cpu.get_state();
        match &state.memory {
            MemoryView::Full(bytes) => assert_eq!(bytes.len(), MEMORY_SIZE),
            other => panic!("expected full view, got {:?}", other),
        }
        assert_eq!(state.memory.get(0x10), 7);
    }

    #[test]
    fn test_sparse_expectation_matches_full_export() {
        let expected = ExecutionState::registers(0x0605, 0x42, 0, 0, 0xFF, 0).with_byte(0x0200, 0x42);
        let mut cpu = Cpu::new();
        // LDA #$42 ; STA $0200
        cpu.load_program(&[0xA9, 0x42, 0x8D, 0x00, 0x02], 0x0600);
        assert_eq!(cpu.step().unwrap(), StepResult::Continue);
        assert!(!expected.matches(&cpu.get_state()));
        assert_eq!(cpu.step().unwrap(), StepResult::Continue);
        assert!(expected.matches(&cpu.get_state()));
    }

    #[test]
    fn test_diff_reports_each_mismatch() {
        let expected = ExecutionState::registers(0x0600, 1, 2, 3, 4, 0x00).with_byte(0x0010, 0xAA);
        let actual = ExecutionState::registers(0x0601, 1, 9, 3, 4, 0x20);
        let diff = expected.diff(&actual);
        assert_eq!(
            diff,
            vec![
                "PC: expected 0600, got 0601",
                "X: expected 02, got 09",
                "[0010]: expected AA, got 00",
            ]
        );
    }

    #[test]
    fn test_diff_ignores_unused_status_bit() {
        let expected = ExecutionState::registers(0, 0, 0, 0, 0, 0x30);
        let actual = ExecutionState::registers(0, 0, 0, 0, 0, 0x10);
        assert!(expected.matches(&actual));
    }

    #[test]
    fn test_raw_state_parses_single_step_layout() {
        let state = ExecutionState::try_from(raw(json!({
            "pc": 59121, "s": 189, "a": 1, "x": 2, "y": 3, "p": 36,
            "ram": [[59121, 169], [59122, 66]]
        })))
        .unwrap();
        assert_eq!(state.pc, 59121);
        assert_eq!(state.s, 189);
        assert_eq!(state.memory.get(59121), 169);
        assert_eq!(state.memory.get(59122), 66);
    }

    #[test]
    fn test_raw_state_rejections() {
        let err = ExecutionState::try_from(raw(json!({"pc": 0, "a": 0, "x": 0, "y": 0, "p": 0})))
            .unwrap_err();
        assert!(matches!(err, StateError::MissingField("s")));

        let err = ExecutionState::try_from(raw(json!({
            "pc": 0, "s": 0, "a": 0, "x": 0, "y": 0, "p": 0, "ram": [[65536, 1]]
        })))
        .unwrap_err();
        assert!(matches!(err, StateError::AddressOutOfRange(65536)));

        let err = ExecutionState::try_from(raw(json!({
            "pc": 0, "s": 0, "a": 256, "x": 0, "y": 0, "p": 0
        })))
        .unwrap_err();
        assert!(matches!(err, StateError::ValueOutOfRange { bits: 8, .. }));
    }

    #[test]
    fn test_failed_import_leaves_cpu_unchanged() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0xA9, 0x42], 0x0600);
        cpu.set_register_x(0x11);

        let bad = raw(json!({
            "pc": 0x1000, "s": 0, "a": 0, "x": 0, "y": 0, "p": 0, "ram": [[70000, 1]]
        }));
        assert!(cpu.import_state(&bad).is_err());

        assert_eq!(cpu.get_pc(), 0x0600);
        assert_eq!(cpu.get_register_x(), 0x11);
        assert_eq!(cpu.memory().read(0x0600), 0xA9);
    }

    #[test]
    fn test_import_replaces_memory() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0xA9, 0x42], 0x0600);
        cpu.import_state(&raw(json!({
            "pc": 0x0200, "sp": 0xFD, "a": 0, "x": 0, "y": 0, "p": 0, "ram": [[0x0200, 0xEA]]
        })))
        .unwrap();
        assert_eq!(cpu.get_pc(), 0x0200);
        assert_eq!(cpu.get_sp(), 0xFD);
        assert_eq!(cpu.memory().read(0x0600), 0x00);
        assert_eq!(cpu.memory().read(0x0200), 0xEA);
    }

    #[test]
    fn test_to_raw_round_trips_through_validation() {
        let state = ExecutionState::registers(0x0600, 1, 2, 3, 0xFF, 0x81).with_byte(0x0300, 0);
        let back = ExecutionState::try_from(state.to_raw()).unwrap();
        assert_eq!(back, state);
    }
}
