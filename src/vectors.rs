//! Per-opcode conformance vectors in the SingleStepTests layout.
//!
//! A file holds a JSON array of cases, each an `initial` state, a `final`
//! state and an optional bus trace. A case passes when one `step` from the
//! initial state reproduces the final registers and every listed byte. The
//! bus trace is only used to cross-check the cycle count, and a mismatch
//! there is reported but does not fail the case.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cpu::Cpu;
use crate::error::{CpuError, StateError};
use crate::opcodes::OPCODE_TABLE;
use crate::state::{ExecutionState, RawCpuState};

/// Opcodes whose vectors model behavior this core deliberately does not:
/// BRK and STP end the program, WAI pauses, and 02/03/13 carry the debug opcodes.
pub const SKIPPED_OPCODES: [u8; 6] = [0x00, 0x02, 0x03, 0x13, 0xCB, 0xDB];

/// One bus access: address, value, `"read"` or `"write"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusCycle(pub u64, pub u64, pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub initial: RawCpuState,
    #[serde(rename = "final")]
    pub final_state: RawCpuState,
    #[serde(default)]
    pub cycles: Vec<BusCycle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    pub name: String,
    pub mismatches: Vec<String>,
    pub error: Option<CpuError>,
    pub expected_cycles: Option<u32>,
    pub actual_cycles: Option<u32>,
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.mismatches.is_empty()
    }

    pub fn cycles_match(&self) -> bool {
        match (self.expected_cycles, self.actual_cycles) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => true,
        }
    }
}

impl fmt::Display for CaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            return write!(f, "{}: ok", self.name);
        }
        write!(f, "{}:", self.name)?;
        if let Some(err) = &self.error {
            write!(f, " {}", err)?;
        }
        for mismatch in &self.mismatches {
            write!(f, " {};", mismatch)?;
        }
        Ok(())
    }
}

/// Tally for one vector file.
#[derive(Debug, Clone, Default)]
pub struct VectorReport {
    pub file: PathBuf,
    pub total: usize,
    pub passed: usize,
    pub cycle_mismatches: usize,
    pub failures: Vec<CaseOutcome>,
}

impl VectorReport {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        VectorReport {
            file: file.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: CaseOutcome) {
        self.total += 1;
        if !outcome.cycles_match() {
            self.cycle_mismatches += 1;
        }
        if outcome.passed() {
            self.passed += 1;
        } else {
            log::debug!("{}", outcome);
            self.failures.push(outcome);
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.passed
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for VectorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} passed",
            self.file.display(),
            self.passed,
            self.total
        )?;
        if self.cycle_mismatches > 0 {
            write!(f, " ({} cycle count mismatches)", self.cycle_mismatches)?;
        }
        Ok(())
    }
}

pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<TestCase>, StateError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Runs one case. Malformed states are errors; execution faults are failures.
pub fn run_case(case: &TestCase) -> Result<CaseOutcome, StateError> {
    let initial = ExecutionState::try_from(&case.initial)?;
    let expected = ExecutionState::try_from(&case.final_state)?;

    let mut cpu = Cpu::from_state(&initial);
    let error = cpu.step().err();
    let actual_cycles = match error {
        None => cpu.last_instruction().map(|instruction| instruction.cycles()),
        Some(_) => None,
    };
    let mismatches = match error {
        None => expected.diff(&cpu.get_state()),
        Some(_) => Vec::new(),
    };

    Ok(CaseOutcome {
        name: case.name.clone(),
        mismatches,
        error,
        expected_cycles: (!case.cycles.is_empty()).then(|| case.cycles.len() as u32),
        actual_cycles,
    })
}

pub fn run_file(path: impl AsRef<Path>) -> Result<VectorReport, StateError> {
    let path = path.as_ref();
    let mut report = VectorReport::new(path);
    for case in load_file(path)? {
        report.record(run_case(&case)?);
    }
    Ok(report)
}

/// JSON files under `path` (or `path` itself), sorted by name.
pub fn collect_files(path: impl AsRef<Path>) -> Result<Vec<PathBuf>, StateError> {
    let path = path.as_ref();
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let file = entry?.path();
        if file.extension().map_or(false, |ext| ext == "json") {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}

/// Opcode named by a vector file stem such as `a9.json`.
pub fn opcode_of(path: &Path) -> Option<u8> {
    let stem = path.file_stem()?.to_str()?;
    u8::from_str_radix(stem, 16).ok()
}

/// True for files of [`SKIPPED_OPCODES`] and of bytes with no table entry.
pub fn is_skipped(path: &Path) -> bool {
    opcode_of(path).map_or(false, |opcode| {
        SKIPPED_OPCODES.contains(&opcode) || OPCODE_TABLE.get(opcode).is_none()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lda_case() -> TestCase {
        serde_json::from_value(json!({
            "name": "a9 42",
            "initial": {"pc": 512, "s": 253, "a": 0, "x": 0, "y": 0, "p": 38,
                        "ram": [[512, 169], [513, 66]]},
            "final": {"pc": 514, "s": 253, "a": 66, "x": 0, "y": 0, "p": 36,
                      "ram": [[512, 169], [513, 66]]},
            "cycles": [[512, 169, "read"], [513, 66, "read"]]
        }))
        .unwrap()
    }

    #[test]
    fn test_passing_case() {
        let outcome = run_case(&lda_case()).unwrap();
        assert!(outcome.passed(), "{}", outcome);
        assert_eq!(outcome.expected_cycles, Some(2));
        assert_eq!(outcome.actual_cycles, Some(2));
    }

    #[test]
    fn test_failing_case_lists_mismatches() {
        let mut case = lda_case();
        case.final_state.a = Some(0x41);
        let outcome = run_case(&case).unwrap();
        assert!(!outcome.passed());
        assert_eq!(outcome.mismatches, vec!["A: expected 41, got 42".to_string()]);
    }

    #[test]
    fn test_unsupported_opcode_is_failure() {
        let mut case = lda_case();
        case.initial.ram = vec![(512, 0xFC)];
        let outcome = run_case(&case).unwrap();
        assert_eq!(
            outcome.error,
            Some(CpuError::UnsupportedInstruction { opcode: 0xFC, pc: 0x0200 })
        );
    }

    #[test]
    fn test_malformed_state_is_error() {
        let mut case = lda_case();
        case.initial.p = None;
        assert!(matches!(run_case(&case), Err(StateError::MissingField("p"))));
    }

    #[test]
    fn test_report_counts() {
        let mut report = VectorReport::new("a9.json");
        report.record(run_case(&lda_case()).unwrap());
        let mut slow = lda_case();
        slow.cycles.push(BusCycle(514, 0, "read".to_string()));
        report.record(run_case(&slow).unwrap());
        assert_eq!(report.total, 2);
        assert_eq!(report.passed, 2);
        assert_eq!(report.cycle_mismatches, 1);
        assert!(report.is_success());
        assert_eq!(report.to_string(), "a9.json: 2/2 passed (1 cycle count mismatches)");
    }

    #[test]
    fn test_skipped_files() {
        assert!(is_skipped(Path::new("/suite/db.json")));
        assert!(is_skipped(Path::new("00.json")));
        assert!(is_skipped(Path::new("fc.json")));
        assert!(!is_skipped(Path::new("a9.json")));
        assert_eq!(opcode_of(Path::new("7f.json")), Some(0x7F));
        assert_eq!(opcode_of(Path::new("readme.json")), None);
    }
}
