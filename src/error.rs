use std::path::PathBuf;

use thiserror::Error;

use crate::opcodes::AddressingMode;

/// Fatal conditions raised while executing an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("unsupported instruction: opcode ${opcode:02X} at PC ${pc:04X}")]
    UnsupportedInstruction { opcode: u8, pc: u16 },

    #[error("unsupported addressing mode {mode:?} at PC ${pc:04X}")]
    UnsupportedAddressingMode { mode: AddressingMode, pc: u16 },
}

/// Rejected snapshot or checkpoint input. Raised before any CPU state is touched.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("memory address {0:#X} is outside 0x0000-0xFFFF")]
    AddressOutOfRange(u64),

    #[error("value {value:#X} for `{field}` does not fit in {bits} bits")]
    ValueOutOfRange {
        field: String,
        value: u64,
        bits: u8,
    },

    #[error("memory image is {0} bytes, expected 65536")]
    MemorySize(usize),

    #[error("memory digest does not match the recorded SHA-256")]
    DigestMismatch,

    #[error("corrupt memory encoding: {0}")]
    Corrupt(String),

    #[error("invalid state JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures surfaced by the external assembler collaborator.
#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("assembly source is empty")]
    EmptySource,

    #[error("assembly input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("failed to start assembler `{executable}`: {source}")]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("assembler exited with status {code:?}\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    Failed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("assembler produced no output at {0}")]
    NoOutput(PathBuf),

    #[error("assembler I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid clock setting `{0}`")]
    InvalidClock(String),
}
