//! # WDC 65C02 CPU Emulator
//!
//! An interpreter core for the WDC 65C02, the CMOS successor of the 6502.
//! It decodes opcodes from a flat 64 KiB memory image, executes them against
//! the registers and memory, keeps the status flags bit-exact (decimal mode
//! included) and charges cycles with page-cross penalties.
//!
//! ## Features
//!
//! - Every documented 65C02 opcode, including the bit instructions
//!   (`RMB`/`SMB`/`BBR`/`BBS`), `STZ`, `TRB`/`TSB`, `PHX`/`PLY` and `BRA`
//! - Three debug opcodes on unused slots: `DBP` breakpoint, `DRS` register
//!   dump and `DMP` memory dump
//! - A run controller with breakpoints, single-stepping and clock pacing
//! - State import/export in the SingleStepTests JSON layout, plus a runner
//!   for those conformance vectors
//! - Compressed checkpoints and Prometheus metrics
//!
//! ## Example
//!
//! ```rust
//! use wdc65c02_emulator::{Cpu, ExecutionController, ScriptedPauseHandler};
//!
//! let mut cpu = Cpu::new();
//! // LDA #$42 ; STA $0200 ; NOP
//! cpu.load_program(&[0xA9, 0x42, 0x8D, 0x00, 0x02, 0xEA], 0x0600);
//!
//! let mut controller = ExecutionController::new(cpu, ScriptedPauseHandler::default());
//! controller.run_until_finish().unwrap();
//!
//! assert_eq!(controller.cpu().get_register_a(), 0x42);
//! assert_eq!(controller.cpu().memory().read(0x0200), 0x42);
//! ```

pub mod addressing;
pub mod assembler;
pub mod checkpoint;
pub mod config;
pub mod controller;
pub mod cpu;
pub mod diagnostics;
pub mod error;
pub mod instructions;
pub mod memory;
pub mod metrics;
pub mod opcodes;
pub mod state;
pub mod status;
pub mod vectors;

pub use checkpoint::{Checkpoint, CheckpointReason};
pub use config::{ClockProfile, RunConfig};
pub use controller::{
    ExecState, ExecutionController, LinePauseHandler, PauseHandler, RunOutcome,
    ScriptedPauseHandler,
};
pub use cpu::{Cpu, StepResult};
pub use diagnostics::{CapturedDiagnostics, Diagnostics, LogDiagnostics};
pub use error::{AssemblerError, ConfigError, CpuError, StateError};
pub use memory::Memory;
pub use opcodes::{AddressingMode, InstructionDescriptor, Mnemonic, OPCODE_TABLE};
pub use state::{ExecutionState, MemoryView, RawCpuState};
