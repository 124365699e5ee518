use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::cpu::Cpu;
use crate::error::StateError;
use crate::memory::MEMORY_SIZE;
use crate::state::{ExecutionState, MemoryView};

const RLE_MARKER: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointReason {
    Manual,
    Breakpoint,
    Finished,
}

/// Complete machine state saved to disk: registers, counters and the whole
/// memory image (run-length encoded, base64, with a SHA-256 of the raw bytes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub reason: CheckpointReason,
    pub steps: u64,
    pub cycles: u64,
    pub halted: bool,
    pub pc: u16,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub s: u8,
    pub p: u8,
    pub memory_rle: String,
    pub memory_sha256: String,
}

impl Checkpoint {
    pub fn capture(cpu: &Cpu, name: impl Into<String>, reason: CheckpointReason, steps: u64) -> Self {
        let memory = cpu.memory().as_slice();
        Checkpoint {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: Utc::now(),
            reason,
            steps,
            cycles: cpu.total_cycles(),
            halted: cpu.is_halted(),
            pc: cpu.get_pc(),
            a: cpu.get_register_a(),
            x: cpu.get_register_x(),
            y: cpu.get_register_y(),
            s: cpu.get_sp(),
            p: cpu.get_status(),
            memory_rle: STANDARD.encode(compress_memory(memory)),
            memory_sha256: sha256_hex(memory),
        }
    }

    /// Decodes the memory image, checking size and digest.
    pub fn memory(&self) -> Result<Vec<u8>, StateError> {
        let compressed = STANDARD
            .decode(&self.memory_rle)
            .map_err(|e| StateError::Corrupt(format!("base64: {}", e)))?;
        let memory = decompress_memory(&compressed)?;
        if memory.len() != MEMORY_SIZE {
            return Err(StateError::MemorySize(memory.len()));
        }
        if sha256_hex(&memory) != self.memory_sha256 {
            return Err(StateError::DigestMismatch);
        }
        Ok(memory)
    }

    /// Rebuilds a CPU. Fails before constructing anything if the image is damaged.
    pub fn restore(&self) -> Result<Cpu, StateError> {
        let memory = self.memory()?;
        let state = ExecutionState {
            pc: self.pc,
            a: self.a,
            x: self.x,
            y: self.y,
            s: self.s,
            p: self.p,
            memory: MemoryView::Full(memory),
        };
        let mut cpu = Cpu::from_state(&state);
        cpu.restore_counters(self.cycles, self.halted);
        Ok(cpu)
    }

    /// Compressed size over raw size.
    pub fn compression_ratio(&self) -> f32 {
        let encoded = STANDARD.decode(&self.memory_rle).map(|b| b.len()).unwrap_or(0);
        encoded as f32 / MEMORY_SIZE as f32
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Longest run a single `[RLE_MARKER, len, value]` triple can carry.
const MAX_RUN: usize = u8::MAX as usize;

fn compress_memory(memory: &[u8]) -> Vec<u8> {
    let mut compressed = Vec::new();
    let mut rest = memory;
    while let Some(&value) = rest.first() {
        let len = rest.iter().take(MAX_RUN).take_while(|&&b| b == value).count();
        encode_run(&mut compressed, value, len);
        rest = &rest[len..];
    }
    compressed
}

/// Zero runs and runs longer than three become triples; short runs stay literal,
/// with a literal marker byte written as `[RLE_MARKER, 0x00]`.
fn encode_run(out: &mut Vec<u8>, value: u8, len: usize) {
    if len > 3 || value == 0 {
        out.extend_from_slice(&[RLE_MARKER, len as u8, value]);
    } else if value == RLE_MARKER {
        for _ in 0..len {
            out.extend_from_slice(&[RLE_MARKER, 0x00]);
        }
    } else {
        out.extend(std::iter::repeat(value).take(len));
    }
}

fn decompress_memory(compressed: &[u8]) -> Result<Vec<u8>, StateError> {
    let mut decompressed = Vec::with_capacity(MEMORY_SIZE);
    let mut i = 0;

    while i < compressed.len() {
        if compressed[i] != RLE_MARKER {
            decompressed.push(compressed[i]);
            i += 1;
            continue;
        }
        match compressed.get(i + 1) {
            None => return Err(StateError::Corrupt("truncated RLE data".to_string())),
            Some(0x00) => {
                decompressed.push(RLE_MARKER);
                i += 2;
            }
            Some(&count) => {
                let value = *compressed
                    .get(i + 2)
                    .ok_or_else(|| StateError::Corrupt("truncated RLE run".to_string()))?;
                decompressed.extend(std::iter::repeat(value).take(count as usize));
                i += 3;
            }
        }
        if decompressed.len() > MEMORY_SIZE {
            return Err(StateError::MemorySize(decompressed.len()));
        }
    }

    Ok(decompressed)
}
