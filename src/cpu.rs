use crate::diagnostics::{Diagnostics, LogDiagnostics};
use crate::error::CpuError;
use crate::instructions::HandlerTable;
use crate::memory::Memory;
use crate::opcodes::{InstructionDescriptor, OPCODE_TABLE};
use crate::status::{StatusFlags, BREAK_COMMAND, UNUSED_FLAG};

pub const STACK_BASE: u16 = 0x0100;
pub const RESET_STACK_POINTER: u8 = 0xFF;

/// Outcome of one fetch-decode-execute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Continue,
    Pause,
    Finished,
}

/// The instruction currently (or most recently) executed, with its cycle cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub descriptor: &'static InstructionDescriptor,
    /// Address of the opcode byte.
    pub address: u16,
    pub base_cycles: u8,
    pub extra_cycles: u8,
}

impl Instruction {
    pub fn cycles(&self) -> u32 {
        self.base_cycles as u32 + self.extra_cycles as u32
    }
}

#[derive(Debug)]
pub struct Cpu {
    // Registers
    pub(crate) a: u8,  // Accumulator
    pub(crate) x: u8,  // X Index Register
    pub(crate) y: u8,  // Y Index Register
    pub(crate) pc: u16, // Program Counter
    pub(crate) sp: u8, // Stack Pointer
    pub(crate) status: StatusFlags,

    pub(crate) memory: Memory,
    pub(crate) halted: bool,
    pub(crate) diagnostics: Box<dyn Diagnostics>,

    handlers: HandlerTable,
    instruction: Option<Instruction>,
    total_cycles: u64,
}

impl Cpu {
    pub fn new() -> Self {
        Self::with_diagnostics(Box::new(LogDiagnostics::default()))
    }

    pub fn with_diagnostics(diagnostics: Box<dyn Diagnostics>) -> Self {
        Cpu {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            sp: RESET_STACK_POINTER,
            status: StatusFlags::default(),
            memory: Memory::new(),
            halted: false,
            diagnostics,
            handlers: HandlerTable::standard(),
            instruction: None,
            total_cycles: 0,
        }
    }

    /// Replaces the mnemonic dispatch table.
    pub fn with_handlers(mut self, handlers: HandlerTable) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn set_diagnostics(&mut self, diagnostics: Box<dyn Diagnostics>) {
        self.diagnostics = diagnostics;
    }

    /// Zeroes A/X/Y, sets S to 0xFF, clears every flag and points PC at `start`.
    /// Memory is untouched.
    pub fn reset(&mut self, start: u16) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = RESET_STACK_POINTER;
        self.status = StatusFlags::default();
        self.pc = start;
        self.halted = false;
        self.instruction = None;
        self.total_cycles = 0;
    }

    /// Copies `program` to `base` (bytes past 0xFFFF are dropped) and resets with PC at `base`.
    pub fn load_program(&mut self, program: &[u8], base: u16) {
        self.memory.load(program, base);
        self.reset(base);
    }

    /// Executes one instruction.
    ///
    /// PC wraps from $FFFF to $0000, both on fetch and on operand reads.
    /// Fatal errors leave PC at the failing opcode so the failure is reproducible.
    pub fn step(&mut self) -> Result<StepResult, CpuError> {
        if self.halted {
            return Ok(StepResult::Finished);
        }

        let address = self.pc;
        let opcode = self.memory.read(address);
        self.pc = self.pc.wrapping_add(1);

        let descriptor = match OPCODE_TABLE.lookup(opcode, address) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                self.pc = address;
                return Err(err);
            }
        };
        self.instruction = Some(Instruction {
            descriptor,
            address,
            base_cycles: descriptor.cycles,
            extra_cycles: 0,
        });

        let Some(handler) = self.handlers.get(descriptor.mnemonic) else {
            self.pc = address;
            return Err(CpuError::UnsupportedInstruction {
                opcode,
                pc: address,
            });
        };

        match handler(self, descriptor) {
            Ok(result) => {
                if let Some(instruction) = &self.instruction {
                    self.total_cycles += instruction.cycles() as u64;
                }
                Ok(result)
            }
            Err(err) => {
                self.pc = address;
                Err(err)
            }
        }
    }

    /// Charges extra cycles to the instruction being executed.
    pub(crate) fn add_cycles(&mut self, cycles: u8) {
        if let Some(instruction) = self.instruction.as_mut() {
            instruction.extra_cycles = instruction.extra_cycles.saturating_add(cycles);
        }
    }

    /// Opcode address of the executing instruction, or PC outside of a step.
    pub(crate) fn instruction_address(&self) -> u16 {
        self.instruction.map_or(self.pc, |i| i.address)
    }

    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.instruction.as_ref()
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Reinstates counters saved in a checkpoint.
    pub(crate) fn restore_counters(&mut self, total_cycles: u64, halted: bool) {
        self.total_cycles = total_cycles;
        self.halted = halted;
    }

    /// One-line register summary, e.g. `PC=0600 A=42 X=00 Y=00 S=FF P=00`.
    pub fn register_summary(&self) -> String {
        format!(
            "PC={:04X} A={:02X} X={:02X} Y={:02X} S={:02X} P={:02X}",
            self.pc,
            self.a,
            self.x,
            self.y,
            self.sp,
            self.get_status()
        )
    }

    // Getters
    pub fn get_register_a(&self) -> u8 { self.a }
    pub fn get_register_x(&self) -> u8 { self.x }
    pub fn get_register_y(&self) -> u8 { self.y }
    pub fn get_pc(&self) -> u16 { self.pc }
    pub fn get_sp(&self) -> u8 { self.sp }
    pub fn get_status(&self) -> u8 { self.status.pack() }
    pub fn status(&self) -> &StatusFlags { &self.status }
    pub fn is_halted(&self) -> bool { self.halted }
    pub fn memory(&self) -> &Memory { &self.memory }
    pub fn memory_mut(&mut self) -> &mut Memory { &mut self.memory }

    // Register setters. A/X/Y always re-derive Zero and Negative.
    pub fn set_register_a(&mut self, value: u8) {
        self.a = value;
        self.status.update_zero_negative(value);
    }

    pub fn set_register_x(&mut self, value: u8) {
        self.x = value;
        self.status.update_zero_negative(value);
    }

    pub fn set_register_y(&mut self, value: u8) {
        self.y = value;
        self.status.update_zero_negative(value);
    }

    pub fn set_pc(&mut self, value: u16) {
        self.pc = value;
    }

    pub fn set_sp(&mut self, value: u8) {
        self.sp = value;
    }

    pub fn set_status(&mut self, p: u8) {
        self.status = StatusFlags::unpack(p);
    }

    // Flag operations
    pub fn set_flag(&mut self, flag: u8, value: bool) {
        self.status.set(flag, value);
    }

    pub fn get_flag(&self, flag: u8) -> bool {
        self.status.get(flag)
    }

    /// Restores registers verbatim, without the flag derivation of the setters.
    pub(crate) fn load_registers(&mut self, pc: u16, a: u8, x: u8, y: u8, sp: u8, p: u8) {
        self.pc = pc;
        self.a = a;
        self.x = x;
        self.y = y;
        self.sp = sp;
        self.status = StatusFlags::unpack(p);
    }

    /// Status byte as pushed by PHP: B and bit 5 read as set.
    pub(crate) fn pushed_status(&self) -> u8 {
        self.status.pack() | BREAK_COMMAND | UNUSED_FLAG
    }

    // Stack operations
    pub fn push(&mut self, value: u8) {
        self.memory.write(STACK_BASE + self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    pub fn pop(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.memory.read(STACK_BASE + self.sp as u16)
    }

    pub(crate) fn push_u16(&mut self, value: u16) {
        self.push((value >> 8) as u8);
        self.push((value & 0xFF) as u8);
    }

    pub(crate) fn pop_u16(&mut self) -> u16 {
        let low = self.pop() as u16;
        let high = self.pop() as u16;
        (high << 8) | low
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
