//! WDC 65C02 opcode table.
//!
//! One [`InstructionDescriptor`] per defined opcode byte, built once and shared
//! read-only through [`OPCODE_TABLE`]. Bytes with no descriptor are not
//! instructions: looking them up fails with `UnsupportedInstruction`.
//!
//! Three slots that are undefined on real hardware carry emulator-only debug
//! opcodes. They are not part of the 65C02 instruction set:
//!
//! | Opcode | Mnemonic | Effect |
//! |--------|----------|--------|
//! | `$03`  | `DBP`    | breakpoint, pauses execution |
//! | `$02`  | `DRS #n` | register dump tagged with `n` |
//! | `$13`  | `DMP`    | dump of every non-zero memory byte |

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::CpuError;

macro_rules! mnemonics {
    ($($name:ident),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Mnemonic {
            $($name),*
        }

        impl Mnemonic {
            pub const ALL: &'static [Mnemonic] = &[$(Mnemonic::$name),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Mnemonic::$name => stringify!($name)),*
                }
            }
        }
    };
}

mnemonics! {
    ADC, AND, ASL,
    BBR0, BBR1, BBR2, BBR3, BBR4, BBR5, BBR6, BBR7,
    BBS0, BBS1, BBS2, BBS3, BBS4, BBS5, BBS6, BBS7,
    BCC, BCS, BEQ, BIT, BMI, BNE, BPL, BRA, BRK, BVC, BVS,
    CLC, CLD, CLI, CLV, CMP, CPX, CPY,
    DEC, DEX, DEY, EOR, INC, INX, INY, JMP, JSR,
    LDA, LDX, LDY, LSR, NOP, ORA,
    PHA, PHP, PHX, PHY, PLA, PLP, PLX, PLY,
    RMB0, RMB1, RMB2, RMB3, RMB4, RMB5, RMB6, RMB7,
    ROL, ROR, RTI, RTS, SBC, SEC, SED, SEI,
    SMB0, SMB1, SMB2, SMB3, SMB4, SMB5, SMB6, SMB7,
    STA, STP, STX, STY, STZ,
    TAX, TAY, TRB, TSB, TSX, TXA, TXS, TYA, WAI,
    // Emulator-only debug extensions
    DBP, DRS, DMP,
}

impl Mnemonic {
    pub const COUNT: usize = Mnemonic::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    /// True for the non-ISA debug opcodes.
    pub fn is_debug(self) -> bool {
        matches!(self, Mnemonic::DBP | Mnemonic::DRS | Mnemonic::DMP)
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for Mnemonic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mnemonic::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown mnemonic `{s}`"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressingMode {
    /// i (implied), s (stack)
    Implied,
    /// A
    Accumulator,
    /// #
    Immediate,
    /// a
    Absolute,
    /// a,x
    AbsoluteIndexedX,
    /// a,y
    AbsoluteIndexedY,
    /// (a)
    AbsoluteIndirect,
    /// (a,x)
    AbsoluteIndexedIndirectX,
    /// r
    ProgramCounterRelative,
    /// zp
    ZeroPage,
    /// zp,x
    ZeroPageIndexedX,
    /// zp,y
    ZeroPageIndexedY,
    /// (zp)
    ZeroPageIndirect,
    /// (zp,x)
    ZeroPageIndexedIndirectX,
    /// (zp),y
    ZeroPageIndirectIndexedY,
}

impl AddressingMode {
    /// Number of operand bytes following the opcode.
    pub const fn operand_len(self) -> u8 {
        use AddressingMode::*;
        match self {
            Implied | Accumulator => 0,
            Immediate
            | ProgramCounterRelative
            | ZeroPage
            | ZeroPageIndexedX
            | ZeroPageIndexedY
            | ZeroPageIndirect
            | ZeroPageIndexedIndirectX
            | ZeroPageIndirectIndexedY => 1,
            Absolute
            | AbsoluteIndexedX
            | AbsoluteIndexedY
            | AbsoluteIndirect
            | AbsoluteIndexedIndirectX => 2,
        }
    }
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstructionDescriptor {
    pub opcode: u8,
    pub mnemonic: Mnemonic,
    pub mode: AddressingMode,
    /// Second operand for dual-operand forms (BBR/BBS: zero page + relative).
    pub mode2: Option<AddressingMode>,
    /// Total length including the opcode byte.
    pub bytes: u8,
    /// Base cycle cost before page-cross, branch or decimal penalties.
    pub cycles: u8,
}

impl InstructionDescriptor {
    const fn new(opcode: u8, mnemonic: Mnemonic, mode: AddressingMode, cycles: u8) -> Self {
        InstructionDescriptor {
            opcode,
            mnemonic,
            mode,
            mode2: None,
            bytes: 1 + mode.operand_len(),
            cycles,
        }
    }

    const fn dual(
        opcode: u8,
        mnemonic: Mnemonic,
        mode: AddressingMode,
        mode2: AddressingMode,
        cycles: u8,
    ) -> Self {
        InstructionDescriptor {
            opcode,
            mnemonic,
            mode,
            mode2: Some(mode2),
            bytes: 1 + mode.operand_len() + mode2.operand_len(),
            cycles,
        }
    }

    /// Bit number selected by BBR/BBS/RMB/SMB, encoded in the opcode's high nibble.
    pub fn bit_index(&self) -> u8 {
        (self.opcode >> 4) & 0x07
    }
}

use AddressingMode::*;
use Mnemonic::*;

const fn op(opcode: u8, mnemonic: Mnemonic, mode: AddressingMode, cycles: u8) -> InstructionDescriptor {
    InstructionDescriptor::new(opcode, mnemonic, mode, cycles)
}

const fn bit_branch(opcode: u8, mnemonic: Mnemonic) -> InstructionDescriptor {
    InstructionDescriptor::dual(opcode, mnemonic, ZeroPage, ProgramCounterRelative, 5)
}

// Sorted by mnemonic. Cycle counts from the WDC W65C02S datasheet.
const DESCRIPTORS: &[InstructionDescriptor] = &[
    // ADC (Add with Carry)
    op(0x69, ADC, Immediate, 2),
    op(0x65, ADC, ZeroPage, 3),
    op(0x75, ADC, ZeroPageIndexedX, 4),
    op(0x6D, ADC, Absolute, 4),
    op(0x7D, ADC, AbsoluteIndexedX, 4), // +1 if page crossed
    op(0x79, ADC, AbsoluteIndexedY, 4), // +1 if page crossed
    op(0x72, ADC, ZeroPageIndirect, 5),
    op(0x61, ADC, ZeroPageIndexedIndirectX, 6),
    op(0x71, ADC, ZeroPageIndirectIndexedY, 5), // +1 if page crossed
    // AND
    op(0x29, AND, Immediate, 2),
    op(0x25, AND, ZeroPage, 3),
    op(0x35, AND, ZeroPageIndexedX, 4),
    op(0x2D, AND, Absolute, 4),
    op(0x3D, AND, AbsoluteIndexedX, 4),
    op(0x39, AND, AbsoluteIndexedY, 4),
    op(0x32, AND, ZeroPageIndirect, 5),
    op(0x21, AND, ZeroPageIndexedIndirectX, 6),
    op(0x31, AND, ZeroPageIndirectIndexedY, 5),
    // ASL (Arithmetic Shift Left)
    op(0x0A, ASL, Accumulator, 2),
    op(0x06, ASL, ZeroPage, 5),
    op(0x16, ASL, ZeroPageIndexedX, 6),
    op(0x0E, ASL, Absolute, 6),
    op(0x1E, ASL, AbsoluteIndexedX, 6), // +1 if page crossed
    // BBR (Branch on Bit Reset)
    bit_branch(0x0F, BBR0),
    bit_branch(0x1F, BBR1),
    bit_branch(0x2F, BBR2),
    bit_branch(0x3F, BBR3),
    bit_branch(0x4F, BBR4),
    bit_branch(0x5F, BBR5),
    bit_branch(0x6F, BBR6),
    bit_branch(0x7F, BBR7),
    // BBS (Branch on Bit Set)
    bit_branch(0x8F, BBS0),
    bit_branch(0x9F, BBS1),
    bit_branch(0xAF, BBS2),
    bit_branch(0xBF, BBS3),
    bit_branch(0xCF, BBS4),
    bit_branch(0xDF, BBS5),
    bit_branch(0xEF, BBS6),
    bit_branch(0xFF, BBS7),
    // Conditional branches: +1 if taken, +1 more if the target is on another page
    op(0x90, BCC, ProgramCounterRelative, 2),
    op(0xB0, BCS, ProgramCounterRelative, 2),
    op(0xF0, BEQ, ProgramCounterRelative, 2),
    op(0x30, BMI, ProgramCounterRelative, 2),
    op(0xD0, BNE, ProgramCounterRelative, 2),
    op(0x10, BPL, ProgramCounterRelative, 2),
    op(0x50, BVC, ProgramCounterRelative, 2),
    op(0x70, BVS, ProgramCounterRelative, 2),
    op(0x80, BRA, ProgramCounterRelative, 2), // always taken
    // BIT (Bit Test)
    op(0x89, BIT, Immediate, 2),
    op(0x24, BIT, ZeroPage, 3),
    op(0x34, BIT, ZeroPageIndexedX, 4),
    op(0x2C, BIT, Absolute, 4),
    op(0x3C, BIT, AbsoluteIndexedX, 4),
    // BRK
    op(0x00, BRK, Implied, 7),
    // Flag clears
    op(0x18, CLC, Implied, 2),
    op(0xD8, CLD, Implied, 2),
    op(0x58, CLI, Implied, 2),
    op(0xB8, CLV, Implied, 2),
    // CMP (Compare with Accumulator)
    op(0xC9, CMP, Immediate, 2),
    op(0xC5, CMP, ZeroPage, 3),
    op(0xD5, CMP, ZeroPageIndexedX, 4),
    op(0xCD, CMP, Absolute, 4),
    op(0xDD, CMP, AbsoluteIndexedX, 4),
    op(0xD9, CMP, AbsoluteIndexedY, 4),
    op(0xD2, CMP, ZeroPageIndirect, 5),
    op(0xC1, CMP, ZeroPageIndexedIndirectX, 6),
    op(0xD1, CMP, ZeroPageIndirectIndexedY, 5),
    // CPX / CPY
    op(0xE0, CPX, Immediate, 2),
    op(0xE4, CPX, ZeroPage, 3),
    op(0xEC, CPX, Absolute, 4),
    op(0xC0, CPY, Immediate, 2),
    op(0xC4, CPY, ZeroPage, 3),
    op(0xCC, CPY, Absolute, 4),
    // DEC
    op(0x3A, DEC, Accumulator, 2),
    op(0xC6, DEC, ZeroPage, 5),
    op(0xD6, DEC, ZeroPageIndexedX, 6),
    op(0xCE, DEC, Absolute, 6),
    op(0xDE, DEC, AbsoluteIndexedX, 7),
    op(0xCA, DEX, Implied, 2),
    op(0x88, DEY, Implied, 2),
    // EOR
    op(0x49, EOR, Immediate, 2),
    op(0x45, EOR, ZeroPage, 3),
    op(0x55, EOR, ZeroPageIndexedX, 4),
    op(0x4D, EOR, Absolute, 4),
    op(0x5D, EOR, AbsoluteIndexedX, 4),
    op(0x59, EOR, AbsoluteIndexedY, 4),
    op(0x52, EOR, ZeroPageIndirect, 5),
    op(0x41, EOR, ZeroPageIndexedIndirectX, 6),
    op(0x51, EOR, ZeroPageIndirectIndexedY, 5),
    // INC
    op(0x1A, INC, Accumulator, 2),
    op(0xE6, INC, ZeroPage, 5),
    op(0xF6, INC, ZeroPageIndexedX, 6),
    op(0xEE, INC, Absolute, 6),
    op(0xFE, INC, AbsoluteIndexedX, 7),
    op(0xE8, INX, Implied, 2),
    op(0xC8, INY, Implied, 2),
    // JMP / JSR
    op(0x4C, JMP, Absolute, 3),
    op(0x6C, JMP, AbsoluteIndirect, 6),
    op(0x7C, JMP, AbsoluteIndexedIndirectX, 6),
    op(0x20, JSR, Absolute, 6),
    // LDA
    op(0xA9, LDA, Immediate, 2),
    op(0xA5, LDA, ZeroPage, 3),
    op(0xB5, LDA, ZeroPageIndexedX, 4),
    op(0xAD, LDA, Absolute, 4),
    op(0xBD, LDA, AbsoluteIndexedX, 4),
    op(0xB9, LDA, AbsoluteIndexedY, 4),
    op(0xB2, LDA, ZeroPageIndirect, 5),
    op(0xA1, LDA, ZeroPageIndexedIndirectX, 6),
    op(0xB1, LDA, ZeroPageIndirectIndexedY, 5),
    // LDX
    op(0xA2, LDX, Immediate, 2),
    op(0xA6, LDX, ZeroPage, 3),
    op(0xB6, LDX, ZeroPageIndexedY, 4),
    op(0xAE, LDX, Absolute, 4),
    op(0xBE, LDX, AbsoluteIndexedY, 4),
    // LDY
    op(0xA0, LDY, Immediate, 2),
    op(0xA4, LDY, ZeroPage, 3),
    op(0xB4, LDY, ZeroPageIndexedX, 4),
    op(0xAC, LDY, Absolute, 4),
    op(0xBC, LDY, AbsoluteIndexedX, 4),
    // LSR
    op(0x4A, LSR, Accumulator, 2),
    op(0x46, LSR, ZeroPage, 5),
    op(0x56, LSR, ZeroPageIndexedX, 6),
    op(0x4E, LSR, Absolute, 6),
    op(0x5E, LSR, AbsoluteIndexedX, 6),
    // NOP
    op(0xEA, NOP, Implied, 2),
    // ORA
    op(0x09, ORA, Immediate, 2),
    op(0x05, ORA, ZeroPage, 3),
    op(0x15, ORA, ZeroPageIndexedX, 4),
    op(0x0D, ORA, Absolute, 4),
    op(0x1D, ORA, AbsoluteIndexedX, 4),
    op(0x19, ORA, AbsoluteIndexedY, 4),
    op(0x12, ORA, ZeroPageIndirect, 5),
    op(0x01, ORA, ZeroPageIndexedIndirectX, 6),
    op(0x11, ORA, ZeroPageIndirectIndexedY, 5),
    // Stack pushes / pulls
    op(0x48, PHA, Implied, 3),
    op(0x08, PHP, Implied, 3),
    op(0xDA, PHX, Implied, 3),
    op(0x5A, PHY, Implied, 3),
    op(0x68, PLA, Implied, 4),
    op(0x28, PLP, Implied, 4),
    op(0xFA, PLX, Implied, 4),
    op(0x7A, PLY, Implied, 4),
    // RMB (Reset Memory Bit)
    op(0x07, RMB0, ZeroPage, 5),
    op(0x17, RMB1, ZeroPage, 5),
    op(0x27, RMB2, ZeroPage, 5),
    op(0x37, RMB3, ZeroPage, 5),
    op(0x47, RMB4, ZeroPage, 5),
    op(0x57, RMB5, ZeroPage, 5),
    op(0x67, RMB6, ZeroPage, 5),
    op(0x77, RMB7, ZeroPage, 5),
    // ROL / ROR
    op(0x2A, ROL, Accumulator, 2),
    op(0x26, ROL, ZeroPage, 5),
    op(0x36, ROL, ZeroPageIndexedX, 6),
    op(0x2E, ROL, Absolute, 6),
    op(0x3E, ROL, AbsoluteIndexedX, 6),
    op(0x6A, ROR, Accumulator, 2),
    op(0x66, ROR, ZeroPage, 5),
    op(0x76, ROR, ZeroPageIndexedX, 6),
    op(0x6E, ROR, Absolute, 6),
    op(0x7E, ROR, AbsoluteIndexedX, 6),
    // RTI / RTS
    op(0x40, RTI, Implied, 6),
    op(0x60, RTS, Implied, 6),
    // SBC (Subtract with Borrow)
    op(0xE9, SBC, Immediate, 2),
    op(0xE5, SBC, ZeroPage, 3),
    op(0xF5, SBC, ZeroPageIndexedX, 4),
    op(0xED, SBC, Absolute, 4),
    op(0xFD, SBC, AbsoluteIndexedX, 4),
    op(0xF9, SBC, AbsoluteIndexedY, 4),
    op(0xF2, SBC, ZeroPageIndirect, 5),
    op(0xE1, SBC, ZeroPageIndexedIndirectX, 6),
    op(0xF1, SBC, ZeroPageIndirectIndexedY, 5),
    // Flag sets
    op(0x38, SEC, Implied, 2),
    op(0xF8, SED, Implied, 2),
    op(0x78, SEI, Implied, 2),
    // SMB (Set Memory Bit)
    op(0x87, SMB0, ZeroPage, 5),
    op(0x97, SMB1, ZeroPage, 5),
    op(0xA7, SMB2, ZeroPage, 5),
    op(0xB7, SMB3, ZeroPage, 5),
    op(0xC7, SMB4, ZeroPage, 5),
    op(0xD7, SMB5, ZeroPage, 5),
    op(0xE7, SMB6, ZeroPage, 5),
    op(0xF7, SMB7, ZeroPage, 5),
    // STA
    op(0x85, STA, ZeroPage, 3),
    op(0x95, STA, ZeroPageIndexedX, 4),
    op(0x8D, STA, Absolute, 4),
    op(0x9D, STA, AbsoluteIndexedX, 5),
    op(0x99, STA, AbsoluteIndexedY, 5),
    op(0x92, STA, ZeroPageIndirect, 5),
    op(0x81, STA, ZeroPageIndexedIndirectX, 6),
    op(0x91, STA, ZeroPageIndirectIndexedY, 6),
    // STP (Stop Processor)
    op(0xDB, STP, Implied, 3),
    // STX / STY / STZ
    op(0x86, STX, ZeroPage, 3),
    op(0x96, STX, ZeroPageIndexedY, 4),
    op(0x8E, STX, Absolute, 4),
    op(0x84, STY, ZeroPage, 3),
    op(0x94, STY, ZeroPageIndexedX, 4),
    op(0x8C, STY, Absolute, 4),
    op(0x64, STZ, ZeroPage, 3),
    op(0x74, STZ, ZeroPageIndexedX, 4),
    op(0x9C, STZ, Absolute, 4),
    op(0x9E, STZ, AbsoluteIndexedX, 5),
    // Transfers
    op(0xAA, TAX, Implied, 2),
    op(0xA8, TAY, Implied, 2),
    op(0xBA, TSX, Implied, 2),
    op(0x8A, TXA, Implied, 2),
    op(0x9A, TXS, Implied, 2),
    op(0x98, TYA, Implied, 2),
    // TRB / TSB (Test and Reset/Set Bits)
    op(0x14, TRB, ZeroPage, 5),
    op(0x1C, TRB, Absolute, 6),
    op(0x04, TSB, ZeroPage, 5),
    op(0x0C, TSB, Absolute, 6),
    // WAI (Wait for Interrupt)
    op(0xCB, WAI, Implied, 3),
    // Debug extensions on undefined 65C02 slots
    op(0x02, DRS, Immediate, 2),
    op(0x03, DBP, Implied, 1),
    op(0x13, DMP, Implied, 1),
];

/// Opcode byte → descriptor, immutable after construction.
pub struct OpcodeTable {
    entries: [Option<InstructionDescriptor>; 256],
}

lazy_static! {
    /// The process-wide 65C02 table.
    pub static ref OPCODE_TABLE: OpcodeTable = OpcodeTable::from_descriptors(DESCRIPTORS);
}

impl OpcodeTable {
    /// Builds a table from a descriptor list. A later entry for the same opcode
    /// replaces an earlier one.
    pub fn from_descriptors(descriptors: &[InstructionDescriptor]) -> Self {
        let mut entries = [None; 256];
        for descriptor in descriptors {
            entries[descriptor.opcode as usize] = Some(*descriptor);
        }
        OpcodeTable { entries }
    }

    pub fn get(&self, opcode: u8) -> Option<&InstructionDescriptor> {
        self.entries[opcode as usize].as_ref()
    }

    /// Looks up `opcode`, fetched from `pc`. A byte with no entry is a hard failure.
    pub fn lookup(&self, opcode: u8, pc: u16) -> Result<&InstructionDescriptor, CpuError> {
        self.get(opcode)
            .ok_or(CpuError::UnsupportedInstruction { opcode, pc })
    }

    /// All opcodes sharing `mnemonic`, in ascending opcode order.
    pub fn by_mnemonic(&self, mnemonic: Mnemonic) -> Vec<&InstructionDescriptor> {
        self.iter().filter(|d| d.mnemonic == mnemonic).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstructionDescriptor> {
        self.entries.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_returns_matching_opcode() {
        for opcode in 0..=0xFFu8 {
            if let Some(descriptor) = OPCODE_TABLE.get(opcode) {
                assert_eq!(descriptor.opcode, opcode);
            }
        }
    }

    #[test]
    fn test_no_duplicate_rows() {
        assert_eq!(OPCODE_TABLE.len(), DESCRIPTORS.len());
    }

    #[test]
    fn test_missing_entry_is_an_error() {
        // $FC is undefined on the 65C02
        let err = OPCODE_TABLE.lookup(0xFC, 0x1234).unwrap_err();
        assert_eq!(
            err,
            CpuError::UnsupportedInstruction {
                opcode: 0xFC,
                pc: 0x1234
            }
        );
    }

    #[test]
    fn test_descriptor_fields() {
        let lda = OPCODE_TABLE.get(0xA9).unwrap();
        assert_eq!(lda.mnemonic, LDA);
        assert_eq!(lda.mode, Immediate);
        assert_eq!(lda.bytes, 2);
        assert_eq!(lda.cycles, 2);

        let sta = OPCODE_TABLE.get(0x8D).unwrap();
        assert_eq!(sta.mnemonic, STA);
        assert_eq!(sta.mode, Absolute);
        assert_eq!(sta.bytes, 3);
    }

    #[test]
    fn test_bit_branch_rows() {
        let bbr3 = OPCODE_TABLE.get(0x3F).unwrap();
        assert_eq!(bbr3.mnemonic, BBR3);
        assert_eq!(bbr3.mode, ZeroPage);
        assert_eq!(bbr3.mode2, Some(ProgramCounterRelative));
        assert_eq!(bbr3.bytes, 3);
        assert_eq!(bbr3.bit_index(), 3);

        let bbs7 = OPCODE_TABLE.get(0xFF).unwrap();
        assert_eq!(bbs7.mnemonic, BBS7);
        assert_eq!(bbs7.bit_index(), 7);
    }

    #[test]
    fn test_branches_are_relative() {
        for mnemonic in [BCC, BCS, BEQ, BMI, BNE, BPL, BVC, BVS, BRA] {
            let rows = OPCODE_TABLE.by_mnemonic(mnemonic);
            assert_eq!(rows.len(), 1, "{mnemonic}");
            assert_eq!(rows[0].mode, ProgramCounterRelative, "{mnemonic}");
        }
    }

    #[test]
    fn test_by_mnemonic() {
        let lda: Vec<u8> = OPCODE_TABLE.by_mnemonic(LDA).iter().map(|d| d.opcode).collect();
        assert_eq!(lda, vec![0xA1, 0xA5, 0xA9, 0xAD, 0xB1, 0xB2, 0xB5, 0xB9, 0xBD]);
        assert!(OPCODE_TABLE.by_mnemonic(STA).iter().all(|d| d.mnemonic == STA));
    }

    #[test]
    fn test_every_mnemonic_has_a_row() {
        for &mnemonic in Mnemonic::ALL {
            assert!(
                !OPCODE_TABLE.by_mnemonic(mnemonic).is_empty(),
                "{mnemonic} has no opcode"
            );
        }
    }

    #[test]
    fn test_debug_opcodes() {
        assert_eq!(OPCODE_TABLE.get(0x03).unwrap().mnemonic, DBP);
        assert_eq!(OPCODE_TABLE.get(0x02).unwrap().mnemonic, DRS);
        assert_eq!(OPCODE_TABLE.get(0x13).unwrap().mnemonic, DMP);
        assert!(DMP.is_debug());
        assert!(!NOP.is_debug());
    }

    #[test]
    fn test_mnemonic_parse() {
        assert_eq!("lda".parse::<Mnemonic>(), Ok(LDA));
        assert_eq!("BBR5".parse::<Mnemonic>(), Ok(BBR5));
        assert!("XYZ".parse::<Mnemonic>().is_err());
        assert_eq!(Mnemonic::COUNT, Mnemonic::ALL.len());
    }
}
