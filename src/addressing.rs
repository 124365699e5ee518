//! Operand resolution for the fifteen 65C02 addressing modes.
//!
//! Every resolution consumes the operand bytes it reads: on return the PC points
//! past them. Page crossing is reported relative to the unindexed base address
//! (or, for relative branches, the PC following the operand).

use crate::cpu::Cpu;
use crate::error::CpuError;
use crate::opcodes::AddressingMode;

/// What an operand refers to after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// The accumulator itself.
    Accumulator,
    /// A literal byte taken from the instruction stream.
    Immediate(u8),
    /// A location in memory.
    Address(u16),
}

/// An operand plus whether computing it crossed a page boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOperand {
    pub operand: Operand,
    pub page_crossed: bool,
}

impl ResolvedOperand {
    fn new(operand: Operand, page_crossed: bool) -> Self {
        ResolvedOperand {
            operand,
            page_crossed,
        }
    }
}

/// A resolved byte value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedValue {
    pub value: u8,
    pub page_crossed: bool,
}

/// A resolved effective address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub address: u16,
    pub page_crossed: bool,
}

pub fn pages_differ(a: u16, b: u16) -> bool {
    a & 0xFF00 != b & 0xFF00
}

impl Cpu {
    fn fetch_byte(&mut self) -> u8 {
        let value = self.memory.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn fetch_word(&mut self) -> u16 {
        let low = self.fetch_byte() as u16;
        let high = self.fetch_byte() as u16;
        (high << 8) | low
    }

    fn unsupported(&self, mode: AddressingMode) -> CpuError {
        CpuError::UnsupportedAddressingMode {
            mode,
            pc: self.instruction_address(),
        }
    }

    /// Resolves `mode` against the live registers, advancing the PC past the operand.
    pub fn resolve_operand(&mut self, mode: AddressingMode) -> Result<ResolvedOperand, CpuError> {
        use AddressingMode::*;

        let resolved = match mode {
            Implied => return Err(self.unsupported(mode)),
            Accumulator => ResolvedOperand::new(Operand::Accumulator, false),
            Immediate => ResolvedOperand::new(Operand::Immediate(self.fetch_byte()), false),
            Absolute => ResolvedOperand::new(Operand::Address(self.fetch_word()), false),
            AbsoluteIndexedX | AbsoluteIndexedY => {
                let base = self.fetch_word();
                let index = if mode == AbsoluteIndexedX { self.x } else { self.y };
                let address = base.wrapping_add(index as u16);
                ResolvedOperand::new(Operand::Address(address), pages_differ(base, address))
            }
            AbsoluteIndirect => {
                let pointer = self.fetch_word();
                ResolvedOperand::new(Operand::Address(self.memory.read_u16(pointer)), false)
            }
            AbsoluteIndexedIndirectX => {
                let pointer = self.fetch_word().wrapping_add(self.x as u16);
                ResolvedOperand::new(Operand::Address(self.memory.read_u16(pointer)), false)
            }
            ProgramCounterRelative => {
                let offset = self.fetch_byte() as i8;
                let origin = self.pc;
                let target = origin.wrapping_add(offset as i16 as u16);
                ResolvedOperand::new(Operand::Address(target), pages_differ(origin, target))
            }
            ZeroPage => ResolvedOperand::new(Operand::Address(self.fetch_byte() as u16), false),
            ZeroPageIndexedX | ZeroPageIndexedY => {
                let index = if mode == ZeroPageIndexedX { self.x } else { self.y };
                let address = self.fetch_byte().wrapping_add(index);
                ResolvedOperand::new(Operand::Address(address as u16), false)
            }
            ZeroPageIndirect => {
                let zp = self.fetch_byte();
                ResolvedOperand::new(Operand::Address(self.memory.read_u16_zero_page(zp)), false)
            }
            ZeroPageIndexedIndirectX => {
                let zp = self.fetch_byte().wrapping_add(self.x);
                ResolvedOperand::new(Operand::Address(self.memory.read_u16_zero_page(zp)), false)
            }
            ZeroPageIndirectIndexedY => {
                let zp = self.fetch_byte();
                let base = self.memory.read_u16_zero_page(zp);
                let address = base.wrapping_add(self.y as u16);
                ResolvedOperand::new(Operand::Address(address), pages_differ(base, address))
            }
        };
        Ok(resolved)
    }

    /// Resolves `mode` to a byte: the accumulator, the literal, or the byte at the effective address.
    pub fn resolve_value(&mut self, mode: AddressingMode) -> Result<ResolvedValue, CpuError> {
        let resolved = self.resolve_operand(mode)?;
        Ok(ResolvedValue {
            value: self.operand_value(resolved.operand),
            page_crossed: resolved.page_crossed,
        })
    }

    /// Resolves `mode` to a writable address. Modes without one are rejected.
    pub fn resolve_address(&mut self, mode: AddressingMode) -> Result<ResolvedAddress, CpuError> {
        match self.resolve_operand(mode)? {
            ResolvedOperand {
                operand: Operand::Address(address),
                page_crossed,
            } => Ok(ResolvedAddress {
                address,
                page_crossed,
            }),
            _ => Err(self.unsupported(mode)),
        }
    }

    pub fn operand_value(&self, operand: Operand) -> u8 {
        match operand {
            Operand::Accumulator => self.a,
            Operand::Immediate(value) => value,
            Operand::Address(address) => self.memory.read(address),
        }
    }

    /// Writes through an operand. The accumulator target re-derives Zero/Negative;
    /// memory targets leave flags alone. Immediate operands are not writable.
    pub fn write_operand(&mut self, operand: Operand, value: u8) {
        match operand {
            Operand::Accumulator => self.set_register_a(value),
            Operand::Address(address) => self.memory.write(address, value),
            Operand::Immediate(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AddressingMode::*;

    fn cpu_with(bytes: &[u8], base: u16) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_program(bytes, base);
        cpu
    }

    #[test]
    fn test_immediate_consumes_one_byte() {
        let mut cpu = cpu_with(&[0x42, 0x99], 0x0600);
        let resolved = cpu.resolve_value(Immediate).unwrap();
        assert_eq!(resolved.value, 0x42);
        assert!(!resolved.page_crossed);
        assert_eq!(cpu.get_pc(), 0x0601);
    }

    #[test]
    fn test_absolute_is_little_endian() {
        let mut cpu = cpu_with(&[0x00, 0x02], 0x0600);
        cpu.memory_mut().write(0x0200, 0x77);
        let resolved = cpu.resolve_operand(Absolute).unwrap();
        assert_eq!(resolved.operand, Operand::Address(0x0200));
        assert_eq!(cpu.operand_value(resolved.operand), 0x77);
        assert_eq!(cpu.get_pc(), 0x0602);
    }

    #[test]
    fn test_zero_page_and_accumulator() {
        let mut cpu = cpu_with(&[0x10], 0x0600);
        cpu.memory_mut().write(0x0010, 0x5A);
        assert_eq!(cpu.resolve_value(ZeroPage).unwrap().value, 0x5A);

        cpu.set_register_a(0x33);
        let pc = cpu.get_pc();
        let resolved = cpu.resolve_value(Accumulator).unwrap();
        assert_eq!(resolved.value, 0x33);
        assert_eq!(cpu.get_pc(), pc);
    }

    #[test]
    fn test_absolute_indexed_page_cross() {
        let mut cpu = cpu_with(&[0xF0, 0x12, 0xF0, 0x12], 0x0600);
        cpu.set_register_x(0x0F);
        let resolved = cpu.resolve_address(AbsoluteIndexedX).unwrap();
        assert_eq!(resolved.address, 0x12FF);
        assert!(!resolved.page_crossed);

        cpu.set_register_x(0x10);
        let resolved = cpu.resolve_address(AbsoluteIndexedX).unwrap();
        assert_eq!(resolved.address, 0x1300);
        assert!(resolved.page_crossed);
    }

    #[test]
    fn test_zero_page_indexed_wraps() {
        let mut cpu = cpu_with(&[0xF0], 0x0600);
        cpu.set_register_y(0x20);
        let resolved = cpu.resolve_address(ZeroPageIndexedY).unwrap();
        assert_eq!(resolved.address, 0x0010);
        assert!(!resolved.page_crossed);
    }

    #[test]
    fn test_indirect_indexed_y() {
        let mut cpu = cpu_with(&[0x40], 0x0600);
        cpu.memory_mut().write_u16(0x0040, 0x20FF);
        cpu.set_register_y(0x01);
        let resolved = cpu.resolve_address(ZeroPageIndirectIndexedY).unwrap();
        assert_eq!(resolved.address, 0x2100);
        assert!(resolved.page_crossed);
    }

    #[test]
    fn test_indexed_indirect_x_wraps_in_page_zero() {
        let mut cpu = cpu_with(&[0xFE], 0x0600);
        cpu.set_register_x(0x01);
        cpu.memory_mut().write(0x00FF, 0x34);
        cpu.memory_mut().write(0x0000, 0x12);
        let resolved = cpu.resolve_address(ZeroPageIndexedIndirectX).unwrap();
        assert_eq!(resolved.address, 0x1234);
    }

    #[test]
    fn test_absolute_indirect_reads_across_page() {
        let mut cpu = cpu_with(&[0xFF, 0x10], 0x0600);
        cpu.memory_mut().write(0x10FF, 0x00);
        cpu.memory_mut().write(0x1100, 0x80);
        let resolved = cpu.resolve_address(AbsoluteIndirect).unwrap();
        assert_eq!(resolved.address, 0x8000);
    }

    #[test]
    fn test_relative_backward_and_page_cross() {
        let mut cpu = cpu_with(&[0xFC], 0x0600);
        let resolved = cpu.resolve_address(ProgramCounterRelative).unwrap();
        // origin is 0x0601, -4
        assert_eq!(resolved.address, 0x05FD);
        assert!(resolved.page_crossed);

        let mut cpu = cpu_with(&[0x10], 0x0600);
        let resolved = cpu.resolve_address(ProgramCounterRelative).unwrap();
        assert_eq!(resolved.address, 0x0611);
        assert!(!resolved.page_crossed);
    }

    #[test]
    fn test_address_request_on_literal_fails() {
        let mut cpu = cpu_with(&[0x42], 0x0600);
        let err = cpu.resolve_address(Immediate).unwrap_err();
        assert!(matches!(
            err,
            CpuError::UnsupportedAddressingMode { mode: Immediate, .. }
        ));
        assert!(cpu.resolve_operand(Implied).is_err());
    }
}
