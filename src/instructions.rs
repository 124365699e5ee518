//! Per-mnemonic instruction semantics.
//!
//! Dispatch is data-driven: [`HandlerTable`] maps each [`Mnemonic`] to a plain
//! function pointer, and the CPU looks the handler up by the descriptor's
//! mnemonic. Adding an opcode means adding a table row and, for a new mnemonic,
//! one handler here.

use std::fmt;

use crate::addressing::Operand;
use crate::cpu::{Cpu, StepResult};
use crate::error::CpuError;
use crate::opcodes::{AddressingMode, InstructionDescriptor, Mnemonic};
use crate::status::{CARRY_FLAG, DECIMAL_MODE, INTERRUPT_DISABLE, OVERFLOW_FLAG};

pub type Handler = fn(&mut Cpu, &InstructionDescriptor) -> Result<StepResult, CpuError>;

type HandlerResult = Result<StepResult, CpuError>;

#[derive(Clone)]
pub struct HandlerTable {
    handlers: [Option<Handler>; Mnemonic::COUNT],
}

impl HandlerTable {
    pub fn empty() -> Self {
        HandlerTable {
            handlers: [None; Mnemonic::COUNT],
        }
    }

    /// Every 65C02 mnemonic plus the debug extensions.
    pub fn standard() -> Self {
        use Mnemonic::*;

        let mut table = HandlerTable::empty();
        let rows: &[(Mnemonic, Handler)] = &[
            (ADC, adc),
            (AND, and),
            (ASL, asl),
            (BCC, bcc),
            (BCS, bcs),
            (BEQ, beq),
            (BIT, bit),
            (BMI, bmi),
            (BNE, bne),
            (BPL, bpl),
            (BRA, bra),
            (BRK, brk),
            (BVC, bvc),
            (BVS, bvs),
            (CLC, clc),
            (CLD, cld),
            (CLI, cli),
            (CLV, clv),
            (CMP, cmp),
            (CPX, cpx),
            (CPY, cpy),
            (DEC, dec),
            (DEX, dex),
            (DEY, dey),
            (EOR, eor),
            (INC, inc),
            (INX, inx),
            (INY, iny),
            (JMP, jmp),
            (JSR, jsr),
            (LDA, lda),
            (LDX, ldx),
            (LDY, ldy),
            (LSR, lsr),
            (NOP, nop),
            (ORA, ora),
            (PHA, pha),
            (PHP, php),
            (PHX, phx),
            (PHY, phy),
            (PLA, pla),
            (PLP, plp),
            (PLX, plx),
            (PLY, ply),
            (ROL, rol),
            (ROR, ror),
            (RTI, rti),
            (RTS, rts),
            (SBC, sbc),
            (SEC, sec),
            (SED, sed),
            (SEI, sei),
            (STA, sta),
            (STP, stp),
            (STX, stx),
            (STY, sty),
            (STZ, stz),
            (TAX, tax),
            (TAY, tay),
            (TRB, trb),
            (TSB, tsb),
            (TSX, tsx),
            (TXA, txa),
            (TXS, txs),
            (TYA, tya),
            (WAI, wai),
            (DBP, dbp),
            (DRS, drs),
            (DMP, dmp),
        ];
        for &(mnemonic, handler) in rows {
            table.set(mnemonic, handler);
        }
        for n in 0..8 {
            table.set(Self::bit_family(BBR0, n), bbr);
            table.set(Self::bit_family(BBS0, n), bbs);
            table.set(Self::bit_family(RMB0, n), rmb);
            table.set(Self::bit_family(SMB0, n), smb);
        }
        table
    }

    // The eight members of a bit family are declared consecutively.
    fn bit_family(first: Mnemonic, n: usize) -> Mnemonic {
        Mnemonic::ALL[first.index() + n]
    }

    pub fn set(&mut self, mnemonic: Mnemonic, handler: Handler) {
        self.handlers[mnemonic.index()] = Some(handler);
    }

    pub fn with(mut self, mnemonic: Mnemonic, handler: Handler) -> Self {
        self.set(mnemonic, handler);
        self
    }

    pub fn without(mut self, mnemonic: Mnemonic) -> Self {
        self.handlers[mnemonic.index()] = None;
        self
    }

    pub fn get(&self, mnemonic: Mnemonic) -> Option<Handler> {
        self.handlers[mnemonic.index()]
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field(
                "registered",
                &self.handlers.iter().filter(|h| h.is_some()).count(),
            )
            .finish()
    }
}

// Operand helpers

/// Reads the operand value, charging one cycle when indexing crossed a page.
fn read_value(cpu: &mut Cpu, d: &InstructionDescriptor) -> Result<u8, CpuError> {
    let resolved = cpu.resolve_value(d.mode)?;
    if resolved.page_crossed {
        cpu.add_cycles(1);
    }
    Ok(resolved.value)
}

fn store(cpu: &mut Cpu, d: &InstructionDescriptor, value: u8) -> HandlerResult {
    let target = cpu.resolve_address(d.mode)?;
    cpu.memory.write(target.address, value);
    Ok(StepResult::Continue)
}

/// Read-modify-write on the accumulator or memory. Zero/Negative follow the new value.
fn modify(
    cpu: &mut Cpu,
    d: &InstructionDescriptor,
    charge_page_cross: bool,
    op: impl FnOnce(&mut Cpu, u8) -> u8,
) -> HandlerResult {
    let resolved = cpu.resolve_operand(d.mode)?;
    if let Operand::Immediate(_) = resolved.operand {
        return Err(CpuError::UnsupportedAddressingMode {
            mode: d.mode,
            pc: cpu.instruction_address(),
        });
    }
    if charge_page_cross && resolved.page_crossed {
        cpu.add_cycles(1);
    }
    let old = cpu.operand_value(resolved.operand);
    let new = op(cpu, old);
    cpu.write_operand(resolved.operand, new);
    cpu.status.update_zero_negative(new);
    Ok(StepResult::Continue)
}

fn branch(cpu: &mut Cpu, d: &InstructionDescriptor, condition: bool) -> HandlerResult {
    let target = cpu.resolve_address(d.mode)?;
    if condition {
        cpu.pc = target.address;
        cpu.add_cycles(if target.page_crossed { 2 } else { 1 });
    }
    Ok(StepResult::Continue)
}

fn bit_branch(cpu: &mut Cpu, d: &InstructionDescriptor, branch_if_set: bool) -> HandlerResult {
    let zp = cpu.resolve_address(d.mode)?;
    let value = cpu.memory.read(zp.address);
    let target = cpu.resolve_address(d.mode2.unwrap_or(AddressingMode::ProgramCounterRelative))?;
    let set = value & (1 << d.bit_index()) != 0;
    if set == branch_if_set {
        cpu.pc = target.address;
        cpu.add_cycles(if target.page_crossed { 2 } else { 1 });
    }
    Ok(StepResult::Continue)
}

fn compare(cpu: &mut Cpu, register: u8, value: u8) {
    let result = register.wrapping_sub(value);
    cpu.status.carry = register >= value;
    cpu.status.update_zero_negative(result);
}

fn flag(cpu: &mut Cpu, flag: u8, value: bool) -> HandlerResult {
    cpu.set_flag(flag, value);
    Ok(StepResult::Continue)
}

// Arithmetic

fn adc(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = read_value(cpu, d)?;
    if cpu.status.decimal_mode {
        add_decimal(cpu, value);
        cpu.add_cycles(1);
    } else {
        add_binary(cpu, value);
    }
    Ok(StepResult::Continue)
}

fn add_binary(cpu: &mut Cpu, value: u8) {
    let a = cpu.a;
    let sum = a as u16 + value as u16 + cpu.status.carry as u16;
    let result = sum as u8;
    cpu.status.carry = sum > 0xFF;
    cpu.status.overflow = !(a ^ value) & (a ^ result) & 0x80 != 0;
    cpu.set_register_a(result);
}

/// Nibble-wise BCD addition. Overflow uses the binary formula on the decimal result.
fn add_decimal(cpu: &mut Cpu, value: u8) {
    let a = cpu.a;
    let mut low = (a & 0x0F) + (value & 0x0F) + cpu.status.carry as u8;
    if low > 9 {
        low += 6;
    }
    let low_carry = low > 0x0F;

    let mut high = (a >> 4) + (value >> 4) + low_carry as u8;
    if high > 9 {
        high += 6;
    }
    let result = ((high & 0x0F) << 4) | (low & 0x0F);

    cpu.status.carry = high > 0x0F;
    cpu.status.overflow = !(a ^ value) & (a ^ result) & 0x80 != 0;
    cpu.set_register_a(result);
}

fn sbc(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = read_value(cpu, d)?;
    if cpu.status.decimal_mode {
        subtract_decimal(cpu, value);
        cpu.add_cycles(1);
    } else {
        // A - M - !C == A + !M + C
        add_binary(cpu, !value);
    }
    Ok(StepResult::Continue)
}

/// 65C02 BCD subtraction. Carry and Overflow come from the binary difference,
/// Zero and Negative from the adjusted result.
fn subtract_decimal(cpu: &mut Cpu, value: u8) {
    let a = cpu.a as i16;
    let v = value as i16;
    let borrow = 1 - cpu.status.carry as i16;

    let binary = a - v - borrow;
    let low = (a & 0x0F) - (v & 0x0F) - borrow;
    let mut result = binary;
    if result < 0 {
        result -= 0x60;
    }
    if low < 0 {
        result -= 0x06;
    }

    let binary_result = binary as u8;
    cpu.status.carry = binary >= 0;
    cpu.status.overflow = (cpu.a ^ value) & (cpu.a ^ binary_result) & 0x80 != 0;
    cpu.set_register_a(result as u8);
}

// Logic

fn and(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = read_value(cpu, d)?;
    cpu.set_register_a(cpu.a & value);
    Ok(StepResult::Continue)
}

fn eor(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = read_value(cpu, d)?;
    cpu.set_register_a(cpu.a ^ value);
    Ok(StepResult::Continue)
}

fn ora(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = read_value(cpu, d)?;
    cpu.set_register_a(cpu.a | value);
    Ok(StepResult::Continue)
}

fn bit(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = read_value(cpu, d)?;
    cpu.status.zero = cpu.a & value == 0;
    // BIT # only touches Z
    if d.mode != AddressingMode::Immediate {
        cpu.status.negative = value & 0x80 != 0;
        cpu.status.overflow = value & 0x40 != 0;
    }
    Ok(StepResult::Continue)
}

fn trb(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let target = cpu.resolve_address(d.mode)?;
    let value = cpu.memory.read(target.address);
    cpu.status.zero = cpu.a & value == 0;
    cpu.memory.write(target.address, value & !cpu.a);
    Ok(StepResult::Continue)
}

fn tsb(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let target = cpu.resolve_address(d.mode)?;
    let value = cpu.memory.read(target.address);
    cpu.status.zero = cpu.a & value == 0;
    cpu.memory.write(target.address, value | cpu.a);
    Ok(StepResult::Continue)
}

// Shifts and rotates

fn asl(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    modify(cpu, d, true, |cpu, value| {
        cpu.status.carry = value & 0x80 != 0;
        value << 1
    })
}

fn lsr(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    modify(cpu, d, true, |cpu, value| {
        cpu.status.carry = value & 0x01 != 0;
        value >> 1
    })
}

fn rol(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    modify(cpu, d, true, |cpu, value| {
        let carry_in = cpu.status.carry as u8;
        cpu.status.carry = value & 0x80 != 0;
        (value << 1) | carry_in
    })
}

fn ror(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    modify(cpu, d, true, |cpu, value| {
        let carry_in = (cpu.status.carry as u8) << 7;
        cpu.status.carry = value & 0x01 != 0;
        (value >> 1) | carry_in
    })
}

// Increments and decrements

fn inc(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    modify(cpu, d, false, |_, value| value.wrapping_add(1))
}

fn dec(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    modify(cpu, d, false, |_, value| value.wrapping_sub(1))
}

fn inx(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.set_register_x(cpu.x.wrapping_add(1));
    Ok(StepResult::Continue)
}

fn iny(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.set_register_y(cpu.y.wrapping_add(1));
    Ok(StepResult::Continue)
}

fn dex(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.set_register_x(cpu.x.wrapping_sub(1));
    Ok(StepResult::Continue)
}

fn dey(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.set_register_y(cpu.y.wrapping_sub(1));
    Ok(StepResult::Continue)
}

// Compares

fn cmp(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = read_value(cpu, d)?;
    let register = cpu.a;
    compare(cpu, register, value);
    Ok(StepResult::Continue)
}

fn cpx(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = read_value(cpu, d)?;
    let register = cpu.x;
    compare(cpu, register, value);
    Ok(StepResult::Continue)
}

fn cpy(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = read_value(cpu, d)?;
    let register = cpu.y;
    compare(cpu, register, value);
    Ok(StepResult::Continue)
}

// Loads and stores

fn lda(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = read_value(cpu, d)?;
    cpu.set_register_a(value);
    Ok(StepResult::Continue)
}

fn ldx(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = read_value(cpu, d)?;
    cpu.set_register_x(value);
    Ok(StepResult::Continue)
}

fn ldy(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = read_value(cpu, d)?;
    cpu.set_register_y(value);
    Ok(StepResult::Continue)
}

fn sta(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = cpu.a;
    store(cpu, d, value)
}

fn stx(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = cpu.x;
    store(cpu, d, value)
}

fn sty(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let value = cpu.y;
    store(cpu, d, value)
}

fn stz(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    store(cpu, d, 0)
}

// Bit manipulation

fn rmb(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let target = cpu.resolve_address(d.mode)?;
    let value = cpu.memory.read(target.address);
    cpu.memory.write(target.address, value & !(1 << d.bit_index()));
    Ok(StepResult::Continue)
}

fn smb(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let target = cpu.resolve_address(d.mode)?;
    let value = cpu.memory.read(target.address);
    cpu.memory.write(target.address, value | (1 << d.bit_index()));
    Ok(StepResult::Continue)
}

fn bbr(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    bit_branch(cpu, d, false)
}

fn bbs(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    bit_branch(cpu, d, true)
}

// Branches

fn bcc(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let taken = !cpu.status.carry;
    branch(cpu, d, taken)
}

fn bcs(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let taken = cpu.status.carry;
    branch(cpu, d, taken)
}

fn beq(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let taken = cpu.status.zero;
    branch(cpu, d, taken)
}

fn bne(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let taken = !cpu.status.zero;
    branch(cpu, d, taken)
}

fn bmi(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let taken = cpu.status.negative;
    branch(cpu, d, taken)
}

fn bpl(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let taken = !cpu.status.negative;
    branch(cpu, d, taken)
}

fn bvc(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let taken = !cpu.status.overflow;
    branch(cpu, d, taken)
}

fn bvs(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let taken = cpu.status.overflow;
    branch(cpu, d, taken)
}

fn bra(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    branch(cpu, d, true)
}

// Jumps and subroutines

fn jmp(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let target = cpu.resolve_address(d.mode)?;
    cpu.pc = target.address;
    Ok(StepResult::Continue)
}

fn jsr(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let target = cpu.resolve_address(d.mode)?;
    // Return address is the last byte of the JSR
    let return_address = cpu.pc.wrapping_sub(1);
    cpu.push_u16(return_address);
    cpu.pc = target.address;
    Ok(StepResult::Continue)
}

fn rts(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.pc = cpu.pop_u16().wrapping_add(1);
    Ok(StepResult::Continue)
}

fn rti(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    let p = cpu.pop();
    cpu.set_status(p);
    cpu.pc = cpu.pop_u16();
    Ok(StepResult::Continue)
}

// Stack

fn pha(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.push(cpu.a);
    Ok(StepResult::Continue)
}

fn phx(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.push(cpu.x);
    Ok(StepResult::Continue)
}

fn phy(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.push(cpu.y);
    Ok(StepResult::Continue)
}

fn php(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.push(cpu.pushed_status());
    Ok(StepResult::Continue)
}

fn pla(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    let value = cpu.pop();
    cpu.set_register_a(value);
    Ok(StepResult::Continue)
}

fn plx(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    let value = cpu.pop();
    cpu.set_register_x(value);
    Ok(StepResult::Continue)
}

fn ply(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    let value = cpu.pop();
    cpu.set_register_y(value);
    Ok(StepResult::Continue)
}

fn plp(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    let p = cpu.pop();
    cpu.set_status(p);
    Ok(StepResult::Continue)
}

// Transfers

fn tax(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.set_register_x(cpu.a);
    Ok(StepResult::Continue)
}

fn tay(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.set_register_y(cpu.a);
    Ok(StepResult::Continue)
}

fn txa(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.set_register_a(cpu.x);
    Ok(StepResult::Continue)
}

fn tya(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.set_register_a(cpu.y);
    Ok(StepResult::Continue)
}

fn tsx(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.set_register_x(cpu.sp);
    Ok(StepResult::Continue)
}

fn txs(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    // No flag effect
    cpu.sp = cpu.x;
    Ok(StepResult::Continue)
}

// Flags

fn clc(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    flag(cpu, CARRY_FLAG, false)
}

fn cld(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    flag(cpu, DECIMAL_MODE, false)
}

fn cli(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    flag(cpu, INTERRUPT_DISABLE, false)
}

fn clv(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    flag(cpu, OVERFLOW_FLAG, false)
}

fn sec(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    flag(cpu, CARRY_FLAG, true)
}

fn sed(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    flag(cpu, DECIMAL_MODE, true)
}

fn sei(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    flag(cpu, INTERRUPT_DISABLE, true)
}

// Control

fn nop(_: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    Ok(StepResult::Continue)
}

/// Treated as program end rather than an interrupt.
fn brk(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.halted = true;
    Ok(StepResult::Finished)
}

fn stp(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    cpu.halted = true;
    Ok(StepResult::Finished)
}

// No interrupt sources exist, so waiting hands control to the pause handler.
fn wai(_: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    Ok(StepResult::Pause)
}

// Debug extensions

fn dbp(_: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    Ok(StepResult::Pause)
}

fn drs(cpu: &mut Cpu, d: &InstructionDescriptor) -> HandlerResult {
    let index = cpu.resolve_value(d.mode)?.value;
    let message = format!("Register Dump #{}\n{}", index, cpu.register_summary());
    cpu.diagnostics.info(&message);
    Ok(StepResult::Continue)
}

fn dmp(cpu: &mut Cpu, _: &InstructionDescriptor) -> HandlerResult {
    let mut text = String::from("Memory Dump:");
    for (address, value) in cpu.memory.non_zero() {
        text.push_str(&format!("\n[{:04X}] = {:02X}", address, value));
    }
    cpu.diagnostics.info(&text);
    Ok(StepResult::Continue)
}
