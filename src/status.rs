use serde::{Deserialize, Serialize};

// Status register bit layout
pub const CARRY_FLAG: u8 = 0x01;
pub const ZERO_FLAG: u8 = 0x02;
pub const INTERRUPT_DISABLE: u8 = 0x04;
pub const DECIMAL_MODE: u8 = 0x08;
pub const BREAK_COMMAND: u8 = 0x10;
pub const UNUSED_FLAG: u8 = 0x20;
pub const OVERFLOW_FLAG: u8 = 0x40;
pub const NEGATIVE_FLAG: u8 = 0x80;

/// Mask of the seven modeled flags (bit 5 is not stored).
pub const MODELED_FLAGS: u8 = !UNUSED_FLAG;

/// The seven processor flags, unpacked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFlags {
    pub carry: bool,
    pub zero: bool,
    pub interrupt_disable: bool,
    pub decimal_mode: bool,
    pub break_command: bool,
    pub overflow: bool,
    pub negative: bool,
}

impl StatusFlags {
    /// Packs the flags into the P register byte. Bit 5 is always clear.
    pub fn pack(&self) -> u8 {
        let mut p = 0;
        if self.carry {
            p |= CARRY_FLAG;
        }
        if self.zero {
            p |= ZERO_FLAG;
        }
        if self.interrupt_disable {
            p |= INTERRUPT_DISABLE;
        }
        if self.decimal_mode {
            p |= DECIMAL_MODE;
        }
        if self.break_command {
            p |= BREAK_COMMAND;
        }
        if self.overflow {
            p |= OVERFLOW_FLAG;
        }
        if self.negative {
            p |= NEGATIVE_FLAG;
        }
        p
    }

    /// Unpacks a P register byte. Bit 5 is ignored.
    pub fn unpack(p: u8) -> Self {
        StatusFlags {
            carry: p & CARRY_FLAG != 0,
            zero: p & ZERO_FLAG != 0,
            interrupt_disable: p & INTERRUPT_DISABLE != 0,
            decimal_mode: p & DECIMAL_MODE != 0,
            break_command: p & BREAK_COMMAND != 0,
            overflow: p & OVERFLOW_FLAG != 0,
            negative: p & NEGATIVE_FLAG != 0,
        }
    }

    pub fn get(&self, flag: u8) -> bool {
        self.pack() & flag != 0
    }

    /// Sets or clears the flags selected by `flag` (one or more of the bit constants).
    pub fn set(&mut self, flag: u8, value: bool) {
        let p = self.pack();
        *self = if value {
            Self::unpack(p | flag)
        } else {
            Self::unpack(p & !flag)
        };
    }

    /// Re-derives Zero and Negative from `value`.
    pub fn update_zero_negative(&mut self, value: u8) {
        let (zero, negative) = zero_negative(value);
        self.zero = zero;
        self.negative = negative;
    }
}

/// Zero/Negative derivation for a freshly written register or memory value.
pub fn zero_negative(value: u8) -> (bool, bool) {
    (value == 0, value & 0x80 != 0)
}
