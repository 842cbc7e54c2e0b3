//! Register map of the MSO-19 and the op-word encoding used to write it.
//!
//! The host can only write registers. Every write is a 16-bit op-word that
//! packs a 4-bit register address and an 8-bit value:
//!
//! ```text
//!  15   14   13 12   11 .. 8   7    6    5 .. 0
//!  0   !v7   v7 v6   address   0   !v5   v5 .. v0
//! ```
//!
//! The inverted copies of bits 5 and 7 guarantee that neither byte of an
//! op-word is ever `0x7e`, the frame delimiter.

/// Register address as understood by the device (4 bits).
pub type Register = u8;

// bank agnostic
pub const REG_CTL2: Register = 15;

// bank 0
pub const REG_BUFFER: Register = 1;
pub const REG_TRIGGER: Register = 2;
pub const REG_DSO_TRIGGER_LO: Register = 3;
pub const REG_DSO_TRIGGER_HI: Register = 4;
pub const REG_LA_TRIGGER: Register = 5;
pub const REG_LA_TRIGGER_MASK: Register = 6;
pub const REG_CLKRATE1: Register = 9;
pub const REG_CLKRATE2: Register = 10;
pub const REG_TRIGGER_WIDTH: Register = 11;
pub const REG_DAC1: Register = 12;
pub const REG_DAC2: Register = 13;
// possibly bank agnostic
pub const REG_CTL1: Register = 14;

// bank 2: SPI/I2C protocol trigger
pub const fn reg_pt_word(index: u8) -> Register {
    index
}

pub const fn reg_pt_mask(index: u8) -> Register {
    index + 4
}

pub const REG_PT_SPIMODE: Register = 8;

// REG_CTL1 bits
pub const BIT_CTL1_RESETFSM: u8 = 1 << 0;
pub const BIT_CTL1_ARM: u8 = 1 << 1;
pub const BIT_CTL1_FORCE: u8 = 1 << 3;
/// Set by an ADC reset and never cleared again. The device misbehaves
/// without it; its meaning is undocumented (possibly "ADC enable").
pub const BIT_CTL1_ADC_UNKNOWN4: u8 = 1 << 4;
pub const BIT_CTL1_RESETADC: u8 = 1 << 6;
pub const BIT_CTL1_LED: u8 = 1 << 7;

// REG_CTL2 bits
pub const fn bits_ctl2_bank(bank: u8) -> u8 {
    bank & 0x3
}

pub const BIT_CTL2_SLOWMODE: u8 = 1 << 5;

/// Encode a register write into its op-word.
pub const fn op_word(register: Register, value: u8) -> u16 {
    let v = value as u16;
    let a = register as u16;
    (v & 0x3f) | ((v & 0xc0) << 6) | ((a & 0xf) << 8) | ((!v & 0x20) << 1) | ((!v & 0x80) << 7)
}

/// Recover `(register, value)` from an op-word produced by [`op_word`].
pub const fn decode_op_word(word: u16) -> (Register, u8) {
    let register = ((word >> 8) & 0xf) as u8;
    let value = ((word & 0x3f) | ((word >> 6) & 0xc0)) as u8;
    (register, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_word_known_values() {
        // value 0: both inverted bits set
        assert_eq!(op_word(REG_BUFFER, 0), 0x4140);
        assert_eq!(op_word(REG_CTL1, 0xff), 0x3e3f);
        assert_eq!(op_word(REG_TRIGGER, 0x20), 0x4220);
    }

    #[test]
    fn test_op_word_round_trips_every_register_and_value() {
        for register in 0..16u8 {
            for value in 0..=255u8 {
                let word = op_word(register, value);
                assert_eq!(decode_op_word(word), (register, value));
            }
        }
    }

    #[test]
    fn test_op_word_never_contains_frame_delimiter() {
        for register in 0..16u8 {
            for value in 0..=255u8 {
                let [hi, lo] = op_word(register, value).to_be_bytes();
                assert_ne!(hi, 0x7e);
                assert_ne!(lo, 0x7e);
            }
        }
    }

    #[test]
    fn test_register_address_is_masked() {
        assert_eq!(op_word(0x1f, 0x12), op_word(0x0f, 0x12));
    }

    #[test]
    fn test_protocol_trigger_bank_layout() {
        assert_eq!(reg_pt_word(3), 3);
        assert_eq!(reg_pt_mask(0), 4);
        assert_eq!(reg_pt_mask(3), 7);
        assert_eq!(bits_ctl2_bank(2), 2);
        assert_eq!(bits_ctl2_bank(6), 2);
    }
}
