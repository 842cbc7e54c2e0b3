//! Calibration constants carried in the MSO-19's USB serial number.
//!
//! The serial number is a run of fixed-width decimal fields (5,3,3,1,1,6
//! digits) starting with the digit `4`. Only this short format is
//! understood; the longer strings some firmware revisions report are
//! rejected rather than guessed at.

use crate::error::{MsoError, Result};

const FIELD_WIDTHS: [usize; 6] = [5, 3, 3, 1, 1, 6];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Millivolts per ADC step.
    pub vbit: f64,
    pub dac_offset: u16,
    pub offset_range: u16,
    pub hwmodel: u8,
    pub hwrev: u8,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            vbit: Self::DEFAULT_VBIT,
            dac_offset: Self::DEFAULT_DAC_OFFSET,
            offset_range: Self::DEFAULT_OFFSET_RANGE,
            hwmodel: 0,
            hwrev: 0,
        }
    }
}

impl Calibration {
    pub const DEFAULT_VBIT: f64 = 4.19195;
    pub const DEFAULT_DAC_OFFSET: u16 = 0x1ff;
    pub const DEFAULT_OFFSET_RANGE: u16 = 0x17d;

    /// Parse an identity (USB serial number) string.
    pub fn parse(identity: &str) -> Result<Self> {
        let parse_error = |reason: &str| MsoError::ProtocolParse {
            identity: identity.to_string(),
            reason: reason.to_string(),
        };

        if !identity.starts_with('4') {
            return Err(parse_error("identity must start with '4'"));
        }

        let mut scanner = FieldScanner::new(identity);
        let mut fields = [0u32; 6];
        for (i, (field, width)) in fields.iter_mut().zip(FIELD_WIDTHS).enumerate() {
            *field = scanner
                .next_field(width)
                .ok_or_else(|| parse_error(&format!("field {} is missing or not a number", i + 1)))?;
        }
        if !scanner.at_end() {
            return Err(parse_error("unexpected characters after the sixth field"));
        }
        let [u1, u2, u3, u4, u5, _] = fields;

        // anything below 1 mV per step means the field is unset
        let vbit = if u1 / 10000 == 0 {
            Self::DEFAULT_VBIT
        } else {
            f64::from(u1) / 10000.0
        };

        let calibration = Self {
            vbit,
            // 3-digit fields always fit
            dac_offset: non_zero_or(u2 as u16, Self::DEFAULT_DAC_OFFSET),
            offset_range: non_zero_or(u3 as u16, Self::DEFAULT_OFFSET_RANGE),
            hwmodel: u4 as u8,
            hwrev: u5 as u8,
        };
        log::debug!("Parsed identity {}: {:?}", identity, calibration);
        Ok(calibration)
    }
}

fn non_zero_or(value: u16, fallback: u16) -> u16 {
    if value == 0 {
        fallback
    } else {
        value
    }
}

/// Reads width-limited unsigned decimal fields the way `%<width>u` would:
/// leading whitespace is skipped and a field ends early at a non-digit.
struct FieldScanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FieldScanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn skip_whitespace(&mut self) {
        while self
            .bytes
            .get(self.pos)
            .is_some_and(u8::is_ascii_whitespace)
        {
            self.pos += 1;
        }
    }

    /// Nothing but whitespace is left.
    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos == self.bytes.len()
    }

    fn next_field(&mut self, width: usize) -> Option<u32> {
        self.skip_whitespace();

        let digits = self.bytes[self.pos..]
            .iter()
            .take(width)
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            return None;
        }

        let value = self.bytes[self.pos..self.pos + digits]
            .iter()
            .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'));
        self.pos += digits;
        Some(value)
    }
}
