use crate::sample_rate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeType {
    X1,
    #[default]
    X10,
}

impl ProbeType {
    pub fn to_multiplier(&self) -> i32 {
        match self {
            ProbeType::X1 => 1,
            ProbeType::X10 => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerSlope {
    #[default]
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitState {
    High,
    Low,
    DontCare,
}

/// Logic-analyzer pattern trigger over the 8 digital inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicPattern {
    pub bit_states: [BitState; 8],
}

impl Default for LogicPattern {
    fn default() -> Self {
        Self {
            bit_states: [BitState::DontCare; 8],
        }
    }
}

impl LogicPattern {
    pub fn when() -> Self {
        Self::default()
    }

    /// Set the expected state of one logic input. Indices past 7 are ignored.
    pub fn bit(mut self, bit: usize, state: BitState) -> Self {
        if let Some(slot) = self.bit_states.get_mut(bit) {
            *slot = state;
        } else {
            log::warn!("Ignoring logic trigger on nonexistent input {}", bit);
        }
        self
    }

    pub fn bit0(self, state: BitState) -> Self {
        self.bit(0, state)
    }

    pub fn bit1(self, state: BitState) -> Self {
        self.bit(1, state)
    }

    pub fn bit2(self, state: BitState) -> Self {
        self.bit(2, state)
    }

    pub fn bit3(self, state: BitState) -> Self {
        self.bit(3, state)
    }

    pub fn bit4(self, state: BitState) -> Self {
        self.bit(4, state)
    }

    pub fn bit5(self, state: BitState) -> Self {
        self.bit(5, state)
    }

    pub fn bit6(self, state: BitState) -> Self {
        self.bit(6, state)
    }

    pub fn bit7(self, state: BitState) -> Self {
        self.bit(7, state)
    }

    /// Value for the LA trigger register: bits expected high.
    pub fn value(&self) -> u8 {
        self.bit_states
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == BitState::High)
            .fold(0, |acc, (i, _)| acc | (1 << i))
    }

    /// Value for the LA trigger mask register. The hardware compares the
    /// bits that are 0 in the mask.
    pub fn mask(&self) -> u8 {
        self.bit_states
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == BitState::DontCare)
            .fold(0, |acc, (i, _)| acc | (1 << i))
    }
}

/// SPI/I2C protocol trigger, written to register bank 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTrigger {
    pub word: [u8; 4],
    pub mask: [u8; 4],
    /// SPI mode 0-3; 0 for I2C.
    pub spimode: u8,
}

impl Default for ProtocolTrigger {
    fn default() -> Self {
        Self {
            word: [0; 4],
            mask: [0xff; 4],
            spimode: 0,
        }
    }
}

/// Trigger settings applied by `Mso19::configure_trigger`.
///
/// `channel` and `output_source` are the raw selector values understood by
/// the device. Channels 0-5 and sources 1-3 have bit patterns; any other
/// value selects nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerConfig {
    pub channel: u8,
    pub slope: TriggerSlope,
    pub output_source: u8,
    /// Analog trigger level in millivolts at the probe tip.
    pub level_mv: f64,
    pub probe: ProbeType,
    /// Minimum pulse width in nanoseconds.
    pub width_ns: u64,
    pub logic: LogicPattern,
    pub protocol: ProtocolTrigger,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            // logic analyzer combination trigger
            channel: 3,
            slope: TriggerSlope::Positive,
            output_source: 0,
            level_mv: 0.0,
            probe: ProbeType::default(),
            width_ns: 0,
            logic: LogicPattern::default(),
            protocol: ProtocolTrigger::default(),
        }
    }
}

impl TriggerConfig {
    pub fn on_channel(channel: u8) -> Self {
        Self {
            channel,
            ..Self::default()
        }
    }

    pub fn rising_edge(mut self) -> Self {
        self.slope = TriggerSlope::Positive;
        self
    }

    pub fn falling_edge(mut self) -> Self {
        self.slope = TriggerSlope::Negative;
        self
    }

    pub fn level_mv(mut self, level_mv: f64) -> Self {
        self.level_mv = level_mv;
        self
    }

    pub fn probe(mut self, probe: ProbeType) -> Self {
        self.probe = probe;
        self
    }

    pub fn output_source(mut self, source: u8) -> Self {
        self.output_source = source;
        self
    }

    pub fn pulse_width_ns(mut self, width_ns: u64) -> Self {
        self.width_ns = width_ns;
        self
    }

    pub fn logic_pattern(mut self, pattern: LogicPattern) -> Self {
        self.logic = pattern;
        self
    }

    pub fn protocol(mut self, protocol: ProtocolTrigger) -> Self {
        self.protocol = protocol;
        self
    }

    /// 10-bit ADC code of the trigger level.
    pub fn raw_level(&self, vbit: f64) -> u16 {
        let volts_at_adc = self.level_mv / f64::from(self.probe.to_multiplier());
        let raw = (512.0 - volts_at_adc / vbit) as i32;
        (raw & 0x3ff) as u16
    }

    /// Assemble the 16-bit DSO trigger word: level, slope, channel and
    /// output source.
    pub fn dso_trigger_word(&self, vbit: f64) -> u16 {
        let mut word = self.raw_level(vbit);

        let slope_bit = match self.slope {
            TriggerSlope::Positive => self.channel == 1,
            TriggerSlope::Negative => matches!(self.channel, 0 | 2 | 3),
        };
        if slope_bit {
            word |= 0x400;
        }

        word |= match self.channel {
            // channel 1 also carries channel 2's bit
            1 => 0xe000 | 0x4000,
            2 => 0x4000,
            3 => 0x2000,
            4 => 0xa000,
            5 => 0x8000,
            _ => 0,
        };

        word |= match self.output_source {
            1 => 0x800,
            2 => 0x1000,
            3 => 0x1800,
            _ => 0,
        };

        word
    }

    /// Pulse width expressed in sample periods at `rate` Hz, saturated to
    /// the 8-bit register.
    pub fn width_samples(&self, rate: u64) -> u8 {
        (self.width_ns / sample_rate::period_ns(rate)).min(255) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VBIT: f64 = 4.0;

    #[test]
    fn test_channel_two_positive_slope() {
        let word = TriggerConfig::on_channel(2).rising_edge().dso_trigger_word(VBIT);
        assert_ne!(word & 0x4000, 0);
        assert_eq!(word & 0x400, 0);
    }

    #[test]
    fn test_channel_two_negative_slope_sets_slope_bit() {
        let word = TriggerConfig::on_channel(2).falling_edge().dso_trigger_word(VBIT);
        assert_ne!(word & 0x400, 0);
        assert_ne!(word & 0x4000, 0);
    }

    #[test]
    fn test_slope_truth_table() {
        let cases = [
            (0, TriggerSlope::Positive, false),
            (0, TriggerSlope::Negative, true),
            (1, TriggerSlope::Positive, true),
            (1, TriggerSlope::Negative, false),
            (3, TriggerSlope::Negative, true),
            (4, TriggerSlope::Negative, false),
            (5, TriggerSlope::Positive, false),
        ];
        for (channel, slope, expected) in cases {
            let mut cfg = TriggerConfig::on_channel(channel);
            cfg.slope = slope;
            let word = cfg.dso_trigger_word(VBIT);
            assert_eq!(word & 0x400 != 0, expected, "channel {channel} {slope:?}");
        }
    }

    #[test]
    fn test_channel_bit_patterns() {
        let high = |channel| TriggerConfig::on_channel(channel).dso_trigger_word(VBIT) & 0xe000;
        assert_eq!(high(0), 0);
        assert_eq!(high(1), 0xe000);
        assert_eq!(high(2), 0x4000);
        assert_eq!(high(3), 0x2000);
        assert_eq!(high(4), 0xa000);
        assert_eq!(high(5), 0x8000);
        assert_eq!(high(9), 0);
    }

    #[test]
    fn test_unknown_channel_sets_no_channel_or_slope_bits() {
        let word = TriggerConfig::on_channel(42).falling_edge().dso_trigger_word(VBIT);
        assert_eq!(word & 0xe400, 0);
    }

    #[test]
    fn test_output_source_bits() {
        let src = |s| TriggerConfig::on_channel(0).output_source(s).dso_trigger_word(VBIT) & 0x1800;
        assert_eq!(src(0), 0);
        assert_eq!(src(1), 0x800);
        assert_eq!(src(2), 0x1000);
        assert_eq!(src(3), 0x1800);
        assert_eq!(src(7), 0);
    }

    #[test]
    fn test_raw_level() {
        // 0 mV sits at mid scale
        assert_eq!(TriggerConfig::default().raw_level(VBIT), 0x200);
        // 400 mV through a x10 probe is 40 mV at the ADC, 10 steps
        let cfg = TriggerConfig::default().level_mv(400.0).probe(ProbeType::X10);
        assert_eq!(cfg.raw_level(VBIT), 0x200 - 10);
        let cfg = TriggerConfig::default().level_mv(-400.0).probe(ProbeType::X1);
        assert_eq!(cfg.raw_level(VBIT), 0x200 + 100);
    }

    #[test]
    fn test_raw_level_wraps_to_ten_bits() {
        let cfg = TriggerConfig::default().level_mv(4000.0).probe(ProbeType::X1);
        // 512 - 1000 = -488
        assert_eq!(cfg.raw_level(VBIT), (-488i32 & 0x3ff) as u16);
        assert!(cfg.raw_level(VBIT) <= 0x3ff);
    }

    #[test]
    fn test_width_samples() {
        let cfg = TriggerConfig::default().pulse_width_ns(50);
        assert_eq!(cfg.width_samples(200_000_000), 10);
        assert_eq!(cfg.width_samples(1_000_000), 0);
        let cfg = TriggerConfig::default().pulse_width_ns(10_000);
        assert_eq!(cfg.width_samples(200_000_000), 255);
    }

    #[test]
    fn test_logic_pattern_value_and_mask() {
        let pattern = LogicPattern::when()
            .bit0(BitState::High)
            .bit1(BitState::Low)
            .bit7(BitState::High);
        assert_eq!(pattern.value(), 0x81);
        assert_eq!(pattern.mask(), 0x7c);
        assert_eq!(LogicPattern::default().mask(), 0xff);
        assert_eq!(LogicPattern::default().value(), 0);
    }

    #[test]
    fn test_logic_pattern_ignores_out_of_range_bit() {
        let pattern = LogicPattern::when().bit(8, BitState::High);
        assert_eq!(pattern, LogicPattern::default());
    }
}
