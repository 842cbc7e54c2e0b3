use crate::registers::BIT_CTL2_SLOWMODE;

const fn khz(n: u64) -> u64 {
    n * 1_000
}

const fn mhz(n: u64) -> u64 {
    n * 1_000_000
}

/// One entry of the clock divider table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateEntry {
    /// Sample rate in Hz.
    pub rate: u64,
    /// Value written to the two clock-rate registers.
    pub divider: u16,
    /// `REG_CTL2` bits required by this rate.
    pub slowmode: u8,
}

const fn entry(rate: u64, divider: u16, slowmode: u8) -> RateEntry {
    RateEntry {
        rate,
        divider,
        slowmode,
    }
}

/// Every sample rate the MSO-19 supports, fastest first.
pub const RATE_TABLE: [RateEntry; 20] = [
    entry(mhz(200), 0x0205, 0),
    entry(mhz(100), 0x0105, 0),
    entry(mhz(50), 0x0005, 0),
    entry(mhz(20), 0x0303, 0),
    entry(mhz(10), 0x0308, 0),
    entry(mhz(5), 0x030c, 0),
    entry(mhz(2), 0x0330, 0),
    entry(mhz(1), 0x0362, 0),
    entry(khz(500), 0x03c6, 0),
    entry(khz(200), 0x07f2, 0),
    entry(khz(100), 0x0fe6, 0),
    entry(khz(50), 0x1fce, 0),
    entry(khz(20), 0x4f86, 0),
    entry(khz(10), 0x9f0e, 0),
    // below 10 kHz the device switches to slow mode
    entry(khz(5), 0x03c7, BIT_CTL2_SLOWMODE),
    entry(khz(2), 0x07f3, BIT_CTL2_SLOWMODE),
    entry(khz(1), 0x0fe7, BIT_CTL2_SLOWMODE),
    entry(500, 0x1fcf, BIT_CTL2_SLOWMODE),
    entry(200, 0x4f87, BIT_CTL2_SLOWMODE),
    entry(100, 0x9f0f, BIT_CTL2_SLOWMODE),
];

pub const DEFAULT_SAMPLE_RATE: u64 = mhz(1);

/// Find the table entry for `rate` Hz.
pub fn lookup(rate: u64) -> Option<&'static RateEntry> {
    RATE_TABLE.iter().find(|e| e.rate == rate)
}

/// All supported rates in Hz, fastest first.
pub fn supported_rates() -> impl Iterator<Item = u64> {
    RATE_TABLE.iter().map(|e| e.rate)
}

/// Length of one sample period in whole nanoseconds.
pub fn period_ns(rate: u64) -> u64 {
    1_000_000_000 / rate.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_rates() {
        let e = lookup(200_000_000).unwrap();
        assert_eq!(e.divider, 0x0205);
        assert_eq!(e.slowmode, 0);

        let e = lookup(100).unwrap();
        assert_eq!(e.divider, 0x9f0f);
        assert_eq!(e.slowmode, BIT_CTL2_SLOWMODE);
    }

    #[test]
    fn test_lookup_unknown_rate() {
        assert!(lookup(3).is_none());
        assert!(lookup(25_000_000).is_none());
    }

    #[test]
    fn test_default_rate_is_supported() {
        assert!(lookup(DEFAULT_SAMPLE_RATE).is_some());
    }

    #[test]
    fn test_rates_are_unique_and_descending() {
        let rates: Vec<u64> = supported_rates().collect();
        assert!(rates.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_period_ns() {
        assert_eq!(period_ns(200_000_000), 5);
        assert_eq!(period_ns(1_000_000), 1_000);
        assert_eq!(period_ns(100), 10_000_000);
    }
}
