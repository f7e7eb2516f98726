//! Formatting utilities
use std::fmt;
use std::time::Duration;

/// Pretty-printing
#[derive(Debug, Default, Copy, Clone, PartialEq, PartialOrd)]
pub struct PrettyPrint<T>(pub T);

impl fmt::Display for PrettyPrint<f64> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let magnitude = self.0.abs();
        if (magnitude >= 1e6 || magnitude <= 1e-4) && self.0 != 0.0 {
            fmt::LowerExp::fmt(&self.0, f)
        } else {
            fmt::Display::fmt(&self.0, f)
        }
    }
}

/// Display a frequency
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub struct Frequency(pub f64);

impl Frequency {
    /// Frequency of `count` events over `elapsed` time.
    pub fn from_count(count: u64, elapsed: Duration) -> Self {
        #[allow(clippy::cast_precision_loss)]
        Self(count as f64 / elapsed.as_secs_f64())
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = self.0;
        let (coef, unit) = if (1e3..1e6).contains(&value) {
            (value / 1e3, "kHz")
        } else if value >= 1e6 {
            (value / 1e6, "MHz")
        } else {
            (value, "Hz")
        };
        fmt::Display::fmt(&PrettyPrint(coef), f)?;
        f.write_str(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_print_small_uses_exponent() {
        assert_eq!(format!("{}", PrettyPrint(1e-6)), "1e-6");
    }

    #[test]
    fn pretty_print_moderate_is_plain() {
        assert_eq!(format!("{:.2}", PrettyPrint(12.3456)), "12.35");
    }

    #[test]
    fn frequency_khz() {
        let freq = Frequency::from_count(3000, Duration::from_secs(1));
        assert_eq!(format!("{:.1}", freq), "3.0kHz");
    }
}
