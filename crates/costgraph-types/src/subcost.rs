//! 64-bit event counters and the ASCII cursor used to parse them.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// A single event counter.
///
/// Event totals of real traces fit comfortably in 64 bits, so arithmetic
/// wraps silently on overflow instead of checking; a wrapped counter means
/// the input was corrupt, not that the model should abort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubCost(pub u64);

impl SubCost {
    /// The zero counter.
    pub const ZERO: SubCost = SubCost(0);

    /// Builds a counter from a float, rounding to the nearest integer.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "negative and huge floats are out of the counter domain; \
                  rounding-to-nearest is the documented conversion"
    )]
    pub fn from_f64(value: f64) -> Self {
        SubCost((value + 0.5) as u64)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }

    /// Subtracts, clamping at zero on underflow.
    #[must_use]
    pub fn saturating_sub(self, other: SubCost) -> SubCost {
        SubCost(self.0.saturating_sub(other.0))
    }

    /// Parses a counter from a full string of ASCII digits.
    ///
    /// Any leading sign has already been stripped by the ingestion layer;
    /// a string that is empty or contains a non-digit yields `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<SubCost> {
        match strip_u64(s) {
            Some((v, rest)) if rest.is_empty() => Some(v),
            _ => None,
        }
    }

    /// Formats the counter with a space between each group of three digits,
    /// e.g. `1234567` becomes `"1 234 567"`.
    #[must_use]
    pub fn pretty(self) -> String {
        let digits = self.0.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        let lead = digits.len() % 3;
        for (i, c) in digits.chars().enumerate() {
            if i != 0 && i % 3 == lead % 3 {
                out.push(' ');
            }
            out.push(c);
        }
        out
    }
}

impl From<u64> for SubCost {
    fn from(v: u64) -> Self {
        SubCost(v)
    }
}

impl From<u32> for SubCost {
    fn from(v: u32) -> Self {
        SubCost(u64::from(v))
    }
}

impl Add for SubCost {
    type Output = SubCost;

    fn add(self, rhs: SubCost) -> SubCost {
        SubCost(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for SubCost {
    fn add_assign(&mut self, rhs: SubCost) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl Sum for SubCost {
    fn sum<I: Iterator<Item = SubCost>>(iter: I) -> SubCost {
        iter.fold(SubCost::ZERO, Add::add)
    }
}

impl fmt::Display for SubCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Consumes leading spaces and then a decimal digit run from the front of
/// `input`.
///
/// Returns the parsed counter and the unconsumed rest, or `None` when no
/// digit follows the spaces. This is the cursor primitive row parsing is
/// built on: a row like `"5 10 15"` is consumed by repeated calls, each
/// advancing past one number.
///
/// Digits accumulate with wrapping arithmetic; values that overflow 64 bits
/// do not occur in real traces and wrap silently.
#[must_use]
pub fn strip_u64(input: &str) -> Option<(SubCost, &str)> {
    let s = input.trim_start_matches(' ');
    let end = s
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let mut v: u64 = 0;
    for b in &s.as_bytes()[..end] {
        v = v.wrapping_mul(10).wrapping_add(u64::from(b - b'0'));
    }
    Some((SubCost(v), &s[end..]))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_from_f64_rounds_to_nearest() {
        assert_eq!(SubCost::from_f64(2.4), SubCost(2));
        assert_eq!(SubCost::from_f64(2.5), SubCost(3));
        assert_eq!(SubCost::from_f64(0.0), SubCost(0));
    }

    #[test]
    fn test_parse_full_string() {
        assert_eq!(SubCost::parse("1234"), Some(SubCost(1234)));
        assert_eq!(SubCost::parse(""), None);
        assert_eq!(SubCost::parse("12x"), None);
    }

    #[test]
    fn test_strip_u64_advances_past_digits() {
        let (v, rest) = strip_u64("  5 10 15").unwrap();
        assert_eq!(v, SubCost(5));
        let (v, rest) = strip_u64(rest).unwrap();
        assert_eq!(v, SubCost(10));
        let (v, rest) = strip_u64(rest).unwrap();
        assert_eq!(v, SubCost(15));
        assert!(strip_u64(rest).is_none());
    }

    #[test]
    fn test_strip_u64_rejects_non_digits() {
        assert!(strip_u64("abc").is_none());
        assert!(strip_u64("").is_none());
        assert!(strip_u64("   ").is_none());
    }

    #[test]
    fn test_pretty_groups_of_three() {
        assert_eq!(SubCost(0).pretty(), "0");
        assert_eq!(SubCost(999).pretty(), "999");
        assert_eq!(SubCost(1000).pretty(), "1 000");
        assert_eq!(SubCost(1_234_567).pretty(), "1 234 567");
    }

    #[test]
    fn test_saturating_sub_clamps_at_zero() {
        assert_eq!(SubCost(5).saturating_sub(SubCost(7)), SubCost::ZERO);
        assert_eq!(SubCost(7).saturating_sub(SubCost(5)), SubCost(2));
    }

    proptest! {
        /// Any counter survives a print/parse round trip.
        #[test]
        fn test_display_parse_roundtrip(v in any::<u64>()) {
            let s = SubCost(v).to_string();
            prop_assert_eq!(SubCost::parse(&s), Some(SubCost(v)));
        }

        /// The pretty form parses back once group separators are removed.
        #[test]
        fn test_pretty_roundtrip(v in any::<u64>()) {
            let s = SubCost(v).pretty().replace(' ', "");
            prop_assert_eq!(SubCost::parse(&s), Some(SubCost(v)));
        }
    }
}
