//! # Money Primitives
//!
//! [`Amount`] is a signed count of currency minor units (cents). It
//! serializes as a decimal string with exactly two fraction digits
//! (`"100000.00"`), and deserializes from such a string or from a JSON
//! integer of whole units. JSON floats are rejected.
//!
//! [`Rate`] is a fraction in basis points (`0..=10_000`), serialized as a
//! four-digit decimal fraction (`"0.1000"`).
//!
//! [`Percentage`] is a percent in `0..=100` with up to two fraction
//! digits, held in hundredths.
//!
//! Parsing never truncates or clamps: an amount with three fraction digits,
//! a rate above 1, or a negative rate is an error.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EngineError;

/// Basis points in a whole (1.0 == 10_000 bps).
pub const BPS_SCALE: i64 = 10_000;

const MINOR_PER_MAJOR: i64 = 100;

// ── Amount ──────────────────────────────────────────────────────────────

/// A money amount in minor units of the platform currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount(0);

    /// Construct from minor units (cents).
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Construct from whole major units, saturating on overflow.
    pub fn from_major(units: i64) -> Self {
        Self(units.saturating_mul(MINOR_PER_MAJOR))
    }

    /// The amount in minor units.
    pub fn minor_units(self) -> i64 {
        self.0
    }

    /// Whether the amount is strictly greater than zero.
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Checked sum of an iterator of amounts.
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.checked_add(a))
    }

    /// `self × numerator / denominator`, rounded half-up to the minor unit.
    ///
    /// Defined for non-negative `self` and `numerator` and a positive
    /// `denominator`; returns `None` otherwise or on overflow.
    pub fn scale_round_half_up(self, numerator: i64, denominator: i64) -> Option<Amount> {
        if self.0 < 0 || numerator < 0 || denominator <= 0 {
            return None;
        }
        let product = i128::from(self.0) * i128::from(numerator);
        let den = i128::from(denominator);
        let rounded = (product * 2 + den) / (den * 2);
        i64::try_from(rounded).ok().map(Self)
    }

    /// Parse a decimal string such as `"1500"`, `"1500.5"` or `"-12.75"`.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        let invalid = || EngineError::InvalidAmount(format!("{s:?} is not a decimal amount"));
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if digits.contains('.') && (frac.is_empty() || frac.len() > 2) {
            return Err(invalid());
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let frac_minor: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse::<i64>().map_err(|_| invalid())?,
        };
        let magnitude = whole
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|v| v.checked_add(frac_minor))
            .ok_or_else(invalid)?;
        Ok(Self(if negative { -magnitude } else { magnitude }))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal amount string or a whole-unit integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                Amount::parse(v).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                v.checked_mul(MINOR_PER_MAJOR)
                    .map(Amount)
                    .ok_or_else(|| E::custom(format!("amount {v} overflows")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                let v = i64::try_from(v).map_err(|_| E::custom(format!("amount {v} overflows")))?;
                self.visit_i64(v)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

// ── Rate ────────────────────────────────────────────────────────────────

/// A fraction in `[0, 1]`, held in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rate(u32);

impl Rate {
    /// Zero rate.
    pub const ZERO: Rate = Rate(0);

    /// The default discount on self-managed requests (20%).
    pub const DEFAULT_DISCOUNT: Rate = Rate(2_000);

    /// Construct from basis points, rejecting values above 10_000.
    pub fn from_bps(bps: u32) -> Result<Self, EngineError> {
        if i64::from(bps) > BPS_SCALE {
            return Err(EngineError::InvalidAmount(format!(
                "rate of {bps} bps is outside [0, 1]"
            )));
        }
        Ok(Self(bps))
    }

    /// The rate in basis points.
    pub fn bps(self) -> u32 {
        self.0
    }

    /// Parse a decimal fraction such as `"0.1"` or `"0.0825"`.
    ///
    /// At most four fraction digits are accepted.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        let invalid = || EngineError::InvalidAmount(format!("{s:?} is not a rate in [0, 1]"));
        let trimmed = s.trim();
        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if whole.is_empty()
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
            || frac.len() > 4
            || (trimmed.contains('.') && frac.is_empty())
        {
            return Err(invalid());
        }
        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        let mut frac_bps: u32 = 0;
        for (i, b) in frac.bytes().enumerate() {
            frac_bps += u32::from(b - b'0') * 10u32.pow(3 - i as u32);
        }
        let bps = whole
            .checked_mul(BPS_SCALE as u32)
            .and_then(|v| v.checked_add(frac_bps))
            .ok_or_else(invalid)?;
        Self::from_bps(bps).map_err(|_| invalid())
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = BPS_SCALE as u32;
        write!(f, "{}.{:04}", self.0 / scale, self.0 % scale)
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Rate::parse(&raw).map_err(de::Error::custom)
    }
}

// ── Percentage ──────────────────────────────────────────────────────────

const HUNDREDTHS_PER_PERCENT: u32 = 100;

/// Hundredths of a percent in a whole (100% == 10_000).
pub const PERCENT_SCALE: u32 = 10_000;

/// A percentage in `0..=100` with up to two fraction digits, held in
/// hundredths of a percent.
///
/// Serializes as a JSON number (`30`, `12.5`, `33.33`) and deserializes
/// from a number or a decimal string. A third fraction digit is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Percentage(u32);

impl Percentage {
    /// Construct from a whole percent, rejecting values above 100.
    pub fn new(whole: u8) -> Result<Self, EngineError> {
        Self::from_hundredths(u32::from(whole) * HUNDREDTHS_PER_PERCENT)
    }

    /// Construct from hundredths of a percent, rejecting values above 100%.
    pub fn from_hundredths(hundredths: u32) -> Result<Self, EngineError> {
        if hundredths > PERCENT_SCALE {
            return Err(EngineError::InvalidAmount(format!(
                "percentage {} is outside [0, 100]",
                format_hundredths(u64::from(hundredths))
            )));
        }
        Ok(Self(hundredths))
    }

    /// Parse a decimal such as `"30"`, `"12.5"` or `"33.33"`.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        let invalid = || EngineError::InvalidAmount(format!("{s:?} is not a percentage"));
        let trimmed = s.trim();
        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if whole.is_empty()
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
            || frac.len() > 2
            || (trimmed.contains('.') && frac.is_empty())
        {
            return Err(invalid());
        }
        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        let mut frac_hundredths: u32 = 0;
        for (i, b) in frac.bytes().enumerate() {
            frac_hundredths += u32::from(b - b'0') * 10u32.pow(1 - i as u32);
        }
        let hundredths = whole
            .checked_mul(HUNDREDTHS_PER_PERCENT)
            .and_then(|v| v.checked_add(frac_hundredths))
            .ok_or_else(invalid)?;
        Self::from_hundredths(hundredths)
    }

    /// The percentage in hundredths of a percent.
    pub fn hundredths(self) -> u32 {
        self.0
    }

    /// Whether the percentage is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// Render hundredths of a percent as a decimal, dropping a zero fraction:
/// `3000` → `"30"`, `1250` → `"12.5"`, `3333` → `"33.33"`.
pub fn format_hundredths(hundredths: u64) -> String {
    let scale = u64::from(HUNDREDTHS_PER_PERCENT);
    let (whole, frac) = (hundredths / scale, hundredths % scale);
    match frac {
        0 => whole.to_string(),
        f if f % 10 == 0 => format!("{whole}.{}", f / 10),
        f => format!("{whole}.{f:02}"),
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", format_hundredths(u64::from(self.0)))
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % HUNDREDTHS_PER_PERCENT == 0 {
            serializer.serialize_u32(self.0 / HUNDREDTHS_PER_PERCENT)
        } else {
            serializer.serialize_f64(f64::from(self.0) / f64::from(HUNDREDTHS_PER_PERCENT))
        }
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PercentageVisitor;

        impl<'de> Visitor<'de> for PercentageVisitor {
            type Value = Percentage;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a percentage in [0, 100] with at most two fraction digits")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Percentage, E> {
                let hundredths = v
                    .checked_mul(u64::from(HUNDREDTHS_PER_PERCENT))
                    .and_then(|h| u32::try_from(h).ok())
                    .ok_or_else(|| E::custom(format!("percentage {v} is outside [0, 100]")))?;
                Percentage::from_hundredths(hundredths).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Percentage, E> {
                let v = u64::try_from(v)
                    .map_err(|_| E::custom(format!("percentage {v} is outside [0, 100]")))?;
                self.visit_u64(v)
            }

            // Floats are re-read through their shortest decimal form so that
            // 33.33 is exactly 3333 hundredths.
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Percentage, E> {
                if !v.is_finite() {
                    return Err(E::custom("percentage must be finite"));
                }
                Percentage::parse(&v.to_string()).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Percentage, E> {
                Percentage::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(PercentageVisitor)
    }
}
