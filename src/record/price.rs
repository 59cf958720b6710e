use serde::{Serialize, Serializer};
use std::fmt;

/// Non-negative fixed-point amount with two decimals, stored as cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(u64);

impl Price {
    /// Largest amount a `DECIMAL(10,2)` column holds: 99 999 999.99
    pub const MAX: Price = Price(9_999_999_999);

    pub fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub fn cents(&self) -> u64 {
        self.0
    }

    /// Rounds a decimal value to the nearest cent
    ///
    /// Returns `None` for negative, non-finite or out-of-range values.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let cents = (value * 100.0).round();
        if cents > Self::MAX.0 as f64 {
            return None;
        }
        Some(Self(cents as u64))
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Parses listing text such as `"3,20 €"`, `"1 234.50"` or `"€3.2"`
    ///
    /// Everything except digits and `,`/`.` is dropped. The last separator
    /// is the decimal point when one or two digits follow it; every other
    /// separator is grouping. Returns `Ok(None)` when no digit is present
    /// and `Err` for amounts above [`Price::MAX`].
    pub fn parse(text: &str) -> Result<Option<Self>, PriceOverflow> {
        let kept: Vec<char> = text
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
            .collect();

        if !kept.iter().any(|c| c.is_ascii_digit()) {
            return Ok(None);
        }

        let decimal_at = kept
            .iter()
            .rposition(|c| *c == ',' || *c == '.')
            .filter(|&pos| {
                let tail = &kept[pos + 1..];
                (1..=2).contains(&tail.len()) && tail.iter().all(|c| c.is_ascii_digit())
            });

        let (int_part, frac_part) = match decimal_at {
            Some(pos) => (&kept[..pos], &kept[pos + 1..]),
            None => (&kept[..], &[][..]),
        };

        let mut units: u64 = 0;
        for digit in int_part.iter().filter_map(|c| c.to_digit(10)) {
            units = units
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(digit)))
                .ok_or(PriceOverflow)?;
        }

        let mut cents: u64 = 0;
        for i in 0..2 {
            let digit = frac_part.get(i).and_then(|c| c.to_digit(10)).unwrap_or(0);
            cents = cents * 10 + u64::from(digit);
        }

        units
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .filter(|&total| total <= Self::MAX.0)
            .map(|total| Some(Self(total)))
            .ok_or(PriceOverflow)
    }
}

/// The amount is larger than [`Price::MAX`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceOverflow;

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}
