//! Money amounts.
//!
//! Amounts are fixed-point integers in minor currency units (cents for KES with
//! two minor digits). Floating point never touches settlement: decimal strings
//! are parsed and rendered only at the display edge via [`Currency`].

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest supported number of minor digits.
pub const MAX_MINOR_UNITS: u32 = 6;

/// A non-negative money amount in minor units.
///
/// Settled values never exceed [`Amount::MAX`], the largest value both store
/// backends can persist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(i64::MAX as u64);

    pub fn new(minor: u64) -> Self {
        Self(minor)
    }

    pub fn minor(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self).filter(Self::in_range)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Multiply a unit price by a quantity.
    pub fn checked_mul(self, quantity: u64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self).filter(Self::in_range)
    }

    /// Whether the amount fits the persisted range.
    pub fn in_range(&self) -> bool {
        *self <= Self::MAX
    }

    /// Reject amounts no store can hold.
    pub fn ensure_in_range(self) -> Result<Self, CoreError> {
        if self.in_range() {
            Ok(self)
        } else {
            Err(CoreError::Validation(format!(
                "amount {} exceeds the maximum of {}",
                self.0,
                Self::MAX.0
            )))
        }
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// `unit × quantity`, failing with a validation error on overflow.
    pub fn total_for(self, quantity: u64) -> Result<Self, CoreError> {
        self.checked_mul(quantity).ok_or_else(|| {
            CoreError::Validation(format!("amount overflow: {} x {quantity}", self.0))
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currency used for display and decimal parsing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub minor_units: u32,
}

impl Currency {
    pub fn new(code: impl Into<String>, minor_units: u32) -> Result<Self, CoreError> {
        if minor_units > MAX_MINOR_UNITS {
            return Err(CoreError::Validation(format!(
                "minor_units must be at most {MAX_MINOR_UNITS}, got {minor_units}"
            )));
        }
        let code = code.into().trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::Validation(format!("invalid currency code: {code}")));
        }
        Ok(Self { code, minor_units })
    }

    /// Kenyan shilling, two minor digits.
    pub fn kes() -> Self {
        Self {
            code: "KES".to_string(),
            minor_units: 2,
        }
    }

    fn scale(&self) -> u64 {
        10u64.pow(self.minor_units)
    }

    /// Parse a decimal string such as `"1250.5"` into minor units.
    ///
    /// More fractional digits than `minor_units` is an error rather than a
    /// silent rounding.
    pub fn parse(&self, input: &str) -> Result<Amount, CoreError> {
        let s = input.trim();
        let invalid = || CoreError::Validation(format!("invalid amount: {input:?}"));
        if s.is_empty() || s.starts_with('-') || s.starts_with('+') {
            return Err(invalid());
        }
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        if frac.len() > self.minor_units as usize {
            return Err(CoreError::Validation(format!(
                "amount {input:?} has more than {} decimal places",
                self.minor_units
            )));
        }
        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut frac_minor: u64 = if frac.is_empty() {
            0
        } else {
            frac.parse().map_err(|_| invalid())?
        };
        for _ in frac.len()..self.minor_units as usize {
            frac_minor *= 10;
        }
        whole
            .checked_mul(self.scale())
            .and_then(|w| w.checked_add(frac_minor))
            .map(Amount::new)
            .filter(Amount::in_range)
            .ok_or_else(invalid)
    }

    /// Render an amount, e.g. `KES 1250.50`.
    pub fn format(&self, amount: Amount) -> String {
        if self.minor_units == 0 {
            return format!("{} {}", self.code, amount.minor());
        }
        let scale = self.scale();
        format!(
            "{} {}.{:0width$}",
            self.code,
            amount.minor() / scale,
            amount.minor() % scale,
            width = self.minor_units as usize
        )
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::kes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_whole_and_fraction() {
        let kes = Currency::kes();
        assert_eq!(kes.parse("10").unwrap(), Amount::new(1000));
        assert_eq!(kes.parse("10.5").unwrap(), Amount::new(1050));
        assert_eq!(kes.parse("0.07").unwrap(), Amount::new(7));
        assert_eq!(kes.parse(".5").unwrap(), Amount::new(50));
    }

    #[test]
    fn parse_rejects_excess_precision_and_sign() {
        let kes = Currency::kes();
        assert!(kes.parse("1.234").is_err());
        assert!(kes.parse("-1").is_err());
        assert!(kes.parse("abc").is_err());
        assert!(kes.parse("").is_err());
        assert!(kes.parse(".").is_err());
    }

    #[test]
    fn format_pads_minor_digits() {
        let kes = Currency::kes();
        assert_eq!(kes.format(Amount::new(125_005)), "KES 1250.05");
        let whole = Currency::new("ugx", 0).unwrap();
        assert_eq!(whole.format(Amount::new(300)), "UGX 300");
    }

    #[test]
    fn currency_rejects_bad_config() {
        assert!(Currency::new("KES", 7).is_err());
        assert!(Currency::new("KE", 2).is_err());
    }

    #[test]
    fn total_for_detects_overflow() {
        assert_eq!(Amount::new(10).total_for(5).unwrap(), Amount::new(50));
        assert!(Amount::new(u64::MAX).total_for(2).is_err());
        // Past the persisted range without wrapping u64.
        assert!(Amount::new(1 << 62).total_for(2).is_err());
        assert_eq!(Amount::new(1 << 62).total_for(1).unwrap().minor(), 1 << 62);
    }

    #[test]
    fn arithmetic_stays_within_persisted_range() {
        assert_eq!(Amount::MAX.minor(), i64::MAX as u64);
        assert!(Amount::MAX.checked_add(Amount::new(1)).is_none());
        assert_eq!(Amount::MAX.checked_add(Amount::ZERO), Some(Amount::MAX));
        assert!(Amount::new(1 << 63).ensure_in_range().is_err());
        assert!(Amount::MAX.ensure_in_range().is_ok());
        assert!(Currency::kes().parse("92233720368547758.08").is_err());
        assert_eq!(
            Currency::kes().parse("92233720368547758.07").unwrap(),
            Amount::MAX
        );
    }
}
