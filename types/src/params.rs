//! Voting thresholds.
//!
//! Thresholds are kept in basis points so that "did this option reach the
//! threshold" is integer arithmetic, never a floating-point comparison.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

const BPS_SCALE: u64 = 10_000;

/// A majority threshold in (0, 1], stored as basis points (1..=10_000).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(u32);

impl Threshold {
    /// Simple majority: 0.5.
    pub const HALF: Self = Self(5_000);

    pub fn from_bps(bps: u32) -> Result<Self, CoreError> {
        if bps == 0 || u64::from(bps) > BPS_SCALE {
            return Err(CoreError::Validation(format!(
                "threshold must be in (0, 1], got {bps} bps"
            )));
        }
        Ok(Self(bps))
    }

    /// Convert a fraction like `0.5` or `0.66`, rounded to the nearest basis point.
    pub fn from_fraction(fraction: f64) -> Result<Self, CoreError> {
        if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
            return Err(CoreError::Validation(format!(
                "threshold must be in (0, 1], got {fraction}"
            )));
        }
        Self::from_bps((fraction * BPS_SCALE as f64).round() as u32)
    }

    pub fn bps(&self) -> u32 {
        self.0
    }

    pub fn as_fraction(&self) -> f64 {
        f64::from(self.0) / BPS_SCALE as f64
    }

    /// Votes needed out of `eligible` to reach the threshold: `⌈T·E⌉`.
    pub fn required_votes(&self, eligible: u32) -> u32 {
        let numerator = u64::from(self.0) * u64::from(eligible);
        numerator.div_ceil(BPS_SCALE) as u32
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::HALF
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_fraction())
    }
}
