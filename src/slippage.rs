//! # Slippage & Price-Impact Policy
//!
//! Resolves the slippage tolerance a trade is allowed to incur and classifies
//! how alarming a tolerance (or a realized price impact) is. Pure policy; the
//! trade assembler consumes the resolved tolerance to size worst-case amounts.
//!
//! All tolerances are expressed in basis points (1 bps = 0.01%).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tolerance applied when neither a user override nor a heuristic is available.
pub const DEFAULT_SLIPPAGE_BPS: u32 = 50;

/// Above this, the tolerance deserves a visible warning.
pub const WARNING_THRESHOLD_BPS: u32 = 100;

/// Above this, the tolerance is treated as an outright configuration error.
pub const ERROR_THRESHOLD_BPS: u32 = 5_000;

/// Severity of a resolved tolerance or a realized price impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlippageFlag {
    Warning,
    TooHigh,
}

/// Outcome of tolerance resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlippageDecision {
    pub allowed_bps: u32,
    pub is_auto: bool,
    pub flag: Option<SlippageFlag>,
}

/// Caller-facing slippage preferences carried on quote arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlippageInput {
    /// Trust the engine to pick a tolerance.
    pub auto: bool,
    /// Explicit user tolerance in basis points; ignored when `auto` is set.
    pub user_override_bps: Option<u32>,
}

impl Default for SlippageInput {
    fn default() -> Self {
        Self {
            auto: true,
            user_override_bps: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlippagePolicy {
    default_bps: u32,
}

impl SlippagePolicy {
    pub fn new(default_bps: u32) -> Self {
        Self { default_bps }
    }

    /// Resolves the allowed tolerance.
    ///
    /// Auto mode (or a missing override) uses the heuristic, falling back to
    /// the configured default. Auto mode is trusted and unflagged unless it
    /// exceeds the hard error bound; manual overrides are classified against
    /// both thresholds.
    pub fn resolve(
        &self,
        auto: bool,
        user_override_bps: Option<u32>,
        heuristic_bps: Option<u32>,
    ) -> SlippageDecision {
        if auto || user_override_bps.is_none() {
            let allowed = heuristic_bps.unwrap_or(self.default_bps);
            let flag = (allowed > ERROR_THRESHOLD_BPS).then_some(SlippageFlag::TooHigh);
            return SlippageDecision {
                allowed_bps: allowed,
                is_auto: true,
                flag,
            };
        }

        let allowed = user_override_bps.unwrap_or(self.default_bps);
        SlippageDecision {
            allowed_bps: allowed,
            is_auto: false,
            flag: classify_bps(allowed),
        }
    }
}

impl Default for SlippagePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SLIPPAGE_BPS)
    }
}

/// Severity of a tolerance or realized price impact, in basis points.
pub fn classify_bps(bps: u32) -> Option<SlippageFlag> {
    if bps > ERROR_THRESHOLD_BPS {
        Some(SlippageFlag::TooHigh)
    } else if bps > WARNING_THRESHOLD_BPS {
        Some(SlippageFlag::Warning)
    } else {
        None
    }
}

/// Basis points as a decimal fraction (50 bps -> 0.005).
pub fn bps_to_fraction(bps: u32) -> Decimal {
    Decimal::from(bps) / Decimal::from(10_000u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn auto_uses_heuristic_then_default() {
        let policy = SlippagePolicy::default();
        let d = policy.resolve(true, Some(700), Some(25));
        assert_eq!(d.allowed_bps, 25);
        assert!(d.is_auto);
        assert_eq!(d.flag, None);

        let d = policy.resolve(true, None, None);
        assert_eq!(d.allowed_bps, DEFAULT_SLIPPAGE_BPS);
    }

    #[test]
    fn missing_override_behaves_like_auto() {
        let policy = SlippagePolicy::default();
        let d = policy.resolve(false, None, Some(40));
        assert!(d.is_auto);
        assert_eq!(d.allowed_bps, 40);
    }

    #[test]
    fn manual_override_is_classified() {
        let policy = SlippagePolicy::default();
        assert_eq!(policy.resolve(false, Some(50), None).flag, None);
        assert_eq!(
            policy.resolve(false, Some(150), None).flag,
            Some(SlippageFlag::Warning)
        );
        assert_eq!(
            policy.resolve(false, Some(5_100), None).flag,
            Some(SlippageFlag::TooHigh)
        );
    }

    #[test]
    fn auto_mode_flags_only_past_hard_bound() {
        let policy = SlippagePolicy::default();
        assert_eq!(policy.resolve(true, None, Some(400)).flag, None);
        assert_eq!(
            policy.resolve(true, None, Some(6_000)).flag,
            Some(SlippageFlag::TooHigh)
        );
    }

    #[test]
    fn fraction_conversion() {
        assert_eq!(bps_to_fraction(100), Decimal::from_str("0.01").unwrap());
        assert_eq!(bps_to_fraction(50), Decimal::from_str("0.005").unwrap());
    }
}
