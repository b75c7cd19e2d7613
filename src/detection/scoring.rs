//! Risk aggregation
//!
//! Combines detector verdicts into one bounded score and a suspicious flag.
//! Deterministic: fixed signals and fixed weights always produce the same
//! result.

use super::Signal;
use crate::config::RiskConfig;

/// Maximum risk score; totals are clamped to [0, MAX_RISK_SCORE].
pub const MAX_RISK_SCORE: u8 = 100;

/// Aggregate fired signals into `(score, suspicious)`.
///
/// The score starts at the configured base and accumulates one weight per
/// fired signal. The suspicious flag is purely qualitative: true iff any
/// signal fired, independent of the numeric score, so retuned weights never
/// silence the verdict.
pub fn score(config: &RiskConfig, signals: &[Signal]) -> (u8, bool) {
    let total: u32 = signals
        .iter()
        .map(|s| u32::from(s.weight(&config.weights)))
        .sum::<u32>()
        + u32::from(config.weights.base_score);

    let clamped = total.min(u32::from(MAX_RISK_SCORE)) as u8;
    (clamped, !signals.is_empty())
}
