//! Score helpers shared by the scoring stages.
//!
//! Every externally visible score lives in `[0, 1]` and is rounded to four
//! decimals so results compare exactly across runs.

/// Clamp to `[0, 1]`, mapping NaN to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Round to four decimals
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Clamp to `[0, 1]` then round to four decimals
pub fn unit_score(value: f64) -> f64 {
    round4(clamp_unit(value))
}
