// Range matching with a tolerance band
//
// 1.0 inside [min, max]; inside the band [min*(1-tol%), max*(1+tol%)] the
// score falls off as ((distance to band edge) / (band width)) ^ strictness;
// 0.0 beyond it.

/// Score returned when either the value or the target range is missing
pub const MISSING_VALUE_SCORE: f32 = 0.5;

/// Match `value` against `[min, max]`
///
/// # Arguments
/// * `tolerance` - Band width in percent of the range edges
/// * `strictness` - Exponent of the fall-off; higher is harsher
pub fn range_match_score(value: f32, min: f32, max: f32, tolerance: f32, strictness: f32) -> f32 {
    if !value.is_finite() || !min.is_finite() || !max.is_finite() {
        return MISSING_VALUE_SCORE;
    }
    if value >= min && value <= max {
        return 1.0;
    }

    let lower = min * (1.0 - tolerance / 100.0);
    let upper = max * (1.0 + tolerance / 100.0);

    if value < min && value >= lower {
        let width = min - lower;
        if width <= 0.0 {
            return 0.0;
        }
        return ((value - lower) / width).max(0.0).powf(strictness);
    }
    if value > max && value <= upper {
        let width = upper - max;
        if width <= 0.0 {
            return 0.0;
        }
        return ((upper - value) / width).max(0.0).powf(strictness);
    }
    0.0
}

/// [`range_match_score`] for optional inputs
pub fn range_match_opt(
    value: Option<f32>,
    range: Option<(f32, f32)>,
    tolerance: f32,
    strictness: f32,
) -> f32 {
    match (value, range) {
        (Some(value), Some((min, max))) => range_match_score(value, min, max, tolerance, strictness),
        _ => MISSING_VALUE_SCORE,
    }
}
