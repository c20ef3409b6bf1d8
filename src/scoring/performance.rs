// Performance sub-score
//
// Weighted blend of range matches for volume, pitch variation and duration
// against one target, plus a clarity term, a rhythm bonus and effect
// bonuses. Bonuses are added to the weighted total before it is divided by
// the weight sum.

use serde::Serialize;

use super::effects::{category_bonus, tolerance_boost, AppliedEffect, BonusCategory, PurchasedEffect};
use super::range_match::range_match_score;
use crate::analysis::AnalysisResult;
use crate::catalog::{Catalog, Cue, ItemId, PerformanceTarget};
use crate::config::PerformanceConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceScore {
    /// 0..=100
    pub score: f32,
    /// Range matches in percent; `None` without a target
    pub volume_match: Option<f32>,
    pub pitch_variation_match: Option<f32>,
    pub duration_match: Option<f32>,
    pub clarity: f32,
    pub rhythm_bonus: f32,
    pub effect_bonus: f32,
    /// Tolerance in percent used for this pass
    pub tolerance: f32,
}

/// First cue of the level, else the profile of the first selected item
pub fn performance_target(
    cues: &[Cue],
    selected: &[ItemId],
    catalog: &Catalog,
) -> Option<PerformanceTarget> {
    match cues.first() {
        Some(cue) => Some(PerformanceTarget::from(cue)),
        None => selected
            .first()
            .and_then(|id| catalog.profile(id.as_str()))
            .map(PerformanceTarget::from),
    }
}

pub fn performance_score(
    analysis: &AnalysisResult,
    target: Option<&PerformanceTarget>,
    cues: &[Cue],
    effects: &[PurchasedEffect],
    config: &PerformanceConfig,
) -> (PerformanceScore, Vec<AppliedEffect>) {
    let tolerance = config.target_value_tolerance + tolerance_boost(effects);
    let strictness = config.range_strictness;

    let mut total = 0.0;
    let mut weight_sum = 0.0;
    let mut detail = PerformanceScore {
        score: 0.0,
        volume_match: None,
        pitch_variation_match: None,
        duration_match: None,
        clarity: analysis.clarity as f32,
        rhythm_bonus: 0.0,
        effect_bonus: 0.0,
        tolerance,
    };

    match target {
        Some(target) => {
            let feature_weight = |weight: f32| {
                if config.apply_cue_feature_weights {
                    weight
                } else {
                    1.0
                }
            };

            let volume = range_match_score(
                analysis.volume as f32,
                target.volume.min,
                target.volume.max,
                tolerance,
                strictness,
            ) * 100.0;
            let weight = config.volume_match_weight * feature_weight(target.volume.weight);
            total += volume * weight;
            weight_sum += weight;
            detail.volume_match = Some(volume);

            let pitch = range_match_score(
                analysis.pitch_variation as f32,
                target.pitch_variation.min,
                target.pitch_variation.max,
                tolerance,
                strictness,
            ) * 100.0;
            let weight =
                config.pitch_variation_match_weight * feature_weight(target.pitch_variation.weight);
            total += pitch * weight;
            weight_sum += weight;
            detail.pitch_variation_match = Some(pitch);

            let duration = range_match_score(
                analysis.duration,
                target.duration.min,
                target.duration.max,
                tolerance + config.duration_tolerance_extra,
                strictness,
            ) * 100.0;
            let weight = config.duration_match_weight * feature_weight(target.duration.weight);
            total += duration * weight;
            weight_sum += weight;
            detail.duration_match = Some(duration);
        }
        None => {
            // Clarity stands in for the three match terms
            let weight = config.volume_match_weight
                + config.pitch_variation_match_weight
                + config.duration_match_weight;
            total += analysis.clarity as f32 * weight;
            weight_sum += weight;
        }
    }

    total += analysis.clarity as f32 * config.clarity_weight;
    weight_sum += config.clarity_weight;

    let rhythm_expected = target.is_some_and(|t| t.rhythm_expected)
        || cues.iter().any(|cue| cue.rhythm_expected);
    if analysis.rhythm_detected && rhythm_expected {
        total += config.rhythm_bonus_points;
        detail.rhythm_bonus = config.rhythm_bonus_points;
    }

    let (effect_bonus, mut applied) = category_bonus(effects, BonusCategory::Performance, analysis);
    total += effect_bonus;
    detail.effect_bonus = effect_bonus;

    applied.extend(
        effects
            .iter()
            .filter(|effect| effect.performance_tolerance_boost != 0.0)
            .map(|effect| AppliedEffect {
                id: effect.id.clone(),
                kind: effect.kind,
                category: BonusCategory::Performance,
                points: 0.0,
                tolerance_boost: effect.performance_tolerance_boost,
            }),
    );

    let score = if weight_sum > 0.0 {
        total / weight_sum
    } else {
        config.empty_weight_score
    };
    detail.score = score.clamp(0.0, 100.0);

    (detail, applied)
}
