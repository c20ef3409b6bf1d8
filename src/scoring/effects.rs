// Purchased modifier effects
//
// An effect adds flat points to one score category when its condition
// holds for the measured features, and may widen the tolerance band of
// every range match in the performance score.

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Reverb,
    EqBassBoost,
    FilterVintage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusCategory {
    Performance,
    Creativity,
}

/// Activation condition over measured features; absent bounds always hold
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectCondition {
    #[serde(default)]
    pub clarity_min: Option<f32>,
    #[serde(default)]
    pub volume_min: Option<f32>,
    #[serde(default)]
    pub pitch_variation_max: Option<f32>,
}

impl EffectCondition {
    pub fn is_met(&self, analysis: &AnalysisResult) -> bool {
        self.clarity_min
            .map_or(true, |min| analysis.clarity as f32 >= min)
            && self
                .volume_min
                .map_or(true, |min| analysis.volume as f32 >= min)
            && self
                .pitch_variation_max
                .map_or(true, |max| analysis.pitch_variation as f32 <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasedEffect {
    /// Shop item the effect comes from
    pub id: String,
    pub kind: EffectKind,
    pub bonus_category: BonusCategory,
    pub bonus_points: f32,
    /// Percentage points added to the performance tolerance band
    #[serde(default)]
    pub performance_tolerance_boost: f32,
    #[serde(default)]
    pub condition: EffectCondition,
}

/// An effect that contributed to a score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedEffect {
    pub id: String,
    pub kind: EffectKind,
    pub category: BonusCategory,
    pub points: f32,
    pub tolerance_boost: f32,
}

/// Sum of tolerance boosts across all owned effects
pub fn tolerance_boost(effects: &[PurchasedEffect]) -> f32 {
    effects
        .iter()
        .map(|effect| effect.performance_tolerance_boost)
        .sum()
}

/// Flat bonus for one category, with the effects that granted it
pub fn category_bonus(
    effects: &[PurchasedEffect],
    category: BonusCategory,
    analysis: &AnalysisResult,
) -> (f32, Vec<AppliedEffect>) {
    let applied: Vec<AppliedEffect> = effects
        .iter()
        .filter(|effect| effect.bonus_category == category && effect.condition.is_met(analysis))
        .map(|effect| AppliedEffect {
            id: effect.id.clone(),
            kind: effect.kind,
            category,
            points: effect.bonus_points,
            tolerance_boost: 0.0,
        })
        .collect();
    let total = applied.iter().map(|effect| effect.points).sum();
    (total, applied)
}
