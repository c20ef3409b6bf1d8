// Scoring engine
//
// Pure with respect to its inputs: every constant comes from ScoringConfig
// and the only randomness (the wildness bonus) is drawn from the caller's
// Rng. The caller gates on a non-empty recording before scoring.

use rand::Rng;
use serde::Serialize;

use crate::analysis::AnalysisResult;
use crate::catalog::{Catalog, Cue, ItemId};
use crate::config::ScoringConfig;

pub mod creativity;
pub mod effects;
pub mod performance;
pub mod range_match;
pub mod stars;
pub mod timing;

pub use creativity::CreativityScore;
pub use effects::{AppliedEffect, BonusCategory, EffectCondition, EffectKind, PurchasedEffect};
pub use performance::PerformanceScore;
pub use range_match::range_match_score;
pub use stars::{stars_for, ScoreComment};
pub use timing::{CueTiming, TimingClassification, TimingScore};

/// Inputs of one scoring pass besides the analysis
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub cues: &'a [Cue],
    pub selected: &'a [ItemId],
    pub effects: &'a [PurchasedEffect],
    /// Item profiles used when a level has no cues
    pub catalog: &'a Catalog,
    pub config: &'a ScoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// Weighted composite, 0..=100
    pub score: u8,
    pub stars: u8,
    pub comment: ScoreComment,
    pub timing: TimingScore,
    pub performance: PerformanceScore,
    pub creativity: CreativityScore,
    pub applied_effects: Vec<AppliedEffect>,
}

impl ScoreBreakdown {
    /// Cue-level timing results
    pub fn cues(&self) -> &[CueTiming] {
        &self.timing.cues
    }
}

/// Weighted composite of the three sub-scores, rounded and clamped
pub fn composite_score(timing: f32, performance: f32, creativity: f32, config: &ScoringConfig) -> u8 {
    let weights = &config.weights;
    let total =
        timing * weights.timing + performance * weights.performance + creativity * weights.creativity;
    if !total.is_finite() {
        return 0;
    }
    total.clamp(0.0, 100.0).round() as u8
}

/// Score an analyzed recording
pub fn compute_score<R: Rng + ?Sized>(
    analysis: &AnalysisResult,
    ctx: &ScoringContext<'_>,
    rng: &mut R,
) -> ScoreBreakdown {
    let config = ctx.config;

    let timing = timing::timing_score(ctx.cues, &analysis.raw_volume_data, &config.timing);

    let target = performance::performance_target(ctx.cues, ctx.selected, ctx.catalog);
    let (performance, mut applied_effects) = performance::performance_score(
        analysis,
        target.as_ref(),
        ctx.cues,
        ctx.effects,
        &config.performance,
    );

    let (creativity, creative_effects) = creativity::creativity_score(
        analysis,
        ctx.selected,
        ctx.effects,
        &config.creativity,
        rng,
    );
    applied_effects.extend(creative_effects);

    let score = composite_score(timing.score, performance.score, creativity.score, config);
    let stars = stars_for(score, &config.star_thresholds);

    log::info!(
        "[Scoring] timing={:.1} performance={:.1} creativity={:.1} total={} stars={}",
        timing.score,
        performance.score,
        creativity.score,
        score,
        stars
    );
    for effect in &applied_effects {
        log::debug!("[Scoring] Effect {} applied to {:?}", effect.id, effect.category);
    }

    ScoreBreakdown {
        score,
        stars,
        comment: ScoreComment::from_stars(stars),
        timing,
        performance,
        creativity,
        applied_effects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::VolumeSample;
    use crate::catalog::WeightedRange;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn metal_cue() -> Cue {
        Cue {
            time: 2.5,
            expected_type: ItemId::from("metal"),
            volume: WeightedRange {
                min: 70.0,
                max: 100.0,
                weight: 1.0,
            },
            pitch_variation: WeightedRange {
                min: 0.0,
                max: 50.0,
                weight: 1.0,
            },
            rhythm_expected: false,
            duration: WeightedRange {
                min: 0.2,
                max: 3.0,
                weight: 1.0,
            },
            score_multiplier: 1.2,
            description: String::new(),
        }
    }

    fn analysis_with_peak(peak_time: f32) -> AnalysisResult {
        AnalysisResult {
            duration: 3.0,
            volume: 85,
            pitch_variation: 30,
            clarity: 70,
            estimated_type: ItemId::from("metal"),
            raw_volume_data: vec![
                VolumeSample { time: 0.0, volume: 10 },
                VolumeSample {
                    time: peak_time,
                    volume: 90,
                },
            ],
            simulated: true,
            ..AnalysisResult::default()
        }
    }

    fn score(analysis: &AnalysisResult, cues: &[Cue], seed: u64) -> ScoreBreakdown {
        let catalog = Catalog::builtin();
        let config = ScoringConfig::default();
        let selected = [ItemId::from("metal")];
        let ctx = ScoringContext {
            cues,
            selected: &selected,
            effects: &[],
            catalog: &catalog,
            config: &config,
        };
        compute_score(analysis, &ctx, &mut StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_single_metal_cue_scenario() {
        let cues = [metal_cue()];
        let result = score(&analysis_with_peak(2.52), &cues, 1);
        assert_eq!(result.timing.score, 100.0);
        assert_eq!(result.cues()[0].classification, TimingClassification::Perfect);
        assert!((result.cues()[0].points - 120.0).abs() < 1e-3);
        // performance 100*0.8 + 70*0.2 = 94, creativity 30
        assert!((result.performance.score - 94.0).abs() < 1e-3);
        assert_eq!(result.creativity.score, 30.0);
        assert_eq!(result.score, 80);
        assert_eq!(result.stars, 2);
    }

    #[test]
    fn test_composite_grows_with_timing_accuracy() {
        let cues = [metal_cue()];
        let mut previous = 0;
        for peak in [4.0, 3.0, 2.85, 2.7, 2.52] {
            let result = score(&analysis_with_peak(peak), &cues, 1);
            assert!(result.score >= previous, "{} at {}", result.score, peak);
            previous = result.score;
        }
    }

    #[test]
    fn test_identical_inputs_give_identical_scores() {
        let cues = [metal_cue()];
        let mut wild = analysis_with_peak(2.6);
        wild.pitch_variation = 90;
        wild.volume = 95;
        let a = score(&wild, &cues, 99);
        let b = score(&wild, &cues, 99);
        assert_eq!(a, b);
    }

    #[test]
    fn test_level_without_cues_scores_full_timing() {
        let result = score(&analysis_with_peak(1.0), &[], 1);
        assert_eq!(result.timing.score, 100.0);
        // Target falls back to the metal profile
        assert!(result.performance.volume_match.is_some());
    }

    #[test]
    fn test_composite_is_clamped_and_rounded() {
        let config = ScoringConfig::default();
        assert_eq!(composite_score(100.0, 100.0, 100.0, &config), 100);
        assert_eq!(composite_score(0.0, 0.0, 0.0, &config), 0);
        assert_eq!(composite_score(50.0, 51.0, 50.0, &config), 50);
        assert_eq!(composite_score(f32::NAN, 0.0, 0.0, &config), 0);
    }
}
