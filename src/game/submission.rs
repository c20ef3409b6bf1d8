// Submission: gate, analysis, scoring and rewards
//
// The gate runs before anything else so an empty recording, a bad item
// selection or a busy session never reaches the analyzer or the scoring
// engine.

use rand::Rng;
use serde::Serialize;

use crate::analysis::{analyze_characteristics, AnalysisResult};
use crate::audio::RecordedAudio;
use crate::catalog::{Catalog, ItemId, Level, LevelRewards, PlayerLevel};
use crate::config::AppConfig;
use crate::error::{log_submission_error, SubmissionError};
use crate::scoring::{compute_score, ScoreBreakdown, ScoringContext};

use super::progress::{LevelCompletion, PlayerProgress};

/// Preconditions checked before any analysis
#[derive(Debug, Clone, Copy)]
pub struct SubmissionGate {
    max_selected_items: usize,
}

impl SubmissionGate {
    pub fn new(max_selected_items: usize) -> Self {
        Self { max_selected_items }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.game.max_selected_items)
    }

    /// Return the recording when a submission may proceed
    pub fn check<'a>(
        &self,
        recording: Option<&'a RecordedAudio>,
        selected: &[ItemId],
        busy: bool,
        catalog: &Catalog,
    ) -> Result<&'a RecordedAudio, SubmissionError> {
        if busy {
            return Err(SubmissionError::Busy);
        }
        let recording = match recording {
            Some(recording) if !recording.is_empty() => recording,
            _ => return Err(SubmissionError::EmptyRecording),
        };
        if selected.is_empty() {
            return Err(SubmissionError::NoItemsSelected);
        }
        if selected.len() > self.max_selected_items {
            return Err(SubmissionError::TooManyItems {
                max: self.max_selected_items,
                selected: selected.len(),
            });
        }
        if let Some(unknown) = selected.iter().find(|id| !catalog.contains_item(id.as_str())) {
            return Err(SubmissionError::UnknownItem {
                id: unknown.to_string(),
            });
        }
        Ok(recording)
    }
}

/// Inspiration earned for a score: `round(base + score / 100 * multiplier * 100)`
pub fn inspiration_points(score: u8, rewards: &LevelRewards) -> u32 {
    let earned = rewards.base_inspiration_points as f32
        + score as f32 / 100.0 * rewards.inspiration_multiplier * 100.0;
    earned.max(0.0).round() as u32
}

/// Everything one submission produced
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub level_id: String,
    pub analysis: AnalysisResult,
    pub breakdown: ScoreBreakdown,
    pub inspiration_earned: u32,
    pub completion: LevelCompletion,
    /// Rank reached by this submission, if any
    pub level_up: Option<PlayerLevel>,
}

/// Inputs of one submission
pub struct Submission<'a> {
    pub level: &'a Level,
    pub recording: Option<&'a RecordedAudio>,
    pub selected: &'a [ItemId],
    /// Recording or playback in progress
    pub busy: bool,
}

/// Gate, analyze, score and update progress
pub fn submit_dubbing<R: Rng + ?Sized>(
    submission: Submission<'_>,
    progress: &mut PlayerProgress,
    catalog: &Catalog,
    config: &AppConfig,
    rng: &mut R,
) -> Result<SubmissionOutcome, SubmissionError> {
    let level = submission.level;
    let span = tracing::info_span!("submit_dubbing", level = %level.id);
    let _enter = span.enter();

    let gate = SubmissionGate::from_config(config);
    let recording = gate
        .check(submission.recording, submission.selected, submission.busy, catalog)
        .map_err(|err| {
            log_submission_error(&err, "submit_dubbing");
            err
        })?;

    let analysis = analyze_characteristics(
        recording,
        submission.selected,
        catalog,
        &config.analysis,
        rng,
    );

    let effects = catalog.effects_for(&progress.purchased);
    let ctx = ScoringContext {
        cues: &level.cues,
        selected: submission.selected,
        effects: &effects,
        catalog,
        config: &config.scoring,
    };
    let breakdown = compute_score(&analysis, &ctx, rng);

    let inspiration_earned = inspiration_points(breakdown.score, &level.rewards);
    let completion = progress.complete_level(level, breakdown.score, breakdown.stars, catalog);
    let level_up = progress.add_inspiration(inspiration_earned as i64, catalog);

    tracing::info!(
        score = breakdown.score,
        stars = breakdown.stars,
        inspiration = inspiration_earned,
        simulated = analysis.simulated,
        "submission scored"
    );

    Ok(SubmissionOutcome {
        level_id: level.id.clone(),
        analysis,
        breakdown,
        inspiration_earned,
        completion,
        level_up,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::finalizer::{finalize_recording, FinalizeRequest};
    use crate::audio::{RecordingFormat, VolumeSample};
    use crate::testing::Signal;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn recording(secs: f32) -> RecordedAudio {
        let samples = Signal::default().render(8_000, secs);
        finalize_recording(FinalizeRequest {
            chunks: if samples.is_empty() { Vec::new() } else { vec![samples] },
            sample_rate: 8_000,
            format: RecordingFormat::WavFloat,
            volume_data: vec![
                VolumeSample { time: 0.0, volume: 10 },
                VolumeSample { time: 2.5, volume: 90 },
            ],
            waveform_points: Vec::new(),
            chunk_interval_ms: 100,
        })
        .unwrap()
    }

    fn ids(list: &[&str]) -> Vec<ItemId> {
        list.iter().map(|&id| ItemId::from(id)).collect()
    }

    #[test]
    fn test_gate_order() {
        let catalog = Catalog::builtin();
        let gate = SubmissionGate::new(3);
        let audio = recording(0.5);
        let empty = recording(0.0);
        assert!(empty.is_empty());

        assert_eq!(
            gate.check(Some(&audio), &ids(&["metal"]), true, &catalog).unwrap_err(),
            SubmissionError::Busy
        );
        assert_eq!(
            gate.check(None, &ids(&["metal"]), false, &catalog).unwrap_err(),
            SubmissionError::EmptyRecording
        );
        assert_eq!(
            gate.check(Some(&empty), &ids(&["metal"]), false, &catalog).unwrap_err(),
            SubmissionError::EmptyRecording
        );
        assert_eq!(
            gate.check(Some(&audio), &[], false, &catalog).unwrap_err(),
            SubmissionError::NoItemsSelected
        );
        assert_eq!(
            gate.check(Some(&audio), &ids(&["metal", "paper", "water", "wood"]), false, &catalog)
                .unwrap_err(),
            SubmissionError::TooManyItems { max: 3, selected: 4 }
        );
        assert_eq!(
            gate.check(Some(&audio), &ids(&["kazoo"]), false, &catalog).unwrap_err(),
            SubmissionError::UnknownItem { id: "kazoo".to_string() }
        );
        assert!(gate.check(Some(&audio), &ids(&["metal"]), false, &catalog).is_ok());
    }

    #[test]
    fn test_inspiration_points() {
        let rewards = LevelRewards {
            base_inspiration_points: 120,
            inspiration_multiplier: 0.75,
        };
        assert_eq!(inspiration_points(0, &rewards), 120);
        assert_eq!(inspiration_points(100, &rewards), 195);
        assert_eq!(inspiration_points(80, &rewards), 180);
    }

    #[test]
    fn test_empty_recording_is_never_scored() {
        let catalog = Catalog::builtin();
        let config = AppConfig::default();
        let level = catalog.level("level_001").unwrap();
        let empty = recording(0.0);
        let mut progress = PlayerProgress::new();

        let result = submit_dubbing(
            Submission {
                level,
                recording: Some(&empty),
                selected: &ids(&["metal"]),
                busy: false,
            },
            &mut progress,
            &catalog,
            &config,
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(result.unwrap_err(), SubmissionError::EmptyRecording);
        // Nothing was recorded against the level
        assert!(progress.record("level_001").is_none());
        assert_eq!(progress.inspiration, 0);
    }

    #[test]
    fn test_submission_updates_progress() {
        let catalog = Catalog::builtin();
        let config = AppConfig::default();
        let level = catalog.level("level_001").unwrap();
        let audio = recording(3.0);
        let mut progress = PlayerProgress::new();

        let outcome = submit_dubbing(
            Submission {
                level,
                recording: Some(&audio),
                selected: &ids(&["metal"]),
                busy: false,
            },
            &mut progress,
            &catalog,
            &config,
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap();

        assert!(!outcome.analysis.simulated);
        assert_eq!(outcome.completion.reward_item, Some(ItemId::from("wood")));
        assert_eq!(progress.inspiration, outcome.inspiration_earned);
        assert_eq!(
            progress.record("level_001").unwrap().best_score,
            outcome.breakdown.score
        );
    }
}
