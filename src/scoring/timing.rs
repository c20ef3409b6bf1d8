// Timing sub-score
//
// Each cue is matched with the closest volume sample above the detection
// floor. The distance picks a window (perfect, good, ok) as a fraction of
// the base tolerance; a detected sound outside every window earns nothing,
// while a recording with no qualifying peak at all is penalised.

use serde::Serialize;

use crate::audio::VolumeSample;
use crate::catalog::Cue;
use crate::config::TimingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingClassification {
    Perfect,
    Good,
    Ok,
    /// A peak exists but lies outside the ok window
    Outside,
    /// No sample above the detection floor
    Missed,
}

/// Timing result of one cue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CueTiming {
    pub cue_time: f32,
    /// Distance to the closest peak; `None` when nothing was detected
    pub time_diff: Option<f32>,
    pub classification: TimingClassification,
    /// Points after the cue's multiplier
    pub points: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingScore {
    /// 0..=100
    pub score: f32,
    pub cues: Vec<CueTiming>,
    /// Set when the default score was used instead of per-cue matching
    pub fallback: Option<TimingFallback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingFallback {
    NoCues,
    NoVolumeData,
}

/// Closest above-floor sample to `time`
pub fn closest_peak(time: f32, volume_data: &[VolumeSample], floor: f32) -> Option<f32> {
    volume_data
        .iter()
        .filter(|sample| sample.volume as f32 > floor)
        .map(|sample| (sample.time - time).abs())
        .fold(None, |best: Option<f32>, diff| match best {
            Some(b) if b <= diff => Some(b),
            _ => Some(diff),
        })
}

/// Classify one distance and return its unmultiplied points
pub fn classify(time_diff: Option<f32>, config: &TimingConfig) -> (TimingClassification, f32) {
    let base = config.base_points_per_cue;
    let tolerance = config.base_tolerance_secs;

    match time_diff {
        None => (
            TimingClassification::Missed,
            -base * config.miss_penalty_factor,
        ),
        Some(diff) if diff <= tolerance * config.perfect_window_factor => {
            (TimingClassification::Perfect, base)
        }
        Some(diff) if diff <= tolerance * config.good_window_factor => {
            (TimingClassification::Good, base * config.good_points_factor)
        }
        Some(diff) if diff <= tolerance * config.ok_window_factor => {
            (TimingClassification::Ok, base * config.ok_points_factor)
        }
        Some(_) => (TimingClassification::Outside, 0.0),
    }
}

pub fn timing_score(cues: &[Cue], volume_data: &[VolumeSample], config: &TimingConfig) -> TimingScore {
    if cues.is_empty() {
        return TimingScore {
            score: 100.0,
            cues: Vec::new(),
            fallback: Some(TimingFallback::NoCues),
        };
    }
    if volume_data.is_empty() {
        return TimingScore {
            score: config.no_volume_data_score.clamp(0.0, 100.0),
            cues: Vec::new(),
            fallback: Some(TimingFallback::NoVolumeData),
        };
    }

    let cue_results: Vec<CueTiming> = cues
        .iter()
        .map(|cue| {
            let time_diff = closest_peak(cue.time, volume_data, config.peak_detection_floor);
            let (classification, points) = classify(time_diff, config);
            CueTiming {
                cue_time: cue.time,
                time_diff,
                classification,
                points: points * cue.score_multiplier,
            }
        })
        .collect();

    let max_points = cues.len() as f32 * config.base_points_per_cue;
    let total: f32 = cue_results.iter().map(|cue| cue.points).sum();
    let score = if max_points > 0.0 {
        total / max_points * 100.0
    } else {
        50.0
    };

    TimingScore {
        score: score.clamp(0.0, 100.0),
        cues: cue_results,
        fallback: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ItemId, WeightedRange};

    fn cue(time: f32, multiplier: f32) -> Cue {
        let range = WeightedRange {
            min: 0.0,
            max: 100.0,
            weight: 1.0,
        };
        Cue {
            time,
            expected_type: ItemId::from("metal"),
            volume: range,
            pitch_variation: range,
            rhythm_expected: false,
            duration: range,
            score_multiplier: multiplier,
            description: String::new(),
        }
    }

    fn peak(time: f32, volume: u8) -> VolumeSample {
        VolumeSample { time, volume }
    }

    #[test]
    fn test_no_cues_is_perfect() {
        let result = timing_score(&[], &[], &TimingConfig::default());
        assert_eq!(result.score, 100.0);
        assert_eq!(result.fallback, Some(TimingFallback::NoCues));
    }

    #[test]
    fn test_no_volume_data_is_low_fixed_score() {
        let result = timing_score(&[cue(1.0, 1.0)], &[], &TimingConfig::default());
        assert_eq!(result.score, 30.0);
        assert_eq!(result.fallback, Some(TimingFallback::NoVolumeData));
    }

    #[test]
    fn test_perfect_peak_earns_full_points_times_multiplier() {
        let result = timing_score(
            &[cue(10.0, 1.2)],
            &[peak(9.0, 20), peak(10.05, 80), peak(11.0, 20)],
            &TimingConfig::default(),
        );
        assert_eq!(result.cues[0].classification, TimingClassification::Perfect);
        assert!((result.cues[0].points - 120.0).abs() < 1e-4);
        // 120 / 100 is clamped
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_window_boundaries() {
        let config = TimingConfig::default();
        // Windows at 0.18, 0.42 and 0.6 s
        let cases = [
            (Some(0.17), TimingClassification::Perfect, 100.0),
            (Some(0.3), TimingClassification::Good, 70.0),
            (Some(0.5), TimingClassification::Ok, 40.0),
            (Some(0.61), TimingClassification::Outside, 0.0),
            (None, TimingClassification::Missed, -20.0),
        ];
        for (diff, expected, points) in cases {
            let (classification, awarded) = classify(diff, &config);
            assert_eq!(classification, expected, "{:?}", diff);
            assert!((awarded - points).abs() < 1e-3, "{:?}", diff);
        }
    }

    #[test]
    fn test_samples_at_floor_are_not_peaks() {
        let result = timing_score(
            &[cue(1.0, 1.0)],
            &[peak(1.0, 35), peak(1.1, 30)],
            &TimingConfig::default(),
        );
        assert_eq!(result.cues[0].classification, TimingClassification::Missed);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_mixed_cues_are_normalised() {
        let cues = [cue(1.0, 1.0), cue(5.0, 1.0)];
        let samples = [peak(1.0, 90), peak(5.3, 90)];
        let result = timing_score(&cues, &samples, &TimingConfig::default());
        // 100 + 70 over 200
        assert!((result.score - 85.0).abs() < 1e-4);
    }

    #[test]
    fn test_score_improves_with_accuracy() {
        let config = TimingConfig::default();
        let cues = [cue(2.5, 1.2)];
        let mut previous = -1.0;
        for offset in [0.7, 0.5, 0.3, 0.02] {
            let score = timing_score(&cues, &[peak(2.5 + offset, 80)], &config).score;
            assert!(score >= previous);
            previous = score;
        }
        assert_eq!(previous, 100.0);
    }
}
