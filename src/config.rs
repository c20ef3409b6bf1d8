//! Configuration management for capture, analysis and scoring parameters
//!
//! This module provides runtime configuration loading from JSON files so
//! the tuning constants of the game (chunk cadence, analyser settings,
//! scoring weights, tolerance windows, bonus magnitudes) can be adjusted
//! without recompilation. Every section has a `Default` that reproduces
//! the shipped game balance.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub analysis: AnalysisConfig,
    pub scoring: ScoringConfig,
    pub game: GameRulesConfig,
    pub playback: PlaybackConfig,
}

/// Microphone capture and live analysis parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Recorder chunk interval in milliseconds
    pub chunk_interval_ms: u64,
    /// Live analysis tick period in milliseconds (one display refresh)
    pub frame_interval_ms: u64,
    /// Analyser FFT size; frequency snapshots have `fft_size / 2` bins
    pub fft_size: usize,
    /// Exponential smoothing applied between frequency snapshots
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Live volume = round(avg_byte / 255 * volume_scale + volume_offset)
    pub volume_scale: f32,
    pub volume_offset: f32,
    /// Number of pre-allocated blocks between the device callback and the recorder
    pub buffer_pool_size: usize,
    /// Capacity of each block in samples
    pub buffer_size: usize,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chunk_interval_ms: 100,
            frame_interval_ms: 16,
            fft_size: 2048,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            volume_scale: 200.0,
            volume_offset: -20.0,
            buffer_pool_size: 64,
            buffer_size: 2048,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Offline characteristics analysis parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Lower edge of the dB window mapped to volume 0
    pub min_db: f32,
    /// Upper edge of the dB window mapped to volume 100
    pub max_db: f32,
    /// Zero-crossing rate multiplier giving the 0-100 pitch variation proxy
    pub zcr_scale: f32,
    pub clarity_volume_weight: f32,
    pub clarity_peak_weight: f32,
    pub rhythm_min_duration_secs: f32,
    pub rhythm_min_samples: usize,
    pub rhythm_threshold_ratio: f32,
    pub rhythm_threshold_offset: f32,
    /// Peaks per second, exclusive bounds
    pub rhythm_min_density: f32,
    pub rhythm_max_density: f32,
    /// Recordings shorter than this are penalised by the simulated fallback
    pub short_recording_secs: f32,
    pub simulated: SimulatedAnalysisConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_db: -60.0,
            max_db: 0.0,
            zcr_scale: 500.0,
            clarity_volume_weight: 0.8,
            clarity_peak_weight: 0.2,
            rhythm_min_duration_secs: 0.5,
            rhythm_min_samples: 5,
            rhythm_threshold_ratio: 0.6,
            rhythm_threshold_offset: 20.0,
            rhythm_min_density: 1.5,
            rhythm_max_density: 8.0,
            short_recording_secs: 0.3,
            simulated: SimulatedAnalysisConfig::default(),
        }
    }
}

/// Ranges drawn by the simulated analysis fallback
///
/// Each value is `base + rand * spread`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedAnalysisConfig {
    pub volume_base: f32,
    pub volume_spread: f32,
    pub pitch_variation_base: f32,
    pub pitch_variation_spread: f32,
    pub clarity_base: f32,
    pub clarity_spread: f32,
    pub peak_base: f32,
    pub peak_spread: f32,
    pub zcr_spread: f32,
    /// Probability that rhythm is reported
    pub rhythm_probability: f64,
    /// Minimum reported duration
    pub min_duration_secs: f32,
}

impl Default for SimulatedAnalysisConfig {
    fn default() -> Self {
        Self {
            volume_base: 30.0,
            volume_spread: 60.0,
            pitch_variation_base: 20.0,
            pitch_variation_spread: 70.0,
            clarity_base: 40.0,
            clarity_spread: 50.0,
            peak_base: 0.1,
            peak_spread: 0.8,
            zcr_spread: 0.3,
            rhythm_probability: 0.5,
            min_duration_secs: 0.1,
        }
    }
}

/// Category weights of the composite score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub timing: f32,
    pub performance: f32,
    pub creativity: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            timing: 0.40,
            performance: 0.35,
            creativity: 0.25,
        }
    }
}

/// Timing sub-score parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Base tolerance in seconds; window factors are fractions of it
    pub base_tolerance_secs: f32,
    pub perfect_window_factor: f32,
    pub good_window_factor: f32,
    pub ok_window_factor: f32,
    pub base_points_per_cue: f32,
    /// Fraction of base points awarded in the good window
    pub good_points_factor: f32,
    /// Fraction of base points awarded in the ok window
    pub ok_points_factor: f32,
    /// Fraction of base points deducted when no peak exists at all
    pub miss_penalty_factor: f32,
    /// Volume samples strictly above this floor count as peaks
    pub peak_detection_floor: f32,
    /// Score for levels that have cues but no volume data
    pub no_volume_data_score: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            base_tolerance_secs: 0.6,
            perfect_window_factor: 0.3,
            good_window_factor: 0.7,
            ok_window_factor: 1.0,
            base_points_per_cue: 100.0,
            good_points_factor: 0.7,
            ok_points_factor: 0.4,
            miss_penalty_factor: 0.2,
            peak_detection_floor: 35.0,
            no_volume_data_score: 30.0,
        }
    }
}

/// Performance sub-score parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub volume_match_weight: f32,
    pub pitch_variation_match_weight: f32,
    pub duration_match_weight: f32,
    pub clarity_weight: f32,
    pub rhythm_bonus_points: f32,
    /// Range-match tolerance band in percent
    pub target_value_tolerance: f32,
    /// Extra tolerance applied to the duration match
    pub duration_tolerance_extra: f32,
    /// Exponent of the fall-off curve inside the tolerance band
    pub range_strictness: f32,
    /// Multiply the match weights by the cue's own per-feature weights
    pub apply_cue_feature_weights: bool,
    /// Score used when no weight is configured at all
    pub empty_weight_score: f32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            volume_match_weight: 0.30,
            pitch_variation_match_weight: 0.25,
            duration_match_weight: 0.25,
            clarity_weight: 0.20,
            rhythm_bonus_points: 15.0,
            target_value_tolerance: 25.0,
            duration_tolerance_extra: 10.0,
            range_strictness: 1.5,
            apply_cue_feature_weights: false,
            empty_weight_score: 50.0,
        }
    }
}

/// Creativity sub-score parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreativityConfig {
    pub item_fit_bonus: f32,
    pub combo_bonus_per_item: f32,
    pub wildness_max_bonus: f32,
    /// Both thresholds are exclusive
    pub wildness_min_pitch_variation: f32,
    pub wildness_min_volume: f32,
}

impl Default for CreativityConfig {
    fn default() -> Self {
        Self {
            item_fit_bonus: 30.0,
            combo_bonus_per_item: 10.0,
            wildness_max_bonus: 20.0,
            wildness_min_pitch_variation: 80.0,
            wildness_min_volume: 70.0,
        }
    }
}

/// Minimum score for each star tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StarThresholds {
    pub three: u32,
    pub two: u32,
    pub one: u32,
}

impl Default for StarThresholds {
    fn default() -> Self {
        Self {
            three: 90,
            two: 70,
            one: 50,
        }
    }
}

/// Scoring engine configuration
///
/// Passed into every scoring call; the engine keeps no constants of its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    pub timing: TimingConfig,
    pub performance: PerformanceConfig,
    pub creativity: CreativityConfig,
    pub star_thresholds: StarThresholds,
}

/// Gameplay limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRulesConfig {
    pub max_selected_items: usize,
    /// Recording is stopped automatically after this many seconds
    pub max_recording_secs: f32,
    /// An alert fires once when playback enters `[cue - lead, cue)`
    pub cue_alert_lead_secs: f32,
    /// A cue is "now" while playback is within this distance of it
    pub cue_now_window_secs: f32,
}

impl Default for GameRulesConfig {
    fn default() -> Self {
        Self {
            max_selected_items: 3,
            max_recording_secs: 90.0,
            cue_alert_lead_secs: 1.0,
            cue_now_window_secs: 0.25,
        }
    }
}

/// Review playback gain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub master_volume: f32,
    pub sfx_volume: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            master_volume: 0.8,
            sfx_volume: 0.7,
        }
    }
}

impl PlaybackConfig {
    /// Linear gain applied to every played-back sample
    pub fn gain(&self) -> f32 {
        (self.master_volume * self.sfx_volume).clamp(0.0, 1.0)
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults if the file does not exist
    /// or its JSON is invalid. Missing keys take their default values.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the bundled assets directory
    pub fn load() -> Self {
        Self::load_from_file("assets/foley_config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.capture.chunk_interval_ms, 100);
        assert_eq!(config.capture.fft_size, 2048);
        assert_eq!(config.analysis.zcr_scale, 500.0);
        assert_eq!(config.scoring.weights.timing, 0.40);
        assert_eq!(config.scoring.timing.base_points_per_cue, 100.0);
        assert_eq!(config.scoring.star_thresholds.three, 90);
        assert_eq!(config.game.max_selected_items, 3);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            parsed.scoring.performance.target_value_tolerance,
            config.scoring.performance.target_value_tolerance
        );
        assert_eq!(
            parsed.capture.smoothing_time_constant,
            config.capture.smoothing_time_constant
        );
    }

    #[test]
    fn test_partial_json_uses_defaults_for_missing_keys() {
        let json = r#"{ "scoring": { "weights": { "timing": 0.5 } } }"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.scoring.weights.timing, 0.5);
        assert_eq!(parsed.scoring.weights.performance, 0.35);
        assert_eq!(parsed.game.max_recording_secs, 90.0);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/foley_config.json");
        assert_eq!(config.capture.chunk_interval_ms, 100);
    }

    #[test]
    fn test_playback_gain() {
        let gain = PlaybackConfig::default().gain();
        assert!((gain - 0.56).abs() < 1e-6);
    }
}
