// Analysis module - offline characteristics of a finalized recording
//
// This module turns a RecordedAudio into the AnalysisResult the scoring
// engine consumes. It never fails: when no usable decoded buffer exists
// (decode failure, headerless format, zero or non-finite duration) it
// falls back to a simulated analysis so a bad take still produces a score.
//
// Pipeline:
// - features: RMS volume, peak amplitude, zero-crossing rate, clarity
// - rhythm: density of live volume peaks over the recording
// - classifier: selected-item profiles, band rules, random fallback
// - simulated: bounded random fallback

use rand::Rng;
use serde::Serialize;

use crate::audio::{RecordedAudio, VolumeSample, WaveformSample};
use crate::catalog::{Catalog, ItemId};
use crate::config::AnalysisConfig;

pub mod classifier;
pub mod features;
pub mod simulated;

pub use classifier::guess_audio_type;
use features::{detect_rhythm, SignalFeatures};
pub use simulated::simulate_analysis;

/// Acoustic characteristics of one recording
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Seconds
    pub duration: f32,
    /// 0..=100
    pub volume: u8,
    /// 0.0..=1.0
    pub peak_amplitude: f32,
    /// 0..=100, zero-crossing-rate proxy
    pub pitch_variation: u8,
    /// 0..=100
    pub clarity: u8,
    pub rhythm_detected: bool,
    pub estimated_type: ItemId,
    pub zero_crossing_rate: f32,
    pub raw_volume_data: Vec<VolumeSample>,
    pub raw_waveform_points: Vec<WaveformSample>,
    /// True when the values came from the simulated fallback
    pub simulated: bool,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            duration: 0.0,
            volume: 0,
            peak_amplitude: 0.0,
            pitch_variation: 0,
            clarity: 0,
            rhythm_detected: false,
            estimated_type: ItemId::from(classifier::UNKNOWN_TYPE),
            zero_crossing_rate: 0.0,
            raw_volume_data: Vec::new(),
            raw_waveform_points: Vec::new(),
            simulated: false,
        }
    }
}

/// Analyze a finalized recording
///
/// # Arguments
/// * `recorded` - Finalized artifact; its live series are copied into the result
/// * `selected` - Item ids the player selected, in selection order
/// * `catalog` - Source of item profiles for classification
/// * `config` - Analysis constants
/// * `rng` - Random source for the simulated fallback and the classifier's last resort
pub fn analyze_characteristics<R: Rng + ?Sized>(
    recorded: &RecordedAudio,
    selected: &[ItemId],
    catalog: &Catalog,
    config: &AnalysisConfig,
    rng: &mut R,
) -> AnalysisResult {
    if let Some(warning) = &recorded.decode_warning {
        log::warn!("[Analysis] Analysis may be incomplete: {}", warning);
    }

    let buffer = match &recorded.buffer {
        Some(buffer) => buffer,
        None => {
            return simulate_analysis(
                selected,
                recorded.duration,
                &recorded.volume_data,
                catalog,
                config,
                rng,
            );
        }
    };

    let duration = buffer.duration();
    if duration <= 0.0 || !duration.is_finite() {
        log::warn!("[Analysis] Decoded buffer has no usable duration");
        let fallback = if recorded.duration > 0.0 {
            recorded.duration
        } else {
            config.simulated.min_duration_secs
        };
        return simulate_analysis(
            selected,
            fallback,
            &recorded.volume_data,
            catalog,
            config,
            rng,
        );
    }

    let features = SignalFeatures::extract(&buffer.samples, config);
    let rhythm_detected = detect_rhythm(&recorded.volume_data, duration, features.volume, config);
    let estimated_type = guess_audio_type(
        selected,
        features.volume as f32,
        features.pitch_variation as f32,
        Some(features.zero_crossing_rate),
        catalog,
        rng,
    );

    log::info!(
        "[Analysis] duration={:.2}s volume={} pitch_variation={} clarity={} rhythm={} type={}",
        duration,
        features.volume,
        features.pitch_variation,
        features.clarity,
        rhythm_detected,
        estimated_type
    );

    AnalysisResult {
        duration,
        volume: features.volume,
        peak_amplitude: features.peak_amplitude,
        pitch_variation: features.pitch_variation,
        clarity: features.clarity,
        rhythm_detected,
        estimated_type,
        zero_crossing_rate: features.zero_crossing_rate,
        raw_volume_data: recorded.volume_data.clone(),
        raw_waveform_points: recorded.waveform_points.clone(),
        simulated: false,
    }
}
