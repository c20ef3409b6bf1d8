// Features - time-domain measurements of a decoded recording
//
// Everything here works on the first channel of the decoded buffer and
// produces the 0-100 scales the scoring engine consumes. The pitch
// variation value is a zero-crossing-rate heuristic: it tracks how noisy or
// high-pitched a sound is, it does not estimate a fundamental frequency.

use crate::audio::VolumeSample;
use crate::config::AnalysisConfig;

/// Measurements of one decoded buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalFeatures {
    /// 0..=100
    pub volume: u8,
    /// 0.0..=1.0
    pub peak_amplitude: f32,
    /// Sign changes per adjacent sample pair
    pub zero_crossing_rate: f32,
    /// 0..=100
    pub pitch_variation: u8,
    /// 0..=100
    pub clarity: u8,
}

impl SignalFeatures {
    pub fn extract(samples: &[f32], config: &AnalysisConfig) -> Self {
        let volume = volume_from_rms(rms(samples), config.min_db, config.max_db);
        let peak_amplitude = peak_amplitude(samples);
        let zero_crossing_rate = zero_crossing_rate(samples);
        let pitch_variation = pitch_variation_from_zcr(zero_crossing_rate, config.zcr_scale);
        let clarity = clarity(volume, peak_amplitude, config);

        Self {
            volume,
            peak_amplitude,
            zero_crossing_rate,
            pitch_variation,
            clarity,
        }
    }
}

/// Root-mean-square amplitude
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_of_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_of_squares / samples.len() as f64).sqrt() as f32
}

/// Map RMS onto 0-100 through a linear dB window
///
/// Silence (RMS of zero) maps to 0 instead of negative infinity.
pub fn volume_from_rms(rms: f32, min_db: f32, max_db: f32) -> u8 {
    if rms <= 0.0 || !rms.is_finite() || max_db <= min_db {
        return 0;
    }
    let db = 20.0 * rms.log10();
    let normalized = (db - min_db) / (max_db - min_db) * 100.0;
    normalized.clamp(0.0, 100.0).round() as u8
}

pub fn peak_amplitude(samples: &[f32]) -> f32 {
    samples
        .iter()
        .fold(0.0f32, |peak, &s| peak.max(s.abs()))
        .min(1.0)
}

/// Fraction of adjacent sample pairs whose sign differs
///
/// Zero counts as positive, so a signal resting at zero never crosses.
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] < 0.0) != (pair[1] < 0.0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

pub fn pitch_variation_from_zcr(zcr: f32, scale: f32) -> u8 {
    let value = zcr * scale;
    if !value.is_finite() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

pub fn clarity(volume: u8, peak_amplitude: f32, config: &AnalysisConfig) -> u8 {
    let value = volume as f32 * config.clarity_volume_weight
        + peak_amplitude * 100.0 * config.clarity_peak_weight;
    value.clamp(0.0, 100.0).round() as u8
}

/// Whether the live volume series looks rhythmic
///
/// Counts series samples above a threshold that rises with the overall
/// volume, and accepts the recording when that count per second falls
/// strictly inside the configured density band.
pub fn detect_rhythm(
    volume_data: &[VolumeSample],
    duration: f32,
    volume: u8,
    config: &AnalysisConfig,
) -> bool {
    if volume_data.len() <= config.rhythm_min_samples || duration <= config.rhythm_min_duration_secs
    {
        return false;
    }

    let threshold = volume as f32 * config.rhythm_threshold_ratio + config.rhythm_threshold_offset;
    let peaks = volume_data
        .iter()
        .filter(|sample| sample.volume as f32 > threshold)
        .count();
    let density = peaks as f32 / duration;

    density > config.rhythm_min_density && density < config.rhythm_max_density
}

/// Volume series of a decoded buffer, one sample per `interval_ms` window
///
/// Stands in for the live series when a recording comes from a file.
pub fn volume_envelope(
    samples: &[f32],
    sample_rate: u32,
    interval_ms: u64,
    config: &AnalysisConfig,
) -> Vec<VolumeSample> {
    let window = (sample_rate as u64 * interval_ms.max(1) / 1000).max(1) as usize;
    samples
        .chunks(window)
        .enumerate()
        .map(|(index, chunk)| VolumeSample {
            time: (index * window) as f32 / sample_rate.max(1) as f32,
            volume: volume_from_rms(rms(chunk), config.min_db, config.max_db),
        })
        .collect()
}
