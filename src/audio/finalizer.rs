// Recording finalizer
//
// Turns the chunks of one recording attempt into an immutable RecordedAudio:
// encode into the negotiated container, derive a playable reference, try to
// decode the bytes back into a sample buffer, and pick the best available
// duration (decoded buffer, then last live volume timestamp, then chunk
// count times chunk interval).
//
// Decode failure is not an error: the artifact is returned without a buffer
// and with `decode_warning` set, and analysis falls back to simulation.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::Serialize;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::format::RecordingFormat;
use super::live::{VolumeSample, WaveformSample};
use crate::error::CaptureError;

static RECORDING_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Decoded mono samples
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedBuffer {
    #[serde(skip)]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedBuffer {
    pub fn duration(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// A finalized recording
///
/// Owned copies only; nothing here refers back to the capture session.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedAudio {
    #[serde(skip)]
    pub bytes: Arc<[u8]>,
    pub format: RecordingFormat,
    /// Playable reference
    pub url: String,
    /// Seconds, never negative
    pub duration: f32,
    /// Byte length of `bytes`
    pub size: usize,
    pub buffer: Option<DecodedBuffer>,
    pub volume_data: Vec<VolumeSample>,
    pub waveform_points: Vec<WaveformSample>,
    /// Set when decoding failed and analysis may be incomplete
    pub decode_warning: Option<String>,
}

impl RecordedAudio {
    /// A zero-size artifact is a failed recording and must not be scored
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Inputs of one finalization
pub struct FinalizeRequest {
    pub chunks: Vec<Vec<f32>>,
    pub sample_rate: u32,
    pub format: RecordingFormat,
    pub volume_data: Vec<VolumeSample>,
    pub waveform_points: Vec<WaveformSample>,
    pub chunk_interval_ms: u64,
}

/// Assemble the chunks of one attempt into a [`RecordedAudio`]
pub fn finalize_recording(request: FinalizeRequest) -> Result<RecordedAudio, CaptureError> {
    let FinalizeRequest {
        chunks,
        sample_rate,
        format,
        volume_data,
        waveform_points,
        chunk_interval_ms,
    } = request;

    let samples: Vec<f32> = chunks.iter().flatten().copied().collect();
    let url = next_url(format);

    if samples.is_empty() {
        log::warn!("[Finalizer] Recording is empty (0 bytes)");
        return Ok(RecordedAudio {
            bytes: Arc::from(Vec::new()),
            format,
            url,
            duration: 0.0,
            size: 0,
            buffer: None,
            volume_data: Vec::new(),
            waveform_points: Vec::new(),
            decode_warning: None,
        });
    }

    let bytes = encode(&samples, sample_rate, format)?;
    let size = bytes.len();

    let (buffer, decode_warning) = match decode(&bytes, format) {
        Ok(buffer) if buffer.duration() > 0.0 && buffer.duration().is_finite() => {
            (Some(buffer), None)
        }
        Ok(_) => (None, Some("decoded buffer has no duration".to_string())),
        Err(reason) => {
            log::warn!(
                "[Finalizer] Could not decode {} recording, analysis may be incomplete: {}",
                format,
                reason
            );
            (None, Some(reason))
        }
    };

    let duration = match &buffer {
        Some(buffer) => buffer.duration(),
        None => estimate_duration(&volume_data, chunks.len(), chunk_interval_ms),
    };

    log::info!(
        "[Finalizer] Finalized {} ({} bytes, {:.2}s)",
        url,
        size,
        duration
    );

    Ok(RecordedAudio {
        bytes: Arc::from(bytes),
        format,
        url,
        duration: duration.max(0.0),
        size,
        buffer,
        volume_data,
        waveform_points,
        decode_warning,
    })
}

/// Duration used when no decoded buffer is available
pub fn estimate_duration(
    volume_data: &[VolumeSample],
    chunk_count: usize,
    chunk_interval_ms: u64,
) -> f32 {
    match volume_data.last() {
        Some(last) => last.time,
        None => (chunk_count as u64 * chunk_interval_ms) as f32 / 1000.0,
    }
}

/// Encode mono samples into the given container
pub fn encode(
    samples: &[f32],
    sample_rate: u32,
    format: RecordingFormat,
) -> Result<Vec<u8>, CaptureError> {
    let to_error = |e: hound::Error| CaptureError::FinalizeFailed {
        reason: format!("failed to encode {}: {}", format, e),
    };

    match format {
        RecordingFormat::L16 => {
            let mut bytes = Vec::with_capacity(samples.len() * 2);
            for &sample in samples {
                bytes.extend_from_slice(&to_i16(sample).to_le_bytes());
            }
            Ok(bytes)
        }
        RecordingFormat::WavFloat => {
            let spec = WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            };
            let mut cursor = Cursor::new(Vec::new());
            {
                let mut writer = WavWriter::new(&mut cursor, spec).map_err(to_error)?;
                for &sample in samples {
                    writer.write_sample(sample).map_err(to_error)?;
                }
                writer.finalize().map_err(to_error)?;
            }
            Ok(cursor.into_inner())
        }
        RecordingFormat::WavPcm | RecordingFormat::Wav => {
            let spec = WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            };
            let mut cursor = Cursor::new(Vec::new());
            {
                let mut writer = WavWriter::new(&mut cursor, spec).map_err(to_error)?;
                for &sample in samples {
                    writer.write_sample(to_i16(sample)).map_err(to_error)?;
                }
                writer.finalize().map_err(to_error)?;
            }
            Ok(cursor.into_inner())
        }
    }
}

/// Decode a container back into mono samples (first channel)
///
/// Headerless formats carry no sample rate and cannot be decoded.
pub fn decode(bytes: &[u8], format: RecordingFormat) -> Result<DecodedBuffer, String> {
    if bytes.is_empty() {
        return Err("recording is empty, nothing to decode".to_string());
    }
    if !format.has_header() {
        return Err(format!("{} has no header to decode", format));
    }
    decode_wav(bytes)
}

/// Decode WAV bytes, keeping the first channel
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedBuffer, String> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?,
        SampleFormat::Int => {
            let full_scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<Result<_, _>>()
                .map_err(|e| e.to_string())?
        }
    };

    Ok(DecodedBuffer {
        samples: interleaved.into_iter().step_by(channels).collect(),
        sample_rate: spec.sample_rate,
    })
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

fn next_url(format: RecordingFormat) -> String {
    let id = RECORDING_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("mem://recordings/{}.{}", id, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(chunks: Vec<Vec<f32>>, format: RecordingFormat) -> FinalizeRequest {
        FinalizeRequest {
            chunks,
            sample_rate: 8000,
            format,
            volume_data: vec![
                VolumeSample {
                    time: 0.0,
                    volume: 40,
                },
                VolumeSample {
                    time: 0.45,
                    volume: 60,
                },
            ],
            waveform_points: vec![WaveformSample {
                time: 0.0,
                value: 3.0,
            }],
            chunk_interval_ms: 100,
        }
    }

    #[test]
    fn test_empty_capture_yields_zero_size_artifact() {
        let recorded = finalize_recording(request(Vec::new(), RecordingFormat::WavPcm)).unwrap();
        assert_eq!(recorded.size, 0);
        assert_eq!(recorded.duration, 0.0);
        assert!(recorded.is_empty());
        assert!(recorded.buffer.is_none());
        assert!(recorded.volume_data.is_empty());
        assert!(recorded.waveform_points.is_empty());
    }

    #[test]
    fn test_decoded_duration_is_preferred() {
        let chunks = vec![vec![0.25; 4000], vec![-0.25; 4000]];
        let recorded = finalize_recording(request(chunks, RecordingFormat::WavFloat)).unwrap();

        let buffer = recorded.buffer.as_ref().unwrap();
        assert_eq!(buffer.sample_rate, 8000);
        assert_eq!(buffer.samples.len(), 8000);
        assert!((recorded.duration - 1.0).abs() < 1e-6);
        assert!(recorded.decode_warning.is_none());
        assert!(recorded.url.ends_with(".wav"));
    }

    #[test]
    fn test_pcm16_round_trip_precision() {
        let recorded =
            finalize_recording(request(vec![vec![0.5, -0.5, 0.0]], RecordingFormat::WavPcm))
                .unwrap();
        let samples = &recorded.buffer.as_ref().unwrap().samples;
        assert!((samples[0] - 0.5).abs() < 1e-3);
        assert!((samples[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_headerless_format_falls_back_to_volume_series_duration() {
        let recorded =
            finalize_recording(request(vec![vec![0.1; 800]], RecordingFormat::L16)).unwrap();

        assert_eq!(recorded.size, 1600);
        assert!(recorded.buffer.is_none());
        assert!(recorded.decode_warning.is_some());
        assert!((recorded.duration - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_chunk_estimate_without_volume_series() {
        assert!((estimate_duration(&[], 7, 100) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_urls_are_unique() {
        let a = finalize_recording(request(vec![vec![0.1]], RecordingFormat::Wav)).unwrap();
        let b = finalize_recording(request(vec![vec![0.1]], RecordingFormat::Wav)).unwrap();
        assert_ne!(a.url, b.url);
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        assert!(decode(b"not a wav file", RecordingFormat::Wav).is_err());
    }
}
