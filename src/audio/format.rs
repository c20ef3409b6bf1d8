// Recording container formats and negotiation

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::backend::AudioBackend;

/// Container a finalized recording is encoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordingFormat {
    /// WAV with 32-bit float samples
    WavFloat,
    /// WAV with 16-bit integer samples
    WavPcm,
    /// Raw headerless 16-bit little-endian PCM
    L16,
    /// Plain WAV; used when the backend confirms none of the preferred formats
    Wav,
}

/// Formats tried in order by [`negotiate_format`].
pub const FORMAT_PREFERENCE: [RecordingFormat; 3] = [
    RecordingFormat::WavFloat,
    RecordingFormat::WavPcm,
    RecordingFormat::L16,
];

/// Format used when nothing in the preference list is supported.
pub const DEFAULT_FORMAT: RecordingFormat = RecordingFormat::Wav;

impl RecordingFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            RecordingFormat::WavFloat => "audio/wav;codecs=float",
            RecordingFormat::WavPcm => "audio/wav;codecs=pcm",
            RecordingFormat::L16 => "audio/L16",
            RecordingFormat::Wav => "audio/wav",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            RecordingFormat::L16 => "pcm",
            _ => "wav",
        }
    }

    /// Parse a MIME type, ignoring case and whitespace around parameters
    pub fn from_mime(mime: &str) -> Option<Self> {
        let normalized: String = mime
            .split(';')
            .map(|part| part.trim().to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(";");
        [
            RecordingFormat::WavFloat,
            RecordingFormat::WavPcm,
            RecordingFormat::L16,
            RecordingFormat::Wav,
        ]
        .into_iter()
        .find(|format| format.mime_type().to_ascii_lowercase() == normalized)
    }

    /// Whether the artifact carries a self-describing header
    pub fn has_header(&self) -> bool {
        !matches!(self, RecordingFormat::L16)
    }
}

impl fmt::Display for RecordingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Pick the first preferred format the backend supports
///
/// Falls back to [`DEFAULT_FORMAT`] with a warning when none is confirmed.
pub fn negotiate_format(backend: &dyn AudioBackend) -> RecordingFormat {
    match FORMAT_PREFERENCE
        .iter()
        .find(|format| backend.supports_format(format))
    {
        Some(format) => {
            log::info!("[Capture] Using recording format {}", format);
            *format
        }
        None => {
            log::warn!(
                "[Capture] No preferred recording format supported, using default {}",
                DEFAULT_FORMAT
            );
            DEFAULT_FORMAT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::StubBackend;

    #[test]
    fn test_negotiation_follows_preference_order() {
        let backend = StubBackend::new();
        assert_eq!(negotiate_format(&backend), RecordingFormat::WavFloat);

        backend.set_supported_formats(&[RecordingFormat::L16, RecordingFormat::WavPcm]);
        assert_eq!(negotiate_format(&backend), RecordingFormat::WavPcm);
    }

    #[test]
    fn test_negotiation_falls_back_to_default() {
        let backend = StubBackend::new();
        backend.set_supported_formats(&[]);
        assert_eq!(negotiate_format(&backend), RecordingFormat::Wav);
    }

    #[test]
    fn test_from_mime() {
        assert_eq!(
            RecordingFormat::from_mime("audio/wav; codecs=float"),
            Some(RecordingFormat::WavFloat)
        );
        assert_eq!(
            RecordingFormat::from_mime("audio/l16"),
            Some(RecordingFormat::L16)
        );
        assert_eq!(RecordingFormat::from_mime("audio/webm;codecs=opus"), None);
    }
}
