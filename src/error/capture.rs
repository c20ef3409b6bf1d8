// Capture error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Capture error code constants
///
/// Single source of truth for the numeric codes surfaced to the game layer.
///
/// Error code range: 1001-1011
pub struct CaptureErrorCodes;

impl CaptureErrorCodes {
    /// Microphone permission denied by the user or platform
    pub const PERMISSION_DENIED: i32 = 1001;

    /// No input device present
    pub const DEVICE_NOT_FOUND: i32 = 1002;

    /// Input device present but busy or misconfigured
    pub const DEVICE_UNAVAILABLE: i32 = 1003;

    /// Any other device failure
    pub const DEVICE_ERROR: i32 = 1004;

    /// Audio engine is suspended and needs a user gesture to resume
    pub const NEEDS_USER_GESTURE: i32 = 1005;

    /// Audio engine is not in a running state
    pub const ENGINE_NOT_RUNNING: i32 = 1006;

    /// Recorder failed while capturing
    pub const RECORDER_FAILED: i32 = 1007;

    /// Input stream failed or disconnected
    pub const STREAM_FAILURE: i32 = 1008;

    /// Mutex was poisoned
    pub const LOCK_POISONED: i32 = 1009;

    /// Buffered chunks could not be assembled into an artifact
    pub const FINALIZE_FAILED: i32 = 1010;

    /// Device only offers a sample format the recorder cannot read
    pub const UNSUPPORTED_SAMPLE_FORMAT: i32 = 1011;
}

/// Log a capture error with structured context
///
/// Logs the numeric code, the component and the human-readable message.
/// The logging is non-blocking and will not panic on failure.
pub fn log_capture_error(err: &CaptureError, context: &str) {
    error!(
        "Capture error in {}: code={}, component=CaptureController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Capture-path errors
///
/// All of these are user-recoverable: the player can grant permission,
/// plug a device in, tap the screen, or simply retry.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// Microphone permission denied
    PermissionDenied,

    /// No microphone found
    DeviceNotFound,

    /// Microphone exists but cannot be opened (in use, overconstrained)
    DeviceUnavailable { reason: String },

    /// Generic device failure
    DeviceError { details: String },

    /// Engine resume was refused; a user gesture listener has been armed
    NeedsUserGesture,

    /// Engine is in a state other than running after a resume attempt
    EngineNotRunning { state: String },

    /// Recorder reported an error
    RecorderFailed { reason: String },

    /// Stream channel disconnected unexpectedly
    StreamFailure { reason: String },

    /// Mutex was poisoned
    LockPoisoned { component: String },

    /// Finalization could not produce an artifact
    FinalizeFailed { reason: String },

    /// Device sample format is not readable by the capture path
    UnsupportedSampleFormat { format: String },
}

impl ErrorCode for CaptureError {
    fn code(&self) -> i32 {
        match self {
            CaptureError::PermissionDenied => CaptureErrorCodes::PERMISSION_DENIED,
            CaptureError::DeviceNotFound => CaptureErrorCodes::DEVICE_NOT_FOUND,
            CaptureError::DeviceUnavailable { .. } => CaptureErrorCodes::DEVICE_UNAVAILABLE,
            CaptureError::DeviceError { .. } => CaptureErrorCodes::DEVICE_ERROR,
            CaptureError::NeedsUserGesture => CaptureErrorCodes::NEEDS_USER_GESTURE,
            CaptureError::EngineNotRunning { .. } => CaptureErrorCodes::ENGINE_NOT_RUNNING,
            CaptureError::RecorderFailed { .. } => CaptureErrorCodes::RECORDER_FAILED,
            CaptureError::StreamFailure { .. } => CaptureErrorCodes::STREAM_FAILURE,
            CaptureError::LockPoisoned { .. } => CaptureErrorCodes::LOCK_POISONED,
            CaptureError::FinalizeFailed { .. } => CaptureErrorCodes::FINALIZE_FAILED,
            CaptureError::UnsupportedSampleFormat { .. } => {
                CaptureErrorCodes::UNSUPPORTED_SAMPLE_FORMAT
            }
        }
    }

    fn message(&self) -> String {
        match self {
            CaptureError::PermissionDenied => {
                "Microphone permission denied. Please allow microphone access in your settings."
                    .to_string()
            }
            CaptureError::DeviceNotFound => {
                "No microphone found. Please check that a microphone is connected.".to_string()
            }
            CaptureError::DeviceUnavailable { reason } => {
                format!(
                    "Microphone is unavailable, it may be in use by another application ({})",
                    reason
                )
            }
            CaptureError::DeviceError { details } => {
                format!("Microphone access error: {}", details)
            }
            CaptureError::NeedsUserGesture => {
                "The audio system needs a user interaction (such as a tap) to start.".to_string()
            }
            CaptureError::EngineNotRunning { state } => {
                format!(
                    "Audio engine is in state '{}'. A user interaction may be required.",
                    state
                )
            }
            CaptureError::RecorderFailed { reason } => {
                format!("Recording device error: {}", reason)
            }
            CaptureError::StreamFailure { reason } => {
                format!("Audio input stream failed: {}", reason)
            }
            CaptureError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            CaptureError::FinalizeFailed { reason } => {
                format!("Failed to process the recording: {}", reason)
            }
            CaptureError::UnsupportedSampleFormat { format } => {
                format!("Input sample format {} is not supported", format)
            }
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CaptureError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CaptureError {}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
            std::io::ErrorKind::NotFound => CaptureError::DeviceNotFound,
            _ => CaptureError::DeviceError {
                details: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_codes() {
        assert_eq!(
            CaptureError::PermissionDenied.code(),
            CaptureErrorCodes::PERMISSION_DENIED
        );
        assert_eq!(
            CaptureError::DeviceNotFound.code(),
            CaptureErrorCodes::DEVICE_NOT_FOUND
        );
        assert_eq!(
            CaptureError::DeviceUnavailable {
                reason: "busy".to_string()
            }
            .code(),
            CaptureErrorCodes::DEVICE_UNAVAILABLE
        );
        assert_eq!(
            CaptureError::DeviceError {
                details: "x".to_string()
            }
            .code(),
            CaptureErrorCodes::DEVICE_ERROR
        );
        assert_eq!(
            CaptureError::NeedsUserGesture.code(),
            CaptureErrorCodes::NEEDS_USER_GESTURE
        );
        assert_eq!(
            CaptureError::UnsupportedSampleFormat {
                format: "U8".to_string()
            }
            .code(),
            1011
        );
    }

    #[test]
    fn test_device_errors_have_distinct_messages() {
        let messages = [
            CaptureError::PermissionDenied.message(),
            CaptureError::DeviceNotFound.message(),
            CaptureError::DeviceUnavailable {
                reason: "busy".to_string(),
            }
            .message(),
            CaptureError::DeviceError {
                details: "boom".to_string(),
            }
            .message(),
            CaptureError::NeedsUserGesture.message(),
        ];

        for (i, a) in messages.iter().enumerate() {
            for b in messages.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert!(messages[0].contains("permission denied"));
    }

    #[test]
    fn test_capture_error_display() {
        let err = CaptureError::DeviceNotFound;
        let display = format!("{}", err);
        assert!(display.contains("CaptureError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(CaptureError::from(denied), CaptureError::PermissionDenied);

        let other: CaptureError = std::io::Error::other("test io error").into();
        match other {
            CaptureError::DeviceError { details } => assert!(details.contains("test io error")),
            _ => panic!("Expected DeviceError"),
        }
    }
}
