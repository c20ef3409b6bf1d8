// Submission error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Submission error code constants
///
/// Error code range: 3001-3006
pub struct SubmissionErrorCodes;

impl SubmissionErrorCodes {
    pub const EMPTY_RECORDING: i32 = 3001;
    pub const NO_ITEMS_SELECTED: i32 = 3002;
    pub const TOO_MANY_ITEMS: i32 = 3003;
    pub const BUSY: i32 = 3004;
    pub const UNKNOWN_LEVEL: i32 = 3005;
    pub const UNKNOWN_ITEM: i32 = 3006;
}

/// Log a refused submission
///
/// Refusals are expected player-facing conditions, so they are logged at
/// warn level rather than error.
pub fn log_submission_error(err: &SubmissionError, context: &str) {
    warn!(
        "Submission refused in {}: code={}, component=Submission, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Preconditions that gate scoring
///
/// None of these is a failure of the core: each one asks the player to do
/// something (record again, pick an item, wait) before scoring runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionError {
    /// No recording, or a recording of zero bytes
    EmptyRecording,

    /// Player has not selected any item
    NoItemsSelected,

    /// More items selected than the configured maximum
    TooManyItems { max: usize, selected: usize },

    /// Recording or playback in progress
    Busy,

    /// Level id is not in the catalog
    UnknownLevel { id: String },

    /// Item id is not in the catalog
    UnknownItem { id: String },
}

impl ErrorCode for SubmissionError {
    fn code(&self) -> i32 {
        match self {
            SubmissionError::EmptyRecording => SubmissionErrorCodes::EMPTY_RECORDING,
            SubmissionError::NoItemsSelected => SubmissionErrorCodes::NO_ITEMS_SELECTED,
            SubmissionError::TooManyItems { .. } => SubmissionErrorCodes::TOO_MANY_ITEMS,
            SubmissionError::Busy => SubmissionErrorCodes::BUSY,
            SubmissionError::UnknownLevel { .. } => SubmissionErrorCodes::UNKNOWN_LEVEL,
            SubmissionError::UnknownItem { .. } => SubmissionErrorCodes::UNKNOWN_ITEM,
        }
    }

    fn message(&self) -> String {
        match self {
            SubmissionError::EmptyRecording => {
                "The recording was empty, please record again.".to_string()
            }
            SubmissionError::NoItemsSelected => "Please select at least one item.".to_string(),
            SubmissionError::TooManyItems { max, selected } => {
                format!("At most {} items can be selected (got {})", max, selected)
            }
            SubmissionError::Busy => {
                "An operation is in progress, please wait.".to_string()
            }
            SubmissionError::UnknownLevel { id } => format!("Unknown level '{}'", id),
            SubmissionError::UnknownItem { id } => format!("Unknown item '{}'", id),
        }
    }
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SubmissionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SubmissionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_error_codes() {
        assert_eq!(SubmissionError::EmptyRecording.code(), 3001);
        assert_eq!(SubmissionError::NoItemsSelected.code(), 3002);
        assert_eq!(
            SubmissionError::TooManyItems {
                max: 3,
                selected: 4
            }
            .code(),
            3003
        );
        assert_eq!(SubmissionError::Busy.code(), 3004);
        assert_eq!(
            SubmissionError::UnknownItem {
                id: "gong".to_string()
            }
            .code(),
            3006
        );
    }

    #[test]
    fn test_too_many_items_message() {
        let err = SubmissionError::TooManyItems {
            max: 3,
            selected: 5,
        };
        assert_eq!(err.message(), "At most 3 items can be selected (got 5)");
    }
}
