// Game layer - level sessions, submissions and player progress
//
// Everything here sits on top of the capture engine and the scoring engine;
// no audio processing happens in this module.

pub mod cues;
pub mod progress;
pub mod session;
pub mod submission;

pub use cues::{CueAlert, CueAlertTracker};
pub use progress::{
    LevelCompletion, LevelRecord, PlayerProgress, PurchaseOutcome, STARTER_ITEMS,
};
pub use session::{LevelSession, SessionTick};
pub use submission::{
    inspiration_points, submit_dubbing, Submission, SubmissionGate, SubmissionOutcome,
};

pub use crate::scoring::ScoreComment;
