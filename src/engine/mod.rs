//! Engine module housing the capture core.
//!
//! This module exposes trait-based backends (`backend`), the capture
//! controller state machine (`capture`) and the user gesture gate used to
//! resume a suspended engine (`gesture`).

pub mod backend;
pub mod capture;
pub mod gesture;

#[cfg(not(target_os = "android"))]
pub use backend::CpalBackend;
pub use backend::{
    AudioBackend, EngineState, InputConstraints, InputStream, StubBackend, StubTimeSource,
    SystemTimeSource, TimeSource,
};
pub use capture::{CaptureController, CaptureEvent, RecorderState};
