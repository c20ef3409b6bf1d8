//! Testability utilities.
//!
//! Synthetic signals feed the stub backend so the whole capture path can be
//! exercised without touching live audio hardware.

pub mod signals;

pub use signals::{Signal, SignalGenerator, DEFAULT_SIGNAL_SAMPLE_RATE};
