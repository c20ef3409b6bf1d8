//! Deterministic synthetic signals.
//!
//! Used by the stub backend as a stand-in microphone and by tests and the
//! CLI `simulate` command to produce recordings with known loudness, zero
//! crossing rate and rhythm.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Sample rate used when no backend rate is given.
pub const DEFAULT_SIGNAL_SAMPLE_RATE: u32 = 48_000;

/// Waveform description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    Silence,
    Sine {
        frequency_hz: f32,
        amplitude: f32,
    },
    Noise {
        amplitude: f32,
    },
    /// Sine bursts separated by silence
    Bursts {
        frequency_hz: f32,
        amplitude: f32,
        on_ms: u32,
        off_ms: u32,
    },
}

impl Default for Signal {
    fn default() -> Self {
        Signal::Sine {
            frequency_hz: 440.0,
            amplitude: 0.5,
        }
    }
}

impl Signal {
    /// Render `duration_secs` of the signal at `sample_rate`
    pub fn render(&self, sample_rate: u32, duration_secs: f32) -> Vec<f32> {
        let frames = (duration_secs.max(0.0) * sample_rate as f32).round() as usize;
        let mut samples = vec![0.0; frames];
        SignalGenerator::new(self.clone(), sample_rate).fill(&mut samples);
        samples
    }
}

/// Stateful generator; consecutive `fill` calls continue the waveform.
pub struct SignalGenerator {
    signal: Signal,
    sample_rate: u32,
    phase: f32,
    frames_emitted: u64,
    rng: StdRng,
}

impl SignalGenerator {
    pub fn new(signal: Signal, sample_rate: u32) -> Self {
        Self {
            signal,
            sample_rate: sample_rate.max(1),
            phase: 0.0,
            frames_emitted: 0,
            rng: StdRng::seed_from_u64(0x5A5A_F01E),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fill(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = match self.signal {
                Signal::Silence => 0.0,
                Signal::Sine {
                    frequency_hz,
                    amplitude,
                } => self.next_sine(frequency_hz, amplitude),
                Signal::Noise { amplitude } => {
                    if amplitude > 0.0 {
                        self.rng.gen_range(-amplitude..amplitude)
                    } else {
                        0.0
                    }
                }
                Signal::Bursts {
                    frequency_hz,
                    amplitude,
                    on_ms,
                    off_ms,
                } => {
                    let period = (on_ms as u64 + off_ms as u64).max(1);
                    let ms = self.frames_emitted * 1000 / self.sample_rate as u64;
                    if ms % period < on_ms as u64 {
                        self.next_sine(frequency_hz, amplitude)
                    } else {
                        0.0
                    }
                }
            };
            self.frames_emitted += 1;
        }
    }

    fn next_sine(&mut self, frequency_hz: f32, amplitude: f32) -> f32 {
        let value = (2.0 * PI * self.phase).sin() * amplitude;
        self.phase += frequency_hz.max(0.0) / self.sample_rate as f32;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        value
    }
}
