// AnalyserNode - shared live analysis node
//
// Holds a rolling window of the most recent `fft_size` input samples and
// produces byte snapshots of it on demand:
// - frequency data: Blackman-windowed FFT magnitude, smoothed over time,
//   converted to dB and mapped linearly from [min_db, max_db] onto 0..=255
// - time-domain data: each sample mapped from [-1, 1] onto 0..=255 with
//   the midpoint at 128
//
// The recorder worker feeds samples in; the live analysis loop reads
// snapshots out. Both sides go through one short-lived mutex.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::CaptureConfig;

struct AnalyserState {
    window: VecDeque<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

pub struct AnalyserNode {
    state: Mutex<AnalyserState>,
    fft: Arc<dyn Fft<f32>>,
    blackman: Vec<f32>,
    fft_size: usize,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    connected: AtomicBool,
}

impl AnalyserNode {
    pub fn new(config: &CaptureConfig) -> Self {
        let fft_size = config.fft_size.max(32);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            state: Mutex::new(AnalyserState {
                window: VecDeque::from(vec![0.0; fft_size]),
                smoothed: vec![0.0; fft_size / 2],
                scratch: vec![Complex::new(0.0, 0.0); fft_size],
            }),
            fft,
            blackman: blackman_window(fft_size),
            fft_size,
            smoothing: config.smoothing_time_constant.clamp(0.0, 1.0),
            min_db: config.min_decibels,
            max_db: config.max_decibels,
            connected: AtomicBool::new(false),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Route the input stream into the node
    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Clear the rolling window and the smoothing history
    pub fn reset(&self) {
        let mut state = self.lock();
        state.window.iter_mut().for_each(|s| *s = 0.0);
        state.smoothed.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Append input samples; ignored while disconnected
    pub fn push_samples(&self, samples: &[f32]) {
        if !self.is_connected() || samples.is_empty() {
            return;
        }
        let mut state = self.lock();
        let tail = if samples.len() > self.fft_size {
            &samples[samples.len() - self.fft_size..]
        } else {
            samples
        };
        for &sample in tail {
            state.window.pop_front();
            state.window.push_back(sample);
        }
    }

    /// Fill `out` with the current byte frequency snapshot
    ///
    /// `out` should hold `frequency_bin_count()` entries; extra entries are
    /// left untouched.
    pub fn byte_frequency_data(&self, out: &mut [u8]) {
        let mut guard = self.lock();
        let state = &mut *guard;

        for (i, (slot, &sample)) in state
            .scratch
            .iter_mut()
            .zip(state.window.iter())
            .enumerate()
        {
            *slot = Complex::new(sample * self.blackman[i], 0.0);
        }
        self.fft.process(&mut state.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let range = (self.max_db - self.min_db).max(f32::EPSILON);
        for (k, smoothed) in state.smoothed.iter_mut().enumerate() {
            let magnitude = state.scratch[k].norm() * scale;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;

            if let Some(byte) = out.get_mut(k) {
                let db = if *smoothed > 0.0 {
                    20.0 * smoothed.log10()
                } else {
                    f32::NEG_INFINITY
                };
                let scaled = 255.0 / range * (db - self.min_db);
                *byte = scaled.clamp(0.0, 255.0) as u8;
            }
        }
    }

    /// Fill `out` with the most recent time-domain samples as bytes
    pub fn byte_time_domain_data(&self, out: &mut [u8]) {
        let state = self.lock();
        let skip = state.window.len().saturating_sub(out.len());
        for (byte, &sample) in out.iter_mut().zip(state.window.iter().skip(skip)) {
            *byte = (128.0 * (1.0 + sample)).clamp(0.0, 255.0) as u8;
        }
    }

    fn lock(&self) -> MutexGuard<'_, AnalyserState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let alpha = 0.16_f32;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = i as f32 / n;
            a0 - a1 * (2.0 * std::f32::consts::PI * x).cos()
                + a2 * (4.0 * std::f32::consts::PI * x).cos()
        })
        .collect()
}
