// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::audio::live::LiveSample;
use crate::engine::capture::CaptureEvent;

/// Buffer for live samples: about two seconds at 60 frames per second
const LIVE_SAMPLE_CAPACITY: usize = 128;

/// Buffer for lifecycle events
const CAPTURE_EVENT_CAPACITY: usize = 32;

/// Manages all tokio broadcast channels
///
/// Single Responsibility: Broadcast channel lifecycle and subscription
///
/// # Channel Types
/// - Live samples: per-frame volume plus raw frequency/time-domain bytes,
///   published by the live analysis loop
/// - Capture events: recording started/stopped/failed and cleanup
///
/// Publishing never blocks. A subscriber that falls behind loses the oldest
/// messages and sees `RecvError::Lagged` instead of slowing the publisher.
pub struct BroadcastChannelManager {
    live_samples: Arc<Mutex<Option<broadcast::Sender<LiveSample>>>>,
    capture_events: Arc<Mutex<Option<broadcast::Sender<CaptureEvent>>>>,
}

impl BroadcastChannelManager {
    /// Create a new BroadcastChannelManager with all channels uninitialized
    ///
    /// Channels must be explicitly initialized via init_* methods before use.
    pub fn new() -> Self {
        Self {
            live_samples: Arc::new(Mutex::new(None)),
            capture_events: Arc::new(Mutex::new(None)),
        }
    }

    // ========================================================================
    // LIVE SAMPLE CHANNEL
    // ========================================================================

    /// Initialize the live sample channel, or return the existing sender
    ///
    /// Reusing the sender keeps subscriptions alive across recording
    /// attempts.
    pub fn init_live_samples(&self) -> broadcast::Sender<LiveSample> {
        let mut slot = lock(&self.live_samples);
        match slot.as_ref() {
            Some(tx) => tx.clone(),
            None => {
                let (tx, _) = broadcast::channel(LIVE_SAMPLE_CAPACITY);
                *slot = Some(tx.clone());
                tx
            }
        }
    }

    /// Subscribe to live samples
    ///
    /// Returns None if init_live_samples() was not called yet.
    pub fn subscribe_live_samples(&self) -> Option<broadcast::Receiver<LiveSample>> {
        lock(&self.live_samples).as_ref().map(|tx| tx.subscribe())
    }

    // ========================================================================
    // CAPTURE EVENT CHANNEL
    // ========================================================================

    pub fn init_capture_events(&self) -> broadcast::Sender<CaptureEvent> {
        let mut slot = lock(&self.capture_events);
        match slot.as_ref() {
            Some(tx) => tx.clone(),
            None => {
                let (tx, _) = broadcast::channel(CAPTURE_EVENT_CAPACITY);
                *slot = Some(tx.clone());
                tx
            }
        }
    }

    pub fn subscribe_capture_events(&self) -> Option<broadcast::Receiver<CaptureEvent>> {
        lock(&self.capture_events).as_ref().map(|tx| tx.subscribe())
    }

    /// Publish a capture event if the channel exists
    ///
    /// Having no subscribers is not an error.
    pub fn publish_capture_event(&self, event: CaptureEvent) {
        if let Some(tx) = lock(&self.capture_events).as_ref() {
            let _ = tx.send(event);
        }
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
