// One-shot user gesture gate
//
// When the engine refuses to resume, the controller arms this gate. The next
// user gesture reported to the controller consumes it and retries resume
// exactly once, whatever the outcome.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct GestureGate {
    armed: AtomicBool,
}

impl GestureGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self) {
        if !self.armed.swap(true, Ordering::SeqCst) {
            log::info!("[Capture] Waiting for a user gesture to resume the audio engine");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Disarm and report whether the gate was armed
    pub fn take(&self) -> bool {
        self.armed.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_fires_once() {
        let gate = GestureGate::new();
        assert!(!gate.take());

        gate.arm();
        gate.arm();
        assert!(gate.is_armed());
        assert!(gate.take());
        assert!(!gate.take());
        assert!(!gate.is_armed());
    }
}
