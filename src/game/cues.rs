// Cue alerts during recording
//
// Each cue fires one alert when the elapsed time enters
// [cue - lead, cue). Separately, a cue is "now" while the elapsed time is
// within the now-window of it.

use serde::Serialize;

use crate::catalog::{Cue, ItemId};
use crate::config::GameRulesConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CueAlert {
    pub index: usize,
    pub time: f32,
    pub expected_type: ItemId,
    pub description: String,
}

pub struct CueAlertTracker {
    cues: Vec<Cue>,
    fired: Vec<bool>,
    lead_secs: f32,
    now_window_secs: f32,
}

impl CueAlertTracker {
    pub fn new(cues: &[Cue], rules: &GameRulesConfig) -> Self {
        Self {
            cues: cues.to_vec(),
            fired: vec![false; cues.len()],
            lead_secs: rules.cue_alert_lead_secs,
            now_window_secs: rules.cue_now_window_secs,
        }
    }

    /// Forget fired alerts, for a new recording attempt
    pub fn reset(&mut self) {
        self.fired.iter_mut().for_each(|fired| *fired = false);
    }

    /// Alerts that become due at `elapsed`
    pub fn update(&mut self, elapsed: f32) -> Vec<CueAlert> {
        let mut due = Vec::new();
        for (index, cue) in self.cues.iter().enumerate() {
            if self.fired[index] {
                continue;
            }
            if elapsed >= cue.time - self.lead_secs && elapsed < cue.time {
                self.fired[index] = true;
                due.push(CueAlert {
                    index,
                    time: cue.time,
                    expected_type: cue.expected_type.clone(),
                    description: cue.description.clone(),
                });
            }
        }
        due
    }

    /// Index of the cue happening now, if any
    pub fn current_cue(&self, elapsed: f32) -> Option<usize> {
        self.cues
            .iter()
            .position(|cue| (elapsed - cue.time).abs() < self.now_window_secs)
    }

    pub fn fired_count(&self) -> usize {
        self.fired.iter().filter(|&&fired| fired).count()
    }
}
