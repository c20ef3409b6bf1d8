// Level definitions and their timed cues

use serde::{Deserialize, Serialize};

use super::items::{AcousticProfile, ItemId};

/// Range with a relative importance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedRange {
    pub min: f32,
    pub max: f32,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

fn default_multiplier() -> f32 {
    1.0
}

/// A timestamped expected sound event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Seconds from the start of the clip
    pub time: f32,
    pub expected_type: ItemId,
    pub volume: WeightedRange,
    pub pitch_variation: WeightedRange,
    #[serde(default)]
    pub rhythm_expected: bool,
    pub duration: WeightedRange,
    #[serde(default = "default_multiplier")]
    pub score_multiplier: f32,
    #[serde(default)]
    pub description: String,
}

/// Target the performance score is matched against
///
/// Either the first cue of the level or, for a level without cues, the
/// profile of the first selected item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceTarget {
    pub volume: WeightedRange,
    pub pitch_variation: WeightedRange,
    pub duration: WeightedRange,
    pub rhythm_expected: bool,
}

impl From<&Cue> for PerformanceTarget {
    fn from(cue: &Cue) -> Self {
        Self {
            volume: cue.volume,
            pitch_variation: cue.pitch_variation,
            duration: cue.duration,
            rhythm_expected: cue.rhythm_expected,
        }
    }
}

impl From<&AcousticProfile> for PerformanceTarget {
    fn from(profile: &AcousticProfile) -> Self {
        let weighted = |min, max| WeightedRange {
            min,
            max,
            weight: 1.0,
        };
        Self {
            volume: weighted(profile.volume.min, profile.volume.max),
            pitch_variation: weighted(profile.pitch_variation.min, profile.pitch_variation.max),
            duration: weighted(profile.duration.min, profile.duration.max),
            rhythm_expected: profile.rhythm_expected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelRewards {
    pub base_inspiration_points: u32,
    pub inspiration_multiplier: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub initial_items: Vec<ItemId>,
    /// Item granted the first time the level is completed
    #[serde(default)]
    pub reward_item: Option<ItemId>,
    pub duration_secs: f32,
    pub rewards: LevelRewards,
    #[serde(default)]
    pub cues: Vec<Cue>,
}

#[allow(clippy::too_many_arguments)]
fn cue(
    time: f32,
    expected_type: &str,
    volume: (f32, f32, f32),
    pitch_variation: (f32, f32, f32),
    rhythm_expected: bool,
    duration: (f32, f32, f32),
    score_multiplier: f32,
    description: &str,
) -> Cue {
    let range = |(min, max, weight): (f32, f32, f32)| WeightedRange { min, max, weight };
    Cue {
        time,
        expected_type: ItemId::from(expected_type),
        volume: range(volume),
        pitch_variation: range(pitch_variation),
        rhythm_expected,
        duration: range(duration),
        score_multiplier,
        description: description.to_string(),
    }
}

fn ids(ids: &[&str]) -> Vec<ItemId> {
    ids.iter().map(|&id| ItemId::from(id)).collect()
}

/// The three built-in levels
#[rustfmt::skip]
pub fn builtin_levels() -> Vec<Level> {
    vec![
        Level {
            id: "level_001".to_string(),
            title: "The Monster's Breakfast Concerto".to_string(),
            description: "A clumsy steam monster's breakfast, full of clanking metal and hissing steam."
                .to_string(),
            initial_items: ids(&["metal", "water", "paper"]),
            reward_item: Some(ItemId::from("wood")),
            duration_secs: 25.0,
            rewards: LevelRewards {
                base_inspiration_points: 120,
                inspiration_multiplier: 0.75,
            },
            cues: vec![
                cue(2.5, "metal", (70.0, 100.0, 1.5), (0.0, 50.0, 0.8), false, (0.2, 0.8, 1.0), 1.2, "Cutlery clash"),
                cue(8.0, "water", (50.0, 80.0, 1.0), (40.0, 90.0, 1.0), false, (1.5, 3.0, 1.2), 1.0, "Steam burst"),
                cue(15.2, "voice_low", (60.0, 90.0, 1.2), (0.0, 40.0, 1.5), true, (0.5, 1.5, 1.0), 1.5, "Monster chewing"),
            ],
        },
        Level {
            id: "level_002".to_string(),
            title: "Neon Rain Chase".to_string(),
            description: "A tense chase through a rainy city: footsteps, sirens, heartbeats."
                .to_string(),
            initial_items: ids(&["water", "metal", "paper"]),
            reward_item: Some(ItemId::from("glass")),
            duration_secs: 45.0,
            rewards: LevelRewards {
                base_inspiration_points: 180,
                inspiration_multiplier: 0.7,
            },
            cues: vec![
                cue(5.0, "water", (40.0, 70.0, 1.0), (50.0, 90.0, 1.2), true, (0.1, 0.5, 1.0), 1.0, "Footsteps in the rain"),
                cue(20.5, "electronic", (50.0, 80.0, 1.5), (30.0, 80.0, 1.0), true, (2.0, 4.0, 1.0), 1.2, "Siren"),
                cue(35.0, "voice_low", (30.0, 60.0, 1.0), (0.0, 40.0, 1.0), true, (0.5, 1.0, 1.2), 0.8, "Heartbeat"),
            ],
        },
        Level {
            id: "level_003".to_string(),
            title: "Kitchen Rhapsody".to_string(),
            description: "Everyday kitchen chaos: chopping, stir-frying, shattering dishes."
                .to_string(),
            initial_items: ids(&["metal", "wood", "water", "glass", "plastic"]),
            reward_item: Some(ItemId::from("fabric")),
            duration_secs: 60.0,
            rewards: LevelRewards {
                base_inspiration_points: 250,
                inspiration_multiplier: 0.8,
            },
            cues: vec![
                cue(10.3, "wood", (50.0, 80.0, 1.2), (10.0, 50.0, 1.0), true, (0.1, 0.4, 1.0), 1.1, "Chopping"),
                cue(30.5, "metal", (60.0, 90.0, 1.5), (20.0, 60.0, 1.0), true, (0.8, 2.0, 1.0), 1.3, "Stir-frying"),
                cue(45.8, "glass", (80.0, 100.0, 2.0), (70.0, 100.0, 1.5), false, (0.5, 1.2, 1.5), 1.5, "Dishes shattering"),
            ],
        },
    ]
}
