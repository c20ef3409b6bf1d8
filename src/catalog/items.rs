// Items and their acoustic profiles

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Stable item identifier such as `metal` or `voice_low`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Inclusive numeric range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Expected acoustic behaviour of an item
///
/// Drives classification and serves as the performance target when a
/// level has no cues.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcousticProfile {
    pub volume: ValueRange,
    pub pitch_variation: ValueRange,
    pub rhythm_expected: bool,
    pub duration: ValueRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Inspiration total at which the item becomes available
    #[serde(default)]
    pub unlock_score: u32,
    pub profile: AcousticProfile,
}

#[allow(clippy::too_many_arguments)]
fn item(
    id: &str,
    name: &str,
    description: &str,
    unlock_score: u32,
    volume: (f32, f32),
    pitch_variation: (f32, f32),
    rhythm_expected: bool,
    duration: (f32, f32),
) -> Item {
    Item {
        id: ItemId::from(id),
        name: name.to_string(),
        description: description.to_string(),
        unlock_score,
        profile: AcousticProfile {
            volume: ValueRange::new(volume.0, volume.1),
            pitch_variation: ValueRange::new(pitch_variation.0, pitch_variation.1),
            rhythm_expected,
            duration: ValueRange::new(duration.0, duration.1),
        },
    }
}

/// The ten built-in items, in catalog order
#[rustfmt::skip]
pub fn builtin_items() -> Vec<Item> {
    vec![
        item("metal", "Metal Clash", "Keys, coins and pot lids striking each other", 0, (60.0, 100.0), (0.0, 40.0), false, (0.1, 1.5)),
        item("paper", "Paper Tear", "Tearing, crumpling and page turning", 0, (30.0, 70.0), (50.0, 100.0), false, (0.2, 2.0)),
        item("water", "Flowing Liquid", "Pouring, dripping and bubbling", 0, (40.0, 80.0), (30.0, 80.0), false, (0.5, 3.0)),
        item("wood", "Wood Knock", "Knocking on a table, snapping planks", 500, (50.0, 90.0), (10.0, 60.0), true, (0.1, 1.0)),
        item("glass", "Glass Shatter", "Clinking glasses and breaking windows", 1000, (70.0, 100.0), (60.0, 100.0), false, (0.1, 1.0)),
        item("plastic", "Plastic Creak", "Squeezed bottles and toy parts", 700, (30.0, 70.0), (40.0, 90.0), false, (0.3, 2.5)),
        item("fabric", "Fabric Rustle", "Clothes rubbing and flags flapping", 1200, (20.0, 60.0), (50.0, 90.0), false, (0.5, 3.0)),
        item("electronic", "Odd Electronics", "Old radios and crackling current", 1800, (40.0, 80.0), (30.0, 80.0), true, (0.5, 4.0)),
        item("voice_low", "Low Voice", "Monster growls and giant footsteps", 2500, (50.0, 90.0), (0.0, 30.0), true, (1.0, 5.0)),
        item("voice_high", "High Voice", "Small animal calls and elf whispers", 3000, (30.0, 70.0), (70.0, 100.0), true, (0.5, 3.0)),
    ]
}
