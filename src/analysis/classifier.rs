// Classifier - heuristic sound type estimation
//
// Resolution order:
// 1. The first selected item whose profile ranges contain both the measured
//    volume and pitch variation
// 2. Fixed band rules over volume, pitch variation and zero-crossing rate
// 3. A uniform pick among the selected items, or among all catalog items
//    when nothing is selected

use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog::{Catalog, ItemId};

/// Returned when the catalog has no items and nothing is selected
pub const UNKNOWN_TYPE: &str = "unknown";

/// One band rule; `None` ZCR bounds always hold
struct HeuristicRule {
    item: &'static str,
    volume_above: Option<f32>,
    volume_below: Option<f32>,
    pitch_above: Option<f32>,
    pitch_below: Option<f32>,
    zcr_above: Option<f32>,
    zcr_below: Option<f32>,
}

impl HeuristicRule {
    fn matches(&self, volume: f32, pitch_variation: f32, zcr: Option<f32>) -> bool {
        let above = |bound: Option<f32>, value: f32| bound.map_or(true, |b| value > b);
        let below = |bound: Option<f32>, value: f32| bound.map_or(true, |b| value < b);

        let zcr_ok = match (self.zcr_above, self.zcr_below, zcr) {
            (None, None, _) => true,
            // ZCR rules need a measured rate
            (_, _, None) => false,
            (lo, hi, Some(rate)) => above(lo, rate) && below(hi, rate),
        };

        zcr_ok
            && above(self.volume_above, volume)
            && below(self.volume_below, volume)
            && above(self.pitch_above, pitch_variation)
            && below(self.pitch_below, pitch_variation)
    }
}

const fn rule(item: &'static str) -> HeuristicRule {
    HeuristicRule {
        item,
        volume_above: None,
        volume_below: None,
        pitch_above: None,
        pitch_below: None,
        zcr_above: None,
        zcr_below: None,
    }
}

const HEURISTIC_RULES: [HeuristicRule; 6] = [
    // Loud and steady
    HeuristicRule {
        volume_above: Some(75.0),
        pitch_below: Some(35.0),
        ..rule("metal")
    },
    // Quiet and busy
    HeuristicRule {
        volume_below: Some(45.0),
        pitch_above: Some(65.0),
        ..rule("paper")
    },
    HeuristicRule {
        volume_above: Some(40.0),
        pitch_below: Some(30.0),
        ..rule("voice_low")
    },
    HeuristicRule {
        volume_above: Some(30.0),
        pitch_above: Some(70.0),
        ..rule("voice_high")
    },
    // Noisy texture
    HeuristicRule {
        zcr_above: Some(0.20),
        volume_below: Some(60.0),
        pitch_above: Some(50.0),
        ..rule("fabric")
    },
    // Tonal or percussive knock
    HeuristicRule {
        zcr_below: Some(0.10),
        volume_above: Some(50.0),
        pitch_below: Some(50.0),
        ..rule("wood")
    },
];

/// First selected item whose profile contains the measurement
pub fn match_selected_profile(
    selected: &[ItemId],
    volume: f32,
    pitch_variation: f32,
    catalog: &Catalog,
) -> Option<ItemId> {
    selected
        .iter()
        .find(|id| {
            catalog.profile(id.as_str()).is_some_and(|profile| {
                profile.volume.contains(volume) && profile.pitch_variation.contains(pitch_variation)
            })
        })
        .cloned()
}

/// Item named by the first band rule that matches
pub fn match_heuristic_rules(volume: f32, pitch_variation: f32, zcr: Option<f32>) -> Option<ItemId> {
    HEURISTIC_RULES
        .iter()
        .find(|rule| rule.matches(volume, pitch_variation, zcr))
        .map(|rule| ItemId::from(rule.item))
}

/// Estimate which item a recording sounds like
pub fn guess_audio_type<R: Rng + ?Sized>(
    selected: &[ItemId],
    volume: f32,
    pitch_variation: f32,
    zcr: Option<f32>,
    catalog: &Catalog,
    rng: &mut R,
) -> ItemId {
    if catalog.item_ids().is_empty() && selected.is_empty() {
        return ItemId::from(UNKNOWN_TYPE);
    }

    if let Some(id) = match_selected_profile(selected, volume, pitch_variation, catalog) {
        log::debug!("[Analysis] Type '{}' matched a selected item profile", id);
        return id;
    }

    if let Some(id) = match_heuristic_rules(volume, pitch_variation, zcr) {
        return id;
    }

    let pool = if selected.is_empty() {
        catalog.item_ids()
    } else {
        selected
    };
    match pool.choose(rng) {
        Some(id) => {
            log::debug!("[Analysis] Type '{}' guessed as fallback", id);
            id.clone()
        }
        None => ItemId::from(UNKNOWN_TYPE),
    }
}
