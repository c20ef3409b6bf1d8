// Player progress: inspiration, unlocks, purchases and per-level records
//
// Persistence belongs to the surrounding layer; the struct is serde so it
// can be stored as JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::{Catalog, ItemId, Level, PlayerLevel, ShopItem};

/// Items every new player starts with
pub const STARTER_ITEMS: [&str; 3] = ["metal", "paper", "water"];

/// Best result and reward state of one level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub best_score: u8,
    pub best_stars: u8,
    pub attempts: u32,
    /// Set once the completion reward item has been granted
    pub reward_claimed: bool,
}

/// What one call to [`PlayerProgress::complete_level`] changed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelCompletion {
    pub new_best: bool,
    /// Reward item granted by this completion, first completion only
    pub reward_item: Option<ItemId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOutcome {
    Purchased,
    AlreadyOwned,
    InsufficientInspiration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerProgress {
    /// Inspiration total; never negative
    pub inspiration: u32,
    pub player_level: u32,
    pub unlocked_items: Vec<ItemId>,
    pub purchased: Vec<String>,
    pub levels: BTreeMap<String, LevelRecord>,
}

impl Default for PlayerProgress {
    fn default() -> Self {
        Self {
            inspiration: 0,
            player_level: 1,
            unlocked_items: STARTER_ITEMS.iter().map(|&id| ItemId::from(id)).collect(),
            purchased: Vec::new(),
            levels: BTreeMap::new(),
        }
    }
}

impl PlayerProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn record(&self, level_id: &str) -> Option<&LevelRecord> {
        self.levels.get(level_id)
    }

    pub fn is_completed(&self, level_id: &str) -> bool {
        self.levels
            .get(level_id)
            .is_some_and(|record| record.attempts > 0)
    }

    /// First two levels are always open, later ones need the previous one
    pub fn is_level_unlocked(&self, catalog: &Catalog, level_id: &str) -> bool {
        let levels = catalog.levels();
        match levels.iter().position(|level| level.id == level_id) {
            Some(index) if index <= 1 => true,
            Some(index) => self.is_completed(&levels[index - 1].id),
            None => false,
        }
    }

    /// Add (or with a negative delta, spend) inspiration
    ///
    /// The total is floored at zero. Returns the new rank when the total
    /// crosses a rank threshold.
    pub fn add_inspiration(&mut self, delta: i64, catalog: &Catalog) -> Option<PlayerLevel> {
        let total = (self.inspiration as i64 + delta).clamp(0, u32::MAX as i64);
        self.inspiration = total as u32;

        let reached = catalog.player_level_for(self.inspiration)?;
        if reached.level > self.player_level {
            self.player_level = reached.level;
            log::info!(
                "[Progress] Player reached level {} ({})",
                reached.level,
                reached.name
            );
            return Some(reached.clone());
        }
        None
    }

    /// Unlock an item; unknown ids and duplicates are ignored
    pub fn unlock_item(&mut self, id: &ItemId, catalog: &Catalog) -> bool {
        if !catalog.contains_item(id.as_str()) {
            log::warn!("[Progress] Tried to unlock unknown item '{}'", id);
            return false;
        }
        if self.unlocked_items.contains(id) {
            return false;
        }
        self.unlocked_items.push(id.clone());
        log::info!("[Progress] Unlocked item '{}'", id);
        true
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.unlocked_items.iter().any(|item| item.as_str() == id)
    }

    pub fn owns(&self, shop_id: &str) -> bool {
        self.purchased.iter().any(|id| id == shop_id)
    }

    pub fn purchase(&mut self, item: &ShopItem, catalog: &Catalog) -> PurchaseOutcome {
        if self.owns(&item.id) {
            return PurchaseOutcome::AlreadyOwned;
        }
        if self.inspiration < item.price {
            return PurchaseOutcome::InsufficientInspiration;
        }
        self.add_inspiration(-(item.price as i64), catalog);
        self.purchased.push(item.id.clone());
        log::info!("[Progress] Purchased '{}' for {}", item.id, item.price);
        PurchaseOutcome::Purchased
    }

    /// Record a scored attempt
    ///
    /// Keeps the best score and stars. The level's reward item is granted
    /// only while `reward_claimed` is unset, and the flag is set in the same
    /// step.
    pub fn complete_level(
        &mut self,
        level: &Level,
        score: u8,
        stars: u8,
        catalog: &Catalog,
    ) -> LevelCompletion {
        let record = self.levels.entry(level.id.clone()).or_default();
        record.attempts += 1;
        let new_best = score > record.best_score || record.attempts == 1;
        record.best_score = record.best_score.max(score);
        record.best_stars = record.best_stars.max(stars);

        let reward_item = match &level.reward_item {
            Some(item) if !record.reward_claimed => {
                record.reward_claimed = true;
                Some(item.clone())
            }
            _ => None,
        };
        if let Some(item) = &reward_item {
            self.unlock_item(item, catalog);
        }

        LevelCompletion {
            new_best,
            reward_item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(catalog: &Catalog, id: &str) -> Level {
        catalog.level(id).cloned().unwrap()
    }

    #[test]
    fn test_new_player_has_starter_items() {
        let progress = PlayerProgress::new();
        assert!(progress.is_unlocked("metal"));
        assert!(!progress.is_unlocked("wood"));
        assert_eq!(progress.player_level, 1);
    }

    #[test]
    fn test_reward_granted_once() {
        let catalog = Catalog::builtin();
        let level = level(&catalog, "level_001");
        let mut progress = PlayerProgress::new();

        let first = progress.complete_level(&level, 60, 1, &catalog);
        assert_eq!(first.reward_item, Some(ItemId::from("wood")));
        assert!(progress.is_unlocked("wood"));
        assert!(progress.record("level_001").unwrap().reward_claimed);

        let second = progress.complete_level(&level, 95, 3, &catalog);
        assert_eq!(second.reward_item, None);
        assert!(second.new_best);
        assert_eq!(progress.unlocked_items.iter().filter(|i| i.as_str() == "wood").count(), 1);
    }

    #[test]
    fn test_best_score_is_kept() {
        let catalog = Catalog::builtin();
        let level = level(&catalog, "level_002");
        let mut progress = PlayerProgress::new();
        progress.complete_level(&level, 80, 2, &catalog);
        let worse = progress.complete_level(&level, 40, 0, &catalog);
        assert!(!worse.new_best);
        let record = progress.record("level_002").unwrap();
        assert_eq!(record.best_score, 80);
        assert_eq!(record.best_stars, 2);
        assert_eq!(record.attempts, 2);
    }

    #[test]
    fn test_inspiration_floor_and_level_up() {
        let catalog = Catalog::builtin();
        let mut progress = PlayerProgress::new();
        assert!(progress.add_inspiration(-50, &catalog).is_none());
        assert_eq!(progress.inspiration, 0);

        let rank = progress.add_inspiration(800, &catalog);
        assert_eq!(rank.map(|r| r.level), Some(2));
        assert!(progress.add_inspiration(10, &catalog).is_none());
    }

    #[test]
    fn test_unlock_ignores_unknown_and_duplicates() {
        let catalog = Catalog::builtin();
        let mut progress = PlayerProgress::new();
        assert!(!progress.unlock_item(&ItemId::from("kazoo"), &catalog));
        assert!(!progress.unlock_item(&ItemId::from("metal"), &catalog));
        assert!(progress.unlock_item(&ItemId::from("glass"), &catalog));
    }

    #[test]
    fn test_purchase() {
        let catalog = Catalog::builtin();
        let reverb = catalog.shop_item("shop_reverb_light").cloned().unwrap();
        let mut progress = PlayerProgress::new();

        assert_eq!(
            progress.purchase(&reverb, &catalog),
            PurchaseOutcome::InsufficientInspiration
        );
        progress.add_inspiration(250, &catalog);
        assert_eq!(progress.purchase(&reverb, &catalog), PurchaseOutcome::Purchased);
        assert_eq!(progress.inspiration, 50);
        assert_eq!(progress.purchase(&reverb, &catalog), PurchaseOutcome::AlreadyOwned);
    }

    #[test]
    fn test_level_unlocking() {
        let catalog = Catalog::builtin();
        let mut progress = PlayerProgress::new();
        assert!(progress.is_level_unlocked(&catalog, "level_001"));
        assert!(progress.is_level_unlocked(&catalog, "level_002"));
        assert!(!progress.is_level_unlocked(&catalog, "level_003"));

        let second = level(&catalog, "level_002");
        progress.complete_level(&second, 10, 0, &catalog);
        assert!(progress.is_level_unlocked(&catalog, "level_003"));
    }

    #[test]
    fn test_json_roundtrip() {
        let catalog = Catalog::builtin();
        let mut progress = PlayerProgress::new();
        progress.complete_level(&level(&catalog, "level_001"), 70, 2, &catalog);
        let json = progress.to_json_string().unwrap();
        assert_eq!(PlayerProgress::from_json_str(&json).unwrap(), progress);
    }
}
