// Catalog of items, levels, shop effects and player ranks
//
// The built-in catalog reproduces the shipped game content. A JSON file with
// the same shape can replace it; loading failures are logged and fall back
// to the built-in data, the same way AppConfig does.

pub mod items;
pub mod levels;
pub mod shop;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::scoring::effects::PurchasedEffect;

pub use items::{builtin_items, AcousticProfile, Item, ItemId, ValueRange};
pub use levels::{builtin_levels, Cue, Level, LevelRewards, PerformanceTarget, WeightedRange};
pub use shop::{builtin_player_levels, builtin_shop, PlayerLevel, ShopItem};

/// On-disk shape of a catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    items: Vec<Item>,
    levels: Vec<Level>,
    #[serde(default = "builtin_shop")]
    shop: Vec<ShopItem>,
    #[serde(default = "builtin_player_levels")]
    player_levels: Vec<PlayerLevel>,
}

/// Static game content
///
/// Items are keyed by id; levels, shop items and player ranks keep their
/// declared order.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: BTreeMap<ItemId, Item>,
    item_order: Vec<ItemId>,
    levels: Vec<Level>,
    shop: Vec<ShopItem>,
    player_levels: Vec<PlayerLevel>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    pub fn builtin() -> Self {
        Self::from_parts(
            builtin_items(),
            builtin_levels(),
            builtin_shop(),
            builtin_player_levels(),
        )
    }

    fn from_parts(
        items: Vec<Item>,
        levels: Vec<Level>,
        shop: Vec<ShopItem>,
        mut player_levels: Vec<PlayerLevel>,
    ) -> Self {
        let item_order = items.iter().map(|item| item.id.clone()).collect();
        let items = items.into_iter().map(|item| (item.id.clone(), item)).collect();
        player_levels.sort_by_key(|rank| rank.unlock_score);
        Self {
            items,
            item_order,
            levels,
            shop,
            player_levels,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Ok(Self::from_parts(
            file.items,
            file.levels,
            file.shop,
            file.player_levels,
        ))
    }

    /// Load a catalog file, falling back to the built-in catalog
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(catalog) => {
                    log::info!(
                        "[Config] Loaded catalog from {:?} ({} items, {} levels)",
                        path.as_ref(),
                        catalog.items.len(),
                        catalog.levels.len()
                    );
                    catalog
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse catalog {:?}: {}. Using built-in catalog.",
                        path.as_ref(),
                        err
                    );
                    Self::builtin()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read catalog {:?}: {}. Using built-in catalog.",
                    path.as_ref(),
                    err
                );
                Self::builtin()
            }
        }
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        let file = CatalogFile {
            items: self.items().cloned().collect(),
            levels: self.levels.clone(),
            shop: self.shop.clone(),
            player_levels: self.player_levels.clone(),
        };
        serde_json::to_string_pretty(&file)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn contains_item(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Items in declared order
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.item_order.iter().filter_map(|id| self.items.get(id))
    }

    pub fn item_ids(&self) -> &[ItemId] {
        &self.item_order
    }

    pub fn profile(&self, id: &str) -> Option<&AcousticProfile> {
        self.item(id).map(|item| &item.profile)
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level(&self, id: &str) -> Option<&Level> {
        self.levels.iter().find(|level| level.id == id)
    }

    pub fn shop(&self) -> &[ShopItem] {
        &self.shop
    }

    pub fn shop_item(&self, id: &str) -> Option<&ShopItem> {
        self.shop.iter().find(|item| item.id == id)
    }

    /// Effects granted by the given purchases; unknown ids are skipped
    pub fn effects_for<S: AsRef<str>>(&self, purchased: &[S]) -> Vec<PurchasedEffect> {
        purchased
            .iter()
            .filter_map(|id| self.shop_item(id.as_ref()))
            .map(|item| item.effect.clone())
            .collect()
    }

    pub fn player_levels(&self) -> &[PlayerLevel] {
        &self.player_levels
    }

    /// Highest rank whose threshold the total has reached
    pub fn player_level_for(&self, inspiration: u32) -> Option<&PlayerLevel> {
        self.player_levels
            .iter()
            .rev()
            .find(|rank| inspiration >= rank.unlock_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_contents() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.item_ids().len(), 10);
        assert_eq!(catalog.item_ids()[0].as_str(), "metal");
        assert_eq!(catalog.levels().len(), 3);
        assert_eq!(catalog.shop().len(), 3);
        assert!(catalog.item("voice_low").is_some());
        assert!(catalog.item("kazoo").is_none());
    }

    #[test]
    fn test_levels_reference_known_items() {
        let catalog = Catalog::builtin();
        for level in catalog.levels() {
            for id in &level.initial_items {
                assert!(catalog.contains_item(id.as_str()), "{} in {}", id, level.id);
            }
            for cue in &level.cues {
                assert!(catalog.contains_item(cue.expected_type.as_str()));
            }
        }
    }

    #[test]
    fn test_player_level_thresholds() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.player_level_for(0).map(|r| r.level), Some(1));
        assert_eq!(catalog.player_level_for(749).map(|r| r.level), Some(1));
        assert_eq!(catalog.player_level_for(750).map(|r| r.level), Some(2));
        assert_eq!(catalog.player_level_for(10_000).map(|r| r.level), Some(4));
    }

    #[test]
    fn test_effects_for_skips_unknown_purchases() {
        let catalog = Catalog::builtin();
        let effects = catalog.effects_for(&["shop_vintage_mic", "shop_unknown"]);
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].performance_tolerance_boost, 5.0);
    }

    #[test]
    fn test_json_roundtrip_keeps_order() {
        let catalog = Catalog::builtin();
        let json = catalog.to_json_string().unwrap();
        let parsed = Catalog::from_json_str(&json).unwrap();
        assert_eq!(parsed.item_ids(), catalog.item_ids());
        assert_eq!(parsed.levels(), catalog.levels());
    }

    #[test]
    fn test_missing_file_falls_back_to_builtin() {
        let catalog = Catalog::load_from_file("/nonexistent/catalog.json");
        assert_eq!(catalog.levels().len(), 3);
    }
}
