// Shop items and player level thresholds

use serde::{Deserialize, Serialize};

use crate::scoring::effects::{BonusCategory, EffectCondition, EffectKind, PurchasedEffect};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: u32,
    pub effect: PurchasedEffect,
}

/// Player rank reached at an inspiration total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLevel {
    pub level: u32,
    pub name: String,
    pub unlock_score: u32,
}

pub fn builtin_shop() -> Vec<ShopItem> {
    vec![
        ShopItem {
            id: "shop_reverb_light".to_string(),
            name: "Light Reverb".to_string(),
            description: "Adds a light echo and a sense of space.".to_string(),
            price: 200,
            effect: PurchasedEffect {
                id: "shop_reverb_light".to_string(),
                kind: EffectKind::Reverb,
                bonus_category: BonusCategory::Creativity,
                bonus_points: 5.0,
                performance_tolerance_boost: 0.0,
                condition: EffectCondition {
                    clarity_min: Some(60.0),
                    ..EffectCondition::default()
                },
            },
        },
        ShopItem {
            id: "shop_bass_boost".to_string(),
            name: "Bass Boost Horn".to_string(),
            description: "Boosts the low end for more impact.".to_string(),
            price: 400,
            effect: PurchasedEffect {
                id: "shop_bass_boost".to_string(),
                kind: EffectKind::EqBassBoost,
                bonus_category: BonusCategory::Performance,
                bonus_points: 7.0,
                performance_tolerance_boost: 0.0,
                condition: EffectCondition {
                    volume_min: Some(70.0),
                    pitch_variation_max: Some(40.0),
                    ..EffectCondition::default()
                },
            },
        },
        ShopItem {
            id: "shop_vintage_mic".to_string(),
            name: "Vintage Mic Filter".to_string(),
            description: "Warm old-microphone tone with a little crackle.".to_string(),
            price: 600,
            effect: PurchasedEffect {
                id: "shop_vintage_mic".to_string(),
                kind: EffectKind::FilterVintage,
                bonus_category: BonusCategory::Creativity,
                bonus_points: 8.0,
                performance_tolerance_boost: 5.0,
                condition: EffectCondition::default(),
            },
        },
    ]
}

pub fn builtin_player_levels() -> Vec<PlayerLevel> {
    [
        (1, "Attic Studio", 0),
        (2, "Junk Warehouse", 750),
        (3, "Basement Workshop", 2000),
        (4, "Broadcast Tower", 5000),
    ]
    .into_iter()
    .map(|(level, name, unlock_score)| PlayerLevel {
        level,
        name: name.to_string(),
        unlock_score,
    })
    .collect()
}
