// Built-in store and mission catalogs, and the closed enums they use.
//
// The catalogs are read-only seed data; the ledger only reads ids, prices
// and rewards from them.

use serde::{Deserialize, Serialize};

use crate::ledger::{InventoryItem, Mission};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    WeaponSkin,
    Outfit,
    Emote,
    ProfileFrame,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// What a mission counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionGoal {
    /// Successful `place_bet` calls.
    PlaceBets,
    /// Wagers settled as won.
    WinBets,
    /// Store purchases.
    PurchaseItems,
    /// Advanced only through explicit progress reports.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionCadence {
    Daily,
    Weekly,
    Achievement,
}

/// Items offered in the points store.
pub fn store_items() -> Vec<InventoryItem> {
    use ItemCategory::*;
    use Rarity::*;

    [
        ("m416-glacier", "M416 Glacier", 1800, WeaponSkin, Legendary),
        ("akm-desert-fossil", "AKM Desert Fossil", 900, WeaponSkin, Epic),
        ("pharaoh-outfit", "Golden Pharaoh Outfit", 1500, Outfit, Legendary),
        ("squad-wipe-emote", "Squad Wipe Emote", 400, Emote, Rare),
        ("chicken-dinner-frame", "Chicken Dinner Frame", 250, ProfileFrame, Rare),
        ("rookie-title", "Rookie Analyst", 100, Title, Common),
    ]
    .into_iter()
    .map(|(id, name, price, category, rarity)| InventoryItem {
        id: id.to_string(),
        name: name.to_string(),
        price,
        category,
        rarity,
    })
    .collect()
}

/// Look up a store item by id.
pub fn find_store_item(id: &str) -> Option<InventoryItem> {
    store_items().into_iter().find(|item| item.id == id)
}

/// Missions every fresh ledger starts with.
pub fn default_missions() -> Vec<Mission> {
    use MissionCadence::*;
    use MissionGoal::*;

    vec![
        Mission::new("daily-first-bet", "Place your first prediction today", PlaceBets, Daily, 1, 50),
        Mission::new("daily-three-bets", "Place 3 predictions", PlaceBets, Daily, 3, 120),
        Mission::new("weekly-winner", "Win 5 predictions", WinBets, Weekly, 5, 400),
        Mission::new("collector", "Buy your first store item", PurchaseItems, Achievement, 1, 100),
        Mission::new("watch-finals", "Watch 5 tournament matches", Manual, Weekly, 5, 50),
    ]
}
