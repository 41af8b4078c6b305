// Records owned by the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{ItemCategory, MissionCadence, MissionGoal, Rarity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerStatus {
    Open,
    Won,
    Lost,
}

/// A stake on one selection of a match. Only `status` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wager {
    pub id: Uuid,
    pub match_id: String,
    pub selection_id: String,
    pub stake: i64,
    pub odds: f64,
    pub potential_payout: i64,
    pub status: WagerStatus,
    pub placed_at: DateTime<Utc>,
}

impl Wager {
    pub fn is_open(&self) -> bool {
        self.status == WagerStatus::Open
    }
}

/// Payout owed to a winning stake: `floor(stake * odds)`.
pub fn potential_payout(stake: i64, odds: f64) -> i64 {
    (stake as f64 * odds).floor() as i64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub category: ItemCategory,
    pub rarity: Rarity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub title: String,
    pub goal: MissionGoal,
    pub cadence: MissionCadence,
    pub reward_amount: i64,
    pub progress_current: u32,
    pub progress_target: u32,
    pub claimed: bool,
}

impl Mission {
    pub fn new(
        id: &str,
        title: &str,
        goal: MissionGoal,
        cadence: MissionCadence,
        progress_target: u32,
        reward_amount: i64,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            goal,
            cadence,
            reward_amount,
            progress_current: 0,
            progress_target,
            claimed: false,
        }
    }

    pub fn completed(&self) -> bool {
        self.progress_current >= self.progress_target
    }

    pub fn claimable(&self) -> bool {
        self.completed() && !self.claimed
    }

    /// Add progress, capped at the target. Returns whether anything changed.
    pub(crate) fn advance(&mut self, amount: u32) -> bool {
        let next = self
            .progress_current
            .saturating_add(amount)
            .min(self.progress_target);
        let changed = next != self.progress_current;
        self.progress_current = next;
        changed
    }
}
