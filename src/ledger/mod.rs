// Points ledger: balance, wagers, owned items and mission rewards.
//
// Every mutating operation builds the next state on a copy, writes the keys
// that changed in a single batch, and only then replaces the in-memory state.
// A rejected or failed operation therefore leaves both memory and the store
// exactly as they were.

mod types;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{self, MissionGoal};
use crate::error::{LedgerError, StoreError};
use crate::metrics;
use crate::store::KvStore;

pub use types::{potential_payout, InventoryItem, Mission, Wager, WagerStatus};

pub const BALANCE_KEY: &str = "ledger.balance";
pub const WAGERS_KEY: &str = "ledger.wagers";
pub const INVENTORY_KEY: &str = "ledger.inventory";
pub const MISSIONS_KEY: &str = "ledger.missions";

/// Version written into every stored envelope.
pub const SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_WELCOME_BALANCE: i64 = 2500;

/// First-run parameters.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Balance granted the first time a ledger is opened on an empty store.
    pub welcome_balance: i64,
    /// Mission catalog. Missions missing from the store are added on open.
    pub missions: Vec<Mission>,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            welcome_balance: DEFAULT_WELCOME_BALANCE,
            missions: catalog::default_missions(),
        }
    }
}

/// Everything the ledger persists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerState {
    pub balance: i64,
    /// Newest first.
    pub wagers: Vec<Wager>,
    pub inventory: Vec<InventoryItem>,
    pub missions: Vec<Mission>,
}

pub struct Ledger<S> {
    store: S,
    state: LedgerState,
}

impl<S: KvStore> Ledger<S> {
    /// Load the ledger from `store`, initializing it on first run.
    pub async fn open(store: S, settings: LedgerSettings) -> Result<Self, LedgerError> {
        let Some(raw_balance) = store.get(BALANCE_KEY).await? else {
            let state = LedgerState {
                balance: settings.welcome_balance.max(0),
                wagers: Vec::new(),
                inventory: Vec::new(),
                missions: settings.missions,
            };
            let entries = vec![
                (BALANCE_KEY.to_string(), encode(&state.balance)?),
                (WAGERS_KEY.to_string(), encode(&state.wagers)?),
                (INVENTORY_KEY.to_string(), encode(&state.inventory)?),
                (MISSIONS_KEY.to_string(), encode(&state.missions)?),
            ];
            write_with_retry(&store, &entries).await?;
            tracing::info!("Initialized new ledger with {} points", state.balance);
            let ledger = Self { store, state };
            ledger.publish_gauges();
            return Ok(ledger);
        };

        let balance: i64 = decode(BALANCE_KEY, &raw_balance)?;
        let wagers: Vec<Wager> = load_or_default(&store, WAGERS_KEY).await?;
        let inventory: Vec<InventoryItem> = load_or_default(&store, INVENTORY_KEY).await?;
        let mut missions: Vec<Mission> = load_or_default(&store, MISSIONS_KEY).await?;

        let known = missions.len();
        for mission in settings.missions {
            if !missions.iter().any(|m| m.id == mission.id) {
                missions.push(mission);
            }
        }
        if missions.len() != known {
            let entries = vec![(MISSIONS_KEY.to_string(), encode(&missions)?)];
            write_with_retry(&store, &entries).await?;
            tracing::info!("Added {} new missions from catalog", missions.len() - known);
        }

        tracing::info!(
            "Loaded ledger: balance {balance}, {} wagers, {} items",
            wagers.len(),
            inventory.len()
        );
        let ledger = Self {
            store,
            state: LedgerState {
                balance,
                wagers,
                inventory,
                missions,
            },
        };
        ledger.publish_gauges();
        Ok(ledger)
    }

    // ── Reads ─────────────────────────────────────────────────────────

    pub fn balance(&self) -> i64 {
        self.state.balance
    }

    /// All wagers, newest first.
    pub fn wagers(&self) -> &[Wager] {
        &self.state.wagers
    }

    pub fn open_wagers(&self) -> impl Iterator<Item = &Wager> {
        self.state.wagers.iter().filter(|w| w.is_open())
    }

    pub fn inventory(&self) -> &[InventoryItem] {
        &self.state.inventory
    }

    pub fn owns(&self, item_id: &str) -> bool {
        self.state.inventory.iter().any(|i| i.id == item_id)
    }

    pub fn missions(&self) -> &[Mission] {
        &self.state.missions
    }

    pub fn mission(&self, id: &str) -> Option<&Mission> {
        self.state.missions.iter().find(|m| m.id == id)
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give back the store, e.g. to reopen the ledger from it.
    pub fn into_store(self) -> S {
        self.store
    }

    // ── Wagers ────────────────────────────────────────────────────────

    /// Stake `stake` points on `selection_id` winning `match_id`.
    pub async fn place_bet(
        &mut self,
        match_id: &str,
        selection_id: &str,
        stake: i64,
        odds: f64,
    ) -> Result<Wager, LedgerError> {
        if stake <= 0 {
            return Err(rejected(LedgerError::InvalidStake(stake)));
        }
        if !odds.is_finite() || odds < 1.0 {
            return Err(rejected(LedgerError::InvalidOdds(odds)));
        }
        if stake > self.state.balance {
            return Err(rejected(LedgerError::InsufficientBalance {
                available: self.state.balance,
                required: stake,
            }));
        }

        let wager = Wager {
            id: Uuid::new_v4(),
            match_id: match_id.to_string(),
            selection_id: selection_id.to_string(),
            stake,
            odds,
            potential_payout: potential_payout(stake, odds),
            status: WagerStatus::Open,
            placed_at: chrono::Utc::now(),
        };

        let mut next = self.state.clone();
        next.balance -= stake;
        next.wagers.insert(0, wager.clone());
        advance_goal(&mut next.missions, MissionGoal::PlaceBets, 1);
        self.commit(next).await?;

        metrics::BETS_PLACED_TOTAL.inc();
        tracing::info!(
            "Bet placed on {match_id}/{selection_id}: stake {stake} at {odds}, pays {}",
            wager.potential_payout
        );
        Ok(wager)
    }

    /// Resolve every open wager on `match_id` and credit the winners.
    ///
    /// Returns the total paid out. Wagers already won or lost are never
    /// re-evaluated, so settling the same match twice pays once.
    pub async fn settle_bets(
        &mut self,
        match_id: &str,
        winning_selection_id: &str,
    ) -> Result<i64, LedgerError> {
        let mut next = self.state.clone();
        let mut total_payout: i64 = 0;
        let mut won: u32 = 0;
        let mut lost: u32 = 0;

        for wager in next
            .wagers
            .iter_mut()
            .filter(|w| w.match_id == match_id && w.is_open())
        {
            if wager.selection_id == winning_selection_id {
                wager.status = WagerStatus::Won;
                total_payout = total_payout.saturating_add(wager.potential_payout);
                won += 1;
            } else {
                wager.status = WagerStatus::Lost;
                lost += 1;
            }
        }

        if won + lost == 0 {
            return Ok(0);
        }

        if total_payout > 0 {
            next.balance = next.balance.saturating_add(total_payout);
        }
        advance_goal(&mut next.missions, MissionGoal::WinBets, won);
        self.commit(next).await?;

        metrics::BETS_SETTLED_TOTAL
            .with_label_values(&["won"])
            .inc_by(u64::from(won));
        metrics::BETS_SETTLED_TOTAL
            .with_label_values(&["lost"])
            .inc_by(u64::from(lost));
        metrics::PAYOUT_POINTS_TOTAL.inc_by(total_payout.max(0) as u64);
        tracing::info!(
            "Settled {match_id} for {winning_selection_id}: {won} won, {lost} lost, paid {total_payout}"
        );
        Ok(total_payout)
    }

    // ── Store ─────────────────────────────────────────────────────────

    /// Buy `item` once. Owning it already is an error and never charges.
    pub async fn purchase_item(&mut self, item: &InventoryItem) -> Result<(), LedgerError> {
        if self.owns(&item.id) {
            return Err(rejected(LedgerError::AlreadyOwned(item.id.clone())));
        }
        if item.price < 0 {
            return Err(rejected(LedgerError::InvalidAmount(item.price)));
        }
        if self.state.balance < item.price {
            return Err(rejected(LedgerError::InsufficientBalance {
                available: self.state.balance,
                required: item.price,
            }));
        }

        let mut next = self.state.clone();
        next.balance -= item.price;
        next.inventory.push(item.clone());
        advance_goal(&mut next.missions, MissionGoal::PurchaseItems, 1);
        self.commit(next).await?;

        metrics::PURCHASES_TOTAL.inc();
        tracing::info!("Purchased {} for {}", item.id, item.price);
        Ok(())
    }

    // ── Missions ──────────────────────────────────────────────────────

    /// Credit a completed mission's reward once.
    ///
    /// Unknown, incomplete and already-claimed missions are a silent no-op
    /// and return `Ok(None)`; otherwise returns the reward credited.
    pub async fn claim_mission(&mut self, mission_id: &str) -> Result<Option<i64>, LedgerError> {
        let mut next = self.state.clone();
        let Some(mission) = next
            .missions
            .iter_mut()
            .find(|m| m.id == mission_id && m.claimable())
        else {
            tracing::debug!("Mission {mission_id} is not claimable");
            return Ok(None);
        };

        mission.claimed = true;
        let reward = mission.reward_amount;
        next.balance = next.balance.saturating_add(reward);
        self.commit(next).await?;

        metrics::MISSIONS_CLAIMED_TOTAL.inc();
        tracing::info!("Claimed mission {mission_id} for {reward}");
        Ok(Some(reward))
    }

    /// Report progress on a mission, capped at its target.
    /// Returns whether the progress changed; unknown ids are a no-op.
    pub async fn advance_mission(
        &mut self,
        mission_id: &str,
        amount: u32,
    ) -> Result<bool, LedgerError> {
        let mut next = self.state.clone();
        let changed = next
            .missions
            .iter_mut()
            .find(|m| m.id == mission_id)
            .is_some_and(|m| m.advance(amount));
        if !changed {
            return Ok(false);
        }
        self.commit(next).await?;
        Ok(true)
    }

    // ── Direct adjustments ────────────────────────────────────────────

    /// Internal credit or debit not tied to a bet or purchase.
    ///
    /// Always applied, but a debit larger than the balance stops at zero so
    /// the balance never goes negative. Returns the new balance.
    pub async fn add_points(&mut self, amount: i64) -> Result<i64, LedgerError> {
        let target = self.state.balance.saturating_add(amount);
        if target < 0 {
            tracing::warn!(
                "Adjustment of {amount} exceeds balance {}; clamping to 0",
                self.state.balance
            );
        }
        let mut next = self.state.clone();
        next.balance = target.max(0);
        self.commit(next).await?;
        Ok(self.state.balance)
    }

    /// User-initiated deduction such as a contest entry fee.
    /// Fails instead of overdrawing. Returns the new balance.
    pub async fn charge_fee(&mut self, amount: i64) -> Result<i64, LedgerError> {
        if amount <= 0 {
            return Err(rejected(LedgerError::InvalidAmount(amount)));
        }
        if amount > self.state.balance {
            return Err(rejected(LedgerError::InsufficientBalance {
                available: self.state.balance,
                required: amount,
            }));
        }
        let mut next = self.state.clone();
        next.balance -= amount;
        self.commit(next).await?;
        tracing::info!("Charged fee of {amount}");
        Ok(self.state.balance)
    }

    // ── Commit ────────────────────────────────────────────────────────

    /// Persist the fields of `next` that differ from the current state, then
    /// adopt it. On a failed write the current state is kept.
    async fn commit(&mut self, next: LedgerState) -> Result<(), LedgerError> {
        let mut entries = Vec::new();
        if next.balance != self.state.balance {
            entries.push((BALANCE_KEY.to_string(), encode(&next.balance)?));
        }
        if next.wagers != self.state.wagers {
            entries.push((WAGERS_KEY.to_string(), encode(&next.wagers)?));
        }
        if next.inventory != self.state.inventory {
            entries.push((INVENTORY_KEY.to_string(), encode(&next.inventory)?));
        }
        if next.missions != self.state.missions {
            entries.push((MISSIONS_KEY.to_string(), encode(&next.missions)?));
        }

        if !entries.is_empty() {
            write_with_retry(&self.store, &entries).await?;
        }
        self.state = next;
        self.publish_gauges();
        Ok(())
    }

    fn publish_gauges(&self) {
        metrics::LEDGER_BALANCE.set(self.state.balance);
        metrics::OPEN_WAGERS.set(self.open_wagers().count() as i64);
    }
}

/// Write a batch, retrying once before giving up.
async fn write_with_retry<S: KvStore>(
    store: &S,
    entries: &[(String, String)],
) -> Result<(), LedgerError> {
    let Err(first) = store.set_many(entries).await else {
        return Ok(());
    };
    metrics::STORAGE_WRITE_FAILURES_TOTAL.inc();
    tracing::warn!("Ledger write failed, retrying once: {first}");

    if let Err(e) = store.set_many(entries).await {
        metrics::STORAGE_WRITE_FAILURES_TOTAL.inc();
        tracing::error!("Ledger write failed after retry: {e}");
        let err = LedgerError::StorageFailure(e);
        metrics::LEDGER_REJECTIONS_TOTAL
            .with_label_values(&[err.kind()])
            .inc();
        return Err(err);
    }
    Ok(())
}

fn rejected(err: LedgerError) -> LedgerError {
    tracing::warn!("Ledger operation rejected: {err}");
    metrics::LEDGER_REJECTIONS_TOTAL
        .with_label_values(&[err.kind()])
        .inc();
    err
}

fn advance_goal(missions: &mut [Mission], goal: MissionGoal, amount: u32) {
    if amount == 0 {
        return;
    }
    for mission in missions.iter_mut().filter(|m| m.goal == goal) {
        mission.advance(amount);
    }
}

// ── Stored shape ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    data: serde_json::Value,
}

fn encode<T: Serialize>(value: &T) -> Result<String, StoreError> {
    Ok(serde_json::to_string(&EnvelopeRef {
        version: SCHEMA_VERSION,
        data: value,
    })?)
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StoreError> {
    let corrupt = |e: serde_json::Error| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    };
    let envelope: Envelope = serde_json::from_str(raw).map_err(corrupt)?;
    if envelope.version != SCHEMA_VERSION {
        return Err(StoreError::UnsupportedVersion {
            key: key.to_string(),
            version: envelope.version,
        });
    }
    serde_json::from_value(envelope.data).map_err(corrupt)
}

async fn load_or_default<S: KvStore, T: DeserializeOwned + Default>(
    store: &S,
    key: &str,
) -> Result<T, StoreError> {
    match store.get(key).await? {
        Some(raw) => decode(key, &raw),
        None => Ok(T::default()),
    }
}
