//! Persistence collaborator: durable create/read/update of round and wager
//! records.
//!
//! The engine only relies on the narrow contract below; the persisted
//! representation is the collaborator's concern. The in-memory store backs
//! tests and embedded use.

use crate::errors::{EngineError, EngineResult};
use crate::types::{Amount, PlayerId, Round, RoundId, Wager, WagerId, WagerStatus};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-round stake aggregates, used by operator listings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoundStats {
    pub wagers_total: usize,
    pub wagers_pending: usize,
    pub stake_total: Amount,
    pub stake_pending: Amount,
}

/// Storage contract for rounds and wagers.
#[async_trait]
pub trait RoundStore: Send + Sync {
    /// Allocate the next monotonic round sequence number.
    async fn next_round_id(&self) -> EngineResult<RoundId>;

    async fn insert_round(&self, round: Round) -> EngineResult<()>;

    async fn round(&self, id: RoundId) -> EngineResult<Option<Round>>;

    /// Every stored round, ordered by id ascending.
    async fn rounds(&self) -> EngineResult<Vec<Round>>;

    /// The round currently `Accepting` or `Locked`, if any. At most one
    /// exists at a time; the engine enforces that precondition on open.
    async fn live_round(&self) -> EngineResult<Option<Round>>;

    /// Persist an updated round record (state transition, outcome).
    async fn update_round(&self, round: &Round) -> EngineResult<()>;

    async fn insert_wager(&self, wager: Wager) -> EngineResult<()>;

    async fn wager(&self, id: WagerId) -> EngineResult<Option<Wager>>;

    async fn wagers_for_round(&self, round_id: RoundId) -> EngineResult<Vec<Wager>>;

    async fn wagers_for_player(&self, player: &PlayerId) -> EngineResult<Vec<Wager>>;

    /// Record a wager's settlement, write-once: if the wager already
    /// carries a non-`Pending` status the call is a no-op, so settlement
    /// replays never alter an existing result.
    async fn record_settlement(
        &self,
        wager_id: WagerId,
        status: WagerStatus,
        payout: Amount,
    ) -> EngineResult<()>;

    async fn round_stats(&self, round_id: RoundId) -> EngineResult<RoundStats>;
}

/// In-memory reference store.
pub struct InMemoryStore {
    rounds: DashMap<RoundId, Round>,
    wagers: DashMap<WagerId, Wager>,
    round_index: DashMap<RoundId, Vec<WagerId>>,
    sequence: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rounds: DashMap::new(),
            wagers: DashMap::new(),
            round_index: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoundStore for InMemoryStore {
    async fn next_round_id(&self) -> EngineResult<RoundId> {
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn insert_round(&self, round: Round) -> EngineResult<()> {
        self.rounds.insert(round.id, round);
        Ok(())
    }

    async fn round(&self, id: RoundId) -> EngineResult<Option<Round>> {
        Ok(self.rounds.get(&id).map(|r| r.clone()))
    }

    async fn rounds(&self) -> EngineResult<Vec<Round>> {
        let mut rounds: Vec<Round> = self.rounds.iter().map(|r| r.value().clone()).collect();
        rounds.sort_by_key(|r| r.id);
        Ok(rounds)
    }

    async fn live_round(&self) -> EngineResult<Option<Round>> {
        Ok(self
            .rounds
            .iter()
            .find(|entry| entry.value().is_live())
            .map(|entry| entry.value().clone()))
    }

    async fn update_round(&self, round: &Round) -> EngineResult<()> {
        match self.rounds.get_mut(&round.id) {
            Some(mut existing) => {
                *existing = round.clone();
                Ok(())
            }
            None => Err(EngineError::RoundNotFound(round.id)),
        }
    }

    async fn insert_wager(&self, wager: Wager) -> EngineResult<()> {
        self.round_index
            .entry(wager.round_id)
            .or_default()
            .push(wager.id);
        self.wagers.insert(wager.id, wager);
        Ok(())
    }

    async fn wager(&self, id: WagerId) -> EngineResult<Option<Wager>> {
        Ok(self.wagers.get(&id).map(|w| w.clone()))
    }

    async fn wagers_for_round(&self, round_id: RoundId) -> EngineResult<Vec<Wager>> {
        let ids = match self.round_index.get(&round_id) {
            Some(ids) => ids.clone(),
            None => return Ok(Vec::new()),
        };

        Ok(ids
            .iter()
            .filter_map(|id| self.wagers.get(id).map(|w| w.clone()))
            .collect())
    }

    async fn wagers_for_player(&self, player: &PlayerId) -> EngineResult<Vec<Wager>> {
        let mut wagers: Vec<Wager> = self
            .wagers
            .iter()
            .filter(|entry| &entry.value().player_id == player)
            .map(|entry| entry.value().clone())
            .collect();
        wagers.sort_by_key(|w| w.placed_at);
        Ok(wagers)
    }

    async fn record_settlement(
        &self,
        wager_id: WagerId,
        status: WagerStatus,
        payout: Amount,
    ) -> EngineResult<()> {
        let mut wager = self
            .wagers
            .get_mut(&wager_id)
            .ok_or(EngineError::WagerNotFound(wager_id))?;

        // Write-once: an already settled wager keeps its result.
        if !wager.is_pending() {
            return Ok(());
        }

        wager.status = status;
        wager.payout = payout;
        wager.settled_at = Some(Utc::now());
        Ok(())
    }

    async fn round_stats(&self, round_id: RoundId) -> EngineResult<RoundStats> {
        let wagers = self.wagers_for_round(round_id).await?;
        let mut stats = RoundStats::default();
        for wager in &wagers {
            stats.wagers_total += 1;
            stats.stake_total += wager.total_stake();
            if wager.is_pending() {
                stats.wagers_pending += 1;
                stats.stake_pending += wager.total_stake();
            }
        }
        Ok(stats)
    }
}
