//! Round lifecycle orchestration: the operations exposed to the thin API
//! layer.
//!
//! Per-round transitions are serialized through a round mutex; wager
//! acceptance re-checks the round state after acquiring it, so a wager
//! racing a lock either fully succeeds against the pre-lock state or is
//! rejected, never accepted and silently excluded from settlement.

use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::identity::{Caller, Role};
use crate::ledger::LedgerGateway;
use crate::settlement::{SettlementEngine, SettlementSummary};
use crate::store::{RoundStats, RoundStore};
use crate::types::{Round, RoundId, RoundState, StakeLine, Wager, WagerId, WagerStatus};
use crate::validator;
use crate::wheel::OutcomeSource;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The round lifecycle and settlement engine.
pub struct RoundEngine {
    store: Arc<dyn RoundStore>,
    ledger: Arc<dyn LedgerGateway>,
    outcomes: Arc<dyn OutcomeSource>,
    settlement: SettlementEngine,
    round_locks: DashMap<RoundId, Arc<Mutex<()>>>,
    open_lock: Mutex<()>,
    io_timeout: Duration,
}

impl RoundEngine {
    pub fn new(
        store: Arc<dyn RoundStore>,
        ledger: Arc<dyn LedgerGateway>,
        outcomes: Arc<dyn OutcomeSource>,
        config: &EngineConfig,
    ) -> Self {
        let settlement = SettlementEngine::new(
            store.clone(),
            ledger.clone(),
            config.settlement_concurrency,
        );
        Self {
            store,
            ledger,
            outcomes,
            settlement,
            round_locks: DashMap::new(),
            open_lock: Mutex::new(()),
            io_timeout: Duration::from_millis(config.io_timeout_ms),
        }
    }

    /// Bound a persistence/ledger call. A timed-out operation must not be
    /// assumed applied; the caller retries the whole logical operation.
    async fn io<T>(&self, fut: impl Future<Output = EngineResult<T>>) -> EngineResult<T> {
        match tokio::time::timeout(self.io_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::PersistenceUnavailable(format!(
                "I/O timed out after {}ms",
                self.io_timeout.as_millis()
            ))),
        }
    }

    fn round_lock(&self, round_id: RoundId) -> Arc<Mutex<()>> {
        self.round_locks
            .entry(round_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load_round(&self, round_id: RoundId) -> EngineResult<Round> {
        self.io(self.store.round(round_id))
            .await?
            .ok_or(EngineError::RoundNotFound(round_id))
    }

    /// Open a new round, or return the existing live one. Only one round is
    /// `Accepting` or `Locked` at a time; the check-then-create is
    /// serialized so concurrent opens cannot mint duplicates.
    pub async fn open_round(&self, caller: &Caller) -> EngineResult<Round> {
        caller.require(Role::Operator)?;

        let _guard = self.open_lock.lock().await;

        if let Some(existing) = self.io(self.store.live_round()).await? {
            debug!(round = existing.id, "open requested while a round is live");
            return Ok(existing);
        }

        let id = self.io(self.store.next_round_id()).await?;
        let round = Round::open(id);
        self.io(self.store.insert_round(round.clone())).await?;
        info!(round = id, "round opened");
        Ok(round)
    }

    /// Accept a wager against an accepting round: validate, re-check state
    /// under the round lock, debit the stake, persist the wager. If
    /// persistence fails after the debit, the stake is refunded through the
    /// same gateway before the error is surfaced.
    ///
    /// A caller retrying after a `PersistenceUnavailable` error passes the
    /// same `wager_id` so the debit keeps its idempotency key; one-shot
    /// callers pass `None` for a fresh id.
    pub async fn place_wager(
        &self,
        caller: &Caller,
        round_id: RoundId,
        lines: Vec<StakeLine>,
        wager_id: Option<WagerId>,
    ) -> EngineResult<Wager> {
        validator::validate(&lines)?;

        let lock = self.round_lock(round_id);
        let _guard = lock.lock().await;

        let round = self.load_round(round_id).await?;
        if !round.is_accepting() {
            if !round.is_live() {
                self.round_locks.remove(&round_id);
            }
            return Err(EngineError::RoundNotOpen(round_id));
        }

        // A replayed placement whose first attempt got through returns the
        // stored wager instead of debiting again.
        if let Some(id) = wager_id {
            if let Some(existing) = self.io(self.store.wager(id)).await? {
                return Ok(existing);
            }
        }

        let wager = Wager::place_with_id(
            wager_id.unwrap_or_else(WagerId::new_v4),
            round_id,
            caller.player_id.clone(),
            lines,
        );
        let total = wager.total_stake();

        self.io(self.ledger.debit(
            &caller.player_id,
            total,
            &format!("debit:{}", wager.id),
        ))
        .await?;

        if let Err(e) = self.io(self.store.insert_wager(wager.clone())).await {
            // The stake must not leave the balance without a durable wager
            // record in the same logical operation.
            self.io(self.ledger.credit(
                &caller.player_id,
                total,
                &format!("refund:{}", wager.id),
            ))
            .await?;
            return Err(e);
        }

        debug!(
            round = round_id,
            player = %caller.player_id,
            wager = %wager.id,
            stake = total,
            "wager accepted"
        );
        Ok(wager)
    }

    /// Close the round to new wagers. Idempotent for operator double-clicks:
    /// a round already past `Accepting` is returned as-is.
    pub async fn lock_round(&self, caller: &Caller, round_id: RoundId) -> EngineResult<Round> {
        caller.require(Role::Operator)?;

        let lock = self.round_lock(round_id);
        let _guard = lock.lock().await;

        let mut round = self.load_round(round_id).await?;
        if round.state != RoundState::Accepting {
            debug!(round = round_id, state = %round.state, "lock replay observed current state");
            if !round.is_live() {
                self.round_locks.remove(&round_id);
            }
            return Ok(round);
        }

        round.apply_lock()?;
        self.io(self.store.update_round(&round)).await?;
        info!(round = round_id, "round locked");
        Ok(round)
    }

    /// Draw the outcome and settle every wager of the round. The draw
    /// happens exactly once: concurrent resolvers serialize on the round
    /// lock and the loser observes the already-resolved state. Re-resolving
    /// a resolved round re-runs settlement over still-pending wagers only,
    /// which makes a crash between outcome storage and settlement
    /// recoverable by retrying the call.
    pub async fn resolve_round(
        &self,
        caller: &Caller,
        round_id: RoundId,
    ) -> EngineResult<(Round, SettlementSummary)> {
        caller.require(Role::Operator)?;

        let lock = self.round_lock(round_id);
        let _guard = lock.lock().await;

        let mut round = self.load_round(round_id).await?;

        match round.state {
            RoundState::Accepting => Err(EngineError::InvalidTransition {
                round: round_id,
                from: round.state,
                to: RoundState::Resolved,
            }),
            RoundState::Locked => {
                let outcome = self.outcomes.draw();
                round.apply_resolution(outcome)?;
                // The outcome must be durable before settlement begins so a
                // crash in between leaves a resolvable, not a half-drawn,
                // round.
                self.io(self.store.update_round(&round)).await?;
                info!(
                    round = round_id,
                    pocket = outcome.pocket,
                    color = %outcome.color,
                    "round resolved"
                );

                let summary = self.settlement.settle_round(&round).await?;
                // Resolved rounds reject every transition; the lock entry
                // has no further use, so the map stays bounded by live
                // rounds. Racing operations re-check state under whichever
                // mutex they hold, so a recreated entry is harmless.
                self.round_locks.remove(&round_id);
                Ok((round, summary))
            }
            RoundState::Resolved => {
                debug!(round = round_id, "resolve replay, re-running settlement");
                let summary = self.settlement.settle_round(&round).await?;
                self.round_locks.remove(&round_id);
                Ok((round, summary))
            }
        }
    }

    pub async fn round(&self, round_id: RoundId) -> EngineResult<Round> {
        self.load_round(round_id).await
    }

    /// Every round, ordered by id. Operator listing surface.
    pub async fn rounds(&self) -> EngineResult<Vec<Round>> {
        self.io(self.store.rounds()).await
    }

    pub async fn round_stats(&self, round_id: RoundId) -> EngineResult<RoundStats> {
        self.load_round(round_id).await?;
        self.io(self.store.round_stats(round_id)).await
    }

    /// Wagers of a round, optionally filtered by settlement status.
    pub async fn round_wagers(
        &self,
        round_id: RoundId,
        status: Option<WagerStatus>,
    ) -> EngineResult<Vec<Wager>> {
        self.load_round(round_id).await?;
        let mut wagers = self.io(self.store.wagers_for_round(round_id)).await?;
        if let Some(status) = status {
            wagers.retain(|w| w.status == status);
        }
        Ok(wagers)
    }

    /// A player's own wager history.
    pub async fn player_wagers(&self, caller: &Caller) -> EngineResult<Vec<Wager>> {
        self.io(self.store.wagers_for_player(&caller.player_id))
            .await
    }
}
