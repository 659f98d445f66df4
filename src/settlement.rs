//! Settlement engine: computes payouts for a resolved round and applies
//! credits through the ledger gateway.
//!
//! Wagers are settled independently; the order is not observable and a
//! bounded number are processed concurrently. Settlement is idempotent at
//! the wager granularity: a wager whose status is already non-`Pending` is
//! skipped, so a crash mid-settlement is healed by re-running settlement
//! over the survivors.

use crate::errors::{EngineError, EngineResult};
use crate::ledger::LedgerGateway;
use crate::store::RoundStore;
use crate::types::{
    Amount, Color, Outcome, PlayerId, Round, RoundId, RoundState, Selection, StakeLine, Wager,
    WagerId, WagerStatus,
};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// A winning number stake pays 36x its amount.
pub const NUMBER_PAYOUT_MULTIPLIER: Amount = 36;

/// A winning color stake pays 2x its amount.
pub const COLOR_PAYOUT_MULTIPLIER: Amount = 2;

/// Payout of a single stake line against an outcome. Pure; a green outcome
/// pays no color stake, the neutral pocket settles number stakes only.
/// Stake amounts are bounded at validation, so the products fit in `Amount`.
pub fn line_payout(line: &StakeLine, outcome: &Outcome) -> Amount {
    match line.selection {
        Selection::Number(pocket) if pocket == outcome.pocket => {
            line.amount * NUMBER_PAYOUT_MULTIPLIER
        }
        Selection::Color(color) if color == outcome.color && outcome.color != Color::Green => {
            line.amount * COLOR_PAYOUT_MULTIPLIER
        }
        _ => 0,
    }
}

/// Total payout of a wager: the sum of its line payouts.
pub fn wager_payout(wager: &Wager, outcome: &Outcome) -> Amount {
    wager.lines.iter().map(|line| line_payout(line, outcome)).sum()
}

/// Credit issued to a winning wager's player.
#[derive(Debug, Clone, Serialize)]
pub struct CreditInstruction {
    pub wager_id: WagerId,
    pub player_id: PlayerId,
    pub amount: Amount,
}

/// Outcome of settling one round's wager set.
#[derive(Debug, Default, Serialize)]
pub struct SettlementSummary {
    pub round_id: RoundId,
    pub settled: usize,
    /// Wagers already carrying a result when this pass ran (replay/recovery).
    pub skipped: usize,
    pub won: usize,
    pub lost: usize,
    pub total_payout: Amount,
    pub credits: Vec<CreditInstruction>,
}

enum WagerSettlement {
    Skipped,
    Lost,
    Won(CreditInstruction),
}

/// Applies payouts for resolved rounds.
pub struct SettlementEngine {
    store: Arc<dyn RoundStore>,
    ledger: Arc<dyn LedgerGateway>,
    concurrency: usize,
}

impl SettlementEngine {
    pub fn new(
        store: Arc<dyn RoundStore>,
        ledger: Arc<dyn LedgerGateway>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            ledger,
            concurrency: concurrency.max(1),
        }
    }

    /// Settle every wager of a resolved round. Requires the outcome to be
    /// stored on the round; the engine guarantees that ordering.
    pub async fn settle_round(&self, round: &Round) -> EngineResult<SettlementSummary> {
        let outcome = round.outcome.ok_or(EngineError::InvalidTransition {
            round: round.id,
            from: round.state,
            to: RoundState::Resolved,
        })?;

        let wagers = self.store.wagers_for_round(round.id).await?;

        let results: Vec<EngineResult<WagerSettlement>> = stream::iter(wagers)
            .map(|wager| self.settle_wager(wager, outcome))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = SettlementSummary {
            round_id: round.id,
            ..Default::default()
        };

        for result in results {
            match result? {
                WagerSettlement::Skipped => summary.skipped += 1,
                WagerSettlement::Lost => {
                    summary.settled += 1;
                    summary.lost += 1;
                }
                WagerSettlement::Won(credit) => {
                    summary.settled += 1;
                    summary.won += 1;
                    summary.total_payout += credit.amount;
                    summary.credits.push(credit);
                }
            }
        }

        info!(
            round = round.id,
            pocket = outcome.pocket,
            settled = summary.settled,
            skipped = summary.skipped,
            won = summary.won,
            total_payout = summary.total_payout,
            "round settled"
        );

        Ok(summary)
    }

    /// Settle one wager against the outcome. The credit is applied before
    /// the wager record leaves `Pending`: if the process dies in between,
    /// the next pass recomputes the payout and the idempotent credit key
    /// makes the re-issue a no-op.
    async fn settle_wager(
        &self,
        wager: Wager,
        outcome: Outcome,
    ) -> EngineResult<WagerSettlement> {
        if !wager.is_pending() {
            return Ok(WagerSettlement::Skipped);
        }

        let payout = wager_payout(&wager, &outcome);

        if payout > 0 {
            self.ledger
                .credit(
                    &wager.player_id,
                    payout,
                    &format!("credit:{}", wager.id),
                )
                .await?;
            self.store
                .record_settlement(wager.id, WagerStatus::Won, payout)
                .await?;
            Ok(WagerSettlement::Won(CreditInstruction {
                wager_id: wager.id,
                player_id: wager.player_id,
                amount: payout,
            }))
        } else {
            if let Err(e) = self
                .store
                .record_settlement(wager.id, WagerStatus::Lost, 0)
                .await
            {
                warn!(wager = %wager.id, "failed to record lost wager: {}", e);
                return Err(e);
            }
            Ok(WagerSettlement::Lost)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::store::InMemoryStore;
    use crate::types::{Color, Round, StakeLine};
    use crate::wheel::color_of;

    fn outcome(pocket: u8) -> Outcome {
        Outcome {
            pocket,
            color: color_of(pocket),
        }
    }

    #[test]
    fn test_number_line_pays_36x_on_match_only() {
        let line = StakeLine::number(17, 10);
        assert_eq!(line_payout(&line, &outcome(17)), 360);
        for pocket in (0..37).filter(|p| *p != 17) {
            assert_eq!(line_payout(&line, &outcome(pocket)), 0);
        }
    }

    #[test]
    fn test_color_line_pays_2x_on_match_only() {
        let line = StakeLine::color(Color::Red, 5);
        assert_eq!(line_payout(&line, &outcome(1)), 10); // 1 is red
        assert_eq!(line_payout(&line, &outcome(17)), 0); // 17 is black
    }

    #[test]
    fn test_green_outcome_pays_no_color_stake() {
        for color in [Color::Red, Color::Black, Color::Green] {
            let line = StakeLine::color(color, 50);
            assert_eq!(line_payout(&line, &outcome(0)), 0);
        }
        // The neutral pocket still settles a matching number stake.
        assert_eq!(line_payout(&StakeLine::number(0, 3), &outcome(0)), 108);
    }

    #[test]
    fn test_payout_at_maximum_stake_fits() {
        use crate::validator::MAX_WAGER_STAKE;

        let line = StakeLine::number(17, MAX_WAGER_STAKE);
        assert_eq!(
            line_payout(&line, &outcome(17)),
            MAX_WAGER_STAKE * NUMBER_PAYOUT_MULTIPLIER
        );
    }

    #[test]
    fn test_wager_payout_sums_lines() {
        let wager = Wager::place(
            1,
            "alice".to_string(),
            vec![
                StakeLine::number(17, 10),   // 360
                StakeLine::color(Color::Black, 4), // 8: 17 is black
                StakeLine::number(5, 100),   // 0
            ],
        );
        assert_eq!(wager_payout(&wager, &outcome(17)), 368);
    }

    async fn engine_with_round() -> (SettlementEngine, Arc<InMemoryStore>, Arc<InMemoryLedger>, Round)
    {
        let store = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(InMemoryLedger::new());

        let mut round = Round::open(1);
        round.apply_lock().unwrap();
        round.apply_resolution(outcome(17)).unwrap();
        store.insert_round(round.clone()).await.unwrap();

        let engine = SettlementEngine::new(store.clone(), ledger.clone(), 8);
        (engine, store, ledger, round)
    }

    #[tokio::test]
    async fn test_settle_round_credits_winners_only() {
        let (engine, store, ledger, round) = engine_with_round().await;
        ledger.open_account("alice", 0);
        ledger.open_account("bob", 0);

        let winner = Wager::place(1, "alice".to_string(), vec![StakeLine::number(17, 10)]);
        let loser = Wager::place(1, "bob".to_string(), vec![StakeLine::color(Color::Red, 5)]);
        let winner_id = winner.id;
        let loser_id = loser.id;
        store.insert_wager(winner).await.unwrap();
        store.insert_wager(loser).await.unwrap();

        let summary = engine.settle_round(&round).await.unwrap();
        assert_eq!(summary.settled, 2);
        assert_eq!(summary.won, 1);
        assert_eq!(summary.lost, 1);
        assert_eq!(summary.total_payout, 360);
        assert_eq!(summary.credits.len(), 1);
        assert_eq!(summary.credits[0].player_id, "alice");

        assert_eq!(ledger.balance(&"alice".to_string()).await.unwrap(), 360);
        assert_eq!(ledger.balance(&"bob".to_string()).await.unwrap(), 0);

        let won = store.wager(winner_id).await.unwrap().unwrap();
        assert_eq!(won.status, WagerStatus::Won);
        assert_eq!(won.payout, 360);

        let lost = store.wager(loser_id).await.unwrap().unwrap();
        assert_eq!(lost.status, WagerStatus::Lost);
        assert_eq!(lost.payout, 0);
    }

    #[tokio::test]
    async fn test_replay_settles_only_pending_wagers() {
        let (engine, store, ledger, round) = engine_with_round().await;
        ledger.open_account("alice", 0);

        let wager = Wager::place(1, "alice".to_string(), vec![StakeLine::number(17, 10)]);
        store.insert_wager(wager).await.unwrap();

        let first = engine.settle_round(&round).await.unwrap();
        assert_eq!(first.settled, 1);
        assert_eq!(ledger.balance(&"alice".to_string()).await.unwrap(), 360);

        // A second pass skips the settled wager and pays nothing twice.
        let second = engine.settle_round(&round).await.unwrap();
        assert_eq!(second.settled, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(second.total_payout, 0);
        assert_eq!(ledger.balance(&"alice".to_string()).await.unwrap(), 360);
    }

    #[tokio::test]
    async fn test_settlement_requires_stored_outcome() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let engine = SettlementEngine::new(store.clone(), ledger, 4);

        let round = Round::open(9);
        store.insert_round(round.clone()).await.unwrap();

        assert!(matches!(
            engine.settle_round(&round).await,
            Err(EngineError::InvalidTransition { round: 9, .. })
        ));
    }
}
