//! Croupier - Round Lifecycle & Settlement Engine
//!
//! A round-based game of chance: players place wagers against a shared
//! round, the round is closed to new wagers, an outcome is drawn, and every
//! wager is settled against that outcome with winnings credited back.
//!
//! The crate protects four invariants: money is never duplicated or lost, a
//! wager is never accepted after close, a round is never drawn twice, and
//! settlement is idempotent. Identity and durable storage are collaborators
//! behind traits; in-memory reference implementations back tests and
//! embedded use.

pub mod config;
pub mod engine;
pub mod errors;
pub mod identity;
pub mod ledger;
pub mod settlement;
pub mod store;
pub mod types;
pub mod validator;
pub mod wheel;

pub use config::EngineConfig;
pub use engine::RoundEngine;
pub use errors::{EngineError, EngineResult};
pub use identity::{Caller, IdentityProvider, Role, StaticIdentityProvider};
pub use ledger::{InMemoryLedger, LedgerGateway};
pub use settlement::{CreditInstruction, SettlementEngine, SettlementSummary};
pub use store::{InMemoryStore, RoundStats, RoundStore};
pub use types::{
    Amount, Color, Outcome, PlayerId, Round, RoundId, RoundState, Selection, StakeLine, Wager,
    WagerId, WagerStatus,
};
pub use wheel::{FixedDraw, OutcomeSource, Wheel};

/// Initialize tracing output honoring `RUST_LOG`. Intended for binaries and
/// integration tests embedding the engine.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .try_init();
}
