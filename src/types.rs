//! Core data model: rounds, wagers and stake lines.
//!
//! The round state machine lives on [`Round`] itself: transitions are
//! monotonic (`Accepting -> Locked -> Resolved`), never revert, and the
//! outcome is present if and only if the round is `Resolved`.

use crate::errors::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Monetary quantity in minor units. Integer arithmetic keeps the
/// no-negative-balance invariant a plain unsigned comparison.
pub type Amount = u64;

/// Monotonically increasing round sequence number.
pub type RoundId = u64;

pub type WagerId = Uuid;

/// Player identifier resolved by the identity collaborator.
pub type PlayerId = String;

/// Lifecycle state of a round. Linear, no branches, no reversal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RoundState {
    Accepting,
    Locked,
    Resolved,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundState::Accepting => write!(f, "accepting"),
            RoundState::Locked => write!(f, "locked"),
            RoundState::Resolved => write!(f, "resolved"),
        }
    }
}

/// Pocket color. `Green` is the neutral category reserved for pocket 0 and
/// never pays a color stake.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Black,
    Green,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Red => write!(f, "red"),
            Color::Black => write!(f, "black"),
            Color::Green => write!(f, "green"),
        }
    }
}

/// Result of a draw: the winning pocket and its derived color.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outcome {
    pub pocket: u8,
    pub color: Color,
}

/// One instance of the game, from opening for wagers through resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub state: RoundState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Round {
    /// Create a new round accepting wagers.
    pub fn open(id: RoundId) -> Self {
        Self {
            id,
            state: RoundState::Accepting,
            outcome: None,
            created_at: Utc::now(),
            locked_at: None,
            resolved_at: None,
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.state == RoundState::Accepting
    }

    /// A round is live while it still has a transition ahead of it.
    pub fn is_live(&self) -> bool {
        self.state != RoundState::Resolved
    }

    /// Transition `Accepting -> Locked`. Strict: any other starting state
    /// is an [`EngineError::InvalidTransition`].
    pub fn apply_lock(&mut self) -> EngineResult<()> {
        if self.state != RoundState::Accepting {
            return Err(EngineError::InvalidTransition {
                round: self.id,
                from: self.state,
                to: RoundState::Locked,
            });
        }
        self.state = RoundState::Locked;
        self.locked_at = Some(Utc::now());
        Ok(())
    }

    /// Transition `Locked -> Resolved`, storing the outcome. The outcome is
    /// set exactly once; the state never moves past `Resolved`.
    pub fn apply_resolution(&mut self, outcome: Outcome) -> EngineResult<()> {
        if self.state != RoundState::Locked {
            return Err(EngineError::InvalidTransition {
                round: self.id,
                from: self.state,
                to: RoundState::Resolved,
            });
        }
        self.state = RoundState::Resolved;
        self.outcome = Some(outcome);
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}

/// A single (kind, selection, amount) bet within a wager. The selection
/// domain is carried by the type: a number stake picks a pocket, a color
/// stake picks one of the three color labels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakeLine {
    #[serde(flatten)]
    pub selection: Selection,
    pub amount: Amount,
}

impl StakeLine {
    pub fn number(pocket: u8, amount: Amount) -> Self {
        Self {
            selection: Selection::Number(pocket),
            amount,
        }
    }

    pub fn color(color: Color, amount: Amount) -> Self {
        Self {
            selection: Selection::Color(color),
            amount,
        }
    }
}

/// Stake selection (discriminated union).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "selection", rename_all = "lowercase")]
pub enum Selection {
    Number(u8),
    Color(Color),
}

/// Settlement status of a wager. Write-once: a non-`Pending` status and its
/// payout are immutable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WagerStatus {
    Pending,
    Won,
    Lost,
}

/// A player's stake lines submitted against one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wager {
    pub id: WagerId,
    pub round_id: RoundId,
    pub player_id: PlayerId,
    pub lines: Vec<StakeLine>,
    pub status: WagerStatus,
    pub payout: Amount,
    pub placed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<DateTime<Utc>>,
}

impl Wager {
    pub fn place(round_id: RoundId, player_id: PlayerId, lines: Vec<StakeLine>) -> Self {
        Self::place_with_id(Uuid::new_v4(), round_id, player_id, lines)
    }

    /// Place with a caller-chosen id, letting a retried placement reuse its
    /// idempotency key.
    pub fn place_with_id(
        id: WagerId,
        round_id: RoundId,
        player_id: PlayerId,
        lines: Vec<StakeLine>,
    ) -> Self {
        Self {
            id,
            round_id,
            player_id,
            lines,
            status: WagerStatus::Pending,
            payout: 0,
            placed_at: Utc::now(),
            settled_at: None,
        }
    }

    /// Total stake across all lines, debited atomically at acceptance.
    pub fn total_stake(&self) -> Amount {
        self.lines.iter().map(|line| line.amount).sum()
    }

    pub fn is_pending(&self) -> bool {
        self.status == WagerStatus::Pending
    }
}
