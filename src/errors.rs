//! Typed error kinds for round lifecycle and settlement operations.
//!
//! Every variant is per-request and recoverable by the caller; nothing in
//! this crate treats an error as fatal to the process.

use crate::identity::Role;
use crate::types::{Amount, PlayerId, RoundId, RoundState, WagerId};

/// Root error type for all engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Wager shape or value domain is invalid. The caller corrects the
    /// offending stake line and resubmits.
    #[error("Wager rejected: {0}")]
    ValidationRejected(String),

    /// Wager placement attempted against a round that is no longer
    /// accepting. Surfaced to the caller, no retry.
    #[error("Round {0} is not accepting wagers")]
    RoundNotOpen(RoundId),

    /// Lock/resolve attempted from the wrong state, usually a race.
    /// Callers should re-fetch the round rather than retry blindly.
    #[error("Invalid transition for round {round}: {from} -> {to}")]
    InvalidTransition {
        round: RoundId,
        from: RoundState,
        to: RoundState,
    },

    /// Debit rejected; the wager was not placed and no balance changed.
    #[error("Insufficient funds for player {player}: balance {balance}, required {required}")]
    InsufficientFunds {
        player: PlayerId,
        balance: Amount,
        required: Amount,
    },

    #[error("Round {0} not found")]
    RoundNotFound(RoundId),

    #[error("Wager {0} not found")]
    WagerNotFound(WagerId),

    /// Operator-only operation invoked by a caller without the role.
    #[error("Operation requires the {required} role")]
    Unauthorized { required: Role },

    /// Persistence collaborator failed. The operation's effects must not be
    /// assumed applied; callers retry the whole logical operation.
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),
}

/// Convenience type alias for Results
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::InsufficientFunds {
            player: "alice".to_string(),
            balance: 40,
            required: 100,
        };

        assert!(err.to_string().contains("alice"));
        assert!(err.to_string().contains("balance 40"));
        assert!(err.to_string().contains("required 100"));
    }

    #[test]
    fn test_transition_error_names_states() {
        let err = EngineError::InvalidTransition {
            round: 7,
            from: RoundState::Accepting,
            to: RoundState::Resolved,
        };

        assert!(err.to_string().contains("round 7"));
        assert!(err.to_string().contains("accepting"));
        assert!(err.to_string().contains("resolved"));
    }
}
