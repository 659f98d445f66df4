//! Wager validator: a pure predicate over wager shape.
//!
//! No knowledge of round state or balances; rejection is atomic for the
//! whole wager, so there is never a partially accepted stake line.

use crate::errors::{EngineError, EngineResult};
use crate::settlement::NUMBER_PAYOUT_MULTIPLIER;
use crate::types::{Amount, Selection, StakeLine};
use crate::wheel::POCKET_COUNT;

/// Minimum stake per line, in minor units.
pub const MIN_LINE_STAKE: Amount = 1;

/// Largest combined stake a wager may carry. Caps the worst-case payout
/// (every line a winning number stake) within `Amount`, so settlement
/// arithmetic downstream never overflows.
pub const MAX_WAGER_STAKE: Amount = Amount::MAX / NUMBER_PAYOUT_MULTIPLIER;

/// Validate a proposed wager's stake lines. Any failing line rejects the
/// whole wager with the first offending reason.
pub fn validate(lines: &[StakeLine]) -> EngineResult<()> {
    if lines.is_empty() {
        return Err(EngineError::ValidationRejected(
            "a wager must carry at least one stake line".to_string(),
        ));
    }

    let mut total: Amount = 0;
    for (index, line) in lines.iter().enumerate() {
        if let Selection::Number(pocket) = line.selection {
            if pocket >= POCKET_COUNT {
                return Err(EngineError::ValidationRejected(format!(
                    "line {}: pocket {} is outside 0..=36",
                    index, pocket
                )));
            }
        }

        if line.amount < MIN_LINE_STAKE {
            return Err(EngineError::ValidationRejected(format!(
                "line {}: amount must be at least {}",
                index, MIN_LINE_STAKE
            )));
        }

        total = match total.checked_add(line.amount) {
            Some(total) if total <= MAX_WAGER_STAKE => total,
            _ => {
                return Err(EngineError::ValidationRejected(format!(
                    "combined stake exceeds the maximum of {}",
                    MAX_WAGER_STAKE
                )))
            }
        };
    }

    Ok(())
}
