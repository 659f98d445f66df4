//! Outcome generator: a uniform draw over the 37 pockets and the fixed
//! pocket-to-color table.
//!
//! The color partition is a constant table rather than a runtime
//! computation so the mapping itself is deterministic and testable
//! independent of the randomness.

use crate::types::{Color, Outcome};
use rand::Rng;

/// Number of pockets on the wheel (0..=36).
pub const POCKET_COUNT: u8 = 37;

/// The 18 red pockets of the standard single-zero wheel. Pocket 0 is green;
/// every other pocket not listed here is black.
pub const RED_POCKETS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

/// Derive the color for a pocket from the fixed table.
pub fn color_of(pocket: u8) -> Color {
    if pocket == 0 {
        Color::Green
    } else if RED_POCKETS.contains(&pocket) {
        Color::Red
    } else {
        Color::Black
    }
}

/// Source of round outcomes. The engine invokes it exactly once per round,
/// at resolution time; implementations must have no other side effects.
pub trait OutcomeSource: Send + Sync {
    fn draw(&self) -> Outcome;
}

/// The production wheel: uniform over {0..36}.
#[derive(Debug, Default)]
pub struct Wheel;

impl Wheel {
    pub fn new() -> Self {
        Self
    }
}

impl OutcomeSource for Wheel {
    fn draw(&self) -> Outcome {
        let pocket = rand::thread_rng().gen_range(0..POCKET_COUNT);
        Outcome {
            pocket,
            color: color_of(pocket),
        }
    }
}

/// Deterministic source that always lands on the given pocket. Intended for
/// tests and replay tooling.
#[derive(Debug)]
pub struct FixedDraw(pub u8);

impl OutcomeSource for FixedDraw {
    fn draw(&self) -> Outcome {
        Outcome {
            pocket: self.0,
            color: color_of(self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_table_partition() {
        assert_eq!(color_of(0), Color::Green);

        let reds = (1..POCKET_COUNT).filter(|p| color_of(*p) == Color::Red).count();
        let blacks = (1..POCKET_COUNT)
            .filter(|p| color_of(*p) == Color::Black)
            .count();

        // Two disjoint 18-element sets; green is reserved for 0.
        assert_eq!(reds, 18);
        assert_eq!(blacks, 18);
    }

    #[test]
    fn test_known_pockets() {
        assert_eq!(color_of(17), Color::Black);
        assert_eq!(color_of(1), Color::Red);
        assert_eq!(color_of(36), Color::Red);
        assert_eq!(color_of(2), Color::Black);
    }

    #[test]
    fn test_wheel_stays_in_domain() {
        let wheel = Wheel::new();
        for _ in 0..500 {
            let outcome = wheel.draw();
            assert!(outcome.pocket < POCKET_COUNT);
            assert_eq!(outcome.color, color_of(outcome.pocket));
        }
    }

    #[test]
    fn test_fixed_draw() {
        let outcome = FixedDraw(17).draw();
        assert_eq!(outcome.pocket, 17);
        assert_eq!(outcome.color, Color::Black);
    }
}
