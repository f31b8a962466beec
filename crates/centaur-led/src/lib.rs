//! Correction-mode LED guidance: decides which square(s) to light when the
//! physical board disagrees with the logical chess position, and builds the
//! wire payload for the board's LED command. See `SPEC_FULL.md` §4.4.5.

mod assignment;
mod square;

pub use square::manhattan;

/// Default LED command parameters (`SPEC_FULL.md` §6: speed 3, repeat 1,
/// intensity 5).
pub const DEFAULT_SPEED: u8 = 3;
pub const DEFAULT_REPEAT: u8 = 1;
pub const DEFAULT_INTENSITY: u8 = 5;

/// What the LED matrix should currently display for correction guidance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedPlan {
    /// Board matches the logical position; turn every LED off.
    Clear,
    /// Light squares in order, one at a time, cycling — used for a single
    /// "move this piece from here to there" arrow (`[from, to]`).
    Sequence(Vec<u8>),
    /// Light squares simultaneously — pieces missing from the board that
    /// need to be placed, with no particular source square to point from.
    Light(Vec<u8>),
    /// Flash squares — pieces present on the board that must be removed,
    /// with no logical destination to send them to.
    Flash(Vec<u8>),
}

/// Compute the correction-mode LED plan from the set of squares missing a
/// piece the logical position expects, and squares holding a piece the
/// logical position does not expect.
///
/// - Both empty: correction is complete.
/// - Exactly one of each: a direct arrow from the extra square to the
///   missing square.
/// - Multiple of each: solve the assignment problem on the Manhattan
///   distance cost matrix between extra and missing squares, and point an
///   arrow along the first resulting pair.
/// - Only missing squares: light all of them (pieces need to be placed).
/// - Only extra squares: flash all of them (pieces need to be removed).
pub fn plan_correction(missing: &[u8], extra: &[u8]) -> LedPlan {
    match (missing.len(), extra.len()) {
        (0, 0) => LedPlan::Clear,
        (_, 0) => LedPlan::Light(missing.to_vec()),
        (0, _) => LedPlan::Flash(extra.to_vec()),
        (1, 1) => LedPlan::Sequence(vec![extra[0], missing[0]]),
        _ => {
            let cost: Vec<Vec<f64>> = extra
                .iter()
                .map(|&ex| missing.iter().map(|&mi| manhattan(ex, mi) as f64).collect())
                .collect();
            let assignment = assignment::solve(&cost);
            match assignment.first().copied().flatten() {
                Some(col) => LedPlan::Sequence(vec![extra[0], missing[col]]),
                None => LedPlan::Light(missing.to_vec()),
            }
        }
    }
}

/// Build the payload for the board's LED command (`0xB0`):
/// `[0x05, speed, repeat, intensity, squares...]`.
pub fn build_led_payload(plan: &LedPlan, speed: u8, repeat: u8, intensity: u8) -> Vec<u8> {
    let squares: &[u8] = match plan {
        LedPlan::Clear => &[],
        LedPlan::Sequence(s) | LedPlan::Light(s) | LedPlan::Flash(s) => s,
    };
    let mut payload = vec![0x05, speed, repeat, intensity];
    payload.extend_from_slice(squares);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_empty_clears() {
        assert_eq!(plan_correction(&[], &[]), LedPlan::Clear);
    }

    #[test]
    fn single_pair_is_a_direct_arrow() {
        assert_eq!(plan_correction(&[12], &[20]), LedPlan::Sequence(vec![20, 12]));
    }

    #[test]
    fn only_missing_lights_every_square() {
        let plan = plan_correction(&[1, 2, 3], &[]);
        assert_eq!(plan, LedPlan::Light(vec![1, 2, 3]));
    }

    #[test]
    fn only_extra_flashes_every_square() {
        let plan = plan_correction(&[], &[4, 5]);
        assert_eq!(plan, LedPlan::Flash(vec![4, 5]));
    }

    #[test]
    fn multiple_each_picks_nearest_pair_for_first_extra() {
        // extra at square 0 (a1); missing at 63 (h8, far) and 1 (b1, near).
        let plan = plan_correction(&[63, 1], &[0, 56]);
        match plan {
            LedPlan::Sequence(pair) => {
                assert_eq!(pair[0], 0);
                assert_eq!(pair[1], 1);
            }
            other => panic!("expected Sequence, got {other:?}"),
        }
    }

    #[test]
    fn payload_has_header_then_squares() {
        let payload = build_led_payload(&LedPlan::Sequence(vec![0, 1]), 0x03, 0x05, 0x05);
        assert_eq!(payload, vec![0x05, 0x03, 0x05, 0x05, 0x00, 0x01]);
    }

    #[test]
    fn clear_payload_has_no_squares() {
        let payload = build_led_payload(&LedPlan::Clear, 0x03, 0x05, 0x05);
        assert_eq!(payload, vec![0x05, 0x03, 0x05, 0x05]);
    }
}
