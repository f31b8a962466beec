//! In-progress move tracking. See `SPEC_FULL.md` §4.4.1/§4.4.2.

/// A move the opponent (engine or remote) has announced and that the
/// human is expected to play out on the physical board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedMove {
    pub from: u8,
    pub to: u8,
    pub promotion: Option<char>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiftedState {
    pub source_square: u8,
    pub legal_destinations: Vec<u8>,
    /// Set when `source_square` held the opponent's last-moved piece, not
    /// a side-to-move piece — the only placement this tracks is putting it
    /// back where it came from.
    pub is_takeback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveState {
    Idle,
    Lifted(LiftedState),
    /// The physical board disagrees with the logical position; every
    /// subsequent piece event is interpreted only as "does this fix it".
    Correction,
}
