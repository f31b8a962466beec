//! The pluggable move source contract every opponent variant implements.
//! See `SPEC_FULL.md` §4.5.

use std::sync::Arc;

use crate::error::OpponentResult;
use crate::state::OpponentState;

/// Invoked with a UCI move string once an opponent has one ready. Shared
/// across threads since Engine and Remote variants deliver from a worker.
pub type MoveSink = Arc<dyn Fn(String) + Send + Sync>;

/// A pluggable move source: engine subprocess, a human (null), or a
/// remote streaming peer. `get_move` never blocks; it arranges for `sink`
/// to be called later with the move.
pub trait Opponent: Send {
    fn start(&mut self, sink: MoveSink) -> OpponentResult<()>;
    fn stop(&mut self);

    /// Ask for a move given the current position. Returns immediately;
    /// the move (if any) arrives asynchronously through the sink passed
    /// to `start`.
    fn get_move(&mut self, fen: &str) -> OpponentResult<()>;

    /// Notify the opponent a player move was made, so Engine/Remote
    /// variants can keep their internal position in sync.
    fn on_player_move(&mut self, uci: &str, fen: &str);

    fn on_new_game(&mut self);

    /// Attempt to take back the opponent's last move. Returns whether the
    /// opponent honored the request; default is unsupported.
    fn on_takeback(&mut self) -> bool {
        false
    }

    fn on_resign(&mut self);

    /// Offer a draw to the opponent. Returns whether it was accepted;
    /// default is to decline.
    fn on_draw_offer(&mut self) -> bool {
        false
    }

    fn supports_takeback(&self) -> bool {
        false
    }

    fn state(&self) -> OpponentState;
}
