//! Null opponent: never generates a move. See `SPEC_FULL.md` §4.5.

use crate::error::OpponentResult;
use crate::opponent::{MoveSink, Opponent};
use crate::state::{OpponentState, StateMachine};

pub struct HumanOpponent {
    state: StateMachine,
}

impl HumanOpponent {
    pub fn new() -> Self {
        Self { state: StateMachine::new() }
    }
}

impl Default for HumanOpponent {
    fn default() -> Self {
        Self::new()
    }
}

impl Opponent for HumanOpponent {
    fn start(&mut self, _sink: MoveSink) -> OpponentResult<()> {
        self.state.transition(OpponentState::Initializing)?;
        self.state.transition(OpponentState::Ready)
    }

    fn stop(&mut self) {
        let _ = self.state.transition(OpponentState::Stopped);
    }

    fn get_move(&mut self, _fen: &str) -> OpponentResult<()> {
        // A human never produces a move on its own; the board is the
        // input device. Nothing to do.
        Ok(())
    }

    fn on_player_move(&mut self, _uci: &str, _fen: &str) {}

    fn on_new_game(&mut self) {}

    fn on_resign(&mut self) {}

    fn state(&self) -> OpponentState {
        self.state.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_reaches_ready_and_never_moves() {
        let mut human = HumanOpponent::new();
        let calls = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let calls2 = calls.clone();
        human.start(std::sync::Arc::new(move |m| calls2.lock().push(m))).unwrap();
        assert_eq!(human.state(), OpponentState::Ready);
        human.get_move("startpos").unwrap();
        assert!(calls.lock().is_empty());
    }
}
