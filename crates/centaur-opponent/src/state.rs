//! Opponent lifecycle state machine, shared by every variant. See
//! `SPEC_FULL.md` §4.5.

use parking_lot::Mutex;

use crate::error::OpponentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpponentState {
    Uninitialized,
    Initializing,
    Ready,
    Thinking,
    Stopped,
    Error,
}

impl OpponentState {
    fn can_transition_to(self, next: OpponentState) -> bool {
        use OpponentState::*;
        if next == Error {
            return self != Stopped;
        }
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Initializing, Ready)
                | (Ready, Thinking)
                | (Thinking, Ready)
                | (Ready, Stopped)
                | (Thinking, Stopped)
                | (Initializing, Stopped)
                | (Uninitialized, Stopped)
                | (Error, Stopped)
                | (Error, Initializing)
        )
    }
}

/// Thread-safe holder for an opponent's current state, enforcing the
/// transition graph and logging every change.
pub struct StateMachine {
    current: Mutex<OpponentState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self { current: Mutex::new(OpponentState::Uninitialized) }
    }

    pub fn get(&self) -> OpponentState {
        *self.current.lock()
    }

    pub fn transition(&self, next: OpponentState) -> Result<(), OpponentError> {
        let mut guard = self.current.lock();
        if !guard.can_transition_to(next) {
            return Err(OpponentError::InvalidTransition { from: *guard, to: next });
        }
        tracing::info!(from = ?*guard, to = ?next, "opponent state transition");
        *guard = next;
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_lifecycle_transitions_succeed() {
        let sm = StateMachine::new();
        sm.transition(OpponentState::Initializing).unwrap();
        sm.transition(OpponentState::Ready).unwrap();
        sm.transition(OpponentState::Thinking).unwrap();
        sm.transition(OpponentState::Ready).unwrap();
        sm.transition(OpponentState::Stopped).unwrap();
    }

    #[test]
    fn error_reachable_from_any_non_stopped_state() {
        let sm = StateMachine::new();
        sm.transition(OpponentState::Error).unwrap();
    }

    #[test]
    fn error_not_reachable_from_stopped() {
        let sm = StateMachine::new();
        sm.transition(OpponentState::Stopped).unwrap();
        assert!(sm.transition(OpponentState::Error).is_err());
    }

    #[test]
    fn skipping_ready_rejected() {
        let sm = StateMachine::new();
        assert!(sm.transition(OpponentState::Thinking).is_err());
    }
}
