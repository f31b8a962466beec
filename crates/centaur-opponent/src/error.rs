use thiserror::Error;

use crate::state::OpponentState;

#[derive(Debug, Error)]
pub enum OpponentError {
    #[error("invalid opponent state transition from {from:?} to {to:?}")]
    InvalidTransition { from: OpponentState, to: OpponentState },
    #[error("opponent is stopped")]
    Stopped,
}

pub type OpponentResult<T> = Result<T, OpponentError>;
