use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Chess(#[from] centaur_chess::ChessError),
    #[error(transparent)]
    Persistence(#[from] centaur_persistence::PersistenceError),
    #[error("no piece is currently lifted")]
    NothingLifted,
}

pub type GameResult<T> = Result<T, GameError>;
