use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("game {0} has no move row to take back")]
    NoMoveToDelete(i64),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
