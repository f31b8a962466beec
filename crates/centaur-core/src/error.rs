use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Controller(#[from] centaur_controller::ControllerError),
    #[error(transparent)]
    Game(#[from] centaur_game::GameError),
    #[error(transparent)]
    Opponent(#[from] centaur_opponent::OpponentError),
    #[error(transparent)]
    Config(#[from] centaur_config::ConfigError),
}

pub type CoreResult<T> = Result<T, CoreError>;
