//! Durable game log: one `game` row per game, one `game_move` row per ply.
//! See `SPEC_FULL.md` §3 (Ambient stack, Persistence).

mod error;
mod schema;
mod session;

pub use error::{PersistenceError, PersistenceResult};
pub use session::{GameTransaction, MoveRecord, NewGame, Session};
