//! A database session owned by a single thread for the lifetime of one
//! game. Per `spec.md` §9, sessions are created and destroyed inside the
//! game thread; nothing here is shared across threads.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, Transaction};

use crate::error::{PersistenceError, PersistenceResult};
use crate::schema::SCHEMA;

#[derive(Debug, Clone, Default)]
pub struct NewGame {
    pub source: String,
    pub event: Option<String>,
    pub site: Option<String>,
    pub round: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub id: i64,
    pub game_id: i64,
    pub uci: String,
    pub fen: String,
}

pub struct Session {
    conn: Connection,
}

impl Session {
    pub fn open(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> PersistenceResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Begin an atomic move transaction. Nothing here is durable until
    /// `GameTransaction::commit` runs; dropping it uncommitted rolls back
    /// every statement, matching the failure semantics in §4.4.6.
    pub fn begin(&mut self) -> PersistenceResult<GameTransaction<'_>> {
        let tx = self.conn.transaction()?;
        Ok(GameTransaction { tx })
    }
}

pub struct GameTransaction<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> GameTransaction<'conn> {
    /// Insert a game row and flush it within the open transaction: visible
    /// to later statements on this same transaction, not yet durable.
    pub fn insert_game(&self, new_game: &NewGame) -> PersistenceResult<i64> {
        self.tx.execute(
            "INSERT INTO game (created_at, source, event, site, round, white, black, result)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
            params![
                Utc::now().to_rfc3339(),
                new_game.source,
                new_game.event,
                new_game.site,
                new_game.round,
                new_game.white,
                new_game.black,
            ],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    pub fn insert_move(&self, game_id: i64, uci: &str, tentative_fen: &str) -> PersistenceResult<i64> {
        self.tx.execute(
            "INSERT INTO game_move (gameid, move_uci, fen) VALUES (?1, ?2, ?3)",
            params![game_id, uci, tentative_fen],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    pub fn update_move_fen(&self, move_id: i64, fen: &str) -> PersistenceResult<()> {
        self.tx
            .execute("UPDATE game_move SET fen = ?1 WHERE id = ?2", params![fen, move_id])?;
        Ok(())
    }

    /// Remove the move row for a takeback (§4.4.4).
    pub fn delete_move(&self, move_id: i64) -> PersistenceResult<()> {
        let affected = self.tx.execute("DELETE FROM game_move WHERE id = ?1", params![move_id])?;
        if affected == 0 {
            return Err(PersistenceError::NoMoveToDelete(move_id));
        }
        Ok(())
    }

    pub fn set_result(&self, game_id: i64, result: &str) -> PersistenceResult<()> {
        self.tx
            .execute("UPDATE game SET result = ?1 WHERE id = ?2", params![result, game_id])?;
        Ok(())
    }

    pub fn latest_move(&self, game_id: i64) -> PersistenceResult<Option<MoveRecord>> {
        let mut stmt = self.tx.prepare(
            "SELECT id, gameid, move_uci, fen FROM game_move WHERE gameid = ?1 ORDER BY id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![game_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(MoveRecord {
                id: row.get(0)?,
                game_id: row.get(1)?,
                uci: row.get(2)?,
                fen: row.get(3)?,
            })),
            None => Ok(None),
        }
    }

    pub fn commit(self) -> PersistenceResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> PersistenceResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}
