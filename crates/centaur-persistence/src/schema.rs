//! Durable schema for the game log. One `game` row per played game, one
//! `game_move` row per ply. See `SPEC_FULL.md` §3 (Ambient stack,
//! Persistence).

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS game (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at  TEXT NOT NULL,
    source      TEXT NOT NULL,
    event       TEXT,
    site        TEXT,
    round       TEXT,
    white       TEXT,
    black       TEXT,
    result      TEXT
);

CREATE TABLE IF NOT EXISTS game_move (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    gameid      INTEGER NOT NULL REFERENCES game(id),
    move_uci    TEXT NOT NULL,
    fen         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_game_move_gameid ON game_move(gameid);
"#;
