//! Mediates between physical piece events and the logical chess position.
//! See `SPEC_FULL.md` §4.4.

use std::sync::Arc;

use centaur_chess::ChessState;
use centaur_led::{plan_correction, LedPlan};
use centaur_persistence::{NewGame, Session};
use tracing::{error, warn};

use crate::error::{GameError, GameResult};
use crate::state::{ForcedMove, LiftedState, MoveState};

fn square_name(square: u8) -> String {
    let file = (b'a' + (square % 8)) as char;
    let rank = (b'1' + (square / 8)) as char;
    format!("{file}{rank}")
}

fn starting_snapshot() -> [bool; 64] {
    ChessState::new().snapshot()
}

fn square_from_name(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let file = chars.next()?;
    let rank = chars.next()?;
    if !('a'..='h').contains(&file) || !('1'..='8').contains(&rank) {
        return None;
    }
    Some((file as u8 - b'a') + (rank as u8 - b'1') * 8)
}

/// What to play through the board's buzzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundKind {
    /// A move (or correction) completed cleanly.
    Confirm,
    /// An illegal placement or other user error.
    Wrong,
}

pub type MoveCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;
pub type TakebackCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type PromotionCallback = Arc<dyn Fn(u8, u8) -> char + Send + Sync>;
pub type LedCallback = Arc<dyn Fn(LedPlan) + Send + Sync>;
pub type SoundCallback = Arc<dyn Fn(SoundKind) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&GameError) + Send + Sync>;

/// Owns the logical position, the database session for the game in
/// progress, and the physical-board mirror needed to detect desync. One
/// instance lives for as long as the board is attached; games start and
/// end underneath it without the caller needing to re-create it.
pub struct GameManager {
    chess: ChessState,
    session: Session,
    source: String,
    game_id: Option<i64>,
    last_move_id: Option<i64>,
    physical: [bool; 64],
    move_state: MoveState,
    forced_move: Option<ForcedMove>,

    on_move: Option<MoveCallback>,
    on_takeback: Option<TakebackCallback>,
    on_promotion: Option<PromotionCallback>,
    on_led: Option<LedCallback>,
    on_sound: Option<SoundCallback>,
    on_error: Option<ErrorCallback>,
}

impl GameManager {
    pub fn new(session: Session, source: impl Into<String>) -> Self {
        let chess = ChessState::new();
        let physical = chess.snapshot();
        Self {
            chess,
            session,
            source: source.into(),
            game_id: None,
            last_move_id: None,
            physical,
            move_state: MoveState::Idle,
            forced_move: None,
            on_move: None,
            on_takeback: None,
            on_promotion: None,
            on_led: None,
            on_sound: None,
            on_error: None,
        }
    }

    pub fn set_on_move(&mut self, f: MoveCallback) {
        self.on_move = Some(f);
    }

    pub fn set_on_takeback(&mut self, f: TakebackCallback) {
        self.on_takeback = Some(f);
    }

    pub fn set_on_promotion(&mut self, f: PromotionCallback) {
        self.on_promotion = Some(f);
    }

    pub fn set_on_led(&mut self, f: LedCallback) {
        self.on_led = Some(f);
    }

    pub fn set_on_sound(&mut self, f: SoundCallback) {
        self.on_sound = Some(f);
    }

    pub fn set_on_error(&mut self, f: ErrorCallback) {
        self.on_error = Some(f);
    }

    pub fn fen(&self) -> String {
        self.chess.fen()
    }

    pub fn move_state(&self) -> &MoveState {
        &self.move_state
    }

    pub fn game_id(&self) -> Option<i64> {
        self.game_id
    }

    /// Announce an opponent move the human must now play on the board. A
    /// lift of any other square is restricted to its own square only,
    /// forcing the player back to the forced piece.
    pub fn set_forced_move(&mut self, forced: Option<ForcedMove>) {
        self.forced_move = forced;
    }

    /// Light the board for the current forced move, if any. Called once
    /// right after `set_forced_move` to point the player at the piece to
    /// play, independent of any correction or move-completion event.
    pub fn show_forced_move_hint(&self) {
        if let Some(forced) = &self.forced_move {
            self.emit_led(LedPlan::Sequence(vec![forced.from, forced.to]));
        }
    }

    fn emit_move(&self, uci: &str, fen: &str) {
        if let Some(f) = &self.on_move {
            f(uci, fen);
        }
    }

    fn emit_takeback(&self, uci: &str) {
        if let Some(f) = &self.on_takeback {
            f(uci);
        }
    }

    fn emit_led(&self, plan: LedPlan) {
        if let Some(f) = &self.on_led {
            f(plan);
        }
    }

    fn emit_sound(&self, kind: SoundKind) {
        if let Some(f) = &self.on_sound {
            f(kind);
        }
    }

    fn emit_error(&self, err: &GameError) {
        if let Some(f) = &self.on_error {
            f(err);
        }
        error!(%err, "game manager error");
    }

    fn request_promotion(&self, from: u8, to: u8) -> char {
        self.on_promotion.as_ref().map(|f| f(from, to)).unwrap_or('q')
    }

    fn set_physical(&mut self, square: u8, present: bool) {
        self.physical[square as usize] = present;
    }

    fn last_move_destination(&self) -> Option<u8> {
        square_from_name(&self.chess.last_uci()?[2..4])
    }

    /// A piece was lifted from `square` (§4.4.1). A piece belonging to the
    /// side to move starts normal move tracking. A piece belonging to the
    /// other side only starts tracking when it's the square the last move
    /// landed on — the one takeback a human can make.
    pub fn on_piece_lift(&mut self, square: u8) -> GameResult<()> {
        self.set_physical(square, false);

        if matches!(self.move_state, MoveState::Correction) {
            self.update_correction();
            return Ok(());
        }
        if matches!(self.move_state, MoveState::Lifted(_)) {
            // Only one piece is tracked "in hand" at a time; a second lift
            // while one is already outstanding does not restart tracking.
            return Ok(());
        }

        if self.chess.is_side_to_move_piece(square)? {
            let mut legal = self.chess.legal_destinations(square)?;
            if let Some(forced) = &self.forced_move {
                legal = if forced.from == square { vec![forced.to] } else { vec![square] };
            }
            self.move_state =
                MoveState::Lifted(LiftedState { source_square: square, legal_destinations: legal, is_takeback: false });
        } else if self.last_move_destination() == Some(square) {
            self.move_state = MoveState::Lifted(LiftedState {
                source_square: square,
                legal_destinations: Vec::new(),
                is_takeback: true,
            });
        }
        Ok(())
    }

    /// A piece was placed on `square` (§4.4.2 dispatch table).
    pub fn on_piece_place(&mut self, square: u8) -> GameResult<()> {
        self.set_physical(square, true);

        match std::mem::replace(&mut self.move_state, MoveState::Idle) {
            MoveState::Correction => {
                self.move_state = MoveState::Correction;
                self.update_correction();
                Ok(())
            }
            MoveState::Lifted(lifted) if square == lifted.source_square => {
                // Piece returned to where it came from; nothing happened.
                self.emit_led(LedPlan::Clear);
                Ok(())
            }
            MoveState::Lifted(lifted) if lifted.is_takeback => {
                if self.try_takeback()? {
                    Ok(())
                } else {
                    self.enter_correction();
                    Ok(())
                }
            }
            MoveState::Lifted(lifted) if lifted.legal_destinations.contains(&square) => {
                self.execute_move(lifted.source_square, square)
            }
            MoveState::Lifted(_) => {
                self.emit_sound(SoundKind::Wrong);
                self.enter_correction();
                Ok(())
            }
            MoveState::Idle => {
                if self.physical == starting_snapshot() && self.game_id.is_some() {
                    self.abandon_and_reset()?;
                } else if !self.chess.snapshot()[square as usize] {
                    self.enter_correction();
                }
                Ok(())
            }
        }
    }

    fn try_takeback(&mut self) -> GameResult<bool> {
        let Some(previous) = self.chess.previous_snapshot() else {
            return Ok(false);
        };
        if self.physical != previous {
            return Ok(false);
        }

        let undone_uci = self.chess.pop()?;
        if let Some(game_id) = self.game_id {
            let tx = self.session.begin()?;
            if let Some(record) = tx.latest_move(game_id)? {
                tx.delete_move(record.id)?;
            }
            tx.commit()?;
        }

        self.move_state = MoveState::Idle;
        self.emit_takeback(&undone_uci);

        if let Some(forced) = self.forced_move.clone() {
            let still_legal = self.chess.legal_destinations(forced.from).map(|d| d.contains(&forced.to)).unwrap_or(false);
            if still_legal {
                self.emit_led(LedPlan::Sequence(vec![forced.from, forced.to]));
            } else {
                self.forced_move = None;
            }
        }

        if self.physical != self.chess.snapshot() {
            self.enter_correction();
        }
        Ok(true)
    }

    fn enter_correction(&mut self) {
        self.move_state = MoveState::Correction;
        self.update_correction();
    }

    /// Recompute the mismatch between the physical mirror and the logical
    /// position, and light the board accordingly. Leaves correction mode
    /// once they agree again (§4.4.5).
    fn update_correction(&mut self) {
        let logical = self.chess.snapshot();
        if logical == self.physical {
            self.move_state = MoveState::Idle;
            self.emit_sound(SoundKind::Confirm);
            self.emit_led(LedPlan::Clear);
            if let Some(forced) = &self.forced_move {
                let still_legal = self.chess.legal_destinations(forced.from).map(|d| d.contains(&forced.to)).unwrap_or(false);
                if still_legal {
                    self.emit_led(LedPlan::Sequence(vec![forced.from, forced.to]));
                }
            }
            return;
        }

        let mut missing = Vec::new();
        let mut extra = Vec::new();
        for square in 0u8..64 {
            match (logical[square as usize], self.physical[square as usize]) {
                (true, false) => missing.push(square),
                (false, true) => extra.push(square),
                _ => {}
            }
        }
        self.emit_led(plan_correction(&missing, &extra));
    }

    /// Executes a legal move: the seven-step atomic sequence in §4.4.3.
    fn execute_move(&mut self, from: u8, to: u8) -> GameResult<()> {
        let needs_promotion = self.chess.is_promotion_move(from, to)?;
        // A move the opponent just forced already carries its own
        // promotion letter; only fall back to the player-facing prompt
        // when this move wasn't the forced one.
        let forced_promotion =
            self.forced_move.as_ref().filter(|f| f.from == from && f.to == to).and_then(|f| f.promotion);
        let promotion = if needs_promotion {
            Some(forced_promotion.unwrap_or_else(|| self.request_promotion(from, to)))
        } else {
            None
        };

        let tx = self.session.begin()?;

        let game_id = match self.game_id {
            Some(id) => id,
            None => {
                let new_id = tx.insert_game(&NewGame { source: self.source.clone(), ..Default::default() })?;
                // A move row for the starting position itself, per §6.
                if let Err(e) = tx.insert_move(new_id, "", &self.chess.fen()) {
                    let _ = tx.rollback();
                    return Err(e.into());
                }
                new_id
            }
        };

        let tentative_fen = self.chess.fen();
        let mut uci_guess = format!("{}{}", square_name(from), square_name(to));
        if let Some(p) = promotion {
            uci_guess.push(p);
        }
        let move_id = match tx.insert_move(game_id, &uci_guess, &tentative_fen) {
            Ok(id) => id,
            Err(e) => {
                let _ = tx.rollback();
                return Err(e.into());
            }
        };

        let uci = match self.chess.push(from, to, promotion) {
            Ok(uci) => uci,
            Err(e) => {
                let _ = tx.rollback();
                let err = GameError::Chess(e);
                self.emit_error(&err);
                return Err(err);
            }
        };

        let post_fen = self.chess.fen();
        if let Err(e) = tx.update_move_fen(move_id, &post_fen) {
            warn!(error = %e, game_id, move_id, "failed to update move fen; committing prior state as-is");
        }
        if let Err(e) = tx.commit() {
            error!(error = %e, game_id, move_id, "db commit failed after chess push; logical state remains authoritative");
        }
        self.game_id = Some(game_id);
        self.last_move_id = Some(move_id);

        self.emit_move(&uci, &post_fen);

        if let Some(forced) = &self.forced_move {
            if forced.from == from && forced.to == to {
                self.forced_move = None;
            }
        }

        self.move_state = MoveState::Idle;
        if self.physical != self.chess.snapshot() {
            self.enter_correction();
        } else {
            self.emit_sound(SoundKind::Confirm);
            self.emit_led(LedPlan::Clear);
        }

        Ok(())
    }

    fn abandon_and_reset(&mut self) -> GameResult<()> {
        if let Some(game_id) = self.game_id.take() {
            let tx = self.session.begin()?;
            tx.set_result(game_id, "*")?;
            tx.commit()?;
        }
        self.chess = ChessState::new();
        self.physical = self.chess.snapshot();
        self.last_move_id = None;
        self.move_state = MoveState::Idle;
        self.forced_move = None;
        Ok(())
    }

    /// Record a resignation for the side named (white resigning gives
    /// black the win, and vice versa).
    pub fn resign(&mut self, white_resigns: bool) -> GameResult<()> {
        let Some(game_id) = self.game_id else {
            return Ok(());
        };
        let result = if white_resigns { "0-1" } else { "1-0" };
        let tx = self.session.begin()?;
        tx.set_result(game_id, result)?;
        tx.commit()?;
        self.move_state = MoveState::Idle;
        self.forced_move = None;
        Ok(())
    }

    /// Record an agreed draw.
    pub fn agree_draw(&mut self) -> GameResult<()> {
        let Some(game_id) = self.game_id else {
            return Ok(());
        };
        let tx = self.session.begin()?;
        tx.set_result(game_id, "1/2-1/2")?;
        tx.commit()?;
        self.move_state = MoveState::Idle;
        self.forced_move = None;
        Ok(())
    }

    /// Record a finished game's outcome as derived from the chess rules
    /// themselves (checkmate, stalemate, ...), if the position is terminal.
    pub fn record_outcome_if_terminal(&mut self) -> GameResult<()> {
        let Some(outcome) = self.chess.outcome() else {
            return Ok(());
        };
        let Some(game_id) = self.game_id else {
            return Ok(());
        };
        let tx = self.session.begin()?;
        tx.set_result(game_id, outcome.as_pgn())?;
        tx.commit()?;
        Ok(())
    }
}
