//! Logical chess position: move legality, FEN derivation, and outcome
//! detection. The board only ever reports piece *presence*; this crate
//! holds the authoritative position the physical board must conform to.
//! See `SPEC_FULL.md` §2 (Chess State) and §4.4 (Game Manager) for how the
//! position is mutated.

use shakmaty::fen::Fen;
use shakmaty::uci::Uci;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Outcome, Position, Rank, Role, Square};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChessError {
    #[error("square index {0} is out of range (must be 0-63)")]
    InvalidSquare(u8),
    #[error("illegal move from {from} to {to}")]
    IllegalMove { from: u8, to: u8 },
    #[error("illegal uci move: {0}")]
    IllegalUci(String),
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
    #[error("no move to take back")]
    NothingToPop,
}

pub type ChessResult<T> = Result<T, ChessError>;

/// Terminal game result in PGN notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
}

impl GameResult {
    pub fn as_pgn(&self) -> &'static str {
        match self {
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
        }
    }
}

fn square_from_index(index: u8) -> ChessResult<Square> {
    if index > 63 {
        return Err(ChessError::InvalidSquare(index));
    }
    Ok(Square::ALL[index as usize])
}

fn role_from_letter(letter: char) -> Option<Role> {
    match letter.to_ascii_lowercase() {
        'q' => Some(Role::Queen),
        'r' => Some(Role::Rook),
        'b' => Some(Role::Bishop),
        'n' => Some(Role::Knight),
        _ => None,
    }
}

/// The authoritative logical chess position, plus enough history to support
/// the Game Manager's single-ply takeback (§4.4.4).
pub struct ChessState {
    position: Chess,
    history: Vec<(Chess, String)>,
}

impl ChessState {
    pub fn new() -> Self {
        Self { position: Chess::default(), history: Vec::new() }
    }

    pub fn from_fen(fen: &str) -> ChessResult<Self> {
        let setup: Fen = fen.parse().map_err(|_| ChessError::InvalidFen(fen.to_string()))?;
        let position = setup
            .into_position(CastlingMode::Standard)
            .map_err(|_| ChessError::InvalidFen(fen.to_string()))?;
        Ok(Self { position, history: Vec::new() })
    }

    pub fn fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    pub fn side_to_move(&self) -> Color {
        self.position.turn()
    }

    /// Squares the piece on `from` may legally move to, 0..63 file-major
    /// (a1=0 .. h8=63) matching the physical board's own indexing.
    pub fn legal_destinations(&self, from: u8) -> ChessResult<Vec<u8>> {
        let from_sq = square_from_index(from)?;
        let mut dests: Vec<u8> = self
            .position
            .legal_moves()
            .iter()
            .filter(|m| m.from() == Some(from_sq))
            .map(|m| m.to() as u8)
            .collect();
        dests.sort_unstable();
        dests.dedup();
        Ok(dests)
    }

    /// Whether `square` currently holds a piece belonging to the side to
    /// move — the check a piece lift validates against before recording a
    /// move in progress.
    pub fn is_side_to_move_piece(&self, square: u8) -> ChessResult<bool> {
        let sq = square_from_index(square)?;
        Ok(self.position.board().color_at(sq) == Some(self.position.turn()))
    }

    fn find_move(&self, from: Square, to: Square, promotion: Option<Role>) -> Option<Move> {
        self.position
            .legal_moves()
            .into_iter()
            .find(|m| m.from() == Some(from) && m.to() == to && m.promotion() == promotion)
    }

    /// True when the piece on `from` is a pawn moving to the back rank,
    /// i.e. a promotion letter is required to disambiguate the move.
    pub fn is_promotion_move(&self, from: u8, to: u8) -> ChessResult<bool> {
        let from_sq = square_from_index(from)?;
        let to_sq = square_from_index(to)?;
        let is_pawn = self.position.board().role_at(from_sq) == Some(Role::Pawn);
        let back_rank = matches!(to_sq.rank(), Rank::First | Rank::Eighth);
        Ok(is_pawn && back_rank)
    }

    /// Push a move given as square indices. `promotion` is the target
    /// piece letter (`q|r|b|n`); when the move requires one and none is
    /// given it defaults to queen, per §4.4.3. Returns the UCI played.
    pub fn push(&mut self, from: u8, to: u8, promotion: Option<char>) -> ChessResult<String> {
        let from_sq = square_from_index(from)?;
        let to_sq = square_from_index(to)?;
        let needs_promotion = self.is_promotion_move(from, to)?;
        let promotion_role = if needs_promotion {
            Some(promotion.and_then(role_from_letter).unwrap_or(Role::Queen))
        } else {
            None
        };
        let mv = self
            .find_move(from_sq, to_sq, promotion_role)
            .ok_or(ChessError::IllegalMove { from, to })?;
        self.apply(mv)
    }

    /// Push a move given as a UCI string (e.g. from a forced-move opponent
    /// announcement, which must already include any promotion letter).
    pub fn push_uci(&mut self, uci: &str) -> ChessResult<String> {
        let parsed: Uci = uci.parse().map_err(|_| ChessError::IllegalUci(uci.to_string()))?;
        let mv = parsed
            .to_move(&self.position)
            .map_err(|_| ChessError::IllegalUci(uci.to_string()))?;
        self.apply(mv)
    }

    fn apply(&mut self, mv: Move) -> ChessResult<String> {
        let uci = Uci::from_move(&mv, CastlingMode::Standard).to_string();
        let before = self.position.clone();
        let from = mv.from().map(|s| s as u8).unwrap_or(0);
        let to = mv.to() as u8;
        self.position = self
            .position
            .clone()
            .play(&mv)
            .map_err(|_| ChessError::IllegalMove { from, to })?;
        self.history.push((before, uci.clone()));
        Ok(uci)
    }

    /// Undo the last move pushed, restoring the position that preceded it.
    /// Returns the UCI string that was undone.
    pub fn pop(&mut self) -> ChessResult<String> {
        let (before, uci) = self.history.pop().ok_or(ChessError::NothingToPop)?;
        self.position = before;
        Ok(uci)
    }

    /// The presence snapshot the position had before the last move, without
    /// mutating `self`. Used for takeback detection: a placement matching
    /// this snapshot means the user put the board back the way it was.
    pub fn previous_snapshot(&self) -> Option<[bool; 64]> {
        let (before, _) = self.history.last()?;
        let mut out = [false; 64];
        for sq in before.board().occupied() {
            out[sq as usize] = true;
        }
        Some(out)
    }

    /// The UCI of the last move played, if any.
    pub fn last_uci(&self) -> Option<&str> {
        self.history.last().map(|(_, uci)| uci.as_str())
    }

    /// Presence-only snapshot matching the physical board's own reporting:
    /// `true` where a piece sits, indexed identically to squares (a1=0).
    pub fn snapshot(&self) -> [bool; 64] {
        let mut out = [false; 64];
        for sq in self.position.board().occupied() {
            out[sq as usize] = true;
        }
        out
    }

    pub fn outcome(&self) -> Option<GameResult> {
        match self.position.outcome()? {
            Outcome::Decisive { winner: Color::White } => Some(GameResult::WhiteWins),
            Outcome::Decisive { winner: Color::Black } => Some(GameResult::BlackWins),
            Outcome::Draw => Some(GameResult::Draw),
        }
    }

    pub fn is_legal_uci(&self, uci: &str) -> bool {
        uci.parse::<Uci>()
            .ok()
            .and_then(|u| u.to_move(&self.position).ok())
            .is_some()
    }
}

impl Default for ChessState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(file: u8, rank: u8) -> u8 {
        rank * 8 + file
    }

    #[test]
    fn starting_position_has_thirty_two_pieces() {
        let state = ChessState::new();
        assert_eq!(state.snapshot().iter().filter(|&&p| p).count(), 32);
    }

    #[test]
    fn pawn_e2_can_advance_one_or_two_squares() {
        let state = ChessState::new();
        let e2 = idx(4, 1);
        let dests = state.legal_destinations(e2).unwrap();
        assert_eq!(dests, vec![idx(4, 2), idx(4, 3)]);
    }

    #[test]
    fn push_advances_side_to_move_and_updates_fen() {
        let mut state = ChessState::new();
        let uci = state.push(idx(4, 1), idx(4, 3), None).unwrap();
        assert_eq!(uci, "e2e4");
        assert_eq!(state.side_to_move(), Color::Black);
        assert!(state.fen().contains(" b "));
    }

    #[test]
    fn pop_restores_prior_position() {
        let mut state = ChessState::new();
        let fen_before = state.fen();
        state.push(idx(4, 1), idx(4, 3), None).unwrap();
        let undone = state.pop().unwrap();
        assert_eq!(undone, "e2e4");
        assert_eq!(state.fen(), fen_before);
    }

    #[test]
    fn pop_with_empty_history_errors() {
        let mut state = ChessState::new();
        assert!(matches!(state.pop(), Err(ChessError::NothingToPop)));
    }

    #[test]
    fn illegal_move_is_rejected() {
        let mut state = ChessState::new();
        let e2 = idx(4, 1);
        let e5 = idx(4, 4);
        assert!(matches!(
            state.push(e2, e5, None),
            Err(ChessError::IllegalMove { .. })
        ));
    }

    #[test]
    fn promotion_defaults_to_queen_when_unspecified() {
        // White pawn on a7, black king far away, ready to promote on a8.
        let mut state = ChessState::from_fen("k7/P7/8/8/8/8/8/7K w - - 0 1").unwrap();
        let uci = state.push(idx(0, 6), idx(0, 7), None).unwrap();
        assert_eq!(uci, "a7a8q");
    }

    #[test]
    fn fools_mate_is_detected_as_black_win() {
        let mut state = ChessState::new();
        state.push_uci("f2f3").unwrap();
        state.push_uci("e7e5").unwrap();
        state.push_uci("g2g4").unwrap();
        state.push_uci("d8h4").unwrap();
        assert_eq!(state.outcome(), Some(GameResult::BlackWins));
    }

    #[test]
    fn previous_snapshot_matches_pre_move_position() {
        let mut state = ChessState::new();
        let before = state.snapshot();
        state.push(idx(4, 1), idx(4, 3), None).unwrap();
        assert_eq!(state.previous_snapshot(), Some(before));
        assert_eq!(state.last_uci(), Some("e2e4"));
    }

    #[test]
    fn previous_snapshot_is_none_with_no_history() {
        let state = ChessState::new();
        assert_eq!(state.previous_snapshot(), None);
    }

    #[test]
    fn side_to_move_piece_check() {
        let state = ChessState::new();
        assert!(state.is_side_to_move_piece(idx(4, 1)).unwrap()); // white pawn e2
        assert!(!state.is_side_to_move_piece(idx(4, 6)).unwrap()); // black pawn e7
        assert!(!state.is_side_to_move_piece(idx(4, 3)).unwrap()); // empty e4
    }

    #[test]
    fn invalid_square_index_is_rejected() {
        let state = ChessState::new();
        assert!(matches!(
            state.legal_destinations(64),
            Err(ChessError::InvalidSquare(64))
        ));
    }
}
