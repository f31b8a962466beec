//! Wires a board `Controller`, a `GameManager`, and a pluggable `Opponent`
//! into one running system. See `SPEC_FULL.md` §4 (overview) and §4.5
//! (Opponent integration).

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use centaur_controller::{Button, CommandName, Controller, KeyEvent, PieceEvent, PieceEventKind};
use centaur_game::{ForcedMove, GameManager, SoundKind};
use centaur_led::{build_led_payload, LedPlan, DEFAULT_INTENSITY, DEFAULT_REPEAT, DEFAULT_SPEED};
use centaur_opponent::Opponent;

use crate::error::CoreResult;

fn square_from_name(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let file = chars.next()?;
    let rank = chars.next()?;
    if !('a'..='h').contains(&file) || !('1'..='8').contains(&rank) {
        return None;
    }
    Some((file as u8 - b'a') + (rank as u8 - b'1') * 8)
}

/// Parse a bare UCI move (`e2e4`, `e7e8q`) into a `ForcedMove`. Returns
/// `None` for anything shorter than a move or with an unrecognized square.
fn parse_forced_move(uci: &str) -> Option<ForcedMove> {
    if uci.len() < 4 {
        return None;
    }
    let from = square_from_name(&uci[0..2])?;
    let to = square_from_name(&uci[2..4])?;
    let promotion = uci.chars().nth(4);
    Some(ForcedMove { from, to, promotion })
}

/// Mediates between the physical board, the game, and the opponent: piece
/// and key events drive the game; the game's move/LED/sound callbacks drive
/// the board and the opponent back.
pub struct Coordinator {
    controller: Controller,
    game: Arc<Mutex<GameManager>>,
    opponent: Arc<Mutex<Box<dyn Opponent>>>,
}

impl Coordinator {
    pub fn new(controller: Controller, mut game: GameManager, opponent: Box<dyn Opponent>) -> CoreResult<Self> {
        let handle = controller.handle();

        let led_handle = handle.clone();
        game.set_on_led(Arc::new(move |plan: LedPlan| {
            let payload = build_led_payload(&plan, DEFAULT_SPEED, DEFAULT_REPEAT, DEFAULT_INTENSITY);
            if let Err(e) = led_handle.send_immediate(CommandName::LedCmd, Some(&payload)) {
                warn!(error = %e, "failed to send led command");
            }
        }));

        let sound_handle = handle.clone();
        game.set_on_sound(Arc::new(move |kind: SoundKind| {
            let command = match kind {
                SoundKind::Confirm => CommandName::SoundGeneral,
                SoundKind::Wrong => CommandName::SoundWrong,
            };
            if let Err(e) = sound_handle.send_immediate(command, None) {
                warn!(error = %e, "failed to send sound command");
            }
        }));

        let opponent = Arc::new(Mutex::new(opponent));

        let opponent_for_move = opponent.clone();
        game.set_on_move(Arc::new(move |uci, fen| {
            let mut opponent = opponent_for_move.lock();
            opponent.on_player_move(uci, fen);
            if let Err(e) = opponent.get_move(fen) {
                warn!(error = %e, "opponent rejected move request");
            }
        }));

        let opponent_for_takeback = opponent.clone();
        game.set_on_takeback(Arc::new(move |_uci| {
            opponent_for_takeback.lock().on_takeback();
        }));

        let game = Arc::new(Mutex::new(game));

        let game_for_sink = game.clone();
        let sink: centaur_opponent::MoveSink = Arc::new(move |uci: String| {
            let Some(forced) = parse_forced_move(&uci) else {
                warn!(%uci, "opponent returned an unparseable move");
                return;
            };
            let mut game = game_for_sink.lock();
            game.set_forced_move(Some(forced));
            game.show_forced_move_hint();
        });
        opponent.lock().start(sink)?;

        let game_for_piece = game.clone();
        controller.on_piece_event(move |event: PieceEvent| {
            let mut game = game_for_piece.lock();
            let result = match event.kind {
                PieceEventKind::Lift => game.on_piece_lift(event.square),
                PieceEventKind::Place => game.on_piece_place(event.square),
            };
            if let Err(e) = result {
                warn!(error = %e, square = event.square, "piece event rejected");
            }
        });

        let game_for_key = game.clone();
        let opponent_for_key = opponent.clone();
        controller.on_key_event(move |event: KeyEvent| {
            if !event.down {
                return;
            }
            if event.button == Some(Button::Back) {
                if let Err(e) = game_for_key.lock().resign(true) {
                    warn!(error = %e, "resign failed");
                }
                opponent_for_key.lock().on_resign();
            }
        });

        Ok(Self { controller, game, opponent })
    }

    /// Ask the opponent to move from the current position, e.g. right
    /// after starting a new game where the human plays black.
    pub fn request_opponent_move(&self) -> CoreResult<()> {
        let fen = self.game.lock().fen();
        self.opponent.lock().get_move(&fen)?;
        Ok(())
    }

    pub fn fen(&self) -> String {
        self.game.lock().fen()
    }

    pub fn is_ready(&self) -> bool {
        self.controller.is_ready()
    }

    /// Stop the opponent and the controller's worker threads. Neither has
    /// a failure mode of its own to report; this still returns
    /// `CoreResult` so a future fallible shutdown step composes without
    /// another signature change.
    pub fn shutdown(self) -> CoreResult<()> {
        self.opponent.lock().stop();
        self.controller.shutdown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use centaur_controller::MemoryPort;
    use centaur_opponent::HumanOpponent;
    use centaur_persistence::Session;
    use std::time::Duration;

    fn handshake(port: &MemoryPort) {
        use centaur_codec::build_packet;
        std::thread::sleep(Duration::from_millis(20));
        port.inject(&build_packet(0x87, 0xA1, 0xB2, None));
        std::thread::sleep(Duration::from_millis(20));
        port.inject(&build_packet(0x87, 0xA1, 0xB2, None));
        std::thread::sleep(Duration::from_millis(20));
    }

    #[test]
    fn coordinator_drives_a_move_through_to_the_board() {
        let port = MemoryPort::new();
        let controller = Controller::new(Box::new(port.clone()), Box::new(port.clone()));
        handshake(&port);

        let game = GameManager::new(Session::open_in_memory().unwrap(), "test");
        let coordinator = Coordinator::new(controller, game, Box::new(HumanOpponent::new())).unwrap();
        assert!(coordinator.is_ready());

        coordinator.request_opponent_move().unwrap();
        assert_eq!(coordinator.fen().split(' ').next().unwrap(), "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR");

        coordinator.shutdown().unwrap();
    }

    #[test]
    fn parses_promotion_uci_into_forced_move() {
        let forced = parse_forced_move("e7e8q").unwrap();
        assert_eq!(forced.from, square_from_name("e7").unwrap());
        assert_eq!(forced.to, square_from_name("e8").unwrap());
        assert_eq!(forced.promotion, Some('q'));
    }

    #[test]
    fn rejects_too_short_uci() {
        assert!(parse_forced_move("e7").is_none());
    }
}
