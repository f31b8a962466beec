//! Remote (Lichess-style) opponent: streams state from a remote peer.
//! Authentication, game seeking, and the actual HTTP/streaming transport
//! are outside this crate's scope (`spec.md` Non-goals); `RemoteStream` is
//! the seam a caller plugs a real client into. See `SPEC_FULL.md` §4.5.
//!
//! This is the one opponent variant allowed to use `tokio`, per
//! `SPEC_FULL.md` §3 — the core three subsystems stay on OS threads.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

use crate::error::OpponentResult;
use crate::opponent::{MoveSink, Opponent};
use crate::state::{OpponentState, StateMachine};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// What a Remote opponent needs from its streaming transport: forward a
/// player move, and poll for the next opponent move (if any).
pub trait RemoteStream: Send {
    fn send_move(&mut self, uci: &str);
    fn try_recv(&mut self) -> Option<String>;
}

pub struct RemoteOpponent<R: RemoteStream + 'static> {
    state: Arc<StateMachine>,
    stream: Arc<Mutex<R>>,
    /// Moves we forwarded to the remote peer ourselves, so the echo that
    /// comes back on the stream isn't re-delivered as an opponent move.
    pending_echo: Arc<Mutex<HashSet<String>>>,
    sink: Option<MoveSink>,
    runtime: Runtime,
    poll_task: Option<JoinHandle<()>>,
}

impl<R: RemoteStream + 'static> RemoteOpponent<R> {
    pub fn new(stream: R) -> Self {
        Self {
            state: Arc::new(StateMachine::new()),
            stream: Arc::new(Mutex::new(stream)),
            pending_echo: Arc::new(Mutex::new(HashSet::new())),
            sink: None,
            runtime: Runtime::new().expect("building the remote opponent's tokio runtime"),
            poll_task: None,
        }
    }

    fn ensure_poll_task(&mut self) {
        if self.poll_task.is_some() {
            return;
        }
        let stream = self.stream.clone();
        let pending_echo = self.pending_echo.clone();
        let sink = self.sink.clone().expect("start() must run before get_move()");
        let state = self.state.clone();

        self.poll_task = Some(self.runtime.spawn(async move {
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                if state.get() == OpponentState::Stopped {
                    return;
                }
                let incoming = stream.lock().try_recv();
                let Some(uci) = incoming else { continue };
                if pending_echo.lock().remove(&uci) {
                    tracing::debug!(uci, "suppressing echo of our own forwarded move");
                    continue;
                }
                if state.get() == OpponentState::Thinking {
                    sink(uci);
                    let _ = state.transition(OpponentState::Ready);
                }
            }
        }));
    }
}

impl<R: RemoteStream + 'static> Opponent for RemoteOpponent<R> {
    fn start(&mut self, sink: MoveSink) -> OpponentResult<()> {
        self.state.transition(OpponentState::Initializing)?;
        self.sink = Some(sink);
        self.state.transition(OpponentState::Ready)
    }

    fn stop(&mut self) {
        let _ = self.state.transition(OpponentState::Stopped);
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }

    fn get_move(&mut self, _fen: &str) -> OpponentResult<()> {
        self.state.transition(OpponentState::Thinking)?;
        self.ensure_poll_task();
        Ok(())
    }

    fn on_player_move(&mut self, uci: &str, _fen: &str) {
        self.pending_echo.lock().insert(uci.to_string());
        self.stream.lock().send_move(uci);
    }

    fn on_new_game(&mut self) {
        self.pending_echo.lock().clear();
    }

    fn on_resign(&mut self) {
        self.stop();
    }

    fn state(&self) -> OpponentState {
        self.state.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::mpsc;

    struct ChannelStream {
        incoming: mpsc::Receiver<String>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    impl RemoteStream for ChannelStream {
        fn send_move(&mut self, uci: &str) {
            self.sent.lock().unwrap().push(uci.to_string());
        }

        fn try_recv(&mut self) -> Option<String> {
            self.incoming.try_recv().ok()
        }
    }

    #[test]
    fn opponent_move_delivered_through_sink() {
        let (tx, rx) = mpsc::channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let stream = ChannelStream { incoming: rx, sent };
        let mut opponent = RemoteOpponent::new(stream);

        let received = Arc::new(Mutex::new(None));
        let received2 = received.clone();
        opponent
            .start(Arc::new(move |m| *received2.lock() = Some(m)))
            .unwrap();

        opponent.get_move("startpos").unwrap();
        tx.send("e7e5".to_string()).unwrap();

        for _ in 0..20 {
            if received.lock().is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        assert_eq!(received.lock().clone(), Some("e7e5".to_string()));
        opponent.stop();
    }

    #[test]
    fn own_forwarded_move_echo_is_suppressed() {
        let (tx, rx) = mpsc::channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let stream = ChannelStream { incoming: rx, sent: sent.clone() };
        let mut opponent = RemoteOpponent::new(stream);

        let received = Arc::new(Mutex::new(Vec::new()));
        let received2 = received.clone();
        opponent
            .start(Arc::new(move |m| received2.lock().push(m)))
            .unwrap();

        opponent.on_player_move("e2e4", "fen-after-e4");
        assert_eq!(sent.lock().unwrap().as_slice(), ["e2e4"]);

        opponent.get_move("fen-after-e4").unwrap();
        tx.send("e2e4".to_string()).unwrap(); // the server echoing our own move back

        std::thread::sleep(Duration::from_millis(300));
        assert!(received.lock().is_empty());
        opponent.stop();
    }
}
