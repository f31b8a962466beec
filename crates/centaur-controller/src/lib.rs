//! Serial board controller and piece/key event router. See `SPEC_FULL.md`
//! §4.2/§4.3.

mod controller;
mod discovery;
mod error;
mod events;
mod port;
mod queue;
mod waiter;

pub use controller::{Controller, ControllerHandle, ControllerState};
pub use error::ControllerError;
pub use events::{decode_key_event, decode_piece_events, Button, KeyEvent, PieceEvent, PieceEventKind, KEY_DOWN_OFFSET};
pub use port::{MemoryPort, RealSerialPort, SerialPort};

pub use centaur_codec::CommandName;
