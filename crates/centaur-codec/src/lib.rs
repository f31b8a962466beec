//! Packet framing, checksums, and the command registry for the DGT Centaur
//! serial bus. See `SPEC_FULL.md` §4.1 (Serial Codec).

mod framer;
mod packet;
mod registry;

pub use framer::{FrameAssembler, FrameEvent};
pub use packet::{build_packet, checksum, extract_payload, Packet};
pub use registry::{
    is_immediate, is_start_type_byte, spec_for, CommandName, CommandSpec, KEY_EVENT_RESPONSE,
    PIECE_EVENT_RESPONSE, POLLING_COMMANDS,
};
