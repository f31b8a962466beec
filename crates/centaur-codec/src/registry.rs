//! Static command registry for the DGT Centaur serial bus.
//!
//! Mirrors the `COMMANDS` table in the board's sync driver: a symbolic name
//! maps to a command byte, an optional expected response type, and an
//! optional default payload. The table is immutable and loaded once.

/// Symbolic command name. One variant per registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    Discovery,
    SendState,
    SendChanges,
    PollKeys,
    SendBattery,
    SendTrademark,
    LedCmd,
    SoundGeneral,
    SoundFactory,
    SoundPowerOff,
    SoundPowerOn,
    SoundWrong,
    SoundWrongMove,
    Sleep,
    ReturnBusAddr,
    /// Reserved: part of the board's extended snapshot/init handshake.
    /// No response handler is wired up; kept only so the registry mirrors
    /// the original's full command set.
    SnapshotF0,
    SnapshotF4,
    Snapshot96,
    /// Acknowledged only as "randomize ping" in the original source.
    /// Payload (3 trailing bytes) is consumed and logged, never interpreted.
    BusUnknown2,
}

/// A registry entry: command byte, expected response type, default payload.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: CommandName,
    pub cmd: u8,
    pub expected_response: Option<u8>,
    pub default_payload: Option<&'static [u8]>,
}

const REGISTRY: &[CommandSpec] = &[
    CommandSpec { name: CommandName::Discovery, cmd: 0x87, expected_response: Some(0x87), default_payload: None },
    CommandSpec { name: CommandName::SendState, cmd: 0x82, expected_response: Some(0x83), default_payload: None },
    CommandSpec { name: CommandName::SendChanges, cmd: 0x83, expected_response: Some(0x85), default_payload: None },
    CommandSpec { name: CommandName::PollKeys, cmd: 0x94, expected_response: Some(0xB1), default_payload: None },
    CommandSpec { name: CommandName::SendBattery, cmd: 0x98, expected_response: Some(0xB5), default_payload: None },
    CommandSpec { name: CommandName::SendTrademark, cmd: 0x97, expected_response: Some(0xB4), default_payload: None },
    CommandSpec { name: CommandName::LedCmd, cmd: 0xB0, expected_response: None, default_payload: None },
    CommandSpec { name: CommandName::SoundGeneral, cmd: 0xB1, expected_response: None, default_payload: Some(&[0x4c, 0x08]) },
    CommandSpec { name: CommandName::SoundFactory, cmd: 0xB1, expected_response: None, default_payload: Some(&[0x4c, 0x40]) },
    CommandSpec { name: CommandName::SoundPowerOff, cmd: 0xB1, expected_response: None, default_payload: Some(&[0x4c, 0x08, 0x48, 0x08]) },
    CommandSpec { name: CommandName::SoundPowerOn, cmd: 0xB1, expected_response: None, default_payload: Some(&[0x48, 0x08, 0x4c, 0x08]) },
    CommandSpec { name: CommandName::SoundWrong, cmd: 0xB1, expected_response: None, default_payload: Some(&[0x4e, 0x0c, 0x48, 0x10]) },
    CommandSpec { name: CommandName::SoundWrongMove, cmd: 0xB1, expected_response: None, default_payload: Some(&[0x48, 0x08]) },
    CommandSpec { name: CommandName::Sleep, cmd: 0xB2, expected_response: Some(0xB1), default_payload: Some(&[0x0a]) },
    CommandSpec { name: CommandName::ReturnBusAddr, cmd: 0x46, expected_response: Some(0x90), default_payload: None },
    CommandSpec { name: CommandName::SnapshotF0, cmd: 0xF0, expected_response: Some(0xF0), default_payload: Some(&[0x7f]) },
    CommandSpec { name: CommandName::SnapshotF4, cmd: 0xF4, expected_response: Some(0xF4), default_payload: Some(&[0x7f]) },
    CommandSpec { name: CommandName::Snapshot96, cmd: 0x96, expected_response: Some(0xB2), default_payload: None },
    CommandSpec { name: CommandName::BusUnknown2, cmd: 0x92, expected_response: None, default_payload: None },
];

/// Look up the registry entry for a symbolic command name.
pub fn spec_for(name: CommandName) -> &'static CommandSpec {
    REGISTRY
        .iter()
        .find(|s| s.name == name)
        .expect("every CommandName variant has a registry entry")
}

/// The polling commands subject to deduplication in the request queue (N = 2).
pub const POLLING_COMMANDS: [CommandName; 2] = [CommandName::SendChanges, CommandName::PollKeys];

/// Fire-and-forget commands that bypass both request queues.
pub fn is_immediate(name: CommandName) -> bool {
    matches!(
        name,
        CommandName::SoundGeneral
            | CommandName::SoundFactory
            | CommandName::SoundPowerOff
            | CommandName::SoundPowerOn
            | CommandName::SoundWrong
            | CommandName::SoundWrongMove
            | CommandName::LedCmd
    )
}

/// Start-of-packet type bytes used by the framer's orphan-data detector:
/// every known response type, plus the discovery and "other" start types
/// the board emits that aren't requests we issue ourselves.
pub fn is_start_type_byte(byte: u8) -> bool {
    const OTHER_START_TYPES: [u8; 2] = [0x87, 0x93];
    if OTHER_START_TYPES.contains(&byte) {
        return true;
    }
    REGISTRY
        .iter()
        .any(|s| s.expected_response == Some(byte))
}

/// Unsolicited response type carrying piece lift/place events.
pub const PIECE_EVENT_RESPONSE: u8 = 0x85;
/// Unsolicited response type carrying key press/release events.
pub const KEY_EVENT_RESPONSE: u8 = 0xB1;
