//! Discovery handshake: learns the board's bus address before any other
//! command can be addressed correctly. See `SPEC_FULL.md` §4.2.

use centaur_codec::{build_packet, spec_for, CommandName, Packet};

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    NotStarted,
    AwaitingFirstResponse,
    AwaitingSecondResponse { addr1: u8, addr2: u8 },
    Complete { addr1: u8, addr2: u8 },
}

/// Side effects the caller must perform in response to a discovery step.
/// `Controller` executes these against the serial port and its own state;
/// kept separate from I/O so the state machine itself is pure and testable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryAction {
    WriteBytes(Vec<u8>),
    FlushStaleChanges,
    SetDiscardStaleKeys,
    MarkReady,
    StartPolling,
    LedsOff,
    PowerOnSound,
}

pub struct Discovery {
    state: State,
}

impl Discovery {
    pub fn new() -> Self {
        Self { state: State::NotStarted }
    }

    pub fn address(&self) -> Option<(u8, u8)> {
        match self.state {
            State::Complete { addr1, addr2 } => Some((addr1, addr2)),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Complete { .. })
    }

    fn discovery_packet(addr1: u8, addr2: u8) -> Vec<u8> {
        build_packet(spec_for(CommandName::Discovery).cmd, addr1, addr2, None)
    }

    /// Begin (or restart) the handshake: write the two wake bytes, then the
    /// zero-addressed discovery command.
    pub fn start(&mut self) -> Vec<DiscoveryAction> {
        self.state = State::AwaitingFirstResponse;
        vec![
            DiscoveryAction::WriteBytes(vec![0x4d]),
            DiscoveryAction::WriteBytes(vec![0x4e]),
            DiscoveryAction::WriteBytes(Self::discovery_packet(0x00, 0x00)),
        ]
    }

    /// Feed a completed packet into the handshake. Non-discovery-response
    /// packets are ignored (they can't arrive before the bus address is
    /// known, but defensive ignoring is cheap).
    pub fn on_packet(&mut self, packet: &Packet) -> Vec<DiscoveryAction> {
        if packet.packet_type != spec_for(CommandName::Discovery).cmd {
            return Vec::new();
        }
        match self.state.clone() {
            State::AwaitingFirstResponse => {
                let (addr1, addr2) = (packet.addr1, packet.addr2);
                self.state = State::AwaitingSecondResponse { addr1, addr2 };
                vec![DiscoveryAction::WriteBytes(Self::discovery_packet(addr1, addr2))]
            }
            State::AwaitingSecondResponse { addr1, addr2 } => {
                if packet.addr1 == addr1 && packet.addr2 == addr2 {
                    self.state = State::Complete { addr1, addr2 };
                    vec![
                        DiscoveryAction::FlushStaleChanges,
                        DiscoveryAction::SetDiscardStaleKeys,
                        DiscoveryAction::MarkReady,
                        DiscoveryAction::StartPolling,
                        DiscoveryAction::LedsOff,
                        DiscoveryAction::PowerOnSound,
                    ]
                } else {
                    tracing::warn!(?addr1, ?addr2, got1 = packet.addr1, got2 = packet.addr2, "address mismatch, restarting discovery");
                    self.start()
                }
            }
            State::NotStarted | State::Complete { .. } => Vec::new(),
        }
    }
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(addr1: u8, addr2: u8) -> Packet {
        Packet { packet_type: 0x87, addr1, addr2, payload: Vec::new(), raw: Vec::new() }
    }

    #[test]
    fn start_writes_wake_bytes_then_zero_addressed_discovery() {
        let mut d = Discovery::new();
        let actions = d.start();
        assert_eq!(actions[0], DiscoveryAction::WriteBytes(vec![0x4d]));
        assert_eq!(actions[1], DiscoveryAction::WriteBytes(vec![0x4e]));
        match &actions[2] {
            DiscoveryAction::WriteBytes(bytes) => assert_eq!(bytes[0], 0x87),
            other => panic!("expected WriteBytes, got {other:?}"),
        }
    }

    #[test]
    fn completes_when_second_response_echoes_address() {
        let mut d = Discovery::new();
        d.start();
        let resend = d.on_packet(&response(0xA1, 0xB2));
        assert_eq!(resend.len(), 1);
        let finish = d.on_packet(&response(0xA1, 0xB2));
        assert!(d.is_complete());
        assert_eq!(d.address(), Some((0xA1, 0xB2)));
        assert!(finish.contains(&DiscoveryAction::MarkReady));
        assert!(finish.contains(&DiscoveryAction::StartPolling));
    }

    #[test]
    fn mismatched_second_response_restarts() {
        let mut d = Discovery::new();
        d.start();
        d.on_packet(&response(0xA1, 0xB2));
        let restart = d.on_packet(&response(0xC3, 0xD4));
        assert!(!d.is_complete());
        assert_eq!(restart.len(), 3);
    }

    #[test]
    fn non_discovery_packets_are_ignored_mid_handshake() {
        let mut d = Discovery::new();
        d.start();
        let other = Packet { packet_type: 0x83, addr1: 0, addr2: 0, payload: Vec::new(), raw: Vec::new() };
        assert!(d.on_packet(&other).is_empty());
    }
}
