//! Thread orchestration: the serial reader, request processor, polling
//! loop, and piece-event callback worker described in `SPEC_FULL.md` §4.2.
//!
//! `SEND_CHANGES`/`POLL_KEYS` share their response packet type (`0x85`/
//! `0xB1`) with the unsolicited piece/key event stream. A waiter is still
//! installed and delivered to first, same as any other command; the
//! reader thread then always runs the piece/key routing on top, since
//! those listeners need every such packet regardless of whether a caller
//! happened to be blocked on one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use centaur_codec::{
    build_packet, spec_for, CommandName, FrameAssembler, FrameEvent, Packet, KEY_EVENT_RESPONSE,
    PIECE_EVENT_RESPONSE, POLLING_COMMANDS,
};

use crate::discovery::{Discovery, DiscoveryAction};
use crate::error::ControllerError;
use crate::events::{decode_key_event, decode_piece_events, KeyEvent, PieceEvent};
use crate::port::{RealSerialPort, SerialPort};
use crate::queue::{PollingDedup, Request, RequestQueues};
use crate::waiter::WaiterRegistry;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const POLL_BACKOFF_INTERVAL: Duration = Duration::from_secs(1);
const POLL_FAILURE_BACKOFF_THRESHOLD: u32 = 10;
const CALLBACK_QUEUE_CAPACITY: usize = 256;
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Initializing,
    Ready,
    Stopped,
}

type PieceListener = Box<dyn Fn(PieceEvent) + Send + Sync>;
type KeyListener = Box<dyn Fn(KeyEvent) + Send + Sync>;

struct Inner {
    write_port: StdMutex<Box<dyn SerialPort>>,
    queues: RequestQueues,
    dedup: PollingDedup,
    waiter: WaiterRegistry,
    discovery: Mutex<Discovery>,
    state: Mutex<ControllerState>,
    running: AtomicBool,
    ready: AtomicBool,
    discard_stale_keys: AtomicBool,
    piece_tx: crossbeam_channel::Sender<PieceEvent>,
    piece_rx: crossbeam_channel::Receiver<PieceEvent>,
    piece_listeners: Mutex<Vec<PieceListener>>,
    key_listeners: Mutex<Vec<KeyListener>>,
}

impl Inner {
    fn address(&self) -> Option<(u8, u8)> {
        self.discovery.lock().address()
    }

    fn write(&self, bytes: &[u8]) -> Result<(), ControllerError> {
        self.write_port.lock().unwrap().write_all(bytes).map_err(|e| ControllerError::Io(e.to_string()))
    }

    fn set_state(&self, state: ControllerState) {
        *self.state.lock() = state;
    }
}

/// The top-level serial board controller. Owns the transport and every
/// worker thread the concurrency contract describes; `send_command` and
/// `send_immediate` are the public request paths.
pub struct Controller {
    inner: Arc<Inner>,
    reader_handle: Option<JoinHandle<()>>,
    processor_handle: Option<JoinHandle<()>>,
    polling_handle: Option<JoinHandle<()>>,
    callback_handle: Option<JoinHandle<()>>,
}

/// A cloneable reference to a running controller, carrying only the
/// command-sending surface (no thread join handles). Safe to hand to event
/// listener closures and other threads.
#[derive(Clone)]
pub struct ControllerHandle {
    inner: Arc<Inner>,
}

impl ControllerHandle {
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    pub fn send_command(
        &self,
        command: CommandName,
        override_payload: Option<Vec<u8>>,
        timeout: Duration,
    ) -> Result<Vec<u8>, ControllerError> {
        if !self.inner.running.load(Ordering::SeqCst) {
            return Err(ControllerError::Stopped);
        }
        if POLLING_COMMANDS.contains(&command) && !self.inner.dedup.should_enqueue(command) {
            return Err(ControllerError::QueueFull);
        }
        let (tx, rx) = crossbeam_channel::bounded(1);
        let req = Request { command, override_payload, timeout, reply: Some(tx) };
        if let Err(e) = self.inner.queues.push_main(req) {
            if POLLING_COMMANDS.contains(&command) {
                self.inner.dedup.clear(command);
            }
            return Err(e);
        }
        let result = rx.recv_timeout(timeout + Duration::from_millis(50)).unwrap_or(Err(ControllerError::Timeout));
        if POLLING_COMMANDS.contains(&command) {
            self.inner.dedup.clear(command);
        }
        result
    }

    pub fn send_low_priority(&self, command: CommandName, timeout: Duration) -> Result<Vec<u8>, ControllerError> {
        if !self.inner.running.load(Ordering::SeqCst) {
            return Err(ControllerError::Stopped);
        }
        let (tx, rx) = crossbeam_channel::bounded(1);
        let req = Request { command, override_payload: None, timeout, reply: Some(tx) };
        self.inner.queues.push_low_priority(req)?;
        rx.recv_timeout(timeout + Duration::from_millis(50)).unwrap_or(Err(ControllerError::Timeout))
    }

    pub fn send_immediate(&self, command: CommandName, payload: Option<&[u8]>) -> Result<(), ControllerError> {
        let (addr1, addr2) = self.inner.address().ok_or(ControllerError::NotReady)?;
        let spec = spec_for(command);
        let bytes = build_packet(spec.cmd, addr1, addr2, payload.or(spec.default_payload));
        self.inner.write(&bytes)
    }
}

impl Controller {
    pub fn new(read_port: Box<dyn SerialPort>, write_port: Box<dyn SerialPort>) -> Self {
        let (piece_tx, piece_rx) = crossbeam_channel::bounded(CALLBACK_QUEUE_CAPACITY);
        let inner = Arc::new(Inner {
            write_port: StdMutex::new(write_port),
            queues: RequestQueues::new(),
            dedup: PollingDedup::new(),
            waiter: WaiterRegistry::new(),
            discovery: Mutex::new(Discovery::new()),
            state: Mutex::new(ControllerState::Uninitialized),
            running: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            discard_stale_keys: AtomicBool::new(true),
            piece_tx,
            piece_rx,
            piece_listeners: Mutex::new(Vec::new()),
            key_listeners: Mutex::new(Vec::new()),
        });
        let controller = Self { inner, reader_handle: None, processor_handle: None, polling_handle: None, callback_handle: None };
        controller.spawn(read_port)
    }

    /// Open a real serial device, splitting it into independent read and
    /// write handles via `try_clone`, and start the controller against it.
    pub fn open_serial(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self, ControllerError> {
        let read_port = RealSerialPort::open(path, baud_rate, timeout).map_err(|e| ControllerError::Io(e.to_string()))?;
        let write_port = read_port.try_clone().map_err(|e| ControllerError::Io(e.to_string()))?;
        Ok(Self::new(Box::new(read_port), write_port))
    }

    fn spawn(mut self, read_port: Box<dyn SerialPort>) -> Self {
        self.inner.running.store(true, Ordering::SeqCst);
        self.inner.set_state(ControllerState::Initializing);

        let actions = self.inner.discovery.lock().start();
        for action in actions {
            execute_discovery_action(&self.inner, &mut FrameAssembler::new(), action);
        }

        let reader_inner = self.inner.clone();
        self.reader_handle = Some(std::thread::Builder::new().name("centaur-reader".into()).spawn(move || reader_loop(reader_inner, read_port)).expect("spawn reader thread"));

        let processor_inner = self.inner.clone();
        self.processor_handle = Some(std::thread::Builder::new().name("centaur-processor".into()).spawn(move || processor_loop(processor_inner)).expect("spawn processor thread"));

        let polling_inner = self.inner.clone();
        self.polling_handle = Some(std::thread::Builder::new().name("centaur-polling".into()).spawn(move || polling_loop(polling_inner)).expect("spawn polling thread"));

        let callback_inner = self.inner.clone();
        self.callback_handle = Some(std::thread::Builder::new().name("centaur-callbacks".into()).spawn(move || callback_loop(callback_inner)).expect("spawn callback thread"));

        self
    }

    pub fn state(&self) -> ControllerState {
        *self.inner.state.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    pub fn on_piece_event(&self, listener: impl Fn(PieceEvent) + Send + Sync + 'static) {
        self.inner.piece_listeners.lock().push(Box::new(listener));
    }

    pub fn on_key_event(&self, listener: impl Fn(KeyEvent) + Send + Sync + 'static) {
        self.inner.key_listeners.lock().push(Box::new(listener));
    }

    /// A cheap, cloneable handle carrying the same `send_command`/
    /// `send_immediate` surface as `Controller` itself, for use from event
    /// listener closures (which run on the callback thread and would
    /// otherwise have no way to talk back to the board).
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle { inner: self.inner.clone() }
    }

    /// Queue `command` on the main request queue and block for its
    /// response (or timeout). Polling commands (`SEND_CHANGES`/`POLL_KEYS`)
    /// never reach a waiter; use `send_command` for every other command.
    pub fn send_command(
        &self,
        command: CommandName,
        override_payload: Option<Vec<u8>>,
        timeout: Duration,
    ) -> Result<Vec<u8>, ControllerError> {
        self.handle().send_command(command, override_payload, timeout)
    }

    /// Queue `command` on the low-priority queue, used for validation-only
    /// commands that must never starve the polling loop.
    pub fn send_low_priority(&self, command: CommandName, timeout: Duration) -> Result<Vec<u8>, ControllerError> {
        self.handle().send_low_priority(command, timeout)
    }

    /// Fire-and-forget path for sound/LED commands: bypasses both queues
    /// and writes directly under the shared write lock.
    pub fn send_immediate(&self, command: CommandName, payload: Option<&[u8]>) -> Result<(), ControllerError> {
        self.handle().send_immediate(command, payload)
    }

    /// Shutdown ordering per the concurrency contract: stop flag, LEDs off,
    /// drop the reader's port handle, join threads, clear waiters.
    pub fn shutdown(mut self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.set_state(ControllerState::Stopped);
        let _ = self.send_immediate(CommandName::LedCmd, Some(&[]));
        if let Some(h) = self.reader_handle.take() {
            let _ = h.join();
        }
        if let Some(h) = self.processor_handle.take() {
            let _ = h.join();
        }
        if let Some(h) = self.polling_handle.take() {
            let _ = h.join();
        }
        if let Some(h) = self.callback_handle.take() {
            let _ = h.join();
        }
        self.inner.waiter.clear();
    }
}

fn execute_discovery_action(inner: &Arc<Inner>, assembler: &mut FrameAssembler, action: DiscoveryAction) {
    match action {
        DiscoveryAction::WriteBytes(bytes) => {
            let _ = inner.write(&bytes);
        }
        DiscoveryAction::FlushStaleChanges => {
            if let Some((a1, a2)) = inner.address() {
                let bytes = build_packet(spec_for(CommandName::SendChanges).cmd, a1, a2, None);
                let _ = inner.write(&bytes);
            }
        }
        DiscoveryAction::SetDiscardStaleKeys => inner.discard_stale_keys.store(true, Ordering::SeqCst),
        DiscoveryAction::MarkReady => {
            if let Some((a1, a2)) = inner.address() {
                assembler.set_address(a1, a2);
            }
            inner.set_state(ControllerState::Ready);
        }
        DiscoveryAction::StartPolling => inner.ready.store(true, Ordering::SeqCst),
        DiscoveryAction::LedsOff => {
            if let Some((a1, a2)) = inner.address() {
                let bytes = build_packet(spec_for(CommandName::LedCmd).cmd, a1, a2, Some(&[]));
                let _ = inner.write(&bytes);
            }
        }
        DiscoveryAction::PowerOnSound => {
            if let Some((a1, a2)) = inner.address() {
                let spec = spec_for(CommandName::SoundPowerOn);
                let bytes = build_packet(spec.cmd, a1, a2, spec.default_payload);
                let _ = inner.write(&bytes);
            }
        }
    }
}

fn reader_loop(inner: Arc<Inner>, mut read_port: Box<dyn SerialPort>) {
    let _span = tracing::info_span!("centaur-reader").entered();
    let mut assembler = FrameAssembler::new();
    while inner.running.load(Ordering::SeqCst) {
        match read_port.read_byte() {
            Ok(Some(byte)) => {
                let event = assembler.push_byte(byte);
                handle_frame_event(&inner, &mut assembler, event);
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(2)),
            Err(e) => {
                tracing::error!(error = %e, "serial read error");
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn handle_frame_event(inner: &Arc<Inner>, assembler: &mut FrameAssembler, event: FrameEvent) {
    match event {
        FrameEvent::Incomplete => {}
        FrameEvent::Complete(packet) => {
            if !inner.discovery.lock().is_complete() {
                let actions = inner.discovery.lock().on_packet(&packet);
                for action in actions {
                    execute_discovery_action(inner, assembler, action);
                }
                return;
            }
            route_packet(inner, packet);
        }
        FrameEvent::ChecksumMismatch { packet_type, .. } => {
            tracing::error!(packet_type, "checksum mismatch");
            inner.waiter.try_deliver(packet_type, Err(ControllerError::Io("checksum mismatch".into())));
        }
        FrameEvent::ChecksumMismatchKeyEvent(packet) => {
            tracing::warn!("checksum mismatch on key event packet, routing anyway");
            dispatch_key_event(inner, &packet.payload);
        }
    }
}

fn route_packet(inner: &Arc<Inner>, packet: Packet) {
    // A waiter for this exact type is served first, per the delivery
    // ordering invariant, whether or not the packet type is also one the
    // piece/key routing below always handles.
    let delivered = inner.waiter.try_deliver(packet.packet_type, Ok(packet.payload.clone()));

    if packet.packet_type == PIECE_EVENT_RESPONSE {
        dispatch_piece_events(inner, &packet.payload);
    } else if packet.packet_type == KEY_EVENT_RESPONSE {
        dispatch_key_event(inner, &packet.payload);
    } else if !delivered {
        tracing::debug!(packet_type = packet.packet_type, "unrouted packet");
    }
}

fn dispatch_piece_events(inner: &Arc<Inner>, payload: &[u8]) {
    for event in decode_piece_events(payload) {
        if inner.piece_tx.try_send(event).is_err() {
            tracing::error!("piece event callback queue full, dropping event");
        }
    }
}

fn dispatch_key_event(inner: &Arc<Inner>, payload: &[u8]) {
    if payload.is_empty() {
        if inner.discard_stale_keys.swap(false, Ordering::SeqCst) {
            tracing::debug!("stale key buffer drained");
        }
        return;
    }
    match decode_key_event(payload) {
        None => {
            if inner.discard_stale_keys.swap(false, Ordering::SeqCst) {
                tracing::debug!("stale key buffer drained (no signature in payload)");
            }
        }
        Some(event) => {
            if inner.discard_stale_keys.load(Ordering::SeqCst) {
                tracing::debug!(?event, "discarding stale key event");
                if !event.down {
                    enqueue_poll(inner, CommandName::PollKeys);
                }
                return;
            }
            for listener in inner.key_listeners.lock().iter() {
                listener(event);
            }
        }
    }
}

fn enqueue_poll(inner: &Arc<Inner>, command: CommandName) -> bool {
    if !inner.dedup.should_enqueue(command) {
        return false;
    }
    let req = Request { command, override_payload: None, timeout: DEFAULT_COMMAND_TIMEOUT, reply: None };
    inner.queues.push_main(req).is_ok()
}

fn processor_loop(inner: Arc<Inner>) {
    let _span = tracing::info_span!("centaur-processor").entered();
    while inner.running.load(Ordering::SeqCst) {
        let Some(req) = inner.queues.pop() else {
            std::thread::sleep(Duration::from_millis(5));
            continue;
        };
        process_request(&inner, req);
    }
}

fn process_request(inner: &Arc<Inner>, req: Request) {
    let Some((addr1, addr2)) = inner.address() else {
        if let Some(reply) = req.reply {
            let _ = reply.send(Err(ControllerError::NotReady));
        }
        return;
    };
    let spec = spec_for(req.command);
    let bytes = build_packet(spec.cmd, addr1, addr2, req.override_payload.as_deref().or(spec.default_payload));

    let Some(expected) = spec.expected_response else {
        let write_result = inner.write(&bytes);
        if let Some(reply) = req.reply {
            let _ = reply.send(write_result.map(|_| Vec::new()));
        }
        return;
    };

    // Fire-and-forget: nobody is blocked on a response, so there's no
    // waiter to install. The reader thread's routing (piece/key dispatch,
    // or a future waiter for a non-event response type) still handles
    // whatever comes back.
    let Some(reply) = req.reply else {
        let _ = inner.write(&bytes);
        return;
    };

    let (tx, rx) = crossbeam_channel::bounded(1);
    inner.waiter.install(expected, tx);
    if let Err(e) = inner.write(&bytes) {
        inner.waiter.clear();
        let _ = reply.send(Err(e));
        return;
    }
    let result = rx.recv_timeout(req.timeout).unwrap_or_else(|_| {
        inner.waiter.clear();
        Err(ControllerError::Timeout)
    });
    let _ = reply.send(result);
}

fn polling_loop(inner: Arc<Inner>) {
    let _span = tracing::info_span!("centaur-polling").entered();
    let mut toggle = false;
    let mut consecutive_failures: u32 = 0;
    while inner.running.load(Ordering::SeqCst) {
        if !inner.ready.load(Ordering::SeqCst) {
            std::thread::sleep(POLL_INTERVAL);
            continue;
        }
        let command = if toggle { CommandName::SendChanges } else { CommandName::PollKeys };
        toggle = !toggle;
        if enqueue_poll(&inner, command) {
            consecutive_failures = 0;
        } else {
            consecutive_failures = consecutive_failures.saturating_add(1);
        }
        let interval = if consecutive_failures >= POLL_FAILURE_BACKOFF_THRESHOLD { POLL_BACKOFF_INTERVAL } else { POLL_INTERVAL };
        std::thread::sleep(interval);
    }
}

fn callback_loop(inner: Arc<Inner>) {
    let _span = tracing::info_span!("centaur-callbacks").entered();
    loop {
        match inner.piece_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(event) => {
                for listener in inner.piece_listeners.lock().iter() {
                    listener(event);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if !inner.running.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MemoryPort;
    use std::sync::atomic::AtomicUsize;

    fn handshake(port: &MemoryPort) {
        // wait for the 4d/4e wake bytes and the zero-addressed discovery
        // request, then answer with the board's address twice.
        std::thread::sleep(Duration::from_millis(20));
        port.inject(&build_packet(0x87, 0xA1, 0xB2, None));
        std::thread::sleep(Duration::from_millis(20));
        port.inject(&build_packet(0x87, 0xA1, 0xB2, None));
        std::thread::sleep(Duration::from_millis(20));
    }

    #[test]
    fn discovery_completes_and_marks_ready() {
        let port = MemoryPort::new();
        let controller = Controller::new(Box::new(port.clone()), Box::new(port.clone()));
        handshake(&port);
        assert!(controller.is_ready());
        assert_eq!(controller.state(), ControllerState::Ready);
        controller.shutdown();
    }

    #[test]
    fn send_command_receives_matching_response() {
        let port = MemoryPort::new();
        let controller = Controller::new(Box::new(port.clone()), Box::new(port.clone()));
        handshake(&port);
        let handle = {
            let port = port.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                port.inject(&build_packet(0x83, 0xA1, 0xB2, Some(&[0x2a])));
            })
        };
        let result = controller.send_command(CommandName::SendState, None, Duration::from_millis(500)).unwrap();
        handle.join().unwrap();
        assert_eq!(result, vec![0x2a]);
        controller.shutdown();
    }

    #[test]
    fn send_command_times_out_without_response() {
        let port = MemoryPort::new();
        let controller = Controller::new(Box::new(port.clone()), Box::new(port.clone()));
        handshake(&port);
        let result = controller.send_command(CommandName::SendState, None, Duration::from_millis(50));
        assert!(matches!(result, Err(ControllerError::Timeout)));
        controller.shutdown();
    }

    #[test]
    fn piece_event_listener_receives_decoded_events() {
        let port = MemoryPort::new();
        let controller = Controller::new(Box::new(port.clone()), Box::new(port.clone()));
        handshake(&port);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        controller.on_piece_event(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        port.inject(&build_packet(0x85, 0xA1, 0xB2, Some(&[0x40, 0x0c])));
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        controller.shutdown();
    }

    #[test]
    fn stale_key_events_are_discarded_until_empty_payload() {
        let port = MemoryPort::new();
        let controller = Controller::new(Box::new(port.clone()), Box::new(port.clone()));
        handshake(&port);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        controller.on_key_event(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        port.inject(&build_packet(0xB1, 0xA1, 0xB2, Some(&[0x00, 0x14, 0x0a, 0x05, 0x04, 0x00])));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        port.inject(&build_packet(0xB1, 0xA1, 0xB2, Some(&[])));
        std::thread::sleep(Duration::from_millis(50));
        port.inject(&build_packet(0xB1, 0xA1, 0xB2, Some(&[0x00, 0x14, 0x0a, 0x05, 0x04, 0x00])));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        controller.shutdown();
    }
}
