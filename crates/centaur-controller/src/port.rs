//! The serial transport seam. `RealSerialPort` wraps an actual OS serial
//! device via `serialport`; `MemoryPort` is the developer-mode substitute
//! used by tests and by running the controller without hardware attached.
//! See `SPEC_FULL.md` §4.2 and §4 (developer mode).

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A byte-oriented serial transport. `read_byte` returns `Ok(None)` on a
/// read timeout rather than erroring, mirroring how the controller's reader
/// thread treats "nothing arrived yet" as routine, not exceptional.
pub trait SerialPort: Send {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
    /// An independent handle to the same underlying device, so the reader
    /// thread and the writer-side callers (request processor, polling
    /// thread, immediate path) don't contend for one `&mut self`.
    fn try_clone(&self) -> io::Result<Box<dyn SerialPort>>;
}

pub struct RealSerialPort {
    inner: Box<dyn serialport::SerialPort>,
}

impl RealSerialPort {
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> io::Result<Self> {
        let inner = serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Self { inner })
    }
}

impl SerialPort for RealSerialPort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialPort>> {
        let cloned = self.inner.try_clone().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Box::new(RealSerialPort { inner: cloned }))
    }
}

#[derive(Default)]
struct MemoryPortState {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
}

/// In-memory stand-in for a serial device. Tests (and developer mode)
/// `inject()` bytes as if the board sent them, then inspect `written()` to
/// see what the controller sent back.
#[derive(Clone)]
pub struct MemoryPort {
    state: Arc<Mutex<MemoryPortState>>,
}

impl MemoryPort {
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(MemoryPortState::default())) }
    }

    pub fn inject(&self, bytes: &[u8]) {
        self.state.lock().unwrap().inbound.extend(bytes.iter().copied());
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.lock().unwrap().outbound.clone()
    }

    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().unwrap().outbound)
    }
}

impl Default for MemoryPort {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPort for MemoryPort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.state.lock().unwrap().outbound.extend_from_slice(data);
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        Ok(self.state.lock().unwrap().inbound.pop_front())
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialPort>> {
        Ok(Box::new(self.clone()))
    }
}
