//! Request queueing: the bounded FIFO main queue, the low-priority queue
//! drained only when the main queue is empty, and the polling-command
//! deduplication deque. See `SPEC_FULL.md` §4.2.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use centaur_codec::CommandName;

use crate::error::ControllerError;

pub type ReplyResult = Result<Vec<u8>, ControllerError>;

/// One queued request. `reply` is `None` for fire-and-forget enqueues that
/// still want ordering against other requests but no response waiter.
pub struct Request {
    pub command: CommandName,
    pub override_payload: Option<Vec<u8>>,
    pub timeout: Duration,
    pub reply: Option<crossbeam_channel::Sender<ReplyResult>>,
}

const MAIN_QUEUE_CAPACITY: usize = 200;
const LOW_PRIORITY_CAPACITY: usize = 10;

/// Two FIFOs sharing one lock: pops always prefer the main queue, falling
/// back to low-priority only when the main queue is empty.
pub struct RequestQueues {
    main: Mutex<VecDeque<Request>>,
    low_priority: Mutex<VecDeque<Request>>,
}

impl RequestQueues {
    pub fn new() -> Self {
        Self { main: Mutex::new(VecDeque::new()), low_priority: Mutex::new(VecDeque::new()) }
    }

    pub fn push_main(&self, req: Request) -> Result<(), ControllerError> {
        let mut q = self.main.lock();
        if q.len() >= MAIN_QUEUE_CAPACITY {
            return Err(ControllerError::QueueFull);
        }
        q.push_back(req);
        Ok(())
    }

    pub fn push_low_priority(&self, req: Request) -> Result<(), ControllerError> {
        let mut q = self.low_priority.lock();
        if q.len() >= LOW_PRIORITY_CAPACITY {
            return Err(ControllerError::LowPriorityQueueFull);
        }
        q.push_back(req);
        Ok(())
    }

    /// Pop the next request to process: main queue first, low-priority only
    /// when main is empty.
    pub fn pop(&self) -> Option<Request> {
        if let Some(req) = self.main.lock().pop_front() {
            return Some(req);
        }
        self.low_priority.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.main.lock().is_empty() && self.low_priority.lock().is_empty()
    }
}

impl Default for RequestQueues {
    fn default() -> Self {
        Self::new()
    }
}

const DEDUP_WINDOW: usize = 2;

/// Tracks the last `N` distinct polling command names enqueued. A polling
/// command already present in the window is dropped rather than queued
/// again, preventing a slow board from backing the main queue up with
/// redundant `POLL_KEYS`/`SEND_CHANGES` requests.
pub struct PollingDedup {
    recent: Mutex<VecDeque<CommandName>>,
}

impl PollingDedup {
    pub fn new() -> Self {
        Self { recent: Mutex::new(VecDeque::with_capacity(DEDUP_WINDOW)) }
    }

    /// Returns `true` if `name` should be enqueued (and records it),
    /// `false` if it's a duplicate of something already in flight.
    pub fn should_enqueue(&self, name: CommandName) -> bool {
        let mut recent = self.recent.lock();
        if recent.contains(&name) {
            return false;
        }
        recent.push_back(name);
        if recent.len() > DEDUP_WINDOW {
            recent.pop_front();
        }
        true
    }

    /// Called once a polling command's response arrives, so the same
    /// command name can be queued again on the next cadence tick.
    pub fn clear(&self, name: CommandName) {
        self.recent.lock().retain(|&n| n != name);
    }
}

impl Default for PollingDedup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(command: CommandName) -> Request {
        Request { command, override_payload: None, timeout: Duration::from_millis(10), reply: None }
    }

    #[test]
    fn main_queue_is_fifo() {
        let q = RequestQueues::new();
        q.push_main(req(CommandName::SendState)).unwrap();
        q.push_main(req(CommandName::PollKeys)).unwrap();
        assert_eq!(q.pop().unwrap().command, CommandName::SendState);
        assert_eq!(q.pop().unwrap().command, CommandName::PollKeys);
        assert!(q.pop().is_none());
    }

    #[test]
    fn main_queue_rejects_past_capacity() {
        let q = RequestQueues::new();
        for _ in 0..MAIN_QUEUE_CAPACITY {
            q.push_main(req(CommandName::SendState)).unwrap();
        }
        assert!(matches!(q.push_main(req(CommandName::SendState)), Err(ControllerError::QueueFull)));
    }

    #[test]
    fn low_priority_only_drains_when_main_empty() {
        let q = RequestQueues::new();
        q.push_low_priority(req(CommandName::Snapshot96)).unwrap();
        q.push_main(req(CommandName::SendState)).unwrap();
        assert_eq!(q.pop().unwrap().command, CommandName::SendState);
        assert_eq!(q.pop().unwrap().command, CommandName::Snapshot96);
    }

    #[test]
    fn dedup_drops_repeat_within_window() {
        let dedup = PollingDedup::new();
        assert!(dedup.should_enqueue(CommandName::PollKeys));
        assert!(!dedup.should_enqueue(CommandName::PollKeys));
    }

    #[test]
    fn dedup_allows_two_distinct_commands() {
        let dedup = PollingDedup::new();
        assert!(dedup.should_enqueue(CommandName::PollKeys));
        assert!(dedup.should_enqueue(CommandName::SendChanges));
    }

    #[test]
    fn dedup_evicts_oldest_past_window() {
        let dedup = PollingDedup::new();
        assert!(dedup.should_enqueue(CommandName::PollKeys));
        assert!(dedup.should_enqueue(CommandName::SendChanges));
        // Window now full with [PollKeys, SendChanges]; clearing PollKeys
        // should let it be re-enqueued even though the window isn't empty.
        dedup.clear(CommandName::PollKeys);
        assert!(dedup.should_enqueue(CommandName::PollKeys));
    }
}
