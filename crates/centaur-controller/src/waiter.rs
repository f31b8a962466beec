//! The single outstanding waiter slot. The request-processor thread handles
//! one request at a time, blocking until its response arrives or its
//! timeout elapses, so only ever one waiter is outstanding. See
//! `SPEC_FULL.md` §4.2 ("waiter delivery ordering").

use parking_lot::Mutex;

use crate::queue::ReplyResult;

struct Slot {
    expected_type: u8,
    sender: crossbeam_channel::Sender<ReplyResult>,
}

#[derive(Default)]
pub struct WaiterRegistry {
    slot: Mutex<Option<Slot>>,
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    /// Install the single waiter slot for `expected_type`, replacing any
    /// leftover from a timed-out previous request.
    pub fn install(&self, expected_type: u8, sender: crossbeam_channel::Sender<ReplyResult>) {
        *self.slot.lock() = Some(Slot { expected_type, sender });
    }

    /// Clear the slot without delivering anything (used when a request
    /// times out, so a stale sender isn't kept around).
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }

    /// Try to deliver `result` to a waiter expecting `packet_type`. Returns
    /// `true` if a matching waiter was found and the send succeeded. The
    /// slot is vacated either way once a type match is found: if the send
    /// fails (the receiver already gave up and dropped), the blocked
    /// request has already timed out on its own and there's nothing left
    /// to deliver to.
    pub fn try_deliver(&self, packet_type: u8, result: ReplyResult) -> bool {
        let mut guard = self.slot.lock();
        match guard.as_ref() {
            Some(slot) if slot.expected_type == packet_type => {
                let slot = guard.take().unwrap();
                slot.sender.send(result).is_ok()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_to_matching_waiter() {
        let registry = WaiterRegistry::new();
        let (tx, rx) = crossbeam_channel::bounded(1);
        registry.install(0x83, tx);
        assert!(registry.try_deliver(0x83, Ok(vec![0x01])));
        assert_eq!(rx.try_recv().unwrap(), Ok(vec![0x01]));
    }

    #[test]
    fn ignores_non_matching_type() {
        let registry = WaiterRegistry::new();
        let (tx, _rx) = crossbeam_channel::bounded(1);
        registry.install(0x83, tx);
        assert!(!registry.try_deliver(0x85, Ok(vec![])));
    }

    #[test]
    fn clear_removes_stale_waiter() {
        let registry = WaiterRegistry::new();
        let (tx, _rx) = crossbeam_channel::bounded(1);
        registry.install(0x83, tx);
        registry.clear();
        assert!(!registry.try_deliver(0x83, Ok(vec![])));
    }

    #[test]
    fn failed_send_still_vacates_the_slot() {
        let registry = WaiterRegistry::new();
        let (tx, rx) = crossbeam_channel::bounded(1);
        drop(rx);
        registry.install(0x83, tx);
        assert!(!registry.try_deliver(0x83, Ok(vec![])));
        // slot is gone, so a second delivery for the same type also misses
        assert!(!registry.try_deliver(0x83, Ok(vec![])));
    }
}
