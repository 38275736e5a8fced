//! Shared schedule of periodic session checks
//!
//! One min-heap of due times serves every session. Cancelling a check only
//! drops the renter's handle; the stale heap entry is discarded when it
//! surfaces.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use crate::host::PlayerId;

/// Identifies one armed check; a renter gets a fresh handle every time it is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckHandle(u64);

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    due: Instant,
    handle: CheckHandle,
    renter: PlayerId,
}

#[derive(Debug)]
pub struct CheckScheduler {
    interval: Duration,
    queue: BinaryHeap<Reverse<Slot>>,
    handles: HashMap<PlayerId, CheckHandle>,
    next_handle: u64,
}

impl CheckScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            queue: BinaryHeap::new(),
            handles: HashMap::new(),
            next_handle: 0,
        }
    }

    /// Arm a check for `renter`, first due one interval after `now`.
    /// Any check already armed for the renter is replaced. Returns None, with
    /// nothing armed, if the due time is beyond what `Instant` can represent.
    pub fn schedule(&mut self, renter: PlayerId, now: Instant) -> Option<CheckHandle> {
        let Some(due) = now.checked_add(self.interval) else {
            tracing::error!(
                "Check interval {:?} overflows the clock, {} left unchecked",
                self.interval,
                renter
            );
            self.handles.remove(&renter);
            return None;
        };

        self.next_handle += 1;
        let handle = CheckHandle(self.next_handle);
        if self.handles.insert(renter, handle).is_some() {
            tracing::debug!("Replacing armed check for {}", renter);
        }
        self.queue.push(Reverse(Slot {
            due,
            handle,
            renter,
        }));
        Some(handle)
    }

    /// Disarm the renter's check. Returns false if nothing was armed.
    pub fn cancel(&mut self, renter: PlayerId) -> bool {
        self.handles.remove(&renter).is_some()
    }

    #[cfg(test)]
    pub fn is_scheduled(&self, renter: PlayerId) -> bool {
        self.handles.contains_key(&renter)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Earliest pending due time among live checks
    pub fn next_due(&mut self) -> Option<Instant> {
        self.discard_stale();
        self.queue.peek().map(|Reverse(slot)| slot.due)
    }

    /// Pop every check due at `now` and re-arm each one for its next period.
    ///
    /// Re-arming happens before the caller runs the check, so the cadence
    /// survives a check that bails out early. Periods missed entirely (the
    /// host stalled for longer than one interval) are skipped, not replayed.
    pub fn pop_due(&mut self, now: Instant) -> Vec<PlayerId> {
        let mut due = Vec::new();

        while let Some(Reverse(slot)) = self.queue.peek() {
            if slot.due > now {
                break;
            }
            let Some(Reverse(slot)) = self.queue.pop() else {
                break;
            };
            if self.handles.get(&slot.renter) != Some(&slot.handle) {
                continue;
            }

            let Some(next) = self.next_after(slot.due, now) else {
                tracing::error!("Next check for {} overflows the clock, disarming it", slot.renter);
                self.handles.remove(&slot.renter);
                due.push(slot.renter);
                continue;
            };
            self.queue.push(Reverse(Slot {
                due: next,
                handle: slot.handle,
                renter: slot.renter,
            }));
            due.push(slot.renter);
        }

        due
    }

    /// First period boundary after `now`, counting from `last`
    fn next_after(&self, last: Instant, now: Instant) -> Option<Instant> {
        let mut next = last.checked_add(self.interval)?;
        while next <= now {
            next = next.checked_add(self.interval)?;
        }
        Some(next)
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse(slot)) = self.queue.peek() {
            if self.handles.get(&slot.renter) == Some(&slot.handle) {
                break;
            }
            self.queue.pop();
        }
    }
}
