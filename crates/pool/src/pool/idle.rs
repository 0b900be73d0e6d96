//! The bounded idle set.
//!
//! Push and pop never block. Detaching takes the queue out of its slot under
//! the write lock, so once [`IdleSet::detach`] returns no other caller can
//! pop from or push into the detached queue.

use std::time::{Duration, Instant};

use crossbeam::queue::ArrayQueue;
use parking_lot::RwLock;

/// A resource sitting in the idle set, stamped with when it went idle.
pub(crate) struct IdleEntry<T> {
    pub(crate) resource: T,
    idle_since: Instant,
}

impl<T> IdleEntry<T> {
    pub(crate) fn new(resource: T) -> Self {
        Self {
            resource,
            idle_since: Instant::now(),
        }
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.idle_since.elapsed()
    }
}

/// Why a push did not land in the idle set. The resource is handed back.
pub(crate) enum Rejected<T> {
    Full(T),
    Detached(T),
}

pub(crate) struct IdleSet<T> {
    /// `ArrayQueue` cannot have zero capacity, so a `max_idle` of zero is
    /// enforced here instead.
    capacity: usize,
    slot: RwLock<Option<ArrayQueue<IdleEntry<T>>>>,
}

impl<T> IdleSet<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            slot: RwLock::new(Some(ArrayQueue::new(capacity.max(1)))),
        }
    }

    /// Pop one entry. The outer `None` means the set is detached.
    pub(crate) fn pop(&self) -> Option<Option<IdleEntry<T>>> {
        self.slot.read().as_ref().map(ArrayQueue::pop)
    }

    pub(crate) fn push(&self, entry: IdleEntry<T>) -> Result<(), Rejected<T>> {
        let slot = self.slot.read();
        match slot.as_ref() {
            None => Err(Rejected::Detached(entry.resource)),
            Some(_) if self.capacity == 0 => Err(Rejected::Full(entry.resource)),
            Some(queue) => queue
                .push(entry)
                .map_err(|entry| Rejected::Full(entry.resource)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slot.read().as_ref().map_or(0, ArrayQueue::len)
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.slot.read().is_none()
    }

    /// Remove every entry `is_stale` accepts and return their resources.
    ///
    /// Runs under the write lock, so concurrent pops never observe the set
    /// part way through the sweep. Survivors keep their order and idle
    /// timestamp. `None` if the set is detached.
    pub(crate) fn take_stale(
        &self,
        is_stale: impl Fn(&IdleEntry<T>) -> bool,
    ) -> Option<Vec<T>> {
        let slot = self.slot.write();
        let queue = slot.as_ref()?;
        let mut stale = Vec::new();
        for _ in 0..queue.len() {
            let Some(entry) = queue.pop() else {
                break;
            };
            if is_stale(&entry) {
                stale.push(entry.resource);
            } else if let Err(entry) = queue.push(entry) {
                // Unreachable while the write lock is held.
                stale.push(entry.resource);
            }
        }
        Some(stale)
    }

    /// Take the queue out of the set. `None` if it was already detached.
    pub(crate) fn detach(&self) -> Option<ArrayQueue<IdleEntry<T>>> {
        self.slot.write().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_past_capacity_hands_resource_back() {
        let set = IdleSet::with_capacity(2);
        assert!(set.push(IdleEntry::new(1)).is_ok());
        assert!(set.push(IdleEntry::new(2)).is_ok());
        match set.push(IdleEntry::new(3)) {
            Err(Rejected::Full(3)) => {}
            _ => panic!("third push should be rejected as full"),
        }
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn zero_capacity_rejects_every_push() {
        let set = IdleSet::with_capacity(0);
        assert!(matches!(set.push(IdleEntry::new(7)), Err(Rejected::Full(7))));
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn pop_empty_is_some_none() {
        let set = IdleSet::<u8>::with_capacity(1);
        assert!(matches!(set.pop(), Some(None)));
    }

    #[test]
    fn detach_closes_the_set() {
        let set = IdleSet::with_capacity(2);
        assert!(set.push(IdleEntry::new("a")).is_ok());

        let queue = set.detach().expect("first detach returns the queue");
        assert_eq!(queue.len(), 1);
        assert!(set.is_detached());
        assert!(set.detach().is_none());
        assert!(set.pop().is_none());
        assert_eq!(set.len(), 0);
        assert!(matches!(
            set.push(IdleEntry::new("b")),
            Err(Rejected::Detached("b"))
        ));
    }

    #[test]
    fn take_stale_keeps_survivors_in_order() {
        let set = IdleSet::with_capacity(4);
        for n in 0..4 {
            assert!(set.push(IdleEntry::new(n)).is_ok());
        }

        let stale = set.take_stale(|entry| entry.resource % 2 == 1).unwrap();
        assert_eq!(stale, vec![1, 3]);
        assert_eq!(set.len(), 2);
        assert!(matches!(set.pop(), Some(Some(IdleEntry { resource: 0, .. }))));
        assert!(matches!(set.pop(), Some(Some(IdleEntry { resource: 2, .. }))));
    }

    #[test]
    fn take_stale_on_detached_set() {
        let set = IdleSet::<u8>::with_capacity(1);
        drop(set.detach());
        assert!(set.take_stale(|_| true).is_none());
    }

    #[test]
    fn entry_ages() {
        let entry = IdleEntry::new(());
        std::thread::sleep(Duration::from_millis(5));
        assert!(entry.idle_for() >= Duration::from_millis(5));
    }
}
