//! Dynamic weighted round-robin strategy.
//!
//! Each backend carries a signed `load`: routing picks the backend with the
//! lowest load and charges it one unit, relieving gives one unit back. Ties go
//! to the backend registered first. Load is not clamped, so relieving a
//! backend that was never routed to drives it below zero.

use std::collections::{BTreeSet, HashMap};

use crate::load_balancer::{backend::BackendAddress, RoutingStrategy};

#[derive(Debug, Clone, Copy)]
struct Slot {
    load: i64,
    /// Registration order, used as the tie-breaker.
    seq: u64,
}

/// Least-loaded selector with self-correcting load counts.
#[derive(Debug, Default)]
pub struct DynamicWeightedRoundRobin {
    /// Ordered by `(load, seq)`; the first element is the next pick.
    queue: BTreeSet<(i64, u64, BackendAddress)>,
    slots: HashMap<BackendAddress, Slot>,
    next_seq: u64,
}

impl DynamicWeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current load of `addr`, if registered.
    pub fn load(&self, addr: &BackendAddress) -> Option<i64> {
        self.slots.get(addr).map(|slot| slot.load)
    }

    fn adjust(&mut self, addr: &BackendAddress, delta: i64) {
        let Some(slot) = self.slots.get_mut(addr) else {
            return;
        };
        self.queue.remove(&(slot.load, slot.seq, addr.clone()));
        slot.load += delta;
        self.queue.insert((slot.load, slot.seq, addr.clone()));
    }
}

impl RoutingStrategy for DynamicWeightedRoundRobin {
    fn add_server(&mut self, addr: BackendAddress) {
        if self.slots.contains_key(&addr) {
            return;
        }
        let slot = Slot {
            load: 0,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.queue.insert((slot.load, slot.seq, addr.clone()));
        self.slots.insert(addr, slot);
    }

    fn remove_server(&mut self, addr: &BackendAddress) {
        if let Some(slot) = self.slots.remove(addr) {
            self.queue.remove(&(slot.load, slot.seq, addr.clone()));
        }
    }

    fn route(&mut self, _key: &str) -> Option<BackendAddress> {
        let (_, _, addr) = self.queue.first()?.clone();
        self.adjust(&addr, 1);
        Some(addr)
    }

    fn relieve(&mut self, addr: &BackendAddress) {
        self.adjust(addr, -1);
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn backends(&self) -> Vec<BackendAddress> {
        let mut backends: Vec<_> = self.slots.iter().collect();
        backends.sort_by_key(|(_, slot)| slot.seq);
        backends.into_iter().map(|(addr, _)| addr.clone()).collect()
    }
}
