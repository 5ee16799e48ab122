use std::collections::BTreeMap;

use crate::model::category::Category;

/// What a recurring display tick belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TickOwner {
    /// A note's clock in the selected day
    Note(u32),
    /// A category timer in some day
    Category(String, Category),
}

/// Cancellable repeating tasks, one per running clock or timer.
///
/// Nothing runs on its own: the host loop polls `due` and recomputes the
/// display of every owner returned. A late poll fires each owner once.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    interval_ms: i64,
    next_due: BTreeMap<TickOwner, i64>,
}

impl TickSchedule {
    pub fn new(interval_ms: i64) -> Self {
        TickSchedule {
            interval_ms: interval_ms.max(1),
            next_due: BTreeMap::new(),
        }
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Start ticking for `owner`. Already-scheduled owners keep their phase.
    pub fn start(&mut self, owner: TickOwner, now: i64) {
        self.next_due.entry(owner).or_insert(now + self.interval_ms);
    }

    /// Returns whether a tick was scheduled.
    pub fn cancel(&mut self, owner: &TickOwner) -> bool {
        self.next_due.remove(owner).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.next_due.clear();
    }

    pub fn is_active(&self, owner: &TickOwner) -> bool {
        self.next_due.contains_key(owner)
    }

    pub fn len(&self) -> usize {
        self.next_due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next_due.is_empty()
    }

    /// Owners whose tick has come due, each rescheduled one interval past `now`.
    pub fn due(&mut self, now: i64) -> Vec<TickOwner> {
        let mut fired = Vec::new();
        for (owner, next) in self.next_due.iter_mut() {
            if *next <= now {
                fired.push(owner.clone());
                *next = now + self.interval_ms;
            }
        }
        fired
    }
}
