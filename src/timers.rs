use std::collections::BTreeMap;

use tracing::trace;

use crate::state::Timestamp;

/// One pending timer per purpose; scheduling a purpose again supersedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerPurpose {
    PanicRevert,
    PersistenceDebounce,
    ReviewDismiss,
}

/// Identifies one scheduling of a timer. `owner` is the generation of the
/// typing session the timer was scheduled against, so the receiver can drop
/// a handle that outlived its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    pub purpose: TimerPurpose,
    pub generation: u64,
    pub owner: u64,
    pub deadline: Timestamp,
}

#[derive(Debug, Default)]
pub struct TimerRegistry {
    pending: BTreeMap<TimerPurpose, TimerHandle>,
    generations: BTreeMap<TimerPurpose, u64>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, purpose: TimerPurpose, deadline: Timestamp, owner: u64) -> TimerHandle {
        let generation = self.generations.entry(purpose).or_insert(0);
        *generation += 1;
        let handle = TimerHandle {
            purpose,
            generation: *generation,
            owner,
            deadline,
        };
        if let Some(previous) = self.pending.insert(purpose, handle) {
            trace!(?purpose, superseded = previous.generation, "timer rescheduled");
        }
        handle
    }

    /// Returns `true` if a pending timer was cancelled.
    pub fn cancel(&mut self, purpose: TimerPurpose) -> bool {
        let cancelled = self.pending.remove(&purpose).is_some();
        if cancelled {
            trace!(?purpose, "timer cancelled");
        }
        cancelled
    }

    pub fn is_pending(&self, purpose: TimerPurpose) -> bool {
        self.pending.contains_key(&purpose)
    }

    pub fn deadline(&self, purpose: TimerPurpose) -> Option<Timestamp> {
        self.pending.get(&purpose).map(|h| h.deadline)
    }

    /// Removes and returns every timer whose deadline has passed, earliest
    /// first.
    pub fn take_due(&mut self, now: Timestamp) -> Vec<TimerHandle> {
        let mut due: Vec<TimerHandle> = self
            .pending
            .values()
            .filter(|h| h.deadline <= now)
            .copied()
            .collect();
        due.sort_by_key(|h| (h.deadline, h.purpose));
        for handle in &due {
            self.pending.remove(&handle.purpose);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescheduling_supersedes_previous_handle() {
        let mut timers = TimerRegistry::new();
        let first = timers.schedule(TimerPurpose::PersistenceDebounce, 2_000, 0);
        let second = timers.schedule(TimerPurpose::PersistenceDebounce, 3_000, 0);

        assert_eq!(second.generation, first.generation + 1);
        assert_eq!(timers.deadline(TimerPurpose::PersistenceDebounce), Some(3_000));
        assert!(timers.take_due(2_500).is_empty());

        let due = timers.take_due(3_000);
        assert_eq!(due, vec![second]);
        assert!(!timers.is_pending(TimerPurpose::PersistenceDebounce));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut timers = TimerRegistry::new();
        timers.schedule(TimerPurpose::PanicRevert, 100, 1);
        assert!(timers.cancel(TimerPurpose::PanicRevert));
        assert!(!timers.cancel(TimerPurpose::PanicRevert));
        assert!(timers.take_due(10_000).is_empty());
    }

    #[test]
    fn due_timers_come_out_in_deadline_order() {
        let mut timers = TimerRegistry::new();
        timers.schedule(TimerPurpose::ReviewDismiss, 300, 1);
        timers.schedule(TimerPurpose::PanicRevert, 200, 1);
        timers.schedule(TimerPurpose::PersistenceDebounce, 900, 1);

        let due: Vec<_> = timers.take_due(500).into_iter().map(|h| h.purpose).collect();
        assert_eq!(due, vec![TimerPurpose::PanicRevert, TimerPurpose::ReviewDismiss]);
        assert_eq!(timers.deadline(TimerPurpose::PersistenceDebounce), Some(900));
    }
}
