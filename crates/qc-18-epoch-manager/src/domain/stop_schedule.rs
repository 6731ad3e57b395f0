//! Deferred stops for epochs leaving their grace period.

use parking_lot::Mutex;
use shared_types::EpochCounter;
use std::collections::HashSet;

/// First height at which a bundle for an epoch ending at `final_height` may
/// be stopped.
///
/// Transactions stay valid for `transaction_expiry` blocks after their
/// reference block, so the bundle must outlive its epoch by that many blocks.
#[must_use]
pub fn stop_height(final_height: u64, transaction_expiry: u64) -> u64 {
    final_height
        .saturating_add(transaction_expiry)
        .saturating_add(1)
}

/// Remembers which (epoch, height) stops have been registered so each is
/// registered at most once.
#[derive(Debug, Default)]
pub struct StopSchedule {
    scheduled: Mutex<HashSet<(EpochCounter, u64)>>,
}

impl StopSchedule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stop. Returns false if the same stop was already recorded.
    pub fn insert(&self, counter: EpochCounter, height: u64) -> bool {
        self.scheduled.lock().insert((counter, height))
    }

    /// Drop every record for `counter` once its stop has been handled.
    pub fn forget(&self, counter: EpochCounter) {
        self.scheduled.lock().retain(|(c, _)| *c != counter);
    }

    #[must_use]
    pub fn contains(&self, counter: EpochCounter, height: u64) -> bool {
        self.scheduled.lock().contains(&(counter, height))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scheduled.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scheduled.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_height_includes_grace_period() {
        assert_eq!(stop_height(999, 600), 1600);
        assert_eq!(stop_height(u64::MAX - 1, 600), u64::MAX);
    }

    #[test]
    fn test_duplicate_stop_recorded_once() {
        let schedule = StopSchedule::new();
        assert!(schedule.insert(0, 1600));
        assert!(!schedule.insert(0, 1600));
        assert!(schedule.insert(0, 1700));
        assert!(schedule.contains(0, 1600));
        assert_eq!(schedule.len(), 2);
    }

    #[test]
    fn test_forget_drops_handled_epoch() {
        let schedule = StopSchedule::new();
        schedule.insert(0, 1600);
        schedule.insert(0, 1700);
        schedule.insert(1, 2600);

        schedule.forget(0);
        assert_eq!(schedule.len(), 1);
        assert!(!schedule.contains(0, 1600));
        assert!(schedule.contains(1, 2600));
    }
}
