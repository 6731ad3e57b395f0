//! Height events adapter
//!
//! Implements the HeightEvents port on top of finalized-block notifications.

use crate::ports::{HeightCallback, HeightEvents};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Default)]
struct Pending {
    callbacks: BTreeMap<u64, Vec<HeightCallback>>,
    finalized_height: Option<u64>,
}

/// In-memory height-triggered callback registry.
///
/// Feed it finalized heights with [`on_finalized`]. Every callback whose
/// height is at or below the finalized height runs once, in ascending height
/// order. A callback registered for a height that is already finalized runs
/// on the next finalization.
///
/// [`on_finalized`]: InMemoryHeightEvents::on_finalized
#[derive(Default)]
pub struct InMemoryHeightEvents {
    pending: Mutex<Pending>,
}

impl InMemoryHeightEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finalized height and run every callback now due.
    ///
    /// Returns the number of callbacks run.
    pub async fn on_finalized(&self, height: u64) -> usize {
        let due = {
            let mut pending = self.pending.lock();
            pending.finalized_height = pending.finalized_height.max(Some(height));
            match height.checked_add(1) {
                Some(next) => {
                    let later = pending.callbacks.split_off(&next);
                    std::mem::replace(&mut pending.callbacks, later)
                }
                None => std::mem::take(&mut pending.callbacks),
            }
        };

        let mut fired = 0;
        for (due_height, callbacks) in due {
            debug!(height = due_height, count = callbacks.len(), "Running height callbacks");
            for callback in callbacks {
                callback().await;
                fired += 1;
            }
        }
        fired
    }

    /// Highest finalized height seen so far.
    pub fn finalized_height(&self) -> Option<u64> {
        self.pending.lock().finalized_height
    }

    /// Number of callbacks waiting to run.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().callbacks.values().map(Vec::len).sum()
    }

    /// Heights with at least one waiting callback, ascending.
    pub fn pending_heights(&self) -> Vec<u64> {
        self.pending.lock().callbacks.keys().copied().collect()
    }
}

impl HeightEvents for InMemoryHeightEvents {
    fn on_height(&self, height: u64, callback: HeightCallback) {
        self.pending
            .lock()
            .callbacks
            .entry(height)
            .or_default()
            .push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::HeightCallbackFuture;
    use std::sync::Arc;

    fn recorder(log: &Arc<Mutex<Vec<u64>>>, tag: u64) -> HeightCallback {
        let log = Arc::clone(log);
        Box::new(move || -> HeightCallbackFuture {
            Box::pin(async move {
                log.lock().push(tag);
            })
        })
    }

    #[tokio::test]
    async fn test_fires_once_at_height() {
        let heights = InMemoryHeightEvents::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        heights.on_height(10, recorder(&log, 10));

        assert_eq!(heights.on_finalized(9).await, 0);
        assert_eq!(heights.on_finalized(10).await, 1);
        assert_eq!(heights.on_finalized(11).await, 0);

        assert_eq!(*log.lock(), vec![10]);
        assert_eq!(heights.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_skipped_heights_fire_in_order() {
        let heights = InMemoryHeightEvents::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        heights.on_height(30, recorder(&log, 30));
        heights.on_height(20, recorder(&log, 20));
        heights.on_height(40, recorder(&log, 40));

        assert_eq!(heights.on_finalized(35).await, 2);
        assert_eq!(*log.lock(), vec![20, 30]);
        assert_eq!(heights.pending_heights(), vec![40]);
        assert_eq!(heights.finalized_height(), Some(35));
    }

    #[tokio::test]
    async fn test_late_registration_fires_on_next_finalization() {
        let heights = InMemoryHeightEvents::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        heights.on_finalized(100).await;

        heights.on_height(50, recorder(&log, 50));
        assert!(log.lock().is_empty());

        heights.on_finalized(101).await;
        assert_eq!(*log.lock(), vec![50]);
    }

    #[tokio::test]
    async fn test_max_height() {
        let heights = InMemoryHeightEvents::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        heights.on_height(u64::MAX, recorder(&log, 1));

        assert_eq!(heights.on_finalized(u64::MAX).await, 1);
    }
}
