//! Table of live epoch bundles.
//!
//! ```text
//! admit() ──→ [Starting] ──mark_running()──→ [Running] ──begin_stop()──→ [Stopping] ──remove()──→ gone
//!                 │                                                          ↑
//!                 └──────────── begin_stop() / remove() on timeout ───────────┘
//! ```
//!
//! At most [`MAX_LIVE_EPOCHS`] entries exist at once: the current epoch and
//! the previous one during its grace period. A counter is admitted at most
//! once over the life of the registry.

use super::EpochComponents;
use parking_lot::Mutex;
use shared_types::EpochCounter;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Maximum number of bundles alive at the same time.
pub const MAX_LIVE_EPOCHS: usize = 2;

/// Lifecycle state of a registered bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpochState {
    /// Started, waiting for readiness
    Starting,
    /// Ready and participating
    Running,
    /// Cancelled, waiting for shutdown
    Stopping,
}

impl fmt::Display for EpochState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => f.write_str("starting"),
            Self::Running => f.write_str("running"),
            Self::Stopping => f.write_str("stopping"),
        }
    }
}

/// Why a bundle could not be admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmitError {
    #[error("epoch {0} was already admitted")]
    AlreadyAdmitted(EpochCounter),

    #[error("registry full: epochs {live:?} are live")]
    Full { live: Vec<EpochCounter> },
}

/// A registered bundle and its cancel handle.
#[derive(Debug, Clone)]
pub struct EpochEntry {
    pub counter: EpochCounter,
    pub state: EpochState,
    pub components: Arc<EpochComponents>,
    pub cancel: CancellationToken,
}

#[derive(Default)]
struct RegistryInner {
    live: BTreeMap<EpochCounter, EpochEntry>,
    admitted: HashSet<EpochCounter>,
}

/// Thread-safe registry of live bundles.
#[derive(Default)]
pub struct EpochRegistry {
    inner: Mutex<RegistryInner>,
}

impl EpochRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly created bundle in the `Starting` state.
    pub fn admit(
        &self,
        counter: EpochCounter,
        components: Arc<EpochComponents>,
        cancel: CancellationToken,
    ) -> Result<(), AdmitError> {
        let mut inner = self.inner.lock();
        if inner.admitted.contains(&counter) {
            return Err(AdmitError::AlreadyAdmitted(counter));
        }
        if inner.live.len() >= MAX_LIVE_EPOCHS {
            return Err(AdmitError::Full {
                live: inner.live.keys().copied().collect(),
            });
        }

        inner.admitted.insert(counter);
        inner.live.insert(
            counter,
            EpochEntry {
                counter,
                state: EpochState::Starting,
                components,
                cancel,
            },
        );
        Ok(())
    }

    /// Promote a `Starting` bundle to `Running`. Returns false if the entry
    /// is missing or no longer starting.
    pub fn mark_running(&self, counter: EpochCounter) -> bool {
        let mut inner = self.inner.lock();
        match inner.live.get_mut(&counter) {
            Some(entry) if entry.state == EpochState::Starting => {
                entry.state = EpochState::Running;
                true
            }
            _ => false,
        }
    }

    /// Move a live bundle to `Stopping` and hand back what is needed to shut
    /// it down. `None` if the epoch is not live or already stopping.
    pub fn begin_stop(&self, counter: EpochCounter) -> Option<EpochEntry> {
        let mut inner = self.inner.lock();
        let entry = inner.live.get_mut(&counter)?;
        if entry.state == EpochState::Stopping {
            return None;
        }
        entry.state = EpochState::Stopping;
        Some(entry.clone())
    }

    /// Drop a bundle from the table. The counter stays consumed.
    pub fn remove(&self, counter: EpochCounter) -> Option<EpochEntry> {
        self.inner.lock().live.remove(&counter)
    }

    /// Whether the epoch currently has a bundle.
    #[must_use]
    pub fn contains(&self, counter: EpochCounter) -> bool {
        self.inner.lock().live.contains_key(&counter)
    }

    /// Whether a bundle was ever admitted for the epoch.
    #[must_use]
    pub fn was_admitted(&self, counter: EpochCounter) -> bool {
        self.inner.lock().admitted.contains(&counter)
    }

    #[must_use]
    pub fn state(&self, counter: EpochCounter) -> Option<EpochState> {
        self.inner.lock().live.get(&counter).map(|e| e.state)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().live.is_empty()
    }

    /// Live epochs and their states, ordered by counter.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(EpochCounter, EpochState)> {
        self.inner
            .lock()
            .live
            .values()
            .map(|e| (e.counter, e.state))
            .collect()
    }

    /// Handles to every live bundle, taken under the lock.
    #[must_use]
    pub fn components(&self) -> Vec<Arc<EpochComponents>> {
        self.inner
            .lock()
            .live
            .values()
            .map(|e| Arc::clone(&e.components))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, Signal, SignalerContext};
    use async_trait::async_trait;

    struct Inert;

    #[async_trait]
    impl Component for Inert {
        fn name(&self) -> &str {
            "inert"
        }
        async fn start(&self, _ctx: SignalerContext) {}
        fn ready(&self) -> Signal {
            Signal::closed()
        }
        fn done(&self) -> Signal {
            Signal::closed()
        }
    }

    fn bundle() -> Arc<EpochComponents> {
        let c: Arc<dyn Component> = Arc::new(Inert);
        Arc::new(EpochComponents::new(
            c.clone(),
            c.clone(),
            c.clone(),
            c.clone(),
            c.clone(),
            c,
        ))
    }

    fn admit(registry: &EpochRegistry, counter: EpochCounter) -> Result<(), AdmitError> {
        registry.admit(counter, bundle(), CancellationToken::new())
    }

    #[test]
    fn test_lifecycle_states() {
        let registry = EpochRegistry::new();
        admit(&registry, 0).unwrap();
        assert_eq!(registry.state(0), Some(EpochState::Starting));

        assert!(registry.mark_running(0));
        assert_eq!(registry.state(0), Some(EpochState::Running));
        assert!(!registry.mark_running(0));

        let entry = registry.begin_stop(0).unwrap();
        assert_eq!(entry.state, EpochState::Stopping);
        assert!(registry.begin_stop(0).is_none());

        assert!(registry.remove(0).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_third_bundle_rejected() {
        let registry = EpochRegistry::new();
        admit(&registry, 0).unwrap();
        admit(&registry, 1).unwrap();

        assert_eq!(
            admit(&registry, 2),
            Err(AdmitError::Full { live: vec![0, 1] })
        );
        assert_eq!(registry.len(), MAX_LIVE_EPOCHS);
        assert!(!registry.was_admitted(2));
    }

    #[test]
    fn test_counter_is_single_use() {
        let registry = EpochRegistry::new();
        admit(&registry, 5).unwrap();
        assert_eq!(admit(&registry, 5), Err(AdmitError::AlreadyAdmitted(5)));

        registry.remove(5);
        assert!(!registry.contains(5));
        assert!(registry.was_admitted(5));
        assert_eq!(admit(&registry, 5), Err(AdmitError::AlreadyAdmitted(5)));
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let registry = EpochRegistry::new();
        admit(&registry, 7).unwrap();
        admit(&registry, 6).unwrap();
        registry.mark_running(6);

        assert_eq!(
            registry.snapshot(),
            vec![(6, EpochState::Running), (7, EpochState::Starting)]
        );
        assert_eq!(registry.components().len(), 2);
    }

    #[test]
    fn test_begin_stop_unknown_epoch() {
        let registry = EpochRegistry::new();
        assert!(registry.begin_stop(3).is_none());
        assert!(registry.remove(3).is_none());
    }

    #[test]
    fn test_stopped_while_starting_is_never_promoted() {
        let registry = EpochRegistry::new();
        admit(&registry, 4).unwrap();

        let entry = registry.begin_stop(4).unwrap();
        assert_eq!(entry.state, EpochState::Stopping);
        assert!(!registry.mark_running(4));
        assert_eq!(registry.state(4), Some(EpochState::Stopping));
    }
}
