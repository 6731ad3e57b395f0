//! The per-epoch component bundle.

use crate::component::{Component, Signal, SignalerContext};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// The six consensus components that live exactly as long as one epoch
/// (plus its transaction-expiry grace period).
///
/// Started together, ready when all six are ready, done when all six are
/// done.
#[derive(Clone)]
pub struct EpochComponents {
    /// Epoch-scoped consensus state (committee, leader selection)
    pub state: Arc<dyn Component>,
    /// Collection proposal engine
    pub proposal_engine: Arc<dyn Component>,
    /// Consensus follower synchronisation engine
    pub sync_engine: Arc<dyn Component>,
    /// Event loop driving the consensus participant
    pub consensus_driver: Arc<dyn Component>,
    /// Vote aggregator
    pub vote_aggregator: Arc<dyn Component>,
    /// Timeout aggregator
    pub timeout_aggregator: Arc<dyn Component>,
}

impl EpochComponents {
    #[must_use]
    pub fn new(
        state: Arc<dyn Component>,
        proposal_engine: Arc<dyn Component>,
        sync_engine: Arc<dyn Component>,
        consensus_driver: Arc<dyn Component>,
        vote_aggregator: Arc<dyn Component>,
        timeout_aggregator: Arc<dyn Component>,
    ) -> Self {
        Self {
            state,
            proposal_engine,
            sync_engine,
            consensus_driver,
            vote_aggregator,
            timeout_aggregator,
        }
    }

    fn members(&self) -> [&Arc<dyn Component>; 6] {
        [
            &self.state,
            &self.proposal_engine,
            &self.sync_engine,
            &self.consensus_driver,
            &self.vote_aggregator,
            &self.timeout_aggregator,
        ]
    }
}

impl fmt::Debug for EpochComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.members().iter().map(|c| c.name()))
            .finish()
    }
}

#[async_trait]
impl Component for EpochComponents {
    fn name(&self) -> &str {
        "epoch-components"
    }

    async fn start(&self, ctx: SignalerContext) {
        for component in self.members() {
            component.start(ctx.clone()).await;
        }
    }

    fn ready(&self) -> Signal {
        Signal::all(self.members().iter().map(|c| c.ready()).collect())
    }

    fn done(&self) -> Signal {
        Signal::all(self.members().iter().map(|c| c.done()).collect())
    }
}
