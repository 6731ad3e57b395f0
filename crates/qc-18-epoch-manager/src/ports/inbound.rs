//! Driving ports (Inbound API)

use crate::domain::EpochState;
use async_trait::async_trait;
use shared_types::{BlockHeader, EpochCounter};

/// Protocol notifications consumed by the epoch manager.
///
/// Both calls only enqueue work; they never wait for bundles to start or
/// for votes to complete. They may block briefly while a queue is full.
#[async_trait]
pub trait EpochEventsConsumer: Send + Sync {
    /// The finalized chain crossed into epoch `counter`, whose first block is
    /// `first_block`.
    async fn on_epoch_transition(&self, counter: EpochCounter, first_block: BlockHeader);

    /// The current epoch entered its setup phase at `first_block`.
    async fn on_epoch_setup_phase_started(&self, counter: EpochCounter, first_block: BlockHeader);
}

/// Read-only status of the epoch manager.
pub trait EpochManagerApi: Send + Sync {
    /// Live epochs and their lifecycle states, ordered by counter
    fn epoch_states(&self) -> Vec<(EpochCounter, EpochState)>;
}
