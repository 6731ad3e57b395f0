//! Driven ports (Outbound dependencies)

use crate::domain::{CreateEpochError, EpochComponents};
use async_trait::async_trait;
use shared_types::{BlockHeader, BlockId, Epoch, EpochCounter, EpochPhase};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Which epoch to resolve relative to a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochQuery {
    /// The epoch the block belongs to
    Current,
    /// The epoch after it
    Next,
}

/// Read-only view of the protocol state (queries State Management)
///
/// Errors from these queries indicate storage corruption and are fatal.
pub trait ProtocolState: Send + Sync {
    /// Current epoch as of the latest finalized block
    fn current_epoch(&self) -> Result<Epoch, String>;

    /// Epoch relative to the given block
    fn epoch_at(&self, block_id: &BlockId, query: EpochQuery) -> Result<Epoch, String>;

    /// Phase of the current epoch as of the latest finalized block
    fn phase(&self) -> Result<EpochPhase, String>;

    /// Header of the latest finalized block
    fn finalized_head(&self) -> Result<BlockHeader, String>;
}

/// Builds the component bundle for an epoch.
pub trait EpochComponentsFactory: Send + Sync {
    /// Create a fresh, unstarted bundle.
    ///
    /// Returns [`CreateEpochError::NotAuthorizedForEpoch`] when this node is
    /// not a participant of the epoch.
    fn create(&self, epoch: &Epoch) -> Result<EpochComponents, CreateEpochError>;
}

/// Future returned by a [`HeightCallback`].
pub type HeightCallbackFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// One-shot action run when a height is finalized.
pub type HeightCallback = Box<dyn FnOnce() -> HeightCallbackFuture + Send + 'static>;

/// Height-triggered callbacks driven by finalization.
pub trait HeightEvents: Send + Sync {
    /// Run `callback` exactly once after `height` is finalized.
    fn on_height(&self, height: u64, callback: HeightCallback);
}

/// Casts this node's vote on the root quorum certificate of the next epoch.
#[async_trait]
pub trait RootQcVoter: Send + Sync {
    /// Submit the vote. Must give up when `cancel` fires.
    async fn vote(&self, cancel: &CancellationToken, next_epoch: &Epoch) -> Result<(), String>;
}

/// Transactions queued for a single epoch.
pub trait TransactionPool: Send + Sync {
    /// Number of queued transactions
    fn size(&self) -> usize;

    /// Drop every queued transaction
    fn clear(&self);
}

/// Per-epoch transaction pools.
pub trait TransactionPools: Send + Sync {
    /// Pool for the given epoch, created empty on first access.
    fn for_epoch(&self, counter: EpochCounter) -> Arc<dyn TransactionPool>;
}
