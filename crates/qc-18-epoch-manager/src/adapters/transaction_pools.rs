//! Per-epoch transaction pools adapter

use crate::ports::{TransactionPool, TransactionPools};
use parking_lot::RwLock;
use shared_types::{BlockId, EpochCounter, Hash};
use std::collections::HashMap;
use std::sync::Arc;

/// A transaction waiting to be included in a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PooledTransaction {
    pub hash: Hash,
    /// Block the transaction's expiry is measured from
    pub reference_block: BlockId,
    pub payload: Vec<u8>,
}

/// Transactions queued for one epoch.
pub struct EpochTransactionPool {
    epoch: EpochCounter,
    transactions: RwLock<HashMap<Hash, PooledTransaction>>,
}

impl EpochTransactionPool {
    pub fn new(epoch: EpochCounter) -> Self {
        Self {
            epoch,
            transactions: RwLock::new(HashMap::new()),
        }
    }

    pub fn epoch(&self) -> EpochCounter {
        self.epoch
    }

    /// Queue a transaction. Returns false if it was already queued.
    pub fn add(&self, tx: PooledTransaction) -> bool {
        let mut transactions = self.transactions.write();
        if transactions.contains_key(&tx.hash) {
            return false;
        }
        transactions.insert(tx.hash, tx);
        true
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.transactions.read().contains_key(hash)
    }

    pub fn remove(&self, hash: &Hash) -> Option<PooledTransaction> {
        self.transactions.write().remove(hash)
    }
}

impl TransactionPool for EpochTransactionPool {
    fn size(&self) -> usize {
        self.transactions.read().len()
    }

    fn clear(&self) {
        self.transactions.write().clear();
    }
}

/// In-memory pools keyed by epoch.
#[derive(Default)]
pub struct InMemoryTransactionPools {
    pools: RwLock<HashMap<EpochCounter, Arc<EpochTransactionPool>>>,
}

impl InMemoryTransactionPools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool for `counter`, created on first access.
    pub fn pool(&self, counter: EpochCounter) -> Arc<EpochTransactionPool> {
        if let Some(pool) = self.pools.read().get(&counter) {
            return Arc::clone(pool);
        }
        Arc::clone(
            self.pools
                .write()
                .entry(counter)
                .or_insert_with(|| Arc::new(EpochTransactionPool::new(counter))),
        )
    }

    /// Epochs that have a pool, ascending.
    pub fn epochs(&self) -> Vec<EpochCounter> {
        let mut epochs: Vec<_> = self.pools.read().keys().copied().collect();
        epochs.sort_unstable();
        epochs
    }
}

impl TransactionPools for InMemoryTransactionPools {
    fn for_epoch(&self, counter: EpochCounter) -> Arc<dyn TransactionPool> {
        self.pool(counter)
    }
}
