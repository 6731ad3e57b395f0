//! # Core Domain Entities
//!
//! Chain primitives used by the epoch lifecycle and the event bus.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A 32-byte hash (SHA-256).
pub type Hash = [u8; 32];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// Identifies a block by the hash of its header.
pub type BlockId = Hash;

/// The header of a finalized block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Protocol version for this block.
    pub version: u16,
    /// Block height in the chain.
    pub height: u64,
    /// Hash of the parent block (creates the chain linkage).
    pub parent_hash: Hash,
    /// Root hash of the state trie after applying this block.
    pub state_root: Hash,
    /// Unix timestamp when the block was proposed.
    pub timestamp: u64,
    /// The validator who proposed this block.
    pub proposer: PublicKey,
}

impl BlockHeader {
    /// Create a header at `height` on top of `parent_hash`.
    #[must_use]
    pub fn new(height: u64, parent_hash: Hash) -> Self {
        Self {
            version: 1,
            height,
            parent_hash,
            ..Self::default()
        }
    }

    /// Compute the block ID (hash of the header fields).
    #[must_use]
    pub fn id(&self) -> BlockId {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.parent_hash);
        hasher.update(self.state_root);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.proposer);
        hasher.finalize().into()
    }

    /// Whether this is the genesis header.
    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}
