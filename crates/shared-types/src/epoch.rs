//! # Epochs
//!
//! An epoch is a bounded era with a fixed committee. Epoch counters increase
//! monotonically from 0 and are never reused.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonically increasing epoch number.
pub type EpochCounter = u64;

/// Number of finalized blocks after its reference block during which a
/// transaction remains includable.
pub const DEFAULT_TRANSACTION_EXPIRY: u64 = 600;

/// Phase of the epoch state machine, as of a given block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EpochPhase {
    /// Staking auction for the next epoch is open.
    Staking,
    /// Next epoch's committees are known; root QC voting happens here.
    Setup,
    /// Next epoch is fully configured and will begin at the transition.
    Committed,
    /// Setup failed and the network runs on fallback rules.
    Fallback,
}

impl fmt::Display for EpochPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staking => write!(f, "staking"),
            Self::Setup => write!(f, "setup"),
            Self::Committed => write!(f, "committed"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Read-only descriptor of a committee era.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epoch {
    /// Epoch number.
    pub counter: EpochCounter,
}

impl Epoch {
    #[must_use]
    pub fn new(counter: EpochCounter) -> Self {
        Self { counter }
    }

    /// Counter of the preceding epoch, if any.
    #[must_use]
    pub fn previous_counter(&self) -> Option<EpochCounter> {
        self.counter.checked_sub(1)
    }
}
