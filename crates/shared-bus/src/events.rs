//! # Blockchain Events
//!
//! Event types that flow through the shared bus.

use serde::{Deserialize, Serialize};
use shared_types::{BlockHeader, EpochCounter, Hash};

/// Subsystem ID of Finality, the source of `BlockFinalized`.
pub const FINALITY_SUBSYSTEM: u8 = 9;

/// Subsystem ID of State Management, the source of protocol-state events.
pub const STATE_SUBSYSTEM: u8 = 4;

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BlockchainEvent {
    // =========================================================================
    // SUBSYSTEM 9: FINALITY
    // =========================================================================
    /// A block reached finality.
    BlockFinalized {
        /// The finalized block height.
        block_height: u64,
        /// The finalized block hash.
        block_hash: Hash,
    },

    // =========================================================================
    // SUBSYSTEM 4: PROTOCOL STATE (epoch milestones)
    // =========================================================================
    /// The finalized chain crossed into a new epoch.
    EpochTransition {
        /// Counter of the epoch that just began.
        epoch: EpochCounter,
        /// First block of the new epoch.
        first_block: BlockHeader,
    },

    /// The finalized chain entered the setup phase of the current epoch.
    EpochSetupPhaseStarted {
        /// Counter of the current epoch.
        epoch: EpochCounter,
        /// First block of the setup phase.
        first_block: BlockHeader,
    },

    // =========================================================================
    // CRITICAL EVENTS (DLQ)
    // =========================================================================
    /// Critical error requiring operator attention.
    CriticalError {
        /// The subsystem that encountered the error.
        subsystem_id: u8,
        /// Error description.
        error: String,
    },
}

impl BlockchainEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::BlockFinalized { .. } => EventTopic::Finality,
            Self::EpochTransition { .. } | Self::EpochSetupPhaseStarted { .. } => {
                EventTopic::Epoch
            }
            Self::CriticalError { .. } => EventTopic::DeadLetterQueue,
        }
    }

    /// Get the originating subsystem ID.
    #[must_use]
    pub fn source_subsystem(&self) -> u8 {
        match self {
            Self::BlockFinalized { .. } => FINALITY_SUBSYSTEM,
            Self::EpochTransition { .. } | Self::EpochSetupPhaseStarted { .. } => {
                STATE_SUBSYSTEM
            }
            Self::CriticalError { subsystem_id, .. } => *subsystem_id,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Subsystem 9 events.
    Finality,
    /// Epoch milestones from the protocol state.
    Epoch,
    /// Dead Letter Queue for critical errors.
    DeadLetterQueue,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Source subsystems to include. Empty means all sources.
    pub source_subsystems: Vec<u8>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            source_subsystems: Vec::new(),
        }
    }

    /// Create a filter for events from specific subsystems.
    #[must_use]
    pub fn from_subsystems(subsystems: Vec<u8>) -> Self {
        Self {
            topics: Vec::new(),
            source_subsystems: subsystems,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &BlockchainEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let source_match = self.source_subsystems.is_empty()
            || self.source_subsystems.contains(&event.source_subsystem());

        topic_match && source_match
    }
}
