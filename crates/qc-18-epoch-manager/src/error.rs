//! Error types for the epoch manager.

use shared_types::EpochCounter;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which half of a bundle's lifecycle an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Start,
    Stop,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Stop => f.write_str("stop"),
        }
    }
}

/// Irrecoverable epoch manager errors. Every variant escalated through the
/// signaler context is fatal to the node.
#[derive(Debug, Error)]
pub enum EpochManagerError {
    /// A bundle missed its readiness or shutdown deadline
    #[error("could not {phase} components for epoch {counter}: timed out after {timeout:?}")]
    Timeout {
        counter: EpochCounter,
        phase: LifecyclePhase,
        timeout: Duration,
    },

    /// The components factory failed for a reason other than authorization
    #[error("could not create components for epoch {counter}: {reason}")]
    Factory { counter: EpochCounter, reason: String },

    /// Protocol state query failed
    #[error("protocol state query failed: {0}")]
    ProtocolState(String),

    /// A third bundle would have been admitted
    #[error("cannot admit epoch {counter}: epochs {live:?} already live")]
    RegistryFull {
        counter: EpochCounter,
        live: Vec<EpochCounter>,
    },

    /// A running bundle raised an irrecoverable error
    #[error("components for epoch {counter} failed: {source}")]
    ComponentFault {
        counter: EpochCounter,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// `start` called twice on the same component
    #[error("component {0} already started")]
    AlreadyStarted(String),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EpochManagerError {
    /// Short label used for fault metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout {
                phase: LifecyclePhase::Start,
                ..
            } => "start_timeout",
            Self::Timeout {
                phase: LifecyclePhase::Stop,
                ..
            } => "stop_timeout",
            Self::Factory { .. } => "factory",
            Self::ProtocolState(_) => "protocol_state",
            Self::RegistryFull { .. } => "registry_full",
            Self::ComponentFault { .. } => "component_fault",
            Self::AlreadyStarted(_) => "already_started",
            Self::Config(_) => "config",
        }
    }
}

/// Result alias for epoch manager operations.
pub type EpochManagerResult<T> = Result<T, EpochManagerError>;

/// Outcome of asking the factory for an epoch's components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateEpochError {
    /// This node is not a participant of the epoch. Expected, not a fault.
    #[error("not authorized to participate in epoch {0}")]
    NotAuthorizedForEpoch(EpochCounter),

    /// Any other construction failure
    #[error("{0}")]
    Internal(String),
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
