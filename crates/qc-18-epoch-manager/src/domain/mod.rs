//! # Domain Layer
//!
//! The epoch bundle, the registry of live bundles, and the stop schedule.

pub mod components;
pub mod registry;
pub mod stop_schedule;

pub use components::EpochComponents;
pub use registry::{AdmitError, EpochEntry, EpochRegistry, EpochState, MAX_LIVE_EPOCHS};
pub use stop_schedule::{stop_height, StopSchedule};

pub use crate::error::{CreateEpochError, EpochManagerError, EpochManagerResult, LifecyclePhase};
