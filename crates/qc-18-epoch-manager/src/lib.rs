//! # qc-18-epoch-manager
//!
//! Epoch Manager: runs the epoch-scoped consensus components of a
//! collection node.
//!
//! ## Overview
//!
//! Every epoch has its own committee, so every epoch gets its own bundle of
//! consensus components. This subsystem provides:
//! - **Bundle lifecycle**: create, start, and wait for readiness on each
//!   epoch transition
//! - **Grace period**: the previous epoch's bundle keeps running for one
//!   transaction-expiry window after its last block is finalized
//! - **Root QC voting**: votes on the next epoch's root QC when the setup
//!   phase starts, including when the node boots mid-setup
//! - **Fault escalation**: bundle errors and lifecycle timeouts are fatal
//!
//! ## Architecture
//!
//! ```text
//! Finality (9) ──BlockFinalized──→ HeightEvents ──stop@h──┐
//!                                                         ▼
//! State (4) ──EpochTransition──────────────────→ Epoch Manager (18) ──→ EpochComponents[N-1], [N]
//!           ──EpochSetupPhaseStarted───────────→        │
//!                                                       └── RootQcVoter
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! epoch N begins ──→ schedule stop(N-1) at final(N-1) + expiry + 1
//!                ──→ create(N) ──→ [Starting] ──ready──→ [Running]
//! height reached ──→ [Stopping] ──done──→ removed, pool(N-1) cleared
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use qc_18_epoch_manager::{EpochManager, EpochManagerConfig, EpochManagerDependencies};
//! use qc_18_epoch_manager::component::{Component, SignalerContext};
//!
//! let manager = EpochManager::new(EpochManagerDependencies {
//!     protocol_state,
//!     factory,
//!     height_events,
//!     voter,
//!     pools,
//!     config: EpochManagerConfig::from_env(),
//! })?;
//!
//! let (ctx, mut faults) = SignalerContext::root();
//! manager.start(ctx).await;
//! manager.ready().wait().await;
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod component;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use config::EpochManagerConfig;
pub use domain::{EpochComponents, EpochState};
pub use error::{ConfigError, CreateEpochError, EpochManagerError, EpochManagerResult};
pub use service::{EpochManager, EpochManagerDependencies};
