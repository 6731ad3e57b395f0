//! # Epoch Manager Metrics
//!
//! Prometheus metrics for epoch bundle lifecycles.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! qc-18-epoch-manager = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `epoch_manager_bundles_started_total` - Bundles that became ready
//! - `epoch_manager_bundles_stopped_total` - Bundles that shut down cleanly
//! - `epoch_manager_epochs_skipped_total` - Epochs this node does not participate in
//! - `epoch_manager_live_bundles` - Bundles currently registered
//! - `epoch_manager_faults_total` - Escalated errors (by kind)
//! - `epoch_manager_qc_votes_failed_total` - Root QC votes that failed

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Bundles that reached readiness
    pub static ref BUNDLES_STARTED: IntCounter = register_int_counter!(
        "epoch_manager_bundles_started_total",
        "Total number of epoch bundles started"
    )
    .expect("Failed to create BUNDLES_STARTED metric");

    /// Bundles that shut down within the deadline
    pub static ref BUNDLES_STOPPED: IntCounter = register_int_counter!(
        "epoch_manager_bundles_stopped_total",
        "Total number of epoch bundles stopped"
    )
    .expect("Failed to create BUNDLES_STOPPED metric");

    /// Epochs skipped because this node is not a participant
    pub static ref EPOCHS_SKIPPED: IntCounter = register_int_counter!(
        "epoch_manager_epochs_skipped_total",
        "Total number of epochs this node was not authorized for"
    )
    .expect("Failed to create EPOCHS_SKIPPED metric");

    /// Bundles currently registered
    pub static ref LIVE_BUNDLES: IntGauge = register_int_gauge!(
        "epoch_manager_live_bundles",
        "Number of epoch bundles currently registered"
    )
    .expect("Failed to create LIVE_BUNDLES metric");

    /// Escalated errors, labeled by kind
    pub static ref FAULTS: IntCounterVec = register_int_counter_vec!(
        "epoch_manager_faults_total",
        "Total number of irrecoverable errors escalated",
        &["kind"]
    )
    .expect("Failed to create FAULTS metric");

    /// Root QC votes that failed
    pub static ref QC_VOTES_FAILED: IntCounter = register_int_counter!(
        "epoch_manager_qc_votes_failed_total",
        "Total number of failed root QC votes"
    )
    .expect("Failed to create QC_VOTES_FAILED metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

#[cfg(feature = "metrics")]
pub fn record_bundle_started() {
    BUNDLES_STARTED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_bundle_stopped() {
    BUNDLES_STOPPED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_epoch_skipped() {
    EPOCHS_SKIPPED.inc();
}

/// Update the live bundle gauge
#[cfg(feature = "metrics")]
pub fn set_live_bundles(count: usize) {
    LIVE_BUNDLES.set(count as i64);
}

/// Record an escalated error by kind
#[cfg(feature = "metrics")]
pub fn record_fault(kind: &str) {
    FAULTS.with_label_values(&[kind]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_qc_vote_failed() {
    QC_VOTES_FAILED.inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_bundle_started() {}

#[cfg(not(feature = "metrics"))]
pub fn record_bundle_stopped() {}

#[cfg(not(feature = "metrics"))]
pub fn record_epoch_skipped() {}

#[cfg(not(feature = "metrics"))]
pub fn set_live_bundles(_count: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn record_fault(_kind: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_qc_vote_failed() {}
