//! # Component Lifecycle
//!
//! Everything the epoch manager starts and stops speaks the same contract:
//! `start` once with a cancellable [`SignalerContext`], then observe
//! [`Component::ready`] and [`Component::done`].

mod context;
mod manager;
mod signal;

pub use context::{Fault, FaultReceiver, SignalerContext};
pub use manager::{ComponentManager, ComponentManagerBuilder, ReadyFn};
pub use signal::{Signal, SignalTrigger};

use async_trait::async_trait;

/// A startable, stoppable unit of work.
///
/// `start` must be called at most once. Cancelling the context passed to
/// `start` asks the component to shut down; `done` closes when it has.
#[async_trait]
pub trait Component: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Begin running. Returns once the component has been launched, not when
    /// it is ready.
    async fn start(&self, ctx: SignalerContext);

    /// Closes once the component is fully initialised.
    fn ready(&self) -> Signal;

    /// Closes once the component has fully shut down.
    fn done(&self) -> Signal;
}
