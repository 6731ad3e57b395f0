//! Cancellable context that can also carry irrecoverable faults upward.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// An irrecoverable error raised by a running component.
pub type Fault = anyhow::Error;

/// Context handed to a component on start.
///
/// Cancelling the token asks the component to shut down. [`throw`] reports
/// an irrecoverable error to whoever owns the matching [`FaultReceiver`].
///
/// [`throw`]: SignalerContext::throw
#[derive(Debug, Clone)]
pub struct SignalerContext {
    token: CancellationToken,
    faults: mpsc::UnboundedSender<Fault>,
}

/// Receiving end of a context's fault channel.
#[derive(Debug)]
pub struct FaultReceiver {
    rx: mpsc::UnboundedReceiver<Fault>,
}

impl SignalerContext {
    /// Context bound to an existing token.
    #[must_use]
    pub fn new(token: CancellationToken) -> (Self, FaultReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { token, faults: tx }, FaultReceiver { rx })
    }

    /// Top-level context with a fresh token.
    #[must_use]
    pub fn root() -> (Self, FaultReceiver) {
        Self::new(CancellationToken::new())
    }

    /// Derive a child context with its own fault channel and cancel handle.
    ///
    /// Cancelling this context cancels the child; cancelling the returned
    /// token cancels only the child.
    #[must_use]
    pub fn with_signaler_and_cancel(&self) -> (Self, CancellationToken, FaultReceiver) {
        let token = self.token.child_token();
        let (ctx, faults) = Self::new(token.clone());
        (ctx, token, faults)
    }

    /// Report an irrecoverable error.
    pub fn throw(&self, err: impl Into<Fault>) {
        let err = err.into();
        error!(error = %err, "Irrecoverable error raised");
        if self.faults.send(err).is_err() {
            error!("Fault receiver dropped, irrecoverable error not delivered");
        }
    }

    /// The underlying cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl FaultReceiver {
    /// Wait for the next fault. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Fault> {
        self.rx.recv().await
    }

    /// Take a fault if one is queued.
    pub fn try_recv(&mut self) -> Option<Fault> {
        self.rx.try_recv().ok()
    }
}
