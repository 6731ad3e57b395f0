//! One-shot latches used for the ready/done half of the component contract.

use std::sync::Arc;
use tokio::sync::watch;

/// Write side of a [`Signal`]. Closing is idempotent.
#[derive(Debug, Clone)]
pub struct SignalTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl SignalTrigger {
    /// Create an open trigger.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Close the signal, waking every waiter.
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Obtain a read handle.
    #[must_use]
    pub fn signal(&self) -> Signal {
        Signal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SignalTrigger {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of a one-shot latch. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Signal {
    rx: watch::Receiver<bool>,
}

impl Signal {
    /// A signal that is already closed.
    #[must_use]
    pub fn closed() -> Self {
        let trigger = SignalTrigger::new();
        trigger.close();
        trigger.signal()
    }

    /// Whether the signal has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the signal is closed.
    ///
    /// If the trigger is dropped without closing, this never resolves.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|closed| *closed).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// A signal that closes once every input signal has closed.
    ///
    /// Must be called from within a tokio runtime unless every input is
    /// already closed.
    #[must_use]
    pub fn all(signals: Vec<Signal>) -> Signal {
        if signals.iter().all(Signal::is_closed) {
            return Signal::closed();
        }

        let trigger = SignalTrigger::new();
        let combined = trigger.signal();
        tokio::spawn(async move {
            for signal in signals {
                signal.wait().await;
            }
            trigger.close();
        });
        combined
    }
}
