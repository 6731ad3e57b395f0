//! Worker supervisor implementing the component contract.

use super::{Component, Signal, SignalTrigger, SignalerContext};
use crate::domain::EpochManagerError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use tokio_util::task::TaskTracker;
use tracing::debug;

type WorkerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type Worker = Box<dyn FnOnce(SignalerContext, ReadyFn) -> WorkerFuture + Send>;

/// Handed to each worker; calling it marks that worker ready.
#[derive(Debug)]
pub struct ReadyFn {
    trigger: SignalTrigger,
}

impl ReadyFn {
    pub fn ready(self) {
        self.trigger.close();
    }
}

/// Collects workers before a [`ComponentManager`] is built.
pub struct ComponentManagerBuilder {
    name: String,
    workers: Vec<Worker>,
}

impl ComponentManagerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workers: Vec::new(),
        }
    }

    /// Register a long-running worker. The worker must call its [`ReadyFn`]
    /// once initialised and should return when the context is cancelled.
    #[must_use]
    pub fn add_worker<F, Fut>(mut self, worker: F) -> Self
    where
        F: FnOnce(SignalerContext, ReadyFn) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.workers
            .push(Box::new(move |ctx, ready| Box::pin(worker(ctx, ready))));
        self
    }

    pub fn build(self) -> ComponentManager {
        let mut pending = Vec::with_capacity(self.workers.len());
        let mut ready_signals = Vec::with_capacity(self.workers.len());
        for worker in self.workers {
            let trigger = SignalTrigger::new();
            ready_signals.push(trigger.signal());
            pending.push((worker, trigger));
        }

        ComponentManager {
            name: self.name,
            pending: Mutex::new(Some(pending)),
            ready_signals,
            done: SignalTrigger::new(),
            tracker: TaskTracker::new(),
        }
    }
}

/// Runs a fixed set of workers. Ready once every worker reported ready,
/// done once every worker returned.
pub struct ComponentManager {
    name: String,
    pending: Mutex<Option<Vec<(Worker, SignalTrigger)>>>,
    ready_signals: Vec<Signal>,
    done: SignalTrigger,
    tracker: TaskTracker,
}

impl ComponentManager {
    /// Spawn the workers. Returns false, after throwing `AlreadyStarted`,
    /// if they were already spawned.
    pub fn launch(&self, ctx: SignalerContext) -> bool {
        let Some(workers) = self.pending.lock().take() else {
            ctx.throw(EpochManagerError::AlreadyStarted(self.name.clone()));
            return false;
        };

        debug!(component = %self.name, workers = workers.len(), "Starting workers");
        for (worker, trigger) in workers {
            self.tracker
                .spawn(worker(ctx.clone(), ReadyFn { trigger }));
        }
        self.tracker.close();

        let tracker = self.tracker.clone();
        let done = self.done.clone();
        let name = self.name.clone();
        tokio::spawn(async move {
            tracker.wait().await;
            debug!(component = %name, "All workers exited");
            done.close();
        });
        true
    }
}

#[async_trait]
impl Component for ComponentManager {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, ctx: SignalerContext) {
        self.launch(ctx);
    }

    fn ready(&self) -> Signal {
        Signal::all(self.ready_signals.clone())
    }

    fn done(&self) -> Signal {
        self.done.signal()
    }
}
