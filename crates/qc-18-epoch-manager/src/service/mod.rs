//! Epoch Manager Service - bundle lifecycle orchestration
//!
//! # Workers
//! - setup phase: votes on the next epoch's root QC
//! - transition: creates and starts the new epoch's bundle, schedules the
//!   previous epoch's stop
//! - stop: cancels a bundle once its grace period ends
//! - started: forwards each bundle's irrecoverable errors to the node
//!
//! Each worker consumes its own bounded queue, so a slow vote never delays a
//! transition and a slow stop never delays either.

use crate::component::{
    Component, ComponentManager, ComponentManagerBuilder, FaultReceiver, ReadyFn, Signal,
    SignalerContext,
};
use crate::config::EpochManagerConfig;
use crate::domain::{
    stop_height, AdmitError, CreateEpochError, EpochComponents, EpochManagerError,
    EpochManagerResult, EpochRegistry, EpochState, LifecyclePhase, StopSchedule,
};
use crate::metrics;
use crate::ports::{
    EpochComponentsFactory, EpochEventsConsumer, EpochManagerApi, EpochQuery,
    HeightCallbackFuture, HeightEvents, ProtocolState, RootQcVoter, TransactionPools,
};
use async_trait::async_trait;
use shared_types::{BlockHeader, Epoch, EpochCounter, EpochPhase};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};


/// Dependencies for EpochManager
pub struct EpochManagerDependencies<P, F, H, V, T> {
    pub protocol_state: Arc<P>,
    pub factory: Arc<F>,
    pub height_events: Arc<H>,
    pub voter: Arc<V>,
    pub pools: Arc<T>,
    pub config: EpochManagerConfig,
}

/// A bundle whose faults need forwarding.
struct StartedEpoch {
    counter: EpochCounter,
    faults: FaultReceiver,
}

/// State shared between the manager handle and its workers.
struct Lifecycle<P, F, H, V, T> {
    protocol_state: Arc<P>,
    factory: Arc<F>,
    height_events: Arc<H>,
    voter: Arc<V>,
    pools: Arc<T>,
    config: EpochManagerConfig,
    registry: EpochRegistry,
    stops: StopSchedule,
    stop_tx: mpsc::Sender<EpochCounter>,
    started_tx: mpsc::Sender<StartedEpoch>,
}

/// Epoch Manager
///
/// Owns the consensus components of at most two epochs at a time: the
/// current one and, during its transaction-expiry grace period, the previous
/// one.
pub struct EpochManager<P, F, H, V, T>
where
    P: ProtocolState + 'static,
    F: EpochComponentsFactory + 'static,
    H: HeightEvents + 'static,
    V: RootQcVoter + 'static,
    T: TransactionPools + 'static,
{
    lifecycle: Arc<Lifecycle<P, F, H, V, T>>,
    workers: ComponentManager,
    transitions: mpsc::Sender<BlockHeader>,
    setup_phases: mpsc::Sender<BlockHeader>,
}

impl<P, F, H, V, T> EpochManager<P, F, H, V, T>
where
    P: ProtocolState + 'static,
    F: EpochComponentsFactory + 'static,
    H: HeightEvents + 'static,
    V: RootQcVoter + 'static,
    T: TransactionPools + 'static,
{
    /// Create a new EpochManager. Nothing runs until [`Component::start`].
    pub fn new(deps: EpochManagerDependencies<P, F, H, V, T>) -> EpochManagerResult<Self> {
        deps.config.validate()?;

        let capacity = deps.config.queue_capacity;
        let (transitions, transition_rx) = mpsc::channel(capacity);
        let (setup_phases, setup_rx) = mpsc::channel(capacity);
        let (stop_tx, stop_rx) = mpsc::channel(capacity);
        let (started_tx, started_rx) = mpsc::channel(capacity);

        let lifecycle = Arc::new(Lifecycle {
            protocol_state: deps.protocol_state,
            factory: deps.factory,
            height_events: deps.height_events,
            voter: deps.voter,
            pools: deps.pools,
            config: deps.config,
            registry: EpochRegistry::new(),
            stops: StopSchedule::new(),
            stop_tx,
            started_tx,
        });

        let workers = ComponentManagerBuilder::new("epoch-manager")
            .add_worker({
                let lifecycle = Arc::clone(&lifecycle);
                move |ctx, ready| lifecycle.run_setup_phase_worker(ctx, ready, setup_rx)
            })
            .add_worker({
                let lifecycle = Arc::clone(&lifecycle);
                move |ctx, ready| lifecycle.run_transition_worker(ctx, ready, transition_rx)
            })
            .add_worker({
                let lifecycle = Arc::clone(&lifecycle);
                move |ctx, ready| lifecycle.run_stop_worker(ctx, ready, stop_rx)
            })
            .add_worker(move |ctx, ready| run_started_worker(ctx, ready, started_rx))
            .build();

        Ok(Self {
            lifecycle,
            workers,
            transitions,
            setup_phases,
        })
    }

    /// If the node boots in the middle of a setup phase, the phase-start
    /// event has already passed; queue a vote as if it had just arrived.
    async fn check_should_vote_on_startup(&self) -> EpochManagerResult<()> {
        let phase = self
            .lifecycle
            .protocol_state
            .phase()
            .map_err(EpochManagerError::ProtocolState)?;
        if phase != EpochPhase::Setup {
            return Ok(());
        }

        let head = self
            .lifecycle
            .protocol_state
            .finalized_head()
            .map_err(EpochManagerError::ProtocolState)?;
        info!(height = head.height, "Started during setup phase, queueing root QC vote");
        if self.setup_phases.send(head).await.is_err() {
            debug!("Setup phase worker gone, skipping startup vote");
        }
        Ok(())
    }

    async fn start_current_epoch(&self, ctx: &SignalerContext) -> EpochManagerResult<()> {
        let epoch = self
            .lifecycle
            .protocol_state
            .current_epoch()
            .map_err(EpochManagerError::ProtocolState)?;

        if !self.lifecycle.launch_epoch(ctx, &epoch).await? {
            info!(
                epoch = epoch.counter,
                "Epoch manager started without current epoch components (not authorized)"
            );
        }
        Ok(())
    }

    /// Live epochs and their lifecycle states, ordered by counter.
    pub fn epoch_states(&self) -> Vec<(EpochCounter, EpochState)> {
        self.lifecycle.registry.snapshot()
    }

    /// Number of live bundles.
    pub fn live_epochs(&self) -> usize {
        self.lifecycle.registry.len()
    }
}

#[async_trait]
impl<P, F, H, V, T> Component for EpochManager<P, F, H, V, T>
where
    P: ProtocolState + 'static,
    F: EpochComponentsFactory + 'static,
    H: HeightEvents + 'static,
    V: RootQcVoter + 'static,
    T: TransactionPools + 'static,
{
    fn name(&self) -> &str {
        "epoch-manager"
    }

    /// Starts the workers, queues a vote if booting mid-setup, then starts
    /// the current epoch's bundle and waits for it to become ready.
    async fn start(&self, ctx: SignalerContext) {
        if !self.workers.launch(ctx.clone()) {
            return;
        }

        if let Err(err) = self.check_should_vote_on_startup().await {
            escalate(&ctx, err);
            return;
        }
        if let Err(err) = self.start_current_epoch(&ctx).await {
            escalate(&ctx, err);
        }
    }

    /// Ready once the workers and every bundle live at call time are ready.
    fn ready(&self) -> Signal {
        let mut signals = vec![self.workers.ready()];
        signals.extend(
            self.lifecycle
                .registry
                .components()
                .iter()
                .map(|c| c.ready()),
        );
        Signal::all(signals)
    }

    /// Done once the workers and every bundle live at call time are done.
    fn done(&self) -> Signal {
        let mut signals = vec![self.workers.done()];
        signals.extend(
            self.lifecycle
                .registry
                .components()
                .iter()
                .map(|c| c.done()),
        );
        Signal::all(signals)
    }
}

#[async_trait]
impl<P, F, H, V, T> EpochEventsConsumer for EpochManager<P, F, H, V, T>
where
    P: ProtocolState + 'static,
    F: EpochComponentsFactory + 'static,
    H: HeightEvents + 'static,
    V: RootQcVoter + 'static,
    T: TransactionPools + 'static,
{
    async fn on_epoch_transition(&self, counter: EpochCounter, first_block: BlockHeader) {
        debug!(epoch = counter, height = first_block.height, "Epoch transition queued");
        if self.transitions.send(first_block).await.is_err() {
            warn!(epoch = counter, "Epoch manager stopped, dropping epoch transition");
        }
    }

    async fn on_epoch_setup_phase_started(&self, counter: EpochCounter, first_block: BlockHeader) {
        debug!(epoch = counter, height = first_block.height, "Setup phase start queued");
        if self.setup_phases.send(first_block).await.is_err() {
            warn!(epoch = counter, "Epoch manager stopped, dropping setup phase start");
        }
    }
}

impl<P, F, H, V, T> EpochManagerApi for EpochManager<P, F, H, V, T>
where
    P: ProtocolState + 'static,
    F: EpochComponentsFactory + 'static,
    H: HeightEvents + 'static,
    V: RootQcVoter + 'static,
    T: TransactionPools + 'static,
{
    fn epoch_states(&self) -> Vec<(EpochCounter, EpochState)> {
        self.lifecycle.registry.snapshot()
    }
}

impl<P, F, H, V, T> Lifecycle<P, F, H, V, T>
where
    P: ProtocolState + 'static,
    F: EpochComponentsFactory + 'static,
    H: HeightEvents + 'static,
    V: RootQcVoter + 'static,
    T: TransactionPools + 'static,
{
    // === WORKERS ===

    async fn run_setup_phase_worker(
        self: Arc<Self>,
        ctx: SignalerContext,
        ready: ReadyFn,
        mut rx: mpsc::Receiver<BlockHeader>,
    ) {
        ready.ready();
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return,
                Some(first_block) = rx.recv() => {
                    if let Err(err) = self.on_setup_phase_started(&ctx, first_block).await {
                        escalate(&ctx, err);
                        return;
                    }
                }
            }
        }
    }

    async fn run_transition_worker(
        self: Arc<Self>,
        ctx: SignalerContext,
        ready: ReadyFn,
        mut rx: mpsc::Receiver<BlockHeader>,
    ) {
        ready.ready();
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return,
                Some(first_block) = rx.recv() => {
                    if let Err(err) = self.on_epoch_transition(&ctx, first_block).await {
                        escalate(&ctx, err);
                        return;
                    }
                }
            }
        }
    }

    async fn run_stop_worker(
        self: Arc<Self>,
        ctx: SignalerContext,
        ready: ReadyFn,
        mut rx: mpsc::Receiver<EpochCounter>,
    ) {
        ready.ready();
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return,
                Some(counter) = rx.recv() => {
                    if let Err(err) = self.stop_epoch_components(counter).await {
                        escalate(&ctx, err);
                        return;
                    }
                }
            }
        }
    }

    // === EVENT HANDLERS ===

    async fn on_setup_phase_started(
        &self,
        ctx: &SignalerContext,
        first_block: BlockHeader,
    ) -> EpochManagerResult<()> {
        let next = self
            .protocol_state
            .epoch_at(&first_block.id(), EpochQuery::Next)
            .map_err(EpochManagerError::ProtocolState)?;

        info!(next_epoch = next.counter, "Submitting root QC vote for next epoch");
        match self.voter.vote(ctx.cancellation_token(), &next).await {
            Ok(()) => info!(next_epoch = next.counter, "Root QC vote submitted"),
            Err(err) => {
                metrics::record_qc_vote_failed();
                error!(next_epoch = next.counter, error = %err, "Failed to submit root QC vote");
            }
        }
        Ok(())
    }

    async fn on_epoch_transition(
        &self,
        ctx: &SignalerContext,
        first_block: BlockHeader,
    ) -> EpochManagerResult<()> {
        let epoch = self
            .protocol_state
            .epoch_at(&first_block.id(), EpochQuery::Current)
            .map_err(EpochManagerError::ProtocolState)?;
        let counter = epoch.counter;
        let last_epoch_final_height = first_block.height.saturating_sub(1);

        if self.registry.was_admitted(counter) {
            warn!(epoch = counter, "Components for epoch already set up, ignoring transition");
            return Ok(());
        }

        // The previous epoch's stop must be registered even if this start
        // fails. Registered again below; the schedule drops the repeat.
        let previous = epoch.previous_counter();
        if let Some(previous) = previous {
            self.schedule_stop(previous, last_epoch_final_height);
        }

        info!(epoch = counter, "Creating components for new epoch");
        if !self.launch_epoch(ctx, &epoch).await? {
            return Ok(());
        }
        info!(epoch = counter, "Components for new epoch started");

        if let Some(previous) = previous {
            self.schedule_stop(previous, last_epoch_final_height);
        }
        Ok(())
    }

    // === BUNDLE LIFECYCLE ===

    /// Ask the height registry to stop `counter` once its grace period after
    /// `final_height` has passed. Returns the stop height.
    fn schedule_stop(&self, counter: EpochCounter, final_height: u64) -> u64 {
        let height = stop_height(final_height, self.config.transaction_expiry);
        if !self.stops.insert(counter, height) {
            debug!(epoch = counter, stop_height = height, "Stop already scheduled");
            return height;
        }

        info!(epoch = counter, stop_height = height, "Scheduling epoch components stop");
        let stop_tx = self.stop_tx.clone();
        self.height_events.on_height(
            height,
            Box::new(move || -> HeightCallbackFuture {
                Box::pin(async move {
                    if stop_tx.send(counter).await.is_err() {
                        warn!(epoch = counter, "Epoch manager stopped, dropping stop");
                    }
                })
            }),
        );
        height
    }

    /// Create and start the bundle for `epoch`. Returns false when this node
    /// is not authorized for the epoch.
    async fn launch_epoch(&self, ctx: &SignalerContext, epoch: &Epoch) -> EpochManagerResult<bool> {
        let components = match self.factory.create(epoch) {
            Ok(components) => components,
            Err(CreateEpochError::NotAuthorizedForEpoch(_)) => {
                metrics::record_epoch_skipped();
                info!(epoch = epoch.counter, "Not authorized to participate in epoch, skipping");
                return Ok(false);
            }
            Err(CreateEpochError::Internal(reason)) => {
                return Err(EpochManagerError::Factory {
                    counter: epoch.counter,
                    reason,
                });
            }
        };

        self.start_epoch_components(ctx, epoch.counter, components)
            .await?;
        Ok(true)
    }

    /// Register, start, and wait for a bundle to become ready.
    ///
    /// The bundle runs under a child of `ctx` with its own cancel handle.
    /// On timeout it is cancelled and dropped from the registry.
    async fn start_epoch_components(
        &self,
        ctx: &SignalerContext,
        counter: EpochCounter,
        components: EpochComponents,
    ) -> EpochManagerResult<()> {
        let components = Arc::new(components);
        let (epoch_ctx, cancel, faults) = ctx.with_signaler_and_cancel();

        match self
            .registry
            .admit(counter, Arc::clone(&components), cancel.clone())
        {
            Ok(()) => {}
            Err(AdmitError::AlreadyAdmitted(_)) => {
                warn!(epoch = counter, "Components for epoch already started, discarding duplicate");
                return Ok(());
            }
            Err(AdmitError::Full { live }) => {
                return Err(EpochManagerError::RegistryFull { counter, live });
            }
        }
        metrics::set_live_bundles(self.registry.len());

        components.start(epoch_ctx).await;
        if self
            .started_tx
            .send(StartedEpoch { counter, faults })
            .await
            .is_err()
        {
            debug!(epoch = counter, "Fault forwarder gone, epoch faults not forwarded");
        }

        let ready = components.ready();
        tokio::select! {
            _ = ready.wait() => {
                if self.registry.mark_running(counter) {
                    metrics::record_bundle_started();
                    info!(epoch = counter, "Epoch components ready");
                } else {
                    debug!(epoch = counter, "Epoch components ready after stop was issued");
                }
                Ok(())
            }
            _ = tokio::time::sleep(self.config.startup_timeout) => {
                if self.registry.state(counter) != Some(EpochState::Starting) {
                    debug!(epoch = counter, "Startup timeout for epoch already being stopped");
                    return Ok(());
                }
                cancel.cancel();
                self.registry.remove(counter);
                metrics::set_live_bundles(self.registry.len());
                Err(EpochManagerError::Timeout {
                    counter,
                    phase: LifecyclePhase::Start,
                    timeout: self.config.startup_timeout,
                })
            }
            _ = cancel.cancelled() => {
                debug!(epoch = counter, "Epoch components cancelled while starting");
                Ok(())
            }
            _ = ctx.cancelled() => {
                debug!(epoch = counter, "Shutdown during epoch components start");
                Ok(())
            }
        }
    }

    /// Cancel a bundle and wait for it to shut down, then clear its pool.
    /// Stopping an epoch with no bundle is a no-op.
    async fn stop_epoch_components(&self, counter: EpochCounter) -> EpochManagerResult<()> {
        let Some(entry) = self.registry.begin_stop(counter) else {
            warn!(epoch = counter, "Attempted to stop non-existent epoch components");
            self.stops.forget(counter);
            return Ok(());
        };

        info!(epoch = counter, "Stopping epoch components");
        entry.cancel.cancel();

        let done = entry.components.done();
        if tokio::time::timeout(self.config.shutdown_timeout, done.wait())
            .await
            .is_err()
        {
            return Err(EpochManagerError::Timeout {
                counter,
                phase: LifecyclePhase::Stop,
                timeout: self.config.shutdown_timeout,
            });
        }

        self.registry.remove(counter);
        self.stops.forget(counter);
        self.pools.for_epoch(counter).clear();
        metrics::record_bundle_stopped();
        metrics::set_live_bundles(self.registry.len());
        info!(epoch = counter, "Epoch components stopped");
        Ok(())
    }
}

/// Spawns one forwarder per started bundle. Returns after cancellation once
/// every forwarder has exited.
async fn run_started_worker(
    ctx: SignalerContext,
    ready: ReadyFn,
    mut rx: mpsc::Receiver<StartedEpoch>,
) {
    ready.ready();
    let forwarders = TaskTracker::new();
    loop {
        tokio::select! {
            _ = ctx.cancelled() => break,
            Some(started) = rx.recv() => {
                forwarders.spawn(forward_epoch_faults(ctx.clone(), started));
            }
        }
    }
    forwarders.close();
    forwarders.wait().await;
}

async fn forward_epoch_faults(ctx: SignalerContext, started: StartedEpoch) {
    let StartedEpoch { counter, mut faults } = started;
    tokio::select! {
        _ = ctx.cancelled() => {}
        fault = faults.recv() => {
            if let Some(fault) = fault {
                escalate(
                    &ctx,
                    EpochManagerError::ComponentFault {
                        counter,
                        source: fault.into(),
                    },
                );
            }
        }
    }
}

fn escalate(ctx: &SignalerContext, err: EpochManagerError) {
    metrics::record_fault(err.kind());
    ctx.throw(err);
}
