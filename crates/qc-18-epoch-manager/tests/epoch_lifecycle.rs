//! End-to-end epoch lifecycle driven through the shared event bus.

use async_trait::async_trait;
use parking_lot::Mutex;
use qc_18_epoch_manager::adapters::{
    publish_fault, InMemoryHeightEvents, InMemoryTransactionPools, PooledTransaction,
    ProtocolEventsBridge, EPOCH_MANAGER_SUBSYSTEM,
};
use qc_18_epoch_manager::component::{
    Component, ComponentManagerBuilder, FaultReceiver, ReadyFn, SignalerContext,
};
use qc_18_epoch_manager::ports::{
    EpochComponentsFactory, EpochQuery, ProtocolState, RootQcVoter, TransactionPool,
};
use qc_18_epoch_manager::{
    CreateEpochError, EpochComponents, EpochManager, EpochManagerConfig,
    EpochManagerDependencies, EpochManagerError, EpochState,
};
use shared_bus::{BlockchainEvent, EventFilter, EventPublisher, EventTopic, InMemoryEventBus};
use shared_types::{BlockHeader, BlockId, Epoch, EpochCounter, EpochPhase};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct ChainState {
    blocks: Mutex<HashMap<BlockId, EpochCounter>>,
}

impl ChainState {
    fn new() -> Self {
        Self {
            blocks: Mutex::new(HashMap::new()),
        }
    }

    fn block(&self, height: u64, counter: EpochCounter) -> BlockHeader {
        let header = BlockHeader::new(height, [height as u8; 32]);
        self.blocks.lock().insert(header.id(), counter);
        header
    }
}

impl ProtocolState for ChainState {
    fn current_epoch(&self) -> Result<Epoch, String> {
        Ok(Epoch::new(0))
    }

    fn epoch_at(&self, block_id: &BlockId, query: EpochQuery) -> Result<Epoch, String> {
        let counter = *self
            .blocks
            .lock()
            .get(block_id)
            .ok_or_else(|| "unknown block".to_string())?;
        Ok(match query {
            EpochQuery::Current => Epoch::new(counter),
            EpochQuery::Next => Epoch::new(counter + 1),
        })
    }

    fn phase(&self) -> Result<EpochPhase, String> {
        Ok(EpochPhase::Staking)
    }

    fn finalized_head(&self) -> Result<BlockHeader, String> {
        Ok(BlockHeader::new(0, [0u8; 32]))
    }
}

/// Builds bundles out of idle worker components.
#[derive(Default)]
struct IdleFactory {
    unauthorized: HashSet<EpochCounter>,
    failing: HashSet<EpochCounter>,
}

fn idle(name: &str, counter: EpochCounter) -> Arc<dyn Component> {
    Arc::new(
        ComponentManagerBuilder::new(format!("{name}-{counter}"))
            .add_worker(|ctx: SignalerContext, ready: ReadyFn| async move {
                ready.ready();
                ctx.cancelled().await;
            })
            .build(),
    )
}

impl EpochComponentsFactory for IdleFactory {
    fn create(&self, epoch: &Epoch) -> Result<EpochComponents, CreateEpochError> {
        let counter = epoch.counter;
        if self.unauthorized.contains(&counter) {
            return Err(CreateEpochError::NotAuthorizedForEpoch(counter));
        }
        if self.failing.contains(&counter) {
            return Err(CreateEpochError::Internal("dkg key missing".into()));
        }
        Ok(EpochComponents::new(
            idle("state", counter),
            idle("proposal", counter),
            idle("sync", counter),
            idle("driver", counter),
            idle("votes", counter),
            idle("timeouts", counter),
        ))
    }
}

struct NoopVoter;

#[async_trait]
impl RootQcVoter for NoopVoter {
    async fn vote(&self, _cancel: &CancellationToken, _next: &Epoch) -> Result<(), String> {
        Ok(())
    }
}

type Manager = EpochManager<
    ChainState,
    IdleFactory,
    InMemoryHeightEvents,
    NoopVoter,
    InMemoryTransactionPools,
>;

struct Node {
    bus: InMemoryEventBus,
    chain: Arc<ChainState>,
    manager: Arc<Manager>,
    heights: Arc<InMemoryHeightEvents>,
    pools: Arc<InMemoryTransactionPools>,
    ctx: SignalerContext,
    faults: FaultReceiver,
    bridge_cancel: CancellationToken,
}

async fn boot(factory: IdleFactory) -> Node {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let bus = InMemoryEventBus::new();
    let chain = Arc::new(ChainState::new());
    let heights = Arc::new(InMemoryHeightEvents::new());
    let pools = Arc::new(InMemoryTransactionPools::new());
    let manager = Arc::new(
        EpochManager::new(EpochManagerDependencies {
            protocol_state: Arc::clone(&chain),
            factory: Arc::new(factory),
            height_events: Arc::clone(&heights),
            voter: Arc::new(NoopVoter),
            pools: Arc::clone(&pools),
            config: EpochManagerConfig::default(),
        })
        .expect("valid config"),
    );

    let bridge_cancel = CancellationToken::new();
    ProtocolEventsBridge::new(Arc::clone(&manager), Arc::clone(&heights))
        .spawn(&bus, bridge_cancel.clone());

    let (ctx, faults) = SignalerContext::root();
    manager.start(ctx.clone()).await;
    tokio::time::timeout(Duration::from_secs(1), manager.ready().wait())
        .await
        .expect("epoch manager ready");

    Node {
        bus,
        chain,
        manager,
        heights,
        pools,
        ctx,
        faults,
        bridge_cancel,
    }
}

async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

impl Node {
    async fn transition(&self, counter: EpochCounter, first_height: u64) {
        let first_block = self.chain.block(first_height, counter);
        self.bus
            .publish(BlockchainEvent::EpochTransition {
                epoch: counter,
                first_block,
            })
            .await;
    }

    async fn finalize(&self, height: u64) {
        self.bus
            .publish(BlockchainEvent::BlockFinalized {
                block_height: height,
                block_hash: [0u8; 32],
            })
            .await;
    }

    async fn shutdown(self) {
        let done = self.manager.done();
        self.ctx.cancellation_token().cancel();
        self.bridge_cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), done.wait())
            .await
            .expect("epoch manager done");
    }
}

#[tokio::test]
async fn test_epoch_handover_through_event_bus() {
    let mut node = boot(IdleFactory::default()).await;
    assert_eq!(node.manager.epoch_states(), vec![(0, EpochState::Running)]);

    node.pools.pool(0).add(PooledTransaction {
        hash: [1u8; 32],
        reference_block: [0u8; 32],
        payload: b"transfer".to_vec(),
    });

    node.transition(1, 1000).await;
    eventually(|| node.manager.epoch_states().len() == 2).await;

    // Grace period: epoch 0 ended at 999 and lives until 999 + 600 + 1.
    node.finalize(1599).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(node.manager.epoch_states().len(), 2);

    node.finalize(1600).await;
    eventually(|| node.manager.epoch_states() == vec![(1, EpochState::Running)]).await;
    assert_eq!(node.pools.pool(0).size(), 0);

    assert!(node.faults.try_recv().is_none());
    node.shutdown().await;
}

#[tokio::test]
async fn test_unauthorized_epochs_are_skipped_silently() {
    let mut node = boot(IdleFactory {
        unauthorized: [1].into_iter().collect(),
        ..Default::default()
    })
    .await;

    node.transition(1, 1000).await;
    eventually(|| node.heights.pending_heights() == vec![1600]).await;
    node.finalize(1600).await;
    eventually(|| node.manager.epoch_states().is_empty()).await;

    node.transition(2, 2000).await;
    eventually(|| node.manager.epoch_states() == vec![(2, EpochState::Running)]).await;

    assert!(node.faults.try_recv().is_none());
    node.shutdown().await;
}

#[tokio::test]
async fn test_fault_reaches_dead_letter_topic() {
    let mut node = boot(IdleFactory {
        failing: [1].into_iter().collect(),
        ..Default::default()
    })
    .await;
    let mut dlq = node
        .bus
        .subscribe(EventFilter::topics(vec![EventTopic::DeadLetterQueue]));

    node.transition(1, 1000).await;
    let fault = tokio::time::timeout(Duration::from_secs(1), node.faults.recv())
        .await
        .expect("fault expected")
        .expect("fault channel open");
    assert!(matches!(
        fault.downcast_ref::<EpochManagerError>(),
        Some(EpochManagerError::Factory { counter: 1, .. })
    ));

    publish_fault(&node.bus, &fault).await;
    match dlq.recv().await {
        Some(BlockchainEvent::CriticalError { subsystem_id, error }) => {
            assert_eq!(subsystem_id, EPOCH_MANAGER_SUBSYSTEM);
            assert!(error.contains("dkg key missing"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    node.shutdown().await;
}
