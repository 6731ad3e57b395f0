//! Event Bus adapter
//!
//! Feeds shared-bus protocol events into the epoch manager and the height
//! registry, and reports escalated faults to the dead letter topic.

use super::InMemoryHeightEvents;
use crate::component::Fault;
use crate::ports::EpochEventsConsumer;
use shared_bus::{
    BlockchainEvent, EventFilter, EventPublisher, EventSubscriber, EventTopic, Subscription,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Subsystem ID of the epoch manager on the bus.
pub const EPOCH_MANAGER_SUBSYSTEM: u8 = 18;

/// Routes finality and epoch events from the bus.
///
/// `BlockFinalized` drives the height registry; epoch milestones go to the
/// consumer. Events are handled one at a time, in bus order.
pub struct ProtocolEventsBridge<C: EpochEventsConsumer> {
    consumer: Arc<C>,
    heights: Arc<InMemoryHeightEvents>,
}

impl<C: EpochEventsConsumer + 'static> ProtocolEventsBridge<C> {
    pub fn new(consumer: Arc<C>, heights: Arc<InMemoryHeightEvents>) -> Self {
        Self { consumer, heights }
    }

    /// Subscribe now and process events on a background task until
    /// `cancel` fires or the bus goes away.
    pub fn spawn<S: EventSubscriber>(self, bus: &S, cancel: CancellationToken) -> JoinHandle<()> {
        let subscription = bus.subscribe(EventFilter::topics(vec![
            EventTopic::Finality,
            EventTopic::Epoch,
        ]));
        tokio::spawn(self.run(subscription, cancel))
    }

    pub async fn run(self, mut subscription: Subscription, cancel: CancellationToken) {
        info!("Epoch event bridge started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Epoch event bridge stopped");
                    return;
                }
                event = subscription.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => {
                        warn!("Event bus closed, epoch event bridge exiting");
                        return;
                    }
                },
            }
        }
    }

    async fn dispatch(&self, event: BlockchainEvent) {
        match event {
            BlockchainEvent::BlockFinalized { block_height, .. } => {
                let fired = self.heights.on_finalized(block_height).await;
                if fired > 0 {
                    debug!(height = block_height, fired, "Height callbacks fired");
                }
            }
            BlockchainEvent::EpochTransition { epoch, first_block } => {
                self.consumer.on_epoch_transition(epoch, first_block).await;
            }
            BlockchainEvent::EpochSetupPhaseStarted { epoch, first_block } => {
                self.consumer
                    .on_epoch_setup_phase_started(epoch, first_block)
                    .await;
            }
            BlockchainEvent::CriticalError { .. } => {}
        }
    }
}

/// Publish an escalated fault as a `CriticalError` event.
///
/// Returns the number of subscribers reached.
pub async fn publish_fault<P: EventPublisher + ?Sized>(bus: &P, fault: &Fault) -> usize {
    bus.publish(BlockchainEvent::CriticalError {
        subsystem_id: EPOCH_MANAGER_SUBSYSTEM,
        error: format!("{fault:#}"),
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{HeightCallbackFuture, HeightEvents};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use shared_bus::InMemoryEventBus;
    use shared_types::{BlockHeader, EpochCounter};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingConsumer {
        transitions: Mutex<Vec<EpochCounter>>,
        setups: Mutex<Vec<EpochCounter>>,
    }

    #[async_trait]
    impl EpochEventsConsumer for RecordingConsumer {
        async fn on_epoch_transition(&self, counter: EpochCounter, _first_block: BlockHeader) {
            self.transitions.lock().push(counter);
        }

        async fn on_epoch_setup_phase_started(
            &self,
            counter: EpochCounter,
            _first_block: BlockHeader,
        ) {
            self.setups.lock().push(counter);
        }
    }

    async fn eventually(check: impl Fn() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_bridge_routes_events() {
        let bus = InMemoryEventBus::new();
        let consumer = Arc::new(RecordingConsumer::default());
        let heights = Arc::new(InMemoryHeightEvents::new());
        let fired = Arc::new(Mutex::new(false));
        {
            let fired = Arc::clone(&fired);
            heights.on_height(
                5,
                Box::new(move || -> HeightCallbackFuture {
                    Box::pin(async move { *fired.lock() = true })
                }),
            );
        }

        let cancel = CancellationToken::new();
        let handle = ProtocolEventsBridge::new(Arc::clone(&consumer), Arc::clone(&heights))
            .spawn(&bus, cancel.clone());

        bus.publish(BlockchainEvent::EpochTransition {
            epoch: 1,
            first_block: BlockHeader::new(1000, [0u8; 32]),
        })
        .await;
        bus.publish(BlockchainEvent::EpochSetupPhaseStarted {
            epoch: 1,
            first_block: BlockHeader::new(1500, [0u8; 32]),
        })
        .await;
        bus.publish(BlockchainEvent::BlockFinalized {
            block_height: 5,
            block_hash: [0u8; 32],
        })
        .await;

        eventually(|| *fired.lock()).await;
        assert_eq!(*consumer.transitions.lock(), vec![1]);
        assert_eq!(*consumer.setups.lock(), vec![1]);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_fault_reaches_dead_letter_topic() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::DeadLetterQueue]));

        let reached = publish_fault(&bus, &anyhow::anyhow!("bundle stuck")).await;
        assert_eq!(reached, 1);

        match sub.recv().await {
            Some(BlockchainEvent::CriticalError {
                subsystem_id,
                error,
            }) => {
                assert_eq!(subsystem_id, EPOCH_MANAGER_SUBSYSTEM);
                assert_eq!(error, "bundle stuck");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
