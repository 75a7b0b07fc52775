use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::events::PipelineEvent;
use crate::domain::ports::EventPublisher;

/// Fans pipeline events out to any number of subscribers.
///
/// Slow subscribers lag and lose old events; publishing never blocks.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<PipelineEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }
}

impl EventPublisher<PipelineEvent> for BroadcastPublisher {
    fn publish(&self, event: &PipelineEvent) {
        // Err only means nobody is listening.
        if self.tx.send(event.clone()).is_err() {
            trace!("event dropped, no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::model::ResourceName;

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let publisher = BroadcastPublisher::new(8);
        let mut a = publisher.subscribe();
        let mut b = publisher.subscribe();

        let event = PipelineEvent::CollectionReplaced {
            resource: ResourceName::Crm,
            sequence: 1,
            len: 3,
        };
        publisher.publish(&event);

        assert_eq!(a.recv().await.unwrap(), event);
        assert_eq!(b.recv().await.unwrap(), event);
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let publisher = BroadcastPublisher::new(0);
        publisher.publish(&PipelineEvent::AuditRecorded { entry_id: 1 });
    }
}
