use tokio::sync::broadcast;

use crate::domain::{LifecycleEvent, LifecycleObserver};

/// Writes every lifecycle event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LifecycleObserver for TracingObserver {
    fn notify(&self, event: &LifecycleEvent) {
        tracing::info!(
            signal = event.signal.name(),
            record_type = %event.record_type(),
            id = %event.instance.id,
            linked_id = ?event.instance.linked_id.map(|id| id.0),
            "lifecycle event"
        );
    }
}

const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out of lifecycle events to any number of async subscribers.
///
/// Subscribers receive events emitted after they subscribed. When a
/// subscriber falls more than the channel capacity behind, it observes
/// `RecvError::Lagged` and the oldest events are lost.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LifecycleObserver for EventBus {
    fn notify(&self, event: &LifecycleEvent) {
        // no subscribers is not an error
        let _ = self.sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use publisher_common::test_utils::type_id;

    use super::*;
    use crate::domain::{Content, Draft, LifecycleSignal, RecordId};

    fn draft() -> Draft {
        let now = Utc::now();
        Draft {
            id: RecordId(3),
            record_type: type_id("page"),
            linked_id: None,
            created_at: now,
            modified_at: now,
            published_at: None,
            content: Content::new(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let bus = EventBus::default();
        let mut receiver = bus.subscribe();
        let draft = draft();

        bus.notify(&LifecycleEvent::new(LifecycleSignal::PreUnpublish, &draft, Utc::now()));
        bus.notify(&LifecycleEvent::new(LifecycleSignal::PostUnpublish, &draft, Utc::now()));

        assert_eq!(receiver.recv().await.unwrap().signal, LifecycleSignal::PreUnpublish);
        assert_eq!(receiver.recv().await.unwrap().signal, LifecycleSignal::PostUnpublish);
    }

    #[test]
    fn notifying_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.notify(&LifecycleEvent::new(LifecycleSignal::PrePublish, &draft(), Utc::now()));
    }
}
