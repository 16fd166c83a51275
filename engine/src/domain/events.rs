use std::sync::Arc;

use chrono::{DateTime, Utc};
use publisher_common::RecordTypeId;
use serde::Serialize;

use crate::domain::record::Draft;

/// Lifecycle points announced around publish and unpublish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleSignal {
    /// the draft is linked to its new snapshot but not yet saved
    PrePublish,
    PostPublish,
    /// the unlink is saved, the snapshot is not deleted yet
    PreUnpublish,
    PostUnpublish,
}

impl LifecycleSignal {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleSignal::PrePublish => "pre_publish",
            LifecycleSignal::PostPublish => "post_publish",
            LifecycleSignal::PreUnpublish => "pre_unpublish",
            LifecycleSignal::PostUnpublish => "post_unpublish",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    pub signal: LifecycleSignal,
    /// the draft as it was at the time of the signal
    pub instance: Draft,
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(signal: LifecycleSignal, instance: &Draft, timestamp: DateTime<Utc>) -> Self {
        Self {
            signal,
            instance: instance.clone(),
            timestamp,
        }
    }

    pub fn record_type(&self) -> &RecordTypeId {
        &self.instance.record_type
    }
}

/// Receives lifecycle events synchronously, in emission order.
///
/// Observers must not call back into the publisher for the same record.
/// `PrePublish` is not followed by `PostPublish` when saving the draft fails.
pub trait LifecycleObserver: Send + Sync {
    fn notify(&self, event: &LifecycleEvent);
}

impl<T: LifecycleObserver + ?Sized> LifecycleObserver for Arc<T> {
    fn notify(&self, event: &LifecycleEvent) {
        (**self).notify(event)
    }
}

impl<A: LifecycleObserver, B: LifecycleObserver> LifecycleObserver for (A, B) {
    fn notify(&self, event: &LifecycleEvent) {
        self.0.notify(event);
        self.1.notify(event);
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl LifecycleObserver for NoopObserver {
    fn notify(&self, _event: &LifecycleEvent) {}
}
