use chrono::{DateTime, Utc};

pub mod error;
pub mod events;
pub mod record;
pub mod store;

pub use error::{ContentError, StoreError, VersioningError, VersioningResult};
pub use events::{LifecycleEvent, LifecycleObserver, LifecycleSignal, NoopObserver};
pub use record::{
    ChildRecord, Content, Draft, Duplicate, FieldValue, NewChild, NewRecord, Published, RecordId,
    RecordRef, StoredRecord, Translation, VersionedRecord,
};
pub use store::RecordStore;

/// Source of "now" for every timestamp the engine writes.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
