pub mod domain;
pub mod infrastructure;
pub mod test_utils;
pub mod versioning;

pub use domain::*;
pub use infrastructure::{EventBus, InMemoryStore, PgRecordStore, TracingObserver};
pub use versioning::{CHILD_EDIT_THRESHOLD_SECONDS, PublicationStatus, Publisher, View};
