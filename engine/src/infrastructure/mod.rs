pub mod events;
pub mod memory;
pub mod postgres;

pub use events::{EventBus, TracingObserver};
pub use memory::InMemoryStore;
pub use postgres::PgRecordStore;
