pub mod database;
pub mod record_types;
