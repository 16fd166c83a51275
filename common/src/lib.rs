pub mod domain;
pub mod infrastructure;
pub mod test_utils;

// Persisted record field names

pub const ID_FIELD_NAME: &'static str = "id";
pub const DOCUMENT_ID_FIELD_NAME: &'static str = "document_id";
pub const RELATION_ID_FIELD_NAME: &'static str = "relation_id";
pub const LOCALE_FIELD_NAME: &'static str = "locale";
pub const CONTENT_FIELD_NAME: &'static str = "content";

pub const IS_DRAFT_FIELD_NAME: &'static str = "is_draft";
pub const LINKED_ID_FIELD_NAME: &'static str = "linked_id";

pub const CREATED_FIELD_NAME: &'static str = "created_at";
pub const MODIFIED_FIELD_NAME: &'static str = "modified_at";
pub const PUBLISHED_FIELD_NAME: &'static str = "published_at";

// expose domain module

pub use domain::*;
pub use infrastructure::record_types::{RecordTypesAdapter, load as load_record_types};

// expose database module

pub use infrastructure::database;
