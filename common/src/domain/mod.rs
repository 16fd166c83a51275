use std::fmt::Debug;
use std::sync::LazyLock;

use nutype::nutype;
use regex::Regex;

pub mod persistence;
pub mod record_types;

pub use record_types::*;

/// Registry of every record type the engine knows about.
///
/// This is the explicit, per-type declaration of kind, localizations and
/// owned child relations. Traversal order of relations is the declaration
/// order, so dirty evaluation and cloning are deterministic.
pub trait RecordTypes: Send + Sync + Debug + 'static {
    /// iterate all registered record types
    fn iterate(&self) -> Box<dyn Iterator<Item = &'static RecordType> + '_>;
    /// find record type by its id
    fn get(&self, id: &RecordTypeId) -> Option<&'static RecordType>;
}

// A regex for IDs/names that may contain only ASCII letters, digits, underscore, dash and slash.
// Example: "My_Id_123" or "my-id" is valid; "my id" or "my.id" are not.
pub const ELIGIBLE_SYMBOLS_REGEX: &str = r"^[A-Za-z0-9_/-]+$";

static ELIGIBLE_SYMBOLS_REGEX_COMPILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(ELIGIBLE_SYMBOLS_REGEX).expect("ELIGIBLE_SYMBOLS_REGEX must be a valid regex")
});

/// Ids starting with this prefix are reserved for the engine's own tables.
pub const RESERVED_PREFIX: &str = "publisher_";

pub fn is_eligible_id(id: &str) -> bool {
    !id.starts_with(RESERVED_PREFIX) && ELIGIBLE_SYMBOLS_REGEX_COMPILED.is_match(id)
}

#[nutype(
    sanitize(trim, lowercase),
    validate(not_empty, len_char_max = 20, predicate = is_eligible_id),
    derive(
        Clone,
        Debug,
        Display,
        FromStr,
        AsRef,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize
    )
)]
pub struct RecordTypeId(String);

impl RecordTypeId {
    pub fn normalized(&self) -> String {
        self.as_ref().replace("-", "_")
    }
}

#[nutype(
    sanitize(trim, lowercase),
    validate(not_empty, len_char_max = 20, predicate = is_eligible_id),
    derive(
        Clone,
        Debug,
        Display,
        FromStr,
        AsRef,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize
    )
)]
pub struct AttributeId(String);

impl AttributeId {
    pub fn normalized(&self) -> String {
        self.as_ref().replace("-", "_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_trimmed_and_lowercased() {
        let id = RecordTypeId::try_new("  Article ").unwrap();
        assert_eq!(id.as_ref(), "article");
    }

    #[test]
    fn reserved_prefix_is_rejected() {
        assert!(RecordTypeId::try_new("publisher_links").is_err());
        assert!(AttributeId::try_new("has space").is_err());
    }

    #[test]
    fn normalized_replaces_dashes() {
        let id = AttributeId::try_new("hero-block").unwrap();
        assert_eq!(id.normalized(), "hero_block");
    }
}
