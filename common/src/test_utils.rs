use crate::domain::{AttributeId, RecordTypeId, RecordTypes};
use crate::record_types::{LocalizationId, RecordKind, RecordTitle, RecordType, RecordTypeInfo};

/// Simple registry storing a few static record types.
///
/// Public so that other crates can reuse it for their own tests.
#[derive(Debug)]
pub struct SimpleRegistry {
    pub types: Vec<&'static RecordType>,
}

impl RecordTypes for SimpleRegistry {
    fn iterate(&self) -> Box<dyn Iterator<Item = &'static RecordType> + '_> {
        Box::new(self.types.iter().copied())
    }

    fn get(&self, id: &RecordTypeId) -> Option<&'static RecordType> {
        self.types.iter().copied().find(|rt| &rt.id == id)
    }
}

impl SimpleRegistry {
    /// Leak the given types together with the registry itself.
    pub fn leak(types: Vec<RecordType>) -> &'static SimpleRegistry {
        let types = types.into_iter().map(leak).collect();
        Box::leak(Box::new(SimpleRegistry { types }))
    }
}

pub fn leak(record_type: RecordType) -> &'static RecordType {
    Box::leak(Box::new(record_type))
}

pub fn type_id(id: &str) -> RecordTypeId {
    RecordTypeId::try_new(id).unwrap()
}

pub fn attr(id: &str) -> AttributeId {
    AttributeId::try_new(id).unwrap()
}

pub fn locale(id: &str) -> LocalizationId {
    LocalizationId::try_new(id).unwrap()
}

/// Helper for building a `RecordType` value with the usual pluralization rule (`id` + "s").
pub fn make_type(id: &str, kind: RecordKind) -> RecordType {
    let info = RecordTypeInfo {
        title: RecordTitle::try_new(id).unwrap(),
        singular_name: type_id(id),
        plural_name: type_id(&format!("{}s", id)),
        description: None,
    };
    RecordType::new(type_id(id), kind, info)
}

/// Convenience for creating a versioned type, localized when `locales` is not empty.
pub fn versioned_type(id: &str, locales: &[&str]) -> RecordType {
    let record_type = make_type(id, RecordKind::Versioned);
    if locales.is_empty() {
        record_type
    } else {
        record_type.with_localizations(locales.iter().copied().map(locale).collect())
    }
}

/// Convenience for creating an owned child type.
pub fn child_type(id: &str) -> RecordType {
    make_type(id, RecordKind::Child)
}
