use publisher_common::{AttributeId, AttributeType, LocalizationId, RecordTypeId};
use thiserror::Error;

use crate::domain::record::RecordId;

/// Failures reported by a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found: {0}")]
    NotFound(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("stored row is inconsistent: {0}")]
    InvalidRow(String),

    #[error("database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation(db_err.message().to_owned())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::InvalidRow(err.to_string())
            }
            _ => StoreError::DatabaseError(err.to_string()),
        }
    }
}

/// Content that does not fit the declared fields of its record type.
#[derive(Debug, Error, PartialEq)]
pub enum ContentError {
    #[error("field '{0}' is not declared")]
    UnknownField(AttributeId),

    #[error("field '{field}' expects a {expected:?} value")]
    TypeMismatch {
        field: AttributeId,
        expected: AttributeType,
    },

    #[error("required field '{0}' is missing")]
    MissingRequiredField(AttributeId),
}

#[derive(Debug, Error)]
pub enum VersioningError {
    /// The operation applies to drafts only.
    #[error("cannot {operation} {record_type} {id}: it is a published record")]
    InvalidState {
        operation: &'static str,
        record_type: RecordTypeId,
        id: RecordId,
    },

    /// Another writer changed the draft's link concurrently, or a second
    /// draft would claim the same published record.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("{record_type} {id} not found")]
    NotFound {
        record_type: RecordTypeId,
        id: RecordId,
    },

    #[error("unknown record type '{0}'")]
    UnknownRecordType(RecordTypeId),

    #[error("record type '{0}' is not versioned")]
    NotVersioned(RecordTypeId),

    #[error("record type '{record_type}' has no relation '{relation}'")]
    UnknownRelation {
        record_type: RecordTypeId,
        relation: AttributeId,
    },

    #[error("record type '{record_type}' does not support locale '{locale}'")]
    UnsupportedLocale {
        record_type: RecordTypeId,
        locale: LocalizationId,
    },

    #[error("invalid content for '{record_type}': {source}")]
    InvalidContent {
        record_type: RecordTypeId,
        #[source]
        source: ContentError,
    },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for VersioningError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(message) => VersioningError::ConstraintViolation(message),
            other => VersioningError::Store(other),
        }
    }
}

pub type VersioningResult<T> = Result<T, VersioningError>;

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn unique_violations_surface_as_constraint_violations() {
        let err = VersioningError::from(StoreError::UniqueViolation("linked_id".into()));
        assert_matches!(err, VersioningError::ConstraintViolation(message) if message == "linked_id");

        let err = VersioningError::from(StoreError::DatabaseError("boom".into()));
        assert_matches!(err, VersioningError::Store(StoreError::DatabaseError(_)));
    }
}
