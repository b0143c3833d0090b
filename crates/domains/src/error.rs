//! # Errors
//!
//! Two layers of failure. `StoreError` is what a storage port reports:
//! which constraint fired, or that the backend itself failed.
//! `DomainError` is what a core operation reports to its caller, using
//! only the four kinds the transport needs to map.

use std::fmt;

use thiserror::Error;

/// The uniqueness rule a storage write violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    UserId,
    Username,
    PhotoId,
    CommentId,
    Follow,
    Ban,
    Like,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Constraint::UserId => "users.id",
            Constraint::Username => "users.username",
            Constraint::PhotoId => "photos.id",
            Constraint::CommentId => "comments.id",
            Constraint::Follow => "follows(follower, followed)",
            Constraint::Ban => "bans(banner, banned)",
            Constraint::Like => "likes(user, photo)",
        };
        f.write_str(name)
    }
}

/// Failure reported by a storage port.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("unique constraint violated: {0}")]
    UniqueViolation(Constraint),

    /// A referenced row (user, photo) does not exist
    #[error("referenced row missing: {0}")]
    ForeignKeyViolation(String),

    /// Backend unavailable, transaction aborted, corrupt row, ...
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// The four kinds every core operation can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidArgument,
    StorageFailure,
}

/// The primary error type for all core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Referenced user, photo or comment does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Duplicate username, duplicate ban, duplicate like
    #[error("conflict: {0}")]
    Conflict(String),

    /// Structurally invalid input (empty id, self-follow, ...)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Store unavailable, or a transaction failed for any other reason
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DomainError::Storage(_) => ErrorKind::StorageFailure,
        }
    }
}

/// Constraint violations that a call site did not translate explicitly are
/// still storage failures from the caller's point of view.
impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        DomainError::Storage(err.to_string())
    }
}

/// A specialized Result type for Photogram core logic.
pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(DomainError::not_found("photo", "p1").kind(), ErrorKind::NotFound);
        assert_eq!(DomainError::Conflict("x".into()).kind(), ErrorKind::Conflict);
        assert_eq!(
            DomainError::InvalidArgument("x".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(DomainError::Storage("x".into()).kind(), ErrorKind::StorageFailure);
    }

    #[test]
    fn test_untranslated_store_error_is_storage_failure() {
        let err: DomainError = StoreError::UniqueViolation(Constraint::Like).into();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert!(err.to_string().contains("likes(user, photo)"));
    }

    #[test]
    fn test_not_found_message_names_entity() {
        let err = DomainError::not_found("user", "Zz0yX1wV2u");
        assert_eq!(err.to_string(), "user not found: Zz0yX1wV2u");
    }
}
