use std::path::PathBuf;

/// Errors surfaced by the store and the indexing engine.
///
/// Resolution failures are deliberately absent: an import or reference that
/// cannot be resolved is recorded as data on the row itself, never raised.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Fatal: the store must not be used below the expected schema version.
    #[error("schema migration to v{version} failed: {message}")]
    SchemaMigration { version: i32, message: String },

    /// Indicates an engine bug; cascade rules should make this unreachable.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Another writer held the lock beyond the busy timeout. Retryable; the
    /// operation was not partially applied.
    #[error("store busy beyond busy timeout: {0}")]
    Contention(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl StoreError {
    /// Whether the caller may simply retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Contention(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg) => match e.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    StoreError::Contention(msg.clone().unwrap_or_else(|| e.to_string()))
                }
                rusqlite::ErrorCode::ConstraintViolation => {
                    StoreError::ConstraintViolation(msg.clone().unwrap_or_else(|| e.to_string()))
                }
                _ => StoreError::Store(err.to_string()),
            },
            _ => StoreError::Store(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_maps_to_retryable_contention() {
        let err: StoreError = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        )
        .into();
        assert!(err.is_retryable());
    }

    #[test]
    fn constraint_failure_is_not_retryable() {
        let err: StoreError = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            None,
        )
        .into();
        assert!(!err.is_retryable());
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
    }
}
