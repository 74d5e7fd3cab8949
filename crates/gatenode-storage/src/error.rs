use thiserror::Error;

/// Storage-specific error types for the Gatenode blob store.
///
/// These errors represent failures of the persistence layer itself; the
/// network client maps them onto its `StorageError` taxonomy entry when
/// recording them in the diagnostics log.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Blob key contains characters the backend cannot represent
    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    /// Store is unavailable (unmounted, full, or fail-injected in tests)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
