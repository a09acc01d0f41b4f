//! Storage error.

/// Errors returned by the transaction store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Internal storage error.
    #[error(transparent)]
    Internal(#[from] eyre::Error),
}
