//! Storage error types

/// Result alias for storage primitives
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a storage backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend failed to execute the operation
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Uniqueness or integrity constraint rejected a write
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Stored row could not be decoded
    #[error("corrupt stored row: {0}")]
    Corrupt(String),

    /// Mutation attempted inside a read unit of work
    #[error("write attempted in a read-only transaction")]
    ReadOnly,
}

impl StoreError {
    /// Check if a constraint rejected the write
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Check if stored data failed to decode
    #[inline]
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt(_))
    }
}
