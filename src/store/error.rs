//! Error types for backing store operations.

use thiserror::Error;

/// Error raised by an L2 call.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error reported by the Redis client (connection, protocol, server reply).
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The call did not complete within the configured response timeout.
    #[error("Backing store timed out after {0}ms")]
    Timeout(u64),

    /// The store cannot be reached.
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),

    /// The connection was closed by `disconnect`.
    #[error("Backing store connection closed")]
    Closed,

    /// The key holds a value of another type (e.g. HGET on a string).
    #[error("Wrong value type at key: {0}")]
    WrongType(String),

    /// An increment would leave the 64-bit counter range.
    #[error("Increment or decrement would overflow at key: {0}")]
    Overflow(String),
}

impl StoreError {
    /// Whether retrying the same command may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Redis(e) => e.is_io_error() || e.is_connection_dropped() || e.is_timeout(),
            StoreError::Timeout(_) => true,
            StoreError::Unavailable(_)
            | StoreError::Closed
            | StoreError::WrongType(_)
            | StoreError::Overflow(_) => false,
        }
    }
}

/// Convenience Result type for backing store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_transient() {
        assert!(StoreError::Timeout(50).is_transient());
    }

    #[test]
    fn test_closed_is_not_transient() {
        assert!(!StoreError::Closed.is_transient());
        assert!(!StoreError::Unavailable("down".to_string()).is_transient());
        assert!(!StoreError::WrongType("k".to_string()).is_transient());
        assert!(!StoreError::Overflow("k".to_string()).is_transient());
    }

    #[test]
    fn test_redis_io_error_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = StoreError::from(redis::RedisError::from(io));
        assert!(err.is_transient());
    }
}
