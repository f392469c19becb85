//! # Pool Error Types
//!
//! Construction-time failures and hook faults.
//!
//! Runtime operations (`acquire`, `release`, timers) never return these;
//! they report through `Option`/`bool` sentinels and logs instead.

use thiserror::Error;

/// Errors that can occur when building or configuring a pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No factory was configured and no default construction path was requested.
    #[error("pool '{0}' has no unit factory")]
    MissingFactory(String),

    /// The pool configuration is inconsistent.
    #[error("invalid pool configuration for '{pool}': {reason}")]
    InvalidConfig {
        /// Pool label.
        pool: String,
        /// What was wrong.
        reason: String,
    },

    /// A lifecycle hook failed.
    #[error("{stage} hook failed: {source}")]
    Hook {
        /// Which hook failed (`acquire`, `release`, `dispose`).
        stage: &'static str,
        /// The error the hook reported.
        source: HookError,
    },
}

/// Error reported by a lifecycle hook (`on_acquire`, `on_release`, `on_dispose`).
///
/// Hooks cannot abort pool bookkeeping; the pool logs the error and carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    /// Creates a hook error from any message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Result type for pool construction.
pub type PoolResult<T> = Result<T, PoolError>;

/// Result type returned by lifecycle hooks.
pub type HookResult = Result<(), HookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PoolError::MissingFactory("sparks".into());
        assert_eq!(err.to_string(), "pool 'sparks' has no unit factory");

        let err = PoolError::Hook {
            stage: "acquire",
            source: HookError::new("texture missing"),
        };
        assert_eq!(err.to_string(), "acquire hook failed: texture missing");
    }
}
