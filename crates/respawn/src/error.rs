//! # Runtime Error Types
//!
//! Startup-time failures: config files and owner construction.
//! Nothing in the per-frame path returns these.

use thiserror::Error;

use respawn_core::PoolError;
use respawn_supervisor::SupervisorError;

/// Errors raised while building the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration is missing, malformed or inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// A pool could not be built.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl From<toml::de::Error> for RuntimeError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<SupervisorError> for RuntimeError {
    fn from(err: SupervisorError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for runtime construction.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_error_is_transparent() {
        let err: RuntimeError = PoolError::MissingFactory("enemies".into()).into();
        assert_eq!(err.to_string(), "pool 'enemies' has no unit factory");
    }

    #[test]
    fn test_supervisor_error_maps_to_config() {
        let err: RuntimeError = SupervisorError::InvalidConfig("bad".into()).into();
        assert!(matches!(err, RuntimeError::Config(_)));
    }
}
