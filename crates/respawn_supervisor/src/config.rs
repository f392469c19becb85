//! # Supervisor Configuration
//!
//! Thresholds, steps and budgets for the optimization loop.
//! Loaded once at startup (usually from the `[supervisor]` table of the
//! runtime TOML file).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating supervisor configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SupervisorError {
    /// A threshold or step is inconsistent.
    #[error("invalid supervisor configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for supervisor configuration.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Configuration for [`crate::PoolSupervisor`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Time between monitoring passes (ms).
    pub monitor_interval_ms: u64,
    /// Utilization above which a pool grows.
    pub high_watermark: f64,
    /// Utilization below which a pool shrinks.
    pub low_watermark: f64,
    /// Whether monitoring passes issue resize commands.
    pub auto_optimize: bool,
    /// Minimum time between two optimization passes (ms).
    pub optimize_cooldown_ms: u64,
    /// Units added to a pool above the high watermark.
    pub grow_step: usize,
    /// Units removed from a pool below the low watermark.
    pub shrink_step: usize,
    /// No resize goes below this size.
    pub global_min_size: usize,
    /// No resize goes above this size.
    pub global_max_size: usize,
    /// Aggregate memory estimate that triggers emergency cleanup (MB).
    pub memory_ceiling_mb: f64,
    /// Pools below this utilization are shrunk during emergency cleanup.
    pub emergency_utilization: f64,
    /// Headroom kept above the active count during emergency cleanup.
    pub emergency_buffer: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            monitor_interval_ms: 5_000,
            high_watermark: 0.9,
            low_watermark: 0.3,
            auto_optimize: true,
            optimize_cooldown_ms: 30_000,
            grow_step: 10,
            shrink_step: 5,
            global_min_size: 5,
            global_max_size: 500,
            memory_ceiling_mb: 100.0,
            emergency_utilization: 0.1,
            emergency_buffer: 5,
        }
    }
}

impl SupervisorConfig {
    /// Tight budget for low-memory targets (handhelds, browser builds).
    ///
    /// Samples more often, shrinks harder, and caps pools lower.
    #[must_use]
    pub const fn low_memory() -> Self {
        Self {
            monitor_interval_ms: 2_000,
            high_watermark: 0.9,
            low_watermark: 0.4,
            auto_optimize: true,
            optimize_cooldown_ms: 10_000,
            grow_step: 5,
            shrink_step: 10,
            global_min_size: 2,
            global_max_size: 200,
            memory_ceiling_mb: 32.0,
            emergency_utilization: 0.2,
            emergency_buffer: 2,
        }
    }

    /// Monitoring period.
    #[must_use]
    pub const fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    /// Optimization cooldown.
    #[must_use]
    pub const fn optimize_cooldown(&self) -> Duration {
        Duration::from_millis(self.optimize_cooldown_ms)
    }

    /// Checks thresholds and bounds.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> SupervisorResult<()> {
        let invalid = |reason: String| Err(SupervisorError::InvalidConfig(reason));

        if self.monitor_interval_ms == 0 {
            return invalid("monitor_interval_ms must be greater than zero".into());
        }
        if !(0.0..=1.0).contains(&self.low_watermark) || !(0.0..=1.0).contains(&self.high_watermark) {
            return invalid("watermarks must lie in [0, 1]".into());
        }
        if self.low_watermark >= self.high_watermark {
            return invalid(format!(
                "low_watermark ({}) must be below high_watermark ({})",
                self.low_watermark, self.high_watermark
            ));
        }
        if self.global_min_size > self.global_max_size {
            return invalid(format!(
                "global_min_size ({}) exceeds global_max_size ({})",
                self.global_min_size, self.global_max_size
            ));
        }
        if self.global_max_size == 0 {
            return invalid("global_max_size must be at least 1".into());
        }
        if self.memory_ceiling_mb <= 0.0 {
            return invalid("memory_ceiling_mb must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(SupervisorConfig::default().validate().is_ok());
        assert!(SupervisorConfig::low_memory().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_watermarks() {
        let config = SupervisorConfig {
            low_watermark: 0.9,
            high_watermark: 0.3,
            ..SupervisorConfig::default()
        };
        assert!(matches!(config.validate(), Err(SupervisorError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let config = SupervisorConfig {
            global_min_size: 50,
            global_max_size: 10,
            ..SupervisorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SupervisorConfig = toml::from_str(
            r#"
            high_watermark = 0.85
            grow_step = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.grow_step, 20);
        assert_eq!(config.shrink_step, 5);
        assert_eq!(config.monitor_interval(), Duration::from_secs(5));
    }
}
