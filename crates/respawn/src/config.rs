//! # Runtime Configuration
//!
//! One TOML file, one table per component. Every field has a default, so a
//! file only lists what it changes:
//!
//! ```toml
//! [supervisor]
//! high_watermark = 0.85
//!
//! [waves]
//! max_active = 30
//! seed = 42
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use respawn_supervisor::SupervisorConfig;

use crate::combat_text::CombatTextConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::waves::WaveConfig;

/// Frame pacing and channel sizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameLoopConfig {
    /// Capacity of each event channel.
    pub event_capacity: usize,
    /// Target frames per second.
    pub target_fps: u32,
    /// Log frames that exceed the budget.
    pub enable_timing_logs: bool,
}

impl Default for GameLoopConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            target_fps: 60,
            enable_timing_logs: false,
        }
    }
}

/// Everything the runtime needs at startup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Frame loop.
    pub game_loop: GameLoopConfig,
    /// Cross-pool supervisor.
    pub supervisor: SupervisorConfig,
    /// Enemy waves.
    pub waves: WaveConfig,
    /// Floating combat text.
    pub combat_text: CombatTextConfig,
}

impl RuntimeConfig {
    /// Low-memory preset: tighter supervisor budget, smaller pools.
    #[must_use]
    pub fn low_memory() -> Self {
        Self {
            supervisor: SupervisorConfig::low_memory(),
            waves: WaveConfig {
                initial_pool_size: 10,
                max_pool_size: 30,
                max_active_ceiling: 25,
                ..WaveConfig::default()
            },
            combat_text: CombatTextConfig {
                initial_size: 10,
                max_size: 40,
                ..CombatTextConfig::default()
            },
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Config`] on syntax errors or inconsistent values.
    pub fn from_toml_str(source: &str) -> RuntimeResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn load<P: AsRef<Path>>(path: P) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!("loaded runtime config from {}", path.display());
        Ok(config)
    }

    /// Checks every table.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Config`] describing the first problem.
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.game_loop.event_capacity == 0 || self.game_loop.target_fps == 0 {
            return Err(RuntimeError::Config(
                "game_loop: event_capacity and target_fps must be positive".into(),
            ));
        }
        self.supervisor.validate()?;
        self.waves.validate()?;
        self.combat_text.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_partial_tables() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [supervisor]
            high_watermark = 0.85

            [waves]
            max_active = 30
            seed = 42

            [[waves.templates]]
            name = "brute"
            max_health = 400
            speed = 2.0
            "#,
        )
        .unwrap();

        assert!((config.supervisor.high_watermark - 0.85).abs() < f64::EPSILON);
        assert_eq!(config.supervisor.grow_step, 10);
        assert_eq!(config.waves.max_active, 30);
        assert_eq!(config.waves.seed, 42);
        assert_eq!(config.waves.templates.len(), 1);
        assert_eq!(config.waves.templates[0].name, "brute");
        assert_eq!(config.combat_text, CombatTextConfig::default());
    }

    #[test]
    fn test_inconsistent_values_rejected() {
        let err = RuntimeConfig::from_toml_str(
            r#"
            [waves]
            min_distance = 50.0
            max_distance = 10.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));

        let err = RuntimeConfig::from_toml_str(
            r#"
            [supervisor]
            low_watermark = 0.95
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("low_watermark"));
    }

    #[test]
    fn test_non_finite_distances_rejected() {
        for document in [
            "[waves]\nmin_distance = nan",
            "[waves]\nmax_distance = nan",
            "[waves]\nmax_distance = inf\ndespawn_distance = inf",
        ] {
            let err = RuntimeConfig::from_toml_str(document).unwrap_err();
            assert!(err.to_string().contains("finite"), "{document}: {err}");
        }
    }

    #[test]
    fn test_pool_below_population_rejected() {
        let err = RuntimeConfig::from_toml_str(
            r#"
            [waves]
            initial_pool_size = 5
            max_pool_size = 5
            max_active = 20
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_pool_size"));
    }

    #[test]
    fn test_syntax_error_is_config_error() {
        let err = RuntimeConfig::from_toml_str("[waves\nmax_active = 3").unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RuntimeConfig::load("/nonexistent/respawn.toml").unwrap_err();
        assert!(matches!(err, RuntimeError::Io(_)));
    }

    #[test]
    fn test_low_memory_preset_is_valid() {
        assert!(RuntimeConfig::low_memory().validate().is_ok());
    }
}
