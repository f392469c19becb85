//! # RESPAWN
//!
//! Game-side pool owners and the composition root that drives them.
//!
//! ## Structure
//!
//! - [`waves`]: enemy population with waves, sweeps and a difficulty ramp
//! - [`combat_text`]: floating combat numbers that expire on their own
//! - [`events`]: death reports and combat feedback channels
//! - [`game_loop`]: builds everything, registers owners, ticks the clock
//!
//! ## Example
//!
//! ```rust,ignore
//! use respawn::{GameLoop, RuntimeConfig};
//! use respawn::spatial::{FixedAnchor, OpenGround, Vec3};
//!
//! let config = RuntimeConfig::load("config/runtime.toml")?;
//! let mut game = GameLoop::new(config, Box::new(FixedAnchor(Vec3::ZERO)), Box::new(OpenGround))?;
//! game.start();
//! loop {
//!     game.tick(frame_delta);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod combat_text;
pub mod config;
pub mod error;
pub mod events;
pub mod game_loop;
pub mod spatial;
pub mod waves;

pub use combat_text::{CombatTextConfig, CombatTextPool, DisplayRoot, FloatingText, TextKind, DEFAULT_TEXT_TTL};
pub use config::{GameLoopConfig, RuntimeConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use events::{EventBus, EventReceiver, EventSender, EventSystem, GameEvent};
pub use game_loop::{FrameStats, FrameStatsAccumulator, GameLoop, COMBAT_TEXT_ID, ENEMIES_ID};
pub use waves::{Enemy, EnemyFactory, EnemyTemplate, WaveConfig, WaveSpawner, WaveState};
