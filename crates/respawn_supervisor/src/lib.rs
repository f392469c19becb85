//! # RESPAWN Supervisor
//!
//! Cross-pool monitoring and adaptive sizing.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   register(id)   ┌──────────────────┐
//! │ WaveSpawner  │─────────────────>│                  │
//! └──────────────┘                  │  PoolSupervisor  │──> optimize(n)
//! ┌──────────────┐   register(id)   │  (own interval)  │──> preload(n)
//! │ CombatText   │─────────────────>│                  │──> clear()
//! └──────────────┘                  └──────────────────┘
//! ```
//!
//! The supervisor holds [`respawn_core::SharedOwner`] handles and nothing
//! else. It samples, decides, and issues commands; owners do the work.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod supervisor;

pub use config::{SupervisorConfig, SupervisorError, SupervisorResult};
pub use supervisor::{
    plan_resize, MonitorReport, OptimizationCommand, OptimizationReason, PoolSupervisor,
    PoolUtilizationSample, SupervisorStats,
};
