//! # RESPAWN Core
//!
//! Pooling primitives for a real-time game runtime:
//! - Bounded, growable object pools with LRU forced reclaim
//! - Tick-driven timers (no threads, no sleeping)
//! - The capability contract pool owners expose to the supervisor
//!
//! ## Architecture Rules
//!
//! 1. **Units are built once** - a unit is constructed at prewarm, preload or
//!    growth, and destroyed only by clear or an explicit shrink
//! 2. **Never block, never raise** - exhaustion is `None`, bad releases are
//!    logged no-ops, hook faults are logged and ignored
//! 3. **Re-validate on resume** - deferred work carries a [`UnitHandle`] whose
//!    generation must still match when the work runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use respawn_core::{GenericPool, PoolBuilder};
//!
//! let mut pool = PoolBuilder::new("sparks")
//!     .factory(Spark::default)
//!     .initial_size(10)
//!     .max_size(50)
//!     .build()?;
//!
//! if let Some(handle) = pool.acquire() {
//!     pool.release(handle);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod owner;
pub mod pool;
pub mod timer;

pub use error::{HookError, HookResult, PoolError, PoolResult};
pub use owner::{share, OwnerId, PoolOwner, SharedOwner, BYTES_PER_MB};
pub use pool::{GenericPool, PoolBuilder, PoolStats, Poolable, ResizeOutcome, UnitHandle, UnitState};
pub use timer::{GameClock, Interval, TimerId, TimerQueue, MAX_FRAME_STEP};
