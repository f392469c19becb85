//! # Pool Owner Capability
//!
//! The narrow interface every pool owner exposes to the supervisor.
//!
//! The supervisor never sees a pool. It sees an owner that can report
//! counts and accept coarse commands (`optimize`, `preload`, `clear`).
//! Owners are registered explicitly under a stable [`OwnerId`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Bytes per megabyte, for memory estimates.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Capability contract implemented by every pool owner.
pub trait PoolOwner: Send {
    /// Human-readable owner name.
    fn name(&self) -> &str;

    /// Units owned by the underlying pool.
    fn total_count(&self) -> usize;

    /// Units currently handed out.
    fn active_count(&self) -> usize;

    /// Units ready to hand out.
    fn available_count(&self) -> usize;

    /// Estimated memory held by the pool, in megabytes.
    fn estimated_memory_mb(&self) -> f64;

    /// Whether the owner accepts `optimize` commands.
    fn can_optimize(&self) -> bool;

    /// Resizes the pool toward `new_size`. Must never evict Active units.
    fn optimize(&mut self, new_size: usize);

    /// Constructs up to `count` extra units. Returns how many were created.
    fn preload(&mut self, count: usize) -> usize;

    /// Disposes every unit.
    fn clear(&mut self);

    /// One-line diagnostic description.
    fn describe(&self) -> String;

    /// Active / total, or 0 for an empty pool.
    fn utilization(&self) -> f64 {
        let total = self.total_count();
        if total == 0 {
            return 0.0;
        }
        self.active_count() as f64 / total as f64
    }
}

/// Shared handle to a registered owner.
///
/// The owning component and the supervisor both hold one. Everything runs
/// on the update thread, so the lock is never contended.
pub type SharedOwner = Arc<Mutex<dyn PoolOwner>>;

/// Wraps an owner for registration, keeping a typed handle for the caller.
///
/// ```rust,ignore
/// let text = share(CombatTextPool::new(config, events)?);
/// supervisor.register("combat_text", text.clone());
/// text.lock().spawn(...);
/// ```
pub fn share<O: PoolOwner + 'static>(owner: O) -> Arc<Mutex<O>> {
    Arc::new(Mutex::new(owner))
}

/// Stable registry key for an owner.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(String);

impl OwnerId {
    /// Creates an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        total: usize,
        active: usize,
    }

    impl PoolOwner for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn total_count(&self) -> usize {
            self.total
        }
        fn active_count(&self) -> usize {
            self.active
        }
        fn available_count(&self) -> usize {
            self.total - self.active
        }
        fn estimated_memory_mb(&self) -> f64 {
            0.0
        }
        fn can_optimize(&self) -> bool {
            false
        }
        fn optimize(&mut self, _new_size: usize) {}
        fn preload(&mut self, _count: usize) -> usize {
            0
        }
        fn clear(&mut self) {}
        fn describe(&self) -> String {
            format!("{}/{}", self.active, self.total)
        }
    }

    #[test]
    fn test_default_utilization() {
        assert!((Fixed { total: 20, active: 19 }.utilization() - 0.95).abs() < 1e-9);
        assert_eq!(Fixed { total: 0, active: 0 }.utilization(), 0.0);
    }

    #[test]
    fn test_shared_owner_coerces() {
        let typed = share(Fixed { total: 4, active: 1 });
        let erased: SharedOwner = typed.clone();
        assert_eq!(erased.lock().describe(), "1/4");
        typed.lock().active = 2;
        assert_eq!(erased.lock().active_count(), 2);
    }

    #[test]
    fn test_owner_id_display() {
        let id = OwnerId::from("enemies");
        assert_eq!(id.to_string(), "enemies");
        assert_eq!(id, OwnerId::new(String::from("enemies")));
    }
}
