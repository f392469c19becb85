//! # Generic Pool
//!
//! Bounded pool of reusable units with on-demand growth and LRU forced reclaim.
//!
//! ## Views
//!
//! Every unit lives in a slot of one table (the "all units" view). On top of
//! that table the pool keeps two disjoint views:
//!
//! - **Available**: FIFO queue of slot indices ready to hand out.
//! - **Active**: intrusive doubly-linked list threaded through the slots,
//!   ordered by acquisition time. The head is the least recently acquired
//!   unit and is the one taken by a forced reclaim.
//!
//! `available + active == total` and `total <= max_size` hold whenever a
//! public method returns.
//!
//! ## Handles
//!
//! A [`UnitHandle`] is an index plus the slot generation. The generation
//! advances on every activation, so a handle kept past its release (or past
//! a forced reclaim) no longer resolves. That is what makes double releases
//! and late timer callbacks harmless.

use std::collections::VecDeque;
use std::fmt;

use crate::error::{HookResult, PoolError, PoolResult};

/// A unit that can live in a [`GenericPool`].
///
/// The pool calls `activate`/`deactivate` around every activation cycle;
/// what "active" means for the external representation (visible, simulated,
/// parented) is up to the implementor.
pub trait Poolable: Send + 'static {
    /// Makes the external representation live. Called before `on_acquire`.
    fn activate(&mut self) {}

    /// Hides the external representation. Called after `on_release`.
    fn deactivate(&mut self) {}

    /// Whether the unit is still usable.
    ///
    /// Units reporting `false` are dropped by [`GenericPool::validate_integrity`].
    fn is_alive(&self) -> bool {
        true
    }

    /// Approximate memory footprint in bytes, for supervisor budgeting.
    fn estimated_bytes(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

/// Handle to a unit in a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UnitHandle {
    /// Slot index.
    index: u32,
    /// Activation generation of the slot when this handle was issued.
    generation: u32,
}

impl UnitHandle {
    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Returns the activation generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Lifecycle state of a pooled unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitState {
    /// Waiting in the available queue.
    Available,
    /// Handed out to a caller.
    Active,
}

type Factory<T> = Box<dyn FnMut() -> T + Send>;
type Hook<T> = Box<dyn FnMut(&mut T) -> HookResult + Send>;

/// One entry in the all-units table.
struct Slot<T> {
    /// `None` when the slot is vacant (disposed, awaiting reuse).
    unit: Option<T>,
    state: UnitState,
    generation: u32,
    /// Active-list links.
    prev: Option<usize>,
    next: Option<usize>,
}

impl<T> Slot<T> {
    const fn vacant() -> Self {
        Self {
            unit: None,
            state: UnitState::Available,
            generation: 0,
            prev: None,
            next: None,
        }
    }
}

/// Builder and configuration for a [`GenericPool`].
///
/// # Example
///
/// ```rust,ignore
/// let pool = PoolBuilder::new("sparks")
///     .factory(Spark::default)
///     .initial_size(10)
///     .max_size(50)
///     .allow_growth(true)
///     .build()?;
/// ```
pub struct PoolBuilder<T> {
    label: String,
    factory: Option<Factory<T>>,
    initial_size: usize,
    max_size: usize,
    allow_growth: bool,
    on_acquire: Option<Hook<T>>,
    on_release: Option<Hook<T>>,
    on_dispose: Option<Hook<T>>,
}

impl<T: Poolable> PoolBuilder<T> {
    /// Default maximum size.
    pub const DEFAULT_MAX_SIZE: usize = 100;

    /// Creates a builder with no factory, `initial_size = 0`,
    /// `max_size = 100` and growth enabled.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            factory: None,
            initial_size: 0,
            max_size: Self::DEFAULT_MAX_SIZE,
            allow_growth: true,
            on_acquire: None,
            on_release: None,
            on_dispose: None,
        }
    }

    /// Sets the unit factory.
    #[must_use]
    pub fn factory(mut self, factory: impl FnMut() -> T + Send + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Number of units constructed up front.
    #[must_use]
    pub fn initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = initial_size;
        self
    }

    /// Hard ceiling on the number of units.
    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Whether `acquire` may construct units beyond the prewarmed set.
    #[must_use]
    pub fn allow_growth(mut self, allow_growth: bool) -> Self {
        self.allow_growth = allow_growth;
        self
    }

    /// Hook run after a unit becomes Active.
    #[must_use]
    pub fn on_acquire(mut self, hook: impl FnMut(&mut T) -> HookResult + Send + 'static) -> Self {
        self.on_acquire = Some(Box::new(hook));
        self
    }

    /// Hook run before a unit leaves Active.
    #[must_use]
    pub fn on_release(mut self, hook: impl FnMut(&mut T) -> HookResult + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Hook run when a unit is destroyed (clear or shrink).
    #[must_use]
    pub fn on_dispose(mut self, hook: impl FnMut(&mut T) -> HookResult + Send + 'static) -> Self {
        self.on_dispose = Some(Box::new(hook));
        self
    }

    /// Builds the pool and prewarms `initial_size` units.
    ///
    /// # Errors
    ///
    /// - [`PoolError::MissingFactory`] if no factory was set.
    /// - [`PoolError::InvalidConfig`] if `max_size == 0` or
    ///   `initial_size > max_size`.
    pub fn build(self) -> PoolResult<GenericPool<T>> {
        if self.max_size == 0 {
            return Err(PoolError::InvalidConfig {
                pool: self.label,
                reason: "max_size must be at least 1".into(),
            });
        }
        if self.initial_size > self.max_size {
            return Err(PoolError::InvalidConfig {
                reason: format!(
                    "initial_size ({}) exceeds max_size ({})",
                    self.initial_size, self.max_size
                ),
                pool: self.label,
            });
        }
        let Some(factory) = self.factory else {
            return Err(PoolError::MissingFactory(self.label));
        };

        let mut pool = GenericPool {
            label: self.label,
            slots: Vec::with_capacity(self.initial_size),
            vacant: Vec::new(),
            available: VecDeque::with_capacity(self.initial_size),
            lru_head: None,
            lru_tail: None,
            active_count: 0,
            total_count: 0,
            max_size: self.max_size,
            allow_growth: self.allow_growth,
            factory,
            on_acquire: self.on_acquire,
            on_release: self.on_release,
            on_dispose: self.on_dispose,
            counters: Counters::default(),
        };

        // Prewarm straight into Available, no membership checks.
        for _ in 0..self.initial_size {
            let index = pool.construct();
            pool.available.push_back(index);
        }

        Ok(pool)
    }
}

impl<T: Poolable + Default> PoolBuilder<T> {
    /// Uses `T::default` as the factory.
    #[must_use]
    pub fn with_default_factory(self) -> Self {
        self.factory(T::default)
    }
}

/// Lifetime counters.
#[derive(Clone, Copy, Debug, Default)]
struct Counters {
    created: u64,
    acquired: u64,
    released: u64,
    forced_reclaims: u64,
    exhausted: u64,
    disposed: u64,
}

/// Snapshot of pool counts and lifetime counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Units currently owned by the pool.
    pub total: usize,
    /// Units handed out.
    pub active: usize,
    /// Units waiting in the available queue.
    pub available: usize,
    /// Current ceiling.
    pub max_size: usize,
    /// Units constructed over the pool's lifetime.
    pub created: u64,
    /// Successful acquires (including forced reclaims).
    pub acquired: u64,
    /// Explicit releases.
    pub released: u64,
    /// Acquires satisfied by reclaiming an Active unit.
    pub forced_reclaims: u64,
    /// Acquires that returned `None`.
    pub exhausted: u64,
    /// Units destroyed by clear, shrink or integrity repair.
    pub disposed: u64,
}

impl PoolStats {
    /// Active / total, or 0 for an empty pool.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.active as f64 / self.total as f64
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} active ({} available, max {}, {:.0}% used) | created {} acquired {} released {} reclaimed {} exhausted {} disposed {}",
            self.active,
            self.total,
            self.available,
            self.max_size,
            self.utilization() * 100.0,
            self.created,
            self.acquired,
            self.released,
            self.forced_reclaims,
            self.exhausted,
            self.disposed,
        )
    }
}

/// Result of a [`GenericPool::resize`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResizeOutcome {
    /// Total before the resize.
    pub previous_total: usize,
    /// Total after the resize.
    pub total: usize,
    /// Units constructed.
    pub created: usize,
    /// Units disposed.
    pub disposed: usize,
}

/// A bounded pool of reusable units.
///
/// # Thread Safety
///
/// Not internally synchronized. One owner mutates it; share the owner
/// behind a lock if other components need to reach it.
pub struct GenericPool<T> {
    label: String,
    slots: Vec<Slot<T>>,
    /// Slot indices whose unit was disposed.
    vacant: Vec<usize>,
    available: VecDeque<usize>,
    lru_head: Option<usize>,
    lru_tail: Option<usize>,
    active_count: usize,
    total_count: usize,
    max_size: usize,
    allow_growth: bool,
    factory: Factory<T>,
    on_acquire: Option<Hook<T>>,
    on_release: Option<Hook<T>>,
    on_dispose: Option<Hook<T>>,
    counters: Counters,
}

impl<T: Poolable> GenericPool<T> {
    /// Returns the pool label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Units owned by the pool.
    #[inline]
    #[must_use]
    pub const fn total_count(&self) -> usize {
        self.total_count
    }

    /// Units handed out.
    #[inline]
    #[must_use]
    pub const fn active_count(&self) -> usize {
        self.active_count
    }

    /// Units ready to hand out.
    #[inline]
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    /// Current ceiling.
    #[inline]
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Whether `acquire` may construct new units.
    #[inline]
    #[must_use]
    pub const fn allow_growth(&self) -> bool {
        self.allow_growth
    }

    /// Acquires a unit.
    ///
    /// Order of preference:
    /// 1. front of the available queue,
    /// 2. a newly constructed unit if growth is allowed and below `max_size`,
    /// 3. the least recently acquired Active unit (forced reclaim),
    /// 4. `None`. The caller should skip whatever needed the unit.
    ///
    /// A forced reclaim invalidates the previous owner's handle.
    pub fn acquire(&mut self) -> Option<UnitHandle> {
        let index = if let Some(index) = self.available.pop_front() {
            index
        } else if self.allow_growth && self.total_count < self.max_size {
            let index = self.construct();
            tracing::debug!(
                "pool '{}' grew to {}/{}",
                self.label,
                self.total_count,
                self.max_size
            );
            index
        } else if let Some(index) = self.lru_head {
            self.force_release(index);
            self.counters.forced_reclaims += 1;
            tracing::debug!("pool '{}' at capacity, reclaimed slot {}", self.label, index);
            index
        } else {
            self.counters.exhausted += 1;
            tracing::debug!("pool '{}' exhausted ({} units)", self.label, self.total_count);
            return None;
        };

        Some(self.activate_slot(index))
    }

    /// Releases a unit back to the pool.
    ///
    /// Returns `false` (and logs a warning) if the handle is stale or the
    /// unit is not Active. A second release of the same handle is a no-op.
    pub fn release(&mut self, handle: UnitHandle) -> bool {
        let Some(index) = self.resolve_active(handle) else {
            tracing::warn!(
                "pool '{}': release of {} ignored, unit is not active",
                self.label,
                handle
            );
            return false;
        };

        self.force_release(index);
        self.available.push_back(index);
        self.counters.released += 1;
        true
    }

    /// Constructs up to `count` additional units into the available queue.
    ///
    /// Returns the number of units created, bounded by `max_size - total`.
    pub fn preload(&mut self, count: usize) -> usize {
        let room = self.max_size.saturating_sub(self.total_count);
        let count = count.min(room);
        for _ in 0..count {
            let index = self.construct();
            self.available.push_back(index);
        }
        count
    }

    /// Disposes every unit and empties all views.
    pub fn clear(&mut self) {
        for index in 0..self.slots.len() {
            if self.slots[index].unit.is_some() {
                self.dispose_slot(index);
            }
            let slot = &mut self.slots[index];
            slot.state = UnitState::Available;
            slot.prev = None;
            slot.next = None;
        }
        self.available.clear();
        self.lru_head = None;
        self.lru_tail = None;
        self.active_count = 0;
        tracing::debug!("pool '{}' cleared", self.label);
    }

    /// Resizes the pool toward `target` units.
    ///
    /// The target is clamped so Active units are never evicted. Growing
    /// raises `max_size` if needed and prewarms; shrinking disposes the
    /// least recently released available units and lowers `max_size`.
    pub fn resize(&mut self, target: usize) -> ResizeOutcome {
        let target = target.max(self.active_count).max(1);
        let previous_total = self.total_count;
        let mut outcome = ResizeOutcome {
            previous_total,
            ..ResizeOutcome::default()
        };

        if target >= self.total_count {
            self.max_size = self.max_size.max(target);
            outcome.created = self.preload(target - self.total_count);
        } else {
            while self.total_count > target {
                let Some(index) = self.available.pop_front() else {
                    break;
                };
                self.dispose_slot(index);
                outcome.disposed += 1;
            }
            self.max_size = target.max(self.total_count);
        }

        outcome.total = self.total_count;
        tracing::debug!(
            "pool '{}' resized {} -> {} (max {}, +{} -{})",
            self.label,
            previous_total,
            self.total_count,
            self.max_size,
            outcome.created,
            outcome.disposed
        );
        outcome
    }

    /// Checks the pool invariants and drops dead units.
    ///
    /// Returns `true` if the pool was consistent and held no dead units.
    /// Off the hot path: this walks every slot.
    pub fn validate_integrity(&mut self) -> bool {
        let mut consistent = true;

        let dead: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.unit.as_ref().is_some_and(|unit| !unit.is_alive()))
            .map(|(index, _)| index)
            .collect();
        for &index in &dead {
            match self.slots[index].state {
                UnitState::Active => {
                    self.unlink(index);
                    self.active_count -= 1;
                    self.slots[index].state = UnitState::Available;
                }
                UnitState::Available => self.available.retain(|&i| i != index),
            }
            self.slots[index].unit = None;
            self.vacant.push(index);
            self.total_count -= 1;
            self.counters.disposed += 1;
        }
        if !dead.is_empty() {
            tracing::warn!(
                "pool '{}': dropped {} dead units during validation",
                self.label,
                dead.len()
            );
            consistent = false;
        }

        let occupied = self.slots.iter().filter(|slot| slot.unit.is_some()).count();
        let linked = self.active_indices().count();
        let queued_active = self
            .available
            .iter()
            .filter(|&&i| self.slots[i].state == UnitState::Active || self.slots[i].unit.is_none())
            .count();

        if linked != self.active_count || queued_active > 0 {
            tracing::warn!(
                "pool '{}': view mismatch (linked {}, active {}, bad queue entries {})",
                self.label,
                linked,
                self.active_count,
                queued_active
            );
            self.active_count = linked;
            consistent = false;
        }
        if self.available.len() + self.active_count != self.total_count || occupied != self.total_count {
            tracing::warn!(
                "pool '{}': count invariant violated ({} available + {} active != {} total, {} occupied)",
                self.label,
                self.available.len(),
                self.active_count,
                self.total_count,
                occupied
            );
            self.total_count = occupied;
            consistent = false;
        }
        if self.total_count > self.max_size {
            tracing::warn!(
                "pool '{}': {} units exceed max_size {}",
                self.label,
                self.total_count,
                self.max_size
            );
            consistent = false;
        }

        consistent
    }

    /// Whether `handle` refers to a currently Active unit.
    #[must_use]
    pub fn is_active(&self, handle: UnitHandle) -> bool {
        self.resolve_active(handle).is_some()
    }

    /// Gets an Active unit.
    #[must_use]
    pub fn get(&self, handle: UnitHandle) -> Option<&T> {
        let index = self.resolve_active(handle)?;
        self.slots[index].unit.as_ref()
    }

    /// Gets an Active unit mutably.
    pub fn get_mut(&mut self, handle: UnitHandle) -> Option<&mut T> {
        let index = self.resolve_active(handle)?;
        self.slots[index].unit.as_mut()
    }

    /// Handles of all Active units, least recently acquired first.
    #[must_use]
    pub fn active_handles(&self) -> Vec<UnitHandle> {
        self.active_indices().map(|index| self.handle_for(index)).collect()
    }

    /// Iterates Active units, least recently acquired first.
    pub fn iter_active(&self) -> impl Iterator<Item = (UnitHandle, &T)> + '_ {
        self.active_indices().filter_map(move |index| {
            self.slots[index]
                .unit
                .as_ref()
                .map(|unit| (self.handle_for(index), unit))
        })
    }

    /// Sum of [`Poolable::estimated_bytes`] over all units.
    #[must_use]
    pub fn estimated_memory_bytes(&self) -> usize {
        self.slots
            .iter()
            .filter_map(|slot| slot.unit.as_ref())
            .map(|unit| unit.estimated_bytes())
            .sum()
    }

    /// Returns a snapshot of counts and counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total: self.total_count,
            active: self.active_count,
            available: self.available.len(),
            max_size: self.max_size,
            created: self.counters.created,
            acquired: self.counters.acquired,
            released: self.counters.released,
            forced_reclaims: self.counters.forced_reclaims,
            exhausted: self.counters.exhausted,
            disposed: self.counters.disposed,
        }
    }

    fn construct(&mut self) -> usize {
        let unit = (self.factory)();
        let index = if let Some(index) = self.vacant.pop() {
            self.slots[index].unit = Some(unit);
            self.slots[index].state = UnitState::Available;
            index
        } else {
            let mut slot = Slot::vacant();
            slot.unit = Some(unit);
            self.slots.push(slot);
            self.slots.len() - 1
        };
        self.total_count += 1;
        self.counters.created += 1;
        index
    }

    fn activate_slot(&mut self, index: usize) -> UnitHandle {
        {
            let slot = &mut self.slots[index];
            slot.generation = slot.generation.wrapping_add(1);
            slot.state = UnitState::Active;
        }
        self.link_tail(index);
        self.active_count += 1;
        self.counters.acquired += 1;

        if let Some(unit) = self.slots[index].unit.as_mut() {
            unit.activate();
            if let Some(hook) = self.on_acquire.as_mut() {
                log_hook_fault(&self.label, "acquire", hook(unit));
            }
        }

        self.handle_for(index)
    }

    /// Moves an Active slot out of the Active view without queueing it.
    ///
    /// Skips the membership check; callers guarantee the slot is Active.
    fn force_release(&mut self, index: usize) {
        self.unlink(index);
        self.active_count -= 1;
        self.slots[index].state = UnitState::Available;

        if let Some(unit) = self.slots[index].unit.as_mut() {
            if let Some(hook) = self.on_release.as_mut() {
                log_hook_fault(&self.label, "release", hook(unit));
            }
            unit.deactivate();
        }
    }

    /// Destroys the unit in a slot that is no longer in any view.
    fn dispose_slot(&mut self, index: usize) {
        if let Some(mut unit) = self.slots[index].unit.take() {
            if let Some(hook) = self.on_dispose.as_mut() {
                log_hook_fault(&self.label, "dispose", hook(&mut unit));
            }
            self.total_count -= 1;
            self.counters.disposed += 1;
            self.vacant.push(index);
        }
    }

    fn resolve_active(&self, handle: UnitHandle) -> Option<usize> {
        let index = handle.index();
        let slot = self.slots.get(index)?;
        (slot.unit.is_some() && slot.state == UnitState::Active && slot.generation == handle.generation)
            .then_some(index)
    }

    fn handle_for(&self, index: usize) -> UnitHandle {
        UnitHandle {
            index: u32::try_from(index).unwrap_or(u32::MAX),
            generation: self.slots[index].generation,
        }
    }

    fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        // Bounded by the slot count so a corrupted list cannot loop forever.
        std::iter::successors(self.lru_head, move |&index| self.slots[index].next).take(self.slots.len())
    }

    fn link_tail(&mut self, index: usize) {
        self.slots[index].prev = self.lru_tail;
        self.slots[index].next = None;
        match self.lru_tail {
            Some(tail) => self.slots[tail].next = Some(index),
            None => self.lru_head = Some(index),
        }
        self.lru_tail = Some(index);
    }

    fn unlink(&mut self, index: usize) {
        let prev = self.slots[index].prev.take();
        let next = self.slots[index].next.take();
        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.lru_head = next,
        }
        match next {
            Some(next) => self.slots[next].prev = prev,
            None => self.lru_tail = prev,
        }
    }
}

fn log_hook_fault(label: &str, stage: &'static str, result: HookResult) {
    if let Err(source) = result {
        let err = PoolError::Hook { stage, source };
        tracing::warn!("pool '{}': {}", label, err);
    }
}

impl<T> fmt::Debug for GenericPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericPool")
            .field("label", &self.label)
            .field("total", &self.total_count)
            .field("active", &self.active_count)
            .field("available", &self.available.len())
            .field("max_size", &self.max_size)
            .field("allow_growth", &self.allow_growth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct Spark {
        id: u32,
        visible: bool,
        alive: bool,
        resets: u32,
    }

    impl Poolable for Spark {
        fn activate(&mut self) {
            self.visible = true;
        }

        fn deactivate(&mut self) {
            self.visible = false;
        }

        fn is_alive(&self) -> bool {
            self.alive
        }
    }

    fn spark_pool(initial: usize, max: usize, growth: bool) -> GenericPool<Spark> {
        let next_id = Arc::new(AtomicU32::new(0));
        PoolBuilder::new("sparks")
            .factory(move || Spark {
                id: next_id.fetch_add(1, Ordering::Relaxed),
                visible: false,
                alive: true,
                resets: 0,
            })
            .initial_size(initial)
            .max_size(max)
            .allow_growth(growth)
            .build()
            .unwrap()
    }

    fn assert_invariants(pool: &GenericPool<Spark>) {
        assert_eq!(
            pool.available_count() + pool.active_count(),
            pool.total_count()
        );
        assert!(pool.total_count() <= pool.max_size());
    }

    #[test]
    fn test_build_requires_factory() {
        let result = PoolBuilder::<Spark>::new("empty").initial_size(1).build();
        assert_eq!(result.unwrap_err(), PoolError::MissingFactory("empty".into()));
    }

    #[test]
    fn test_build_rejects_bad_sizes() {
        let zero = PoolBuilder::<Spark>::new("zero")
            .with_default_factory()
            .max_size(0)
            .build();
        assert!(matches!(zero, Err(PoolError::InvalidConfig { .. })));

        let too_many = PoolBuilder::<Spark>::new("big")
            .with_default_factory()
            .initial_size(5)
            .max_size(2)
            .build();
        assert!(matches!(too_many, Err(PoolError::InvalidConfig { .. })));
    }

    #[test]
    fn test_prewarm() {
        let pool = spark_pool(10, 50, true);
        assert_eq!(pool.total_count(), 10);
        assert_eq!(pool.available_count(), 10);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.stats().created, 10);
    }

    #[test]
    fn test_acquire_release_round_trip() {
        let mut pool = spark_pool(4, 8, true);
        let before = (pool.available_count(), pool.active_count());

        let handle = pool.acquire().unwrap();
        assert!(pool.get(handle).unwrap().visible);
        assert!(pool.release(handle));

        assert_eq!((pool.available_count(), pool.active_count()), before);
        assert_invariants(&pool);
    }

    #[test]
    fn test_double_release_is_noop() {
        let mut pool = spark_pool(2, 2, false);
        let handle = pool.acquire().unwrap();
        assert!(pool.release(handle));

        let stats = pool.stats();
        assert!(!pool.release(handle));
        let after = pool.stats();
        assert_eq!(stats.total, after.total);
        assert_eq!(stats.active, after.active);
        assert_eq!(stats.available, after.available);
    }

    #[test]
    fn test_no_double_issuance() {
        let mut pool = spark_pool(3, 20, true);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..20 {
            let handle = pool.acquire().unwrap();
            assert!(seen.insert(handle.index()), "slot issued twice");
        }
        assert_invariants(&pool);
    }

    #[test]
    fn test_growth_scenario() {
        let mut pool = spark_pool(10, 50, true);
        for _ in 0..10 {
            pool.acquire().unwrap();
        }
        assert_eq!(pool.active_count(), 10);
        assert_eq!(pool.available_count(), 0);

        pool.acquire().unwrap();
        assert_eq!(pool.total_count(), 11);
        assert_invariants(&pool);
    }

    #[test]
    fn test_forced_reclaim_takes_least_recent() {
        let mut pool = spark_pool(5, 5, false);
        let handles: Vec<_> = (0..5).map(|_| pool.acquire().unwrap()).collect();
        assert_eq!(pool.available_count(), 0);

        let reclaimed = pool.acquire().unwrap();
        assert_eq!(reclaimed.index(), handles[0].index());
        assert_ne!(reclaimed, handles[0]);
        assert_eq!(pool.total_count(), 5);
        assert_eq!(pool.stats().forced_reclaims, 1);

        // Previous owner's handle no longer resolves.
        assert!(!pool.is_active(handles[0]));
        assert!(!pool.release(handles[0]));
        assert!(pool.is_active(reclaimed));

        // Next reclaim moves on to the second oldest.
        let again = pool.acquire().unwrap();
        assert_eq!(again.index(), handles[1].index());
        assert_invariants(&pool);
    }

    #[test]
    fn test_reclaim_respects_release_order() {
        let mut pool = spark_pool(3, 3, false);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        let c = pool.acquire().unwrap();

        // Re-acquiring `a` makes it the most recent.
        pool.release(a);
        let a2 = pool.acquire().unwrap();
        assert_eq!(a2.index(), a.index());

        let reclaimed = pool.acquire().unwrap();
        assert_eq!(reclaimed.index(), b.index());
        assert!(pool.is_active(c));
    }

    #[test]
    fn test_zero_initial_without_growth_fails_gracefully() {
        let mut pool = spark_pool(0, 1, false);
        assert!(pool.acquire().is_none());
        assert!(pool.acquire().is_none());
        assert_eq!(pool.total_count(), 0);
        assert_eq!(pool.stats().exhausted, 2);
    }

    #[test]
    fn test_single_slot_never_exceeds_one() {
        let mut pool = spark_pool(0, 1, true);
        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert_eq!(pool.total_count(), 1);
        assert_eq!(first.index(), second.index());
        assert!(!pool.is_active(first));
    }

    #[test]
    fn test_hooks_run_and_faults_do_not_abort() {
        let released = Arc::new(AtomicU32::new(0));
        let released_hook = Arc::clone(&released);
        let mut pool = PoolBuilder::<Spark>::new("faulty")
            .factory(|| Spark {
                alive: true,
                ..Spark::default()
            })
            .initial_size(2)
            .max_size(2)
            .on_acquire(|spark: &mut Spark| {
                spark.resets += 1;
                Err(HookError::new("acquire hook exploded"))
            })
            .on_release(move |_| {
                released_hook.fetch_add(1, Ordering::Relaxed);
                Err("release hook exploded".into())
            })
            .build()
            .unwrap();

        let handle = pool.acquire().unwrap();
        assert_eq!(pool.get(handle).unwrap().resets, 1);
        assert_eq!(pool.active_count(), 1);

        assert!(pool.release(handle));
        assert_eq!(released.load(Ordering::Relaxed), 1);
        assert_eq!(pool.available_count(), 2);
    }

    #[test]
    fn test_preload_respects_ceiling() {
        let mut pool = spark_pool(2, 6, true);
        assert_eq!(pool.preload(10), 4);
        assert_eq!(pool.total_count(), 6);
        assert_eq!(pool.preload(1), 0);
    }

    #[test]
    fn test_clear_disposes_everything() {
        let disposed = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&disposed);
        let mut pool = PoolBuilder::<Spark>::new("clear")
            .with_default_factory()
            .initial_size(4)
            .max_size(4)
            .allow_growth(false)
            .on_dispose(move |_: &mut Spark| {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
            .build()
            .unwrap();

        let handle = pool.acquire().unwrap();
        pool.clear();

        assert_eq!(disposed.load(Ordering::Relaxed), 4);
        assert_eq!(pool.total_count(), 0);
        assert_eq!(pool.active_count(), 0);
        assert!(!pool.release(handle));
        assert!(pool.acquire().is_none());
    }

    #[test]
    fn test_handles_stay_unique_after_clear() {
        let mut pool = spark_pool(0, 2, true);
        let before = pool.acquire().unwrap();
        pool.clear();
        let after = pool.acquire().unwrap();
        assert_ne!(before, after);
        assert!(!pool.is_active(before));
    }

    #[test]
    fn test_resize_never_evicts_active() {
        let mut pool = spark_pool(10, 10, false);
        let held: Vec<_> = (0..4).map(|_| pool.acquire().unwrap()).collect();

        let outcome = pool.resize(2);
        assert_eq!(outcome.total, 4);
        assert_eq!(outcome.disposed, 6);
        assert_eq!(pool.max_size(), 4);
        assert!(held.iter().all(|&h| pool.is_active(h)));
        assert_invariants(&pool);

        let outcome = pool.resize(12);
        assert_eq!(outcome.created, 8);
        assert_eq!(pool.total_count(), 12);
        assert_eq!(pool.max_size(), 12);
        assert_invariants(&pool);
    }

    #[test]
    fn test_validate_drops_dead_units() {
        let mut pool = spark_pool(3, 3, false);
        let a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        assert!(pool.validate_integrity());

        pool.get_mut(a).unwrap().alive = false;
        assert!(!pool.validate_integrity());
        assert_eq!(pool.total_count(), 2);
        assert_eq!(pool.active_count(), 1);
        assert!(pool.validate_integrity());
        assert_invariants(&pool);
    }

    #[test]
    fn test_iter_active_in_acquire_order() {
        let mut pool = spark_pool(3, 3, false);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        let ids: Vec<u32> = pool.iter_active().map(|(_, s)| s.id).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(pool.active_handles(), vec![a, b]);
    }

    #[test]
    fn test_stats_display() {
        let mut pool = spark_pool(2, 4, true);
        pool.acquire();
        let text = pool.stats().to_string();
        assert!(text.starts_with("1/2 active"));
    }
}
