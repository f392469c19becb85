//! # Floating Combat Text
//!
//! Pooled damage/heal/experience numbers that expire on their own.
//!
//! ## Lifecycle
//!
//! ```text
//! spawn ──> acquire (reset hook) ──> fill text/color ──> schedule expiry
//!                                                             │
//!   recycle(handle) ─────────────┐                            │
//!                                v                            v
//!                            release <──── update(now): handle still active?
//! ```
//!
//! Each slot remembers the expiry timer of its current activation. A slot
//! that is reacquired cancels whatever timer its previous activation left
//! behind, and a timer that fires for a handle that is no longer active is a
//! no-op. Either guard alone prevents a late expiry from releasing the next
//! owner's text; both keep the timer queue short.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use respawn_core::{
    GenericPool, PoolBuilder, PoolOwner, Poolable, TimerId, TimerQueue, UnitHandle, BYTES_PER_MB,
};

use crate::error::{RuntimeError, RuntimeResult};
use crate::events::{EventReceiver, GameEvent};
use crate::spatial::Vec3;

/// Lifetime of a floating number when the caller gives none.
pub const DEFAULT_TEXT_TTL: Duration = Duration::from_millis(1_500);

/// Scale applied to critical hits.
pub const CRITICAL_SCALE: f32 = 1.5;

/// RGBA colour, 0..1 per channel.
pub type Color = [f32; 4];

/// Colour of a freshly reset text unit.
pub const WHITE: Color = [1.0, 1.0, 1.0, 1.0];

/// What a floating number means, which decides how it reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextKind {
    /// Regular damage: `25`
    Damage,
    /// Critical damage: `25!`, enlarged
    Critical,
    /// Healing: `+25`
    Heal,
    /// Miss: `MISS` (amount ignored)
    Miss,
    /// Experience gain: `+25 XP`
    Experience,
}

impl TextKind {
    /// Text shown for `amount`.
    #[must_use]
    pub fn format(self, amount: u32) -> String {
        match self {
            Self::Damage => amount.to_string(),
            Self::Critical => format!("{amount}!"),
            Self::Heal => format!("+{amount}"),
            Self::Miss => "MISS".to_owned(),
            Self::Experience => format!("+{amount} XP"),
        }
    }

    /// Text colour.
    #[must_use]
    pub const fn color(self) -> Color {
        match self {
            Self::Damage => [1.0, 1.0, 1.0, 1.0],
            Self::Critical => [1.0, 0.85, 0.1, 1.0],
            Self::Heal => [0.3, 1.0, 0.3, 1.0],
            Self::Miss => [0.6, 0.6, 0.6, 1.0],
            Self::Experience => [0.55, 0.4, 1.0, 1.0],
        }
    }

    /// Display scale.
    #[must_use]
    pub const fn scale(self) -> f32 {
        match self {
            Self::Critical => CRITICAL_SCALE,
            _ => 1.0,
        }
    }
}

/// Display parent a text unit is attached to (HUD layer, world canvas).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DisplayRoot(pub u32);

impl DisplayRoot {
    /// The world-space overlay.
    pub const WORLD: Self = Self(0);
}

/// One floating number.
#[derive(Clone, Debug)]
pub struct FloatingText {
    /// Rendered text.
    pub text: String,
    /// Rendered colour.
    pub color: Color,
    /// Uniform scale.
    pub scale: f32,
    /// Rotation around the view axis (radians).
    pub rotation: f32,
    /// World position.
    pub position: Vec3,
    /// Kind of the current activation.
    pub kind: TextKind,
    /// Attached display parent, `None` while pooled.
    pub parent: Option<DisplayRoot>,
    /// Whether the text is shown.
    pub visible: bool,
}

impl FloatingText {
    /// Restores the defaults every activation starts from.
    pub fn reset(&mut self) {
        self.text.clear();
        self.color = WHITE;
        self.scale = 1.0;
        self.rotation = 0.0;
    }
}

impl Default for FloatingText {
    fn default() -> Self {
        Self {
            text: String::with_capacity(8),
            color: WHITE,
            scale: 1.0,
            rotation: 0.0,
            position: Vec3::ZERO,
            kind: TextKind::Damage,
            parent: None,
            visible: false,
        }
    }
}

impl Poolable for FloatingText {
    fn activate(&mut self) {
        self.visible = true;
    }

    fn deactivate(&mut self) {
        self.visible = false;
        self.parent = None;
    }

    fn estimated_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.text.capacity()
    }
}

/// Configuration for [`CombatTextPool`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTextConfig {
    /// Units built at startup.
    pub initial_size: usize,
    /// Ceiling.
    pub max_size: usize,
    /// Whether spawns may build new units.
    pub allow_growth: bool,
    /// Lifetime used when `spawn` gets no TTL (ms).
    pub default_ttl_ms: u64,
}

impl Default for CombatTextConfig {
    fn default() -> Self {
        Self {
            initial_size: 20,
            max_size: 100,
            allow_growth: true,
            default_ttl_ms: 1_500,
        }
    }
}

impl CombatTextConfig {
    /// Default lifetime.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Checks sizes and lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Config`] describing the first problem.
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.max_size == 0 || self.initial_size > self.max_size {
            return Err(RuntimeError::Config(format!(
                "combat_text: initial_size {} / max_size {} out of range",
                self.initial_size, self.max_size
            )));
        }
        if self.default_ttl_ms == 0 {
            return Err(RuntimeError::Config("combat_text: default_ttl_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Pool of floating combat numbers.
pub struct CombatTextPool {
    pool: GenericPool<FloatingText>,
    expiries: TimerQueue<UnitHandle>,
    /// Slot index -> expiry timer of the slot's current activation.
    pending: HashMap<usize, TimerId>,
    default_ttl: Duration,
    root: DisplayRoot,
    feedback: Option<EventReceiver>,
    spawned: u64,
    expired: u64,
    skipped: u64,
}

impl CombatTextPool {
    /// Builds the pool and prewarms `initial_size` units.
    ///
    /// `feedback` is the combat channel drained on every `update`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] if the configuration is invalid.
    pub fn new(config: &CombatTextConfig, feedback: Option<EventReceiver>) -> RuntimeResult<Self> {
        config.validate()?;
        let pool = PoolBuilder::new("combat_text")
            .with_default_factory()
            .initial_size(config.initial_size)
            .max_size(config.max_size)
            .allow_growth(config.allow_growth)
            .on_acquire(|text: &mut FloatingText| {
                text.reset();
                Ok(())
            })
            .build()?;

        Ok(Self {
            pool,
            expiries: TimerQueue::new(),
            pending: HashMap::new(),
            default_ttl: config.default_ttl(),
            root: DisplayRoot::WORLD,
            feedback,
            spawned: 0,
            expired: 0,
            skipped: 0,
        })
    }

    /// Parent used for texts spawned from combat events.
    #[must_use]
    pub fn with_root(mut self, root: DisplayRoot) -> Self {
        self.root = root;
        self
    }

    /// Shows a number at `position` for `ttl` (or the default lifetime).
    ///
    /// Returns `None` when the pool is exhausted; the number is simply not shown.
    pub fn spawn(
        &mut self,
        now: Duration,
        value: u32,
        kind: TextKind,
        position: Vec3,
        parent: DisplayRoot,
        ttl: Option<Duration>,
    ) -> Option<UnitHandle> {
        let Some(handle) = self.pool.acquire() else {
            self.skipped += 1;
            return None;
        };

        if let Some(stale) = self.pending.remove(&handle.index()) {
            self.expiries.cancel(stale);
        }

        if let Some(text) = self.pool.get_mut(handle) {
            text.text = kind.format(value);
            text.color = kind.color();
            text.scale = kind.scale();
            text.position = position;
            text.kind = kind;
            text.parent = Some(parent);
        }

        let ttl = ttl.unwrap_or(self.default_ttl);
        let timer = self.expiries.schedule_after(now, ttl, handle);
        self.pending.insert(handle.index(), timer);
        self.spawned += 1;
        tracing::trace!("combat text {} '{}' for {:?}", handle, kind.format(value), ttl);
        Some(handle)
    }

    /// Releases a text before its lifetime ends.
    pub fn recycle(&mut self, handle: UnitHandle) -> bool {
        if !self.pool.release(handle) {
            return false;
        }
        if let Some(timer) = self.pending.remove(&handle.index()) {
            self.expiries.cancel(timer);
        }
        true
    }

    /// Expires due texts, then spawns texts for pending combat events.
    ///
    /// Returns the number of texts expired.
    pub fn update(&mut self, now: Duration) -> usize {
        let mut expired = 0;
        for (timer, handle) in self.expiries.drain_due(now) {
            if self.pending.get(&handle.index()) == Some(&timer) {
                self.pending.remove(&handle.index());
            }
            // Recycled or reclaimed since the timer was scheduled.
            if !self.pool.is_active(handle) {
                continue;
            }
            self.pool.release(handle);
            expired += 1;
        }
        self.expired += expired as u64;

        let events = self.feedback.as_ref().map(EventReceiver::drain).unwrap_or_default();
        for event in events {
            if let GameEvent::CombatFeedback { amount, kind, position } = event {
                self.spawn(now, amount, kind, position, self.root, None);
            }
        }

        expired
    }

    /// Gets a live text.
    #[must_use]
    pub fn get(&self, handle: UnitHandle) -> Option<&FloatingText> {
        self.pool.get(handle)
    }

    /// Live texts, oldest first.
    pub fn iter_visible(&self) -> impl Iterator<Item = (UnitHandle, &FloatingText)> + '_ {
        self.pool.iter_active()
    }

    /// Expiry timers still queued.
    #[must_use]
    pub fn pending_expiries(&self) -> usize {
        self.expiries.len()
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &GenericPool<FloatingText> {
        &self.pool
    }

    /// Texts shown / expired / skipped on exhaustion.
    #[must_use]
    pub const fn counters(&self) -> (u64, u64, u64) {
        (self.spawned, self.expired, self.skipped)
    }
}

impl PoolOwner for CombatTextPool {
    fn name(&self) -> &str {
        "combat_text"
    }

    fn total_count(&self) -> usize {
        self.pool.total_count()
    }

    fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    fn available_count(&self) -> usize {
        self.pool.available_count()
    }

    fn estimated_memory_mb(&self) -> f64 {
        self.pool.estimated_memory_bytes() as f64 / BYTES_PER_MB
    }

    fn can_optimize(&self) -> bool {
        true
    }

    fn optimize(&mut self, new_size: usize) {
        self.pool.resize(new_size);
    }

    fn preload(&mut self, count: usize) -> usize {
        self.pool.preload(count)
    }

    fn clear(&mut self) {
        self.pool.clear();
        self.expiries.clear();
        self.pending.clear();
    }

    fn describe(&self) -> String {
        format!(
            "combat text: {} | shown {} expired {} skipped {}",
            self.pool.stats(),
            self.spawned,
            self.expired,
            self.skipped
        )
    }
}

impl std::fmt::Debug for CombatTextPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatTextPool")
            .field("pool", &self.pool)
            .field("expiries", &self.expiries)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}
