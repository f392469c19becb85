//! # Enemy Waves
//!
//! Keeps a bounded enemy population around the player, drawn from one pool.
//!
//! ## Loops
//!
//! ```text
//! start(now) ──> initial burst: initial_count spawns, burst_stagger apart
//!
//! update(now):
//!   deaths      ── release immediately, replacement after respawn_delay
//!   wave        ── every spawn_interval: min(enemies_per_wave, max_active - active)
//!   sweep       ── every sweep_interval: recycle far enemies, drop stale handles
//!   difficulty  ── every difficulty_interval: tighten cadence, raise ceilings
//! ```
//!
//! Every spawn re-checks the population ceiling, so deferred spawns that
//! come due after the population filled up are dropped.

use std::collections::BTreeMap;
use std::f32::consts::TAU;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use respawn_core::{
    GenericPool, Interval, PoolBuilder, PoolOwner, Poolable, TimerQueue, UnitHandle, BYTES_PER_MB,
};

use crate::error::{RuntimeError, RuntimeResult};
use crate::events::{EventReceiver, EventSender, GameEvent};
use crate::spatial::{AnchorProvider, Vec3, WalkabilityOracle};

/// Stats an enemy is built from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyTemplate {
    /// Archetype name.
    pub name: String,
    /// Health at difficulty 0.
    pub max_health: u32,
    /// Movement speed handed to the navigation layer.
    pub speed: f32,
}

impl Default for EnemyTemplate {
    fn default() -> Self {
        Self {
            name: "grunt".to_owned(),
            max_health: 100,
            speed: 3.5,
        }
    }
}

/// A pooled enemy.
#[derive(Debug)]
pub struct Enemy {
    /// Archetype name.
    pub archetype: String,
    /// Health at difficulty 0.
    pub base_health: u32,
    /// Current health.
    pub health: u32,
    /// Health this activation started with.
    pub max_health: u32,
    /// Movement speed.
    pub speed: f32,
    /// World position.
    pub position: Vec3,
    /// Difficulty level the enemy was spawned at.
    pub level: u32,
    /// Whether the enemy is shown and simulated.
    pub visible: bool,
    /// Handle of the current activation (non-owning back-reference).
    handle: Option<UnitHandle>,
    death: EventSender,
    death_reported: bool,
    destroyed: bool,
}

impl Enemy {
    /// Builds an enemy from a template.
    #[must_use]
    pub fn from_template(template: &EnemyTemplate, death: EventSender) -> Self {
        Self {
            archetype: template.name.clone(),
            base_health: template.max_health,
            health: template.max_health,
            max_health: template.max_health,
            speed: template.speed,
            position: Vec3::ZERO,
            level: 0,
            visible: false,
            handle: None,
            death,
            death_reported: false,
            destroyed: false,
        }
    }

    /// Handle of the current activation.
    #[must_use]
    pub const fn handle(&self) -> Option<UnitHandle> {
        self.handle
    }

    /// Applies damage. Returns `true` if this hit killed the enemy.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        if self.health == 0 {
            return false;
        }
        self.health = self.health.saturating_sub(amount);
        if self.health == 0 {
            self.report_death();
            return true;
        }
        false
    }

    /// Reports death on the death channel, carrying this activation's handle.
    pub fn report_death(&mut self) {
        let Some(unit) = self.handle else {
            return;
        };
        self.death_reported = true;
        self.death.send(GameEvent::EnemyDied { unit });
    }

    /// Whether a death was reported during this activation.
    #[must_use]
    pub const fn death_reported(&self) -> bool {
        self.death_reported
    }

    /// Marks the enemy as destroyed by an outside system.
    ///
    /// A destroyed enemy is dropped from the pool at the next sweep.
    pub fn destroy(&mut self) {
        self.destroyed = true;
    }

    fn arm(&mut self, handle: UnitHandle, position: Vec3, level: u32) {
        self.handle = Some(handle);
        self.position = position;
        self.level = level;
        self.max_health = self
            .base_health
            .saturating_add(self.base_health.saturating_mul(level) / 10);
        self.health = self.max_health;
        self.death_reported = false;
    }
}

impl Poolable for Enemy {
    fn activate(&mut self) {
        self.visible = true;
    }

    fn deactivate(&mut self) {
        self.visible = false;
        self.handle = None;
    }

    fn is_alive(&self) -> bool {
        !self.destroyed
    }

    fn estimated_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.archetype.capacity()
    }
}

/// Builds enemies for the pool, cycling through its templates.
#[derive(Clone, Debug)]
pub struct EnemyFactory {
    templates: Vec<EnemyTemplate>,
    death: EventSender,
    next: usize,
}

impl EnemyFactory {
    /// Creates a factory. Falls back to the default template if `templates` is empty.
    #[must_use]
    pub fn new(templates: Vec<EnemyTemplate>, death: EventSender) -> Self {
        let templates = if templates.is_empty() {
            vec![EnemyTemplate::default()]
        } else {
            templates
        };
        Self {
            templates,
            death,
            next: 0,
        }
    }

    /// Builds the next enemy.
    pub fn build(&mut self) -> Enemy {
        let template = &self.templates[self.next % self.templates.len()];
        self.next = self.next.wrapping_add(1);
        Enemy::from_template(template, self.death.clone())
    }
}

/// Wave tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Enemies built at startup.
    pub initial_pool_size: usize,
    /// Pool ceiling.
    pub max_pool_size: usize,
    /// Whether the pool may build enemies on demand.
    pub allow_growth: bool,
    /// Spawns in the opening burst.
    pub initial_count: usize,
    /// Gap between burst spawns (ms).
    pub burst_stagger_ms: u64,
    /// Starting wave cadence (ms).
    pub spawn_interval_ms: u64,
    /// Starting spawns per wave.
    pub enemies_per_wave: usize,
    /// Starting population ceiling.
    pub max_active: usize,
    /// Inner spawn radius.
    pub min_distance: f32,
    /// Outer spawn radius.
    pub max_distance: f32,
    /// Enemies farther than this from the anchor are recycled.
    pub despawn_distance: f32,
    /// Candidate positions tried per spawn.
    pub placement_attempts: u32,
    /// Sweep cadence (ms).
    pub sweep_interval_ms: u64,
    /// Difficulty cadence (ms).
    pub difficulty_interval_ms: u64,
    /// Highest difficulty level.
    pub max_difficulty_level: u32,
    /// Multiplier applied to the wave cadence per level.
    pub spawn_interval_factor: f64,
    /// Fastest wave cadence (ms).
    pub min_spawn_interval_ms: u64,
    /// Population ceiling added per level.
    pub max_active_step: usize,
    /// Hard cap on the population ceiling.
    pub max_active_ceiling: usize,
    /// Spawns per wave added per level.
    pub enemies_per_wave_step: usize,
    /// Hard cap on spawns per wave.
    pub enemies_per_wave_ceiling: usize,
    /// Delay before a dead enemy is replaced (ms).
    pub respawn_delay_ms: u64,
    /// Placement RNG seed.
    pub seed: u64,
    /// Archetypes, used round-robin.
    pub templates: Vec<EnemyTemplate>,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            initial_pool_size: 20,
            max_pool_size: 60,
            allow_growth: true,
            initial_count: 10,
            burst_stagger_ms: 100,
            spawn_interval_ms: 3_000,
            enemies_per_wave: 5,
            max_active: 20,
            min_distance: 15.0,
            max_distance: 30.0,
            despawn_distance: 60.0,
            placement_attempts: 8,
            sweep_interval_ms: 2_000,
            difficulty_interval_ms: 30_000,
            max_difficulty_level: 10,
            spawn_interval_factor: 0.9,
            min_spawn_interval_ms: 1_000,
            max_active_step: 5,
            max_active_ceiling: 50,
            enemies_per_wave_step: 1,
            enemies_per_wave_ceiling: 12,
            respawn_delay_ms: 2_000,
            seed: 0x5EED,
            templates: vec![EnemyTemplate::default()],
        }
    }
}

impl WaveConfig {
    /// Short cadences for smoke tests and demos.
    #[must_use]
    pub fn rapid() -> Self {
        Self {
            burst_stagger_ms: 20,
            spawn_interval_ms: 500,
            sweep_interval_ms: 250,
            difficulty_interval_ms: 2_000,
            min_spawn_interval_ms: 100,
            respawn_delay_ms: 200,
            ..Self::default()
        }
    }

    /// Checks distances, cadences and ceilings.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Config`] describing the first problem.
    pub fn validate(&self) -> RuntimeResult<()> {
        let invalid = |reason: String| Err(RuntimeError::Config(format!("waves: {reason}")));

        let finite = [self.min_distance, self.max_distance, self.despawn_distance]
            .iter()
            .all(|d| d.is_finite());
        if !finite {
            return invalid(format!(
                "distances must be finite (min {}, max {}, despawn {})",
                self.min_distance, self.max_distance, self.despawn_distance
            ));
        }
        if self.min_distance < 0.0 || self.min_distance > self.max_distance {
            return invalid(format!(
                "min_distance ({}) must be in [0, max_distance ({})]",
                self.min_distance, self.max_distance
            ));
        }
        if self.despawn_distance < self.max_distance {
            return invalid(format!(
                "despawn_distance ({}) is inside the spawn radius ({})",
                self.despawn_distance, self.max_distance
            ));
        }
        if self.placement_attempts == 0 {
            return invalid("placement_attempts must be at least 1".into());
        }
        if self.spawn_interval_ms == 0 || self.sweep_interval_ms == 0 || self.difficulty_interval_ms == 0 {
            return invalid("intervals must be greater than zero".into());
        }
        if !(self.spawn_interval_factor > 0.0 && self.spawn_interval_factor <= 1.0) {
            return invalid(format!(
                "spawn_interval_factor ({}) must be in (0, 1]",
                self.spawn_interval_factor
            ));
        }
        if self.max_active > self.max_active_ceiling {
            return invalid(format!(
                "max_active ({}) exceeds max_active_ceiling ({})",
                self.max_active, self.max_active_ceiling
            ));
        }
        if self.enemies_per_wave > self.enemies_per_wave_ceiling {
            return invalid(format!(
                "enemies_per_wave ({}) exceeds enemies_per_wave_ceiling ({})",
                self.enemies_per_wave, self.enemies_per_wave_ceiling
            ));
        }
        if self.max_pool_size == 0 || self.initial_pool_size > self.max_pool_size {
            return invalid(format!(
                "initial_pool_size {} / max_pool_size {} out of range",
                self.initial_pool_size, self.max_pool_size
            ));
        }
        if self.max_pool_size < self.max_active {
            return invalid(format!(
                "max_pool_size ({}) is below max_active ({})",
                self.max_pool_size, self.max_active
            ));
        }
        if !self.allow_growth && self.initial_pool_size < self.max_active {
            return invalid(format!(
                "initial_pool_size ({}) is below max_active ({}) and the pool cannot grow",
                self.initial_pool_size, self.max_active
            ));
        }
        Ok(())
    }

    fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_interval_ms)
    }
}

/// Spawner progress, as reported by [`WaveSpawner::state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaveState {
    /// Enemies currently tracked as alive.
    pub active_count: usize,
    /// Spawns since start (monotonic).
    pub total_spawned: u64,
    /// Deaths and despawns since start (monotonic).
    pub total_recycled: u64,
    /// Current difficulty level.
    pub difficulty_level: u32,
    /// Current population ceiling.
    pub max_active: usize,
    /// Current spawns per wave.
    pub enemies_per_wave: usize,
    /// Current wave cadence.
    pub spawn_interval: Duration,
    /// Whether the loops are running.
    pub running: bool,
}

impl WaveState {
    fn initial(config: &WaveConfig) -> Self {
        Self {
            active_count: 0,
            total_spawned: 0,
            total_recycled: 0,
            difficulty_level: 0,
            max_active: config.max_active,
            enemies_per_wave: config.enemies_per_wave,
            spawn_interval: config.spawn_interval(),
            running: false,
        }
    }
}

/// Deferred spawn requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SpawnJob {
    Burst,
    Respawn,
}

struct Loops {
    wave: Interval,
    sweep: Interval,
    difficulty: Interval,
}

/// Enemy population manager.
pub struct WaveSpawner {
    config: WaveConfig,
    pool: GenericPool<Enemy>,
    /// Slot index -> handle of the enemy the spawner believes is alive there.
    active: BTreeMap<usize, UnitHandle>,
    state: WaveState,
    anchor: Box<dyn AnchorProvider>,
    oracle: Box<dyn WalkabilityOracle>,
    deaths: EventReceiver,
    rng: ChaCha8Rng,
    jobs: TimerQueue<SpawnJob>,
    loops: Option<Loops>,
    placement_failures: u64,
}

impl WaveSpawner {
    /// Builds the spawner and prewarms its pool.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] if the configuration is invalid.
    pub fn new(
        config: WaveConfig,
        mut factory: EnemyFactory,
        anchor: Box<dyn AnchorProvider>,
        oracle: Box<dyn WalkabilityOracle>,
        deaths: EventReceiver,
    ) -> RuntimeResult<Self> {
        config.validate()?;
        let pool = PoolBuilder::new("enemies")
            .factory(move || factory.build())
            .initial_size(config.initial_pool_size)
            .max_size(config.max_pool_size)
            .allow_growth(config.allow_growth)
            .build()?;

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            state: WaveState::initial(&config),
            config,
            pool,
            active: BTreeMap::new(),
            anchor,
            oracle,
            deaths,
            jobs: TimerQueue::new(),
            loops: None,
            placement_failures: 0,
        })
    }

    /// Starts the loops and schedules the opening burst.
    pub fn start(&mut self, now: Duration) {
        if self.loops.is_some() {
            tracing::warn!("wave spawner already running");
            return;
        }

        let stagger = Duration::from_millis(self.config.burst_stagger_ms);
        let mut at = now;
        for _ in 0..self.config.initial_count {
            self.jobs.schedule_at(at, SpawnJob::Burst);
            at += stagger;
        }

        self.loops = Some(Loops {
            wave: Interval::new(self.state.spawn_interval, now),
            sweep: Interval::new(Duration::from_millis(self.config.sweep_interval_ms), now),
            difficulty: Interval::new(Duration::from_millis(self.config.difficulty_interval_ms), now),
        });
        self.state.running = true;
        tracing::info!(
            "wave spawner started: burst of {}, max active {}",
            self.config.initial_count,
            self.state.max_active
        );
    }

    /// Advances all loops. Returns the number of enemies spawned.
    pub fn update(&mut self, now: Duration) -> usize {
        self.process_deaths(now);

        let Some(loops) = self.loops.as_mut() else {
            return 0;
        };
        let wave_due = loops.wave.poll(now);
        let sweep_due = loops.sweep.poll(now);
        let difficulty_due = loops.difficulty.poll(now);

        let mut spawned = 0;
        for (_, job) in self.jobs.drain_due(now) {
            if self.spawn_one().is_some() {
                spawned += 1;
            } else {
                tracing::trace!("{:?} spawn dropped", job);
            }
        }

        if wave_due {
            spawned += self.spawn_wave();
        }
        if sweep_due {
            self.sweep(now);
        }
        if difficulty_due {
            self.raise_difficulty(now);
        }
        spawned
    }

    /// Spawns one enemy if the population ceiling and placement allow it.
    pub fn spawn_one(&mut self) -> Option<UnitHandle> {
        if self.active.len() >= self.state.max_active {
            return None;
        }
        let anchor = self.anchor.anchor()?;
        let Some(position) = self.find_spawn_position(anchor) else {
            self.placement_failures += 1;
            tracing::trace!("no walkable spawn position around {:?}", anchor);
            return None;
        };

        let handle = self.pool.acquire()?;
        if let Some(previous) = self.active.insert(handle.index(), handle) {
            self.state.total_recycled += 1;
            tracing::debug!("enemy {} reclaimed by the pool for {}", previous, handle);
        }
        let level = self.state.difficulty_level;
        if let Some(enemy) = self.pool.get_mut(handle) {
            enemy.arm(handle, position, level);
        }
        self.state.total_spawned += 1;
        tracing::trace!("spawned enemy {} at {:?}", handle, position);
        Some(handle)
    }

    /// Halts the loops. Living enemies stay where they are.
    pub fn stop(&mut self) {
        if self.loops.take().is_some() {
            tracing::info!(
                "wave spawner stopped at difficulty {} ({} spawned, {} recycled)",
                self.state.difficulty_level,
                self.state.total_spawned,
                self.state.total_recycled
            );
        }
        self.jobs.clear();
        self.state.running = false;
    }

    /// Stops, disposes every enemy and resets progress.
    pub fn shutdown(&mut self) {
        self.stop();
        drop(self.deaths.drain());
        self.pool.clear();
        self.active.clear();
        self.state = WaveState::initial(&self.config);
    }

    /// Current progress.
    #[must_use]
    pub fn state(&self) -> WaveState {
        WaveState {
            active_count: self.active.len(),
            ..self.state
        }
    }

    /// Whether the loops are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.loops.is_some()
    }

    /// Handles of enemies the spawner tracks as alive.
    #[must_use]
    pub fn active_handles(&self) -> Vec<UnitHandle> {
        self.active.values().copied().collect()
    }

    /// Gets a living enemy.
    #[must_use]
    pub fn enemy(&self, handle: UnitHandle) -> Option<&Enemy> {
        self.pool.get(handle)
    }

    /// Gets a living enemy mutably (damage, movement).
    pub fn enemy_mut(&mut self, handle: UnitHandle) -> Option<&mut Enemy> {
        self.pool.get_mut(handle)
    }

    /// Spawn attempts skipped because no walkable position was found.
    #[must_use]
    pub const fn placement_failures(&self) -> u64 {
        self.placement_failures
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &GenericPool<Enemy> {
        &self.pool
    }

    fn process_deaths(&mut self, now: Duration) {
        for event in self.deaths.drain() {
            let GameEvent::EnemyDied { unit } = event else {
                continue;
            };
            if self.active.get(&unit.index()) != Some(&unit) || !self.pool.release(unit) {
                tracing::trace!("duplicate death report for {}", unit);
                continue;
            }
            self.active.remove(&unit.index());
            self.state.total_recycled += 1;
            if self.loops.is_some() {
                let delay = Duration::from_millis(self.config.respawn_delay_ms);
                self.jobs.schedule_after(now, delay, SpawnJob::Respawn);
            }
        }
    }

    fn spawn_wave(&mut self) -> usize {
        let room = self.state.max_active.saturating_sub(self.active.len());
        let count = self.state.enemies_per_wave.min(room);
        let spawned = (0..count).filter(|_| self.spawn_one().is_some()).count();
        tracing::debug!("wave: {} of {} spawned ({} active)", spawned, count, self.active.len());
        spawned
    }

    /// Recycles far or unreported dead enemies and drops stale or destroyed ones.
    fn sweep(&mut self, now: Duration) -> usize {
        let anchor = self.anchor.anchor();
        let mut recycled = 0;
        let mut destroyed = false;

        let tracked: Vec<UnitHandle> = self.active.values().copied().collect();
        for handle in tracked {
            let Some(enemy) = self.pool.get(handle) else {
                self.active.remove(&handle.index());
                continue;
            };
            if !enemy.is_alive() {
                self.active.remove(&handle.index());
                destroyed = true;
                continue;
            }
            let dead = enemy.health == 0;
            let too_far = anchor.is_some_and(|anchor| {
                enemy.position.distance(anchor) > self.config.despawn_distance
            });
            if (dead || too_far) && self.pool.release(handle) {
                self.active.remove(&handle.index());
                self.state.total_recycled += 1;
                recycled += 1;
                // Death report was lost; the replacement is still owed.
                if dead && self.loops.is_some() {
                    let delay = Duration::from_millis(self.config.respawn_delay_ms);
                    self.jobs.schedule_after(now, delay, SpawnJob::Respawn);
                }
            }
        }

        if destroyed {
            self.pool.validate_integrity();
        }
        if recycled > 0 {
            tracing::debug!("sweep recycled {} enemies", recycled);
        }
        recycled
    }

    fn raise_difficulty(&mut self, now: Duration) {
        if self.state.difficulty_level >= self.config.max_difficulty_level {
            return;
        }
        let config = &self.config;
        let state = &mut self.state;

        state.difficulty_level += 1;
        state.spawn_interval = state
            .spawn_interval
            .mul_f64(config.spawn_interval_factor)
            .max(Duration::from_millis(config.min_spawn_interval_ms));
        state.max_active = (state.max_active + config.max_active_step).min(config.max_active_ceiling);
        state.enemies_per_wave =
            (state.enemies_per_wave + config.enemies_per_wave_step).min(config.enemies_per_wave_ceiling);

        if let Some(loops) = self.loops.as_mut() {
            loops.wave.set_period(state.spawn_interval, now);
        }
        // Pool ceiling must stay at or above the population ceiling.
        if self.pool.max_size() < state.max_active {
            self.pool.resize(state.max_active);
        }
        tracing::info!(
            "difficulty {} -> spawn every {:?}, max active {}, {} per wave",
            state.difficulty_level,
            state.spawn_interval,
            state.max_active,
            state.enemies_per_wave
        );
    }

    fn find_spawn_position(&mut self, anchor: Vec3) -> Option<Vec3> {
        for _ in 0..self.config.placement_attempts {
            let angle = self.rng.gen_range(0.0..TAU);
            let radius = self.rng.gen_range(self.config.min_distance..=self.config.max_distance);
            let candidate = anchor.offset_flat(angle, radius);
            if self.oracle.is_walkable(candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

impl PoolOwner for WaveSpawner {
    fn name(&self) -> &str {
        "enemies"
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

    /// Never shrinks below the current population ceiling, so a full wave
    /// never has to reclaim a living enemy.
    fn optimize(&mut self, new_size: usize) {
        self.pool.resize(new_size.max(self.state.max_active));
    }

    fn preload(&mut self, count: usize) -> usize {
        self.pool.preload(count)
    }

    fn clear(&mut self) {
        self.pool.clear();
        self.active.clear();
    }

    fn describe(&self) -> String {
        let state = self.state();
        format!(
            "enemies: {} | difficulty {} | spawned {} recycled {}",
            self.pool.stats(),
            state.difficulty_level,
            state.total_spawned,
            state.total_recycled
        )
    }
}

impl std::fmt::Debug for WaveSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveSpawner")
            .field("state", &self.state())
            .field("pool", &self.pool)
            .field("pending_spawns", &self.jobs.len())
            .finish_non_exhaustive()
    }
}
