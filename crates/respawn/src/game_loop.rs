//! # RESPAWN Game Loop
//!
//! Composition root: builds every owner, wires the channels, registers the
//! owners with the supervisor, and drives them all from one clock.
//!
//! ```text
//! Frame N (tick(dt)):
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. ADVANCE CLOCK                                                    │
//! │    └─ now += min(dt, MAX_FRAME_STEP)                                │
//! │                                                                     │
//! │ 2. WAVES                                                            │
//! │    ├─ Drain death reports (release + schedule replacement)          │
//! │    ├─ Deferred spawns, wave, sweep, difficulty                      │
//! │                                                                     │
//! │ 3. COMBAT TEXT                                                      │
//! │    ├─ Expire due texts                                              │
//! │    └─ Spawn texts for combat events                                 │
//! │                                                                     │
//! │ 4. SUPERVISOR                                                       │
//! │    └─ Monitoring pass when its interval is due                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use respawn_core::{share, GameClock, SharedOwner};
use respawn_supervisor::{MonitorReport, PoolSupervisor};

use crate::combat_text::CombatTextPool;
use crate::config::{GameLoopConfig, RuntimeConfig};
use crate::error::RuntimeResult;
use crate::events::{EventSender, EventSystem, EventSystemBuilder};
use crate::spatial::{AnchorProvider, WalkabilityOracle};
use crate::waves::{EnemyFactory, WaveSpawner};

/// Registry id of the enemy spawner.
pub const ENEMIES_ID: &str = "enemies";

/// Registry id of the combat text pool.
pub const COMBAT_TEXT_ID: &str = "combat_text";

/// Timing and work done in one frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats {
    /// Frame number.
    pub frame: u64,
    /// Game time after the frame.
    pub now: Duration,
    /// Total frame time in microseconds.
    pub total_us: u64,
    /// Wave update time in microseconds.
    pub waves_us: u64,
    /// Combat text update time in microseconds.
    pub text_us: u64,
    /// Supervisor time in microseconds.
    pub supervisor_us: u64,
    /// Enemies spawned this frame.
    pub spawned: usize,
    /// Texts expired this frame.
    pub texts_expired: usize,
    /// Resize commands issued this frame.
    pub resize_commands: usize,
}

/// The runtime's frame driver.
pub struct GameLoop {
    clock: GameClock,
    events: EventSystem,
    spawner: Arc<Mutex<WaveSpawner>>,
    combat_text: Arc<Mutex<CombatTextPool>>,
    supervisor: PoolSupervisor,
    config: GameLoopConfig,
    frame_budget: Duration,
    stats_accumulator: FrameStatsAccumulator,
    last_report: Option<MonitorReport>,
}

impl GameLoop {
    /// Builds every owner from `config` and registers them with the supervisor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RuntimeError`] if any table is invalid.
    pub fn new(
        config: RuntimeConfig,
        anchor: Box<dyn AnchorProvider>,
        oracle: Box<dyn WalkabilityOracle>,
    ) -> RuntimeResult<Self> {
        config.validate()?;
        let RuntimeConfig {
            game_loop,
            supervisor,
            waves,
            combat_text,
        } = config;

        let clock = GameClock::new();
        let events = EventSystemBuilder::new().capacity(game_loop.event_capacity).build();

        let factory = EnemyFactory::new(waves.templates.clone(), events.death_sender.clone());
        let spawner = share(WaveSpawner::new(
            waves,
            factory,
            anchor,
            oracle,
            events.death_receiver.clone(),
        )?);
        let combat_text = share(CombatTextPool::new(
            &combat_text,
            Some(events.combat_receiver.clone()),
        )?);

        let mut supervisor = PoolSupervisor::new(supervisor, clock.now());
        let enemies: SharedOwner = spawner.clone();
        let texts: SharedOwner = combat_text.clone();
        supervisor.register(ENEMIES_ID, enemies);
        supervisor.register(COMBAT_TEXT_ID, texts);

        let frame_budget = Duration::from_secs(1) / game_loop.target_fps;
        Ok(Self {
            clock,
            events,
            spawner,
            combat_text,
            supervisor,
            config: game_loop,
            frame_budget,
            stats_accumulator: FrameStatsAccumulator::new(frame_budget),
            last_report: None,
        })
    }

    /// Starts the wave loops at the current game time.
    pub fn start(&mut self) {
        self.spawner.lock().start(self.clock.now());
    }

    /// Runs one frame.
    pub fn tick(&mut self, dt: Duration) -> FrameStats {
        let frame_start = Instant::now();
        let now = self.clock.advance(dt);

        let start = Instant::now();
        let spawned = self.spawner.lock().update(now);
        let waves_us = elapsed_us(start);

        let start = Instant::now();
        let texts_expired = self.combat_text.lock().update(now);
        let text_us = elapsed_us(start);

        let start = Instant::now();
        let report = self.supervisor.update(now);
        let supervisor_us = elapsed_us(start);

        let resize_commands = report
            .as_ref()
            .map_or(0, |report| report.optimizations.len() + report.emergency.len());
        if report.is_some() {
            self.last_report = report;
        }

        let stats = FrameStats {
            frame: self.clock.frame(),
            now,
            total_us: elapsed_us(frame_start),
            waves_us,
            text_us,
            supervisor_us,
            spawned,
            texts_expired,
            resize_commands,
        };
        self.stats_accumulator.record(stats);

        if self.config.enable_timing_logs && Duration::from_micros(stats.total_us) > self.frame_budget {
            tracing::warn!(
                "frame {} exceeded budget: {:.2}ms (target: {:.2}ms)",
                stats.frame,
                stats.total_us as f64 / 1000.0,
                self.frame_budget.as_secs_f64() * 1000.0
            );
        }
        stats
    }

    /// Stops the waves and clears every pool.
    pub fn shutdown(&mut self) {
        self.spawner.lock().shutdown();
        self.supervisor.clear_all();
        tracing::info!("runtime shut down after {} frames", self.clock.frame());
    }

    /// Sender gameplay uses for combat feedback.
    #[must_use]
    pub fn combat_events(&self) -> EventSender {
        self.events.combat_sender.clone()
    }

    /// The enemy spawner.
    #[must_use]
    pub fn spawner(&self) -> &Arc<Mutex<WaveSpawner>> {
        &self.spawner
    }

    /// The combat text pool.
    #[must_use]
    pub fn combat_text(&self) -> &Arc<Mutex<CombatTextPool>> {
        &self.combat_text
    }

    /// The supervisor.
    #[must_use]
    pub fn supervisor(&self) -> &PoolSupervisor {
        &self.supervisor
    }

    /// The supervisor, for manual passes.
    pub fn supervisor_mut(&mut self) -> &mut PoolSupervisor {
        &mut self.supervisor
    }

    /// Outcome of the latest monitoring pass.
    #[must_use]
    pub fn last_report(&self) -> Option<&MonitorReport> {
        self.last_report.as_ref()
    }

    /// Current game time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Frames run so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.clock.frame()
    }

    /// Accumulated frame statistics.
    #[must_use]
    pub fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats_accumulator
    }
}

impl std::fmt::Debug for GameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameLoop")
            .field("clock", &self.clock)
            .field("supervisor", &self.supervisor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn elapsed_us(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}

/// Accumulates frame statistics for reporting.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Number of frames recorded.
    pub frames_recorded: u64,
    budget_us: u64,
    total_us_sum: u64,
    waves_us_sum: u64,
    text_us_sum: u64,
    supervisor_us_sum: u64,
    min_frame_us: u64,
    max_frame_us: u64,
    frames_over_budget: u64,
    spawned: u64,
    texts_expired: u64,
    resize_commands: u64,
}

impl FrameStatsAccumulator {
    /// Creates a new accumulator for a given frame budget.
    #[must_use]
    pub fn new(budget: Duration) -> Self {
        Self {
            frames_recorded: 0,
            budget_us: u64::try_from(budget.as_micros()).unwrap_or(u64::MAX),
            total_us_sum: 0,
            waves_us_sum: 0,
            text_us_sum: 0,
            supervisor_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
            spawned: 0,
            texts_expired: 0,
            resize_commands: 0,
        }
    }

    /// Records a frame's statistics.
    pub fn record(&mut self, stats: FrameStats) {
        self.frames_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.waves_us_sum += stats.waves_us;
        self.text_us_sum += stats.text_us;
        self.supervisor_us_sum += stats.supervisor_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);
        self.spawned += stats.spawned as u64;
        self.texts_expired += stats.texts_expired as u64;
        self.resize_commands += stats.resize_commands as u64;

        if stats.total_us > self.budget_us {
            self.frames_over_budget += 1;
        }
    }

    /// Returns average frame time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        self.avg_ms(self.total_us_sum)
    }

    /// Returns the fraction of frames over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    /// Enemies spawned over all recorded frames.
    #[must_use]
    pub const fn total_spawned(&self) -> u64 {
        self.spawned
    }

    /// Resize commands issued over all recorded frames.
    #[must_use]
    pub const fn total_resize_commands(&self) -> u64 {
        self.resize_commands
    }

    fn avg_ms(&self, sum_us: u64) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (sum_us as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Prints a summary of the statistics.
    pub fn print_summary(&self) {
        let min_frame_us = if self.frames_recorded == 0 { 0 } else { self.min_frame_us };
        println!("╔══════════════════════════════════════════════════════════════════╗");
        println!("║                    FRAME STATISTICS SUMMARY                      ║");
        println!("╚══════════════════════════════════════════════════════════════════╝");
        println!();
        println!("┌─ TIMING ─────────────────────────────────────────────────────────┐");
        println!("│ Frames Recorded:    {}", self.frames_recorded);
        println!("│ Average Frame:      {:.3} ms", self.avg_frame_ms());
        println!("│ Min Frame:          {:.3} ms", min_frame_us as f64 / 1000.0);
        println!("│ Max Frame:          {:.3} ms", self.max_frame_us as f64 / 1000.0);
        println!(
            "│ Over Budget:        {} frames ({:.1}%)",
            self.frames_over_budget,
            self.over_budget_ratio() * 100.0
        );
        println!("└──────────────────────────────────────────────────────────────────┘");
        println!();
        println!("┌─ BREAKDOWN ──────────────────────────────────────────────────────┐");
        println!("│ Waves:              {:.4} ms", self.avg_ms(self.waves_us_sum));
        println!("│ Combat Text:        {:.4} ms", self.avg_ms(self.text_us_sum));
        println!("│ Supervisor:         {:.4} ms", self.avg_ms(self.supervisor_us_sum));
        println!("└──────────────────────────────────────────────────────────────────┘");
        println!();
        println!("┌─ WORK ───────────────────────────────────────────────────────────┐");
        println!("│ Enemies Spawned:    {}", self.spawned);
        println!("│ Texts Expired:      {}", self.texts_expired);
        println!("│ Resize Commands:    {}", self.resize_commands);
        println!("└──────────────────────────────────────────────────────────────────┘");
    }
}
