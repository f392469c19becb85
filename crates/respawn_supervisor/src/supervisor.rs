//! # Pool Supervisor
//!
//! Samples every registered owner on a fixed interval and issues coarse
//! resize commands through [`PoolOwner`].
//!
//! ## Monitoring Pass
//!
//! ```text
//! every monitor_interval:
//!   1. sample owners          -> utilization = active / total
//!   2. flag                   -> util > high || util < low
//!   3. optimize (cooldown)    -> grow by grow_step / shrink by shrink_step
//!   4. memory ceiling check   -> emergency shrink of near-idle owners
//! ```
//!
//! Shrinks are clamped to `max(active, global_min_size)`; grows to
//! `global_max_size`. The supervisor never touches a pool directly.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use respawn_core::{Interval, OwnerId, PoolOwner, SharedOwner};

use crate::config::SupervisorConfig;

/// Utilization snapshot of one owner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoolUtilizationSample {
    /// Units owned.
    pub total: usize,
    /// Units handed out.
    pub active: usize,
    /// Units ready.
    pub available: usize,
    /// `active / total`, 0 when empty.
    pub utilization: f64,
    /// Memory estimate (MB).
    pub memory_mb: f64,
    /// Game time of the sample.
    pub sampled_at: Duration,
    /// Utilization is outside the watermarks.
    pub needs_optimization: bool,
}

impl PoolUtilizationSample {
    /// Samples an owner.
    #[must_use]
    pub fn take(owner: &dyn PoolOwner, config: &SupervisorConfig, now: Duration) -> Self {
        let total = owner.total_count();
        let active = owner.active_count();
        let utilization = if total == 0 {
            0.0
        } else {
            active as f64 / total as f64
        };
        Self {
            total,
            active,
            available: owner.available_count(),
            utilization,
            memory_mb: owner.estimated_memory_mb(),
            sampled_at: now,
            needs_optimization: utilization > config.high_watermark
                || utilization < config.low_watermark,
        }
    }
}

/// Why a resize was issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimizationReason {
    /// Utilization above the high watermark.
    HighUtilization,
    /// Utilization below the low watermark.
    LowUtilization,
    /// Aggregate memory above the ceiling.
    MemoryPressure,
}

/// A resize issued to one owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptimizationCommand {
    /// Target owner.
    pub owner: OwnerId,
    /// Total before the command.
    pub from: usize,
    /// Total after the owner applied it.
    pub to: usize,
    /// Trigger.
    pub reason: OptimizationReason,
}

/// Outcome of one monitoring pass.
#[derive(Clone, Debug, Default)]
pub struct MonitorReport {
    /// Commands issued by the watermark pass.
    pub optimizations: Vec<OptimizationCommand>,
    /// Commands issued by emergency cleanup.
    pub emergency: Vec<OptimizationCommand>,
    /// Aggregate memory estimate (MB).
    pub total_memory_mb: f64,
    /// Watermark pass was skipped because of the cooldown.
    pub cooldown_active: bool,
}

/// Lifetime counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SupervisorStats {
    /// Monitoring passes run.
    pub monitor_passes: u64,
    /// Optimization passes that issued at least one command.
    pub optimization_passes: u64,
    /// Grow commands issued.
    pub grow_commands: u64,
    /// Shrink commands issued (watermark and emergency).
    pub shrink_commands: u64,
    /// Emergency cleanups triggered.
    pub emergency_cleanups: u64,
    /// Memory estimate from the last pass (MB).
    pub last_total_memory_mb: f64,
}

/// Cross-pool monitor and optimizer.
pub struct PoolSupervisor {
    config: SupervisorConfig,
    owners: BTreeMap<OwnerId, SharedOwner>,
    monitor: Interval,
    last_optimization: Option<Duration>,
    last_samples: BTreeMap<OwnerId, PoolUtilizationSample>,
    stats: SupervisorStats,
}

impl PoolSupervisor {
    /// Creates a supervisor whose first pass runs one interval after `now`.
    #[must_use]
    pub fn new(config: SupervisorConfig, now: Duration) -> Self {
        Self {
            monitor: Interval::new(config.monitor_interval(), now),
            config,
            owners: BTreeMap::new(),
            last_optimization: None,
            last_samples: BTreeMap::new(),
            stats: SupervisorStats::default(),
        }
    }

    /// Registers an owner under `id`. Replaces (and warns about) a previous
    /// owner with the same id.
    pub fn register(&mut self, id: impl Into<OwnerId>, owner: SharedOwner) {
        let id = id.into();
        let name = owner.lock().name().to_owned();
        if self.owners.insert(id.clone(), owner).is_some() {
            tracing::warn!("supervisor: owner '{}' re-registered, previous owner dropped", id);
        } else {
            tracing::debug!("supervisor: registered '{}' ({})", id, name);
        }
    }

    /// Removes an owner. Returns it if it was registered.
    pub fn unregister(&mut self, id: &str) -> Option<SharedOwner> {
        let key = OwnerId::from(id);
        self.last_samples.remove(&key);
        self.owners.remove(&key)
    }

    /// Number of registered owners.
    #[must_use]
    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    /// Looks up an owner.
    #[must_use]
    pub fn owner(&self, id: &str) -> Option<&SharedOwner> {
        self.owners.get(&OwnerId::from(id))
    }

    /// Advances the supervisor. Runs a monitoring pass when the interval is due.
    pub fn update(&mut self, now: Duration) -> Option<MonitorReport> {
        if self.monitor.poll(now) {
            Some(self.monitor_pass(now))
        } else {
            None
        }
    }

    /// Runs one full monitoring pass immediately.
    pub fn monitor_pass(&mut self, now: Duration) -> MonitorReport {
        self.stats.monitor_passes += 1;

        let samples = self.sample_all(now);
        let total_memory_mb: f64 = samples.iter().map(|(_, sample)| sample.memory_mb).sum();
        self.last_samples = samples.into_iter().collect();
        self.stats.last_total_memory_mb = total_memory_mb;

        let mut report = MonitorReport {
            total_memory_mb,
            ..MonitorReport::default()
        };

        if self.config.auto_optimize {
            if self.cooldown_elapsed(now) {
                report.optimizations = self.optimize_flagged(now);
            } else {
                report.cooldown_active = true;
            }
        }

        if total_memory_mb > self.config.memory_ceiling_mb {
            tracing::info!(
                "supervisor: memory estimate {:.2} MB exceeds ceiling {:.2} MB, running emergency cleanup",
                total_memory_mb,
                self.config.memory_ceiling_mb
            );
            report.emergency = self.emergency_cleanup();
        }

        report
    }

    /// Samples every owner, in id order.
    #[must_use]
    pub fn sample_all(&self, now: Duration) -> Vec<(OwnerId, PoolUtilizationSample)> {
        self.owners
            .iter()
            .map(|(id, owner)| {
                let owner = owner.lock();
                (id.clone(), PoolUtilizationSample::take(&*owner, &self.config, now))
            })
            .collect()
    }

    /// Runs the watermark pass now, if the cooldown allows it.
    ///
    /// Returns the commands issued (empty while cooling down).
    pub fn optimize_now(&mut self, now: Duration) -> Vec<OptimizationCommand> {
        if !self.cooldown_elapsed(now) {
            tracing::debug!("supervisor: optimization skipped, cooldown active");
            return Vec::new();
        }
        self.last_samples = self.sample_all(now).into_iter().collect();
        self.optimize_flagged(now)
    }

    /// Shrinks every near-idle owner toward `max(active + buffer, floor)`.
    pub fn emergency_cleanup(&mut self) -> Vec<OptimizationCommand> {
        self.stats.emergency_cleanups += 1;
        let mut commands = Vec::new();

        for (id, owner) in &self.owners {
            let mut owner = owner.lock();
            if !owner.can_optimize() || owner.utilization() >= self.config.emergency_utilization {
                continue;
            }
            let total = owner.total_count();
            let target = (owner.active_count() + self.config.emergency_buffer).max(self.config.global_min_size);
            if target >= total {
                continue;
            }
            owner.optimize(target);
            let after = owner.total_count();
            if after >= total {
                tracing::debug!("supervisor: '{}' kept {} units under memory pressure", id, total);
                continue;
            }
            tracing::info!("supervisor: emergency shrink '{}' {} -> {}", id, total, after);
            commands.push(OptimizationCommand {
                owner: id.clone(),
                from: total,
                to: after,
                reason: OptimizationReason::MemoryPressure,
            });
        }

        self.stats.shrink_commands += commands.len() as u64;
        commands
    }

    /// Preloads `count` units into one owner. `None` if the id is unknown.
    pub fn preload(&self, id: &str, count: usize) -> Option<usize> {
        let owner = self.owners.get(&OwnerId::from(id))?;
        Some(owner.lock().preload(count))
    }

    /// Clears every owner.
    pub fn clear_all(&mut self) {
        for owner in self.owners.values() {
            owner.lock().clear();
        }
        self.last_samples.clear();
    }

    /// Current aggregate memory estimate (MB).
    #[must_use]
    pub fn total_memory_mb(&self) -> f64 {
        self.owners
            .values()
            .map(|owner| owner.lock().estimated_memory_mb())
            .sum()
    }

    /// Samples from the last pass.
    #[must_use]
    pub fn last_samples(&self) -> &BTreeMap<OwnerId, PoolUtilizationSample> {
        &self.last_samples
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> SupervisorStats {
        self.stats
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Human-readable per-owner and aggregate statistics.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Pool Supervisor: {} owners ===", self.owners.len());

        let mut total_units = 0;
        let mut active_units = 0;
        for (id, owner) in &self.owners {
            let owner = owner.lock();
            total_units += owner.total_count();
            active_units += owner.active_count();
            let _ = writeln!(
                out,
                "[{}] {:.0}% | {:.3} MB | {}",
                id,
                owner.utilization() * 100.0,
                owner.estimated_memory_mb(),
                owner.describe()
            );
        }

        let _ = writeln!(
            out,
            "Total: {}/{} units active | {:.3} MB (ceiling {:.1} MB)",
            active_units,
            total_units,
            self.total_memory_mb(),
            self.config.memory_ceiling_mb
        );
        let _ = write!(
            out,
            "Passes: {} monitor, {} optimize ({} grow, {} shrink), {} emergency",
            self.stats.monitor_passes,
            self.stats.optimization_passes,
            self.stats.grow_commands,
            self.stats.shrink_commands,
            self.stats.emergency_cleanups
        );
        out
    }

    fn cooldown_elapsed(&self, now: Duration) -> bool {
        self.last_optimization
            .map_or(true, |last| now.saturating_sub(last) >= self.config.optimize_cooldown())
    }

    fn optimize_flagged(&mut self, now: Duration) -> Vec<OptimizationCommand> {
        let mut commands = Vec::new();

        for (id, sample) in &self.last_samples {
            if !sample.needs_optimization {
                continue;
            }
            let Some(owner) = self.owners.get(id) else {
                continue;
            };
            let mut owner = owner.lock();
            if !owner.can_optimize() {
                continue;
            }
            let Some((target, reason)) = plan_resize(sample, &self.config) else {
                continue;
            };

            owner.optimize(target);
            let after = owner.total_count();
            if after == sample.total {
                tracing::debug!("supervisor: '{}' declined {:?} resize to {}", id, reason, target);
                continue;
            }
            tracing::debug!(
                "supervisor: {:?} '{}' {} -> {} (utilization {:.2})",
                reason,
                id,
                sample.total,
                after,
                sample.utilization
            );
            commands.push(OptimizationCommand {
                owner: id.clone(),
                from: sample.total,
                to: after,
                reason,
            });
        }

        if !commands.is_empty() {
            self.last_optimization = Some(now);
            self.stats.optimization_passes += 1;
            for command in &commands {
                match command.reason {
                    OptimizationReason::HighUtilization => self.stats.grow_commands += 1,
                    _ => self.stats.shrink_commands += 1,
                }
            }
        }
        commands
    }
}

/// Computes the resize for a flagged sample.
///
/// Returns `None` when the clamped target would not move the pool in the
/// intended direction (already at the ceiling, or already at the floor).
#[must_use]
pub fn plan_resize(
    sample: &PoolUtilizationSample,
    config: &SupervisorConfig,
) -> Option<(usize, OptimizationReason)> {
    if sample.utilization > config.high_watermark {
        let target = (sample.total + config.grow_step).min(config.global_max_size);
        (target > sample.total).then_some((target, OptimizationReason::HighUtilization))
    } else if sample.utilization < config.low_watermark {
        let target = sample
            .total
            .saturating_sub(config.shrink_step)
            .max(sample.active)
            .max(config.global_min_size);
        (target < sample.total).then_some((target, OptimizationReason::LowUtilization))
    } else {
        None
    }
}

impl std::fmt::Debug for PoolSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolSupervisor")
            .field("owners", &self.owners.keys().collect::<Vec<_>>())
            .field("last_optimization", &self.last_optimization)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use respawn_core::share;

    /// Owner whose counts are set directly by the test.
    struct ScriptedOwner {
        total: usize,
        active: usize,
        memory_mb: f64,
        optimizable: bool,
        resizes: Vec<usize>,
        cleared: bool,
        /// Smallest total `optimize` will accept.
        floor: usize,
    }

    impl ScriptedOwner {
        fn new(total: usize, active: usize) -> Self {
            Self {
                total,
                active,
                memory_mb: 1.0,
                optimizable: true,
                resizes: Vec::new(),
                cleared: false,
                floor: 0,
            }
        }
    }

    impl PoolOwner for ScriptedOwner {
        fn name(&self) -> &str {
            "scripted"
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
            self.memory_mb
        }
        fn can_optimize(&self) -> bool {
            self.optimizable
        }
        fn optimize(&mut self, new_size: usize) {
            self.resizes.push(new_size);
            self.total = new_size.max(self.active).max(self.floor);
        }
        fn preload(&mut self, count: usize) -> usize {
            self.total += count;
            count
        }
        fn clear(&mut self) {
            self.cleared = true;
            self.total = 0;
            self.active = 0;
        }
        fn describe(&self) -> String {
            format!("{}/{} scripted", self.active, self.total)
        }
    }

    const fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    #[test]
    fn test_high_utilization_grows() {
        let owner = share(ScriptedOwner::new(20, 19));
        let mut supervisor = PoolSupervisor::new(SupervisorConfig::default(), Duration::ZERO);
        supervisor.register("hot", owner.clone());

        let commands = supervisor.optimize_now(secs(1));
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].reason, OptimizationReason::HighUtilization);
        assert!(commands[0].to > 20);
        assert_eq!(owner.lock().resizes, vec![30]);
    }

    #[test]
    fn test_low_utilization_shrinks_but_respects_floor() {
        let owner = share(ScriptedOwner::new(20, 2));
        let mut supervisor = PoolSupervisor::new(SupervisorConfig::default(), Duration::ZERO);
        supervisor.register("cold", owner.clone());

        let commands = supervisor.optimize_now(secs(1));
        assert_eq!(commands.len(), 1);
        let target = commands[0].to;
        assert!(target < 20);
        assert!(target >= 2);
        assert!(target >= supervisor.config().global_min_size);
    }

    #[test]
    fn test_shrink_never_below_active() {
        let config = SupervisorConfig {
            shrink_step: 100,
            global_min_size: 1,
            ..SupervisorConfig::default()
        };
        let sample = PoolUtilizationSample {
            total: 40,
            active: 8,
            available: 32,
            utilization: 0.2,
            memory_mb: 0.0,
            sampled_at: Duration::ZERO,
            needs_optimization: true,
        };
        assert_eq!(
            plan_resize(&sample, &config),
            Some((8, OptimizationReason::LowUtilization))
        );
    }

    #[test]
    fn test_grow_clamped_to_ceiling() {
        let config = SupervisorConfig {
            global_max_size: 25,
            ..SupervisorConfig::default()
        };
        let mut sample = PoolUtilizationSample {
            total: 20,
            active: 20,
            available: 0,
            utilization: 1.0,
            memory_mb: 0.0,
            sampled_at: Duration::ZERO,
            needs_optimization: true,
        };
        assert_eq!(plan_resize(&sample, &config).map(|(to, _)| to), Some(25));

        sample.total = 25;
        sample.active = 25;
        assert_eq!(plan_resize(&sample, &config), None);
    }

    #[test]
    fn test_empty_pool_is_left_alone() {
        let owner = share(ScriptedOwner::new(0, 0));
        let mut supervisor = PoolSupervisor::new(SupervisorConfig::default(), Duration::ZERO);
        supervisor.register("empty", owner.clone());

        assert!(supervisor.optimize_now(secs(1)).is_empty());
        assert!(owner.lock().resizes.is_empty());
    }

    #[test]
    fn test_cooldown_rate_limits_passes() {
        let owner = share(ScriptedOwner::new(20, 19));
        let mut supervisor = PoolSupervisor::new(SupervisorConfig::default(), Duration::ZERO);
        supervisor.register("hot", owner.clone());

        assert_eq!(supervisor.optimize_now(secs(1)).len(), 1);
        owner.lock().active = 30; // still saturated after growing to 30
        assert!(supervisor.optimize_now(secs(10)).is_empty());
        assert_eq!(supervisor.optimize_now(secs(31)).len(), 1);
        assert_eq!(owner.lock().resizes, vec![30, 40]);
    }

    #[test]
    fn test_non_optimizable_owner_skipped() {
        let mut scripted = ScriptedOwner::new(20, 20);
        scripted.optimizable = false;
        let owner = share(scripted);
        let mut supervisor = PoolSupervisor::new(SupervisorConfig::default(), Duration::ZERO);
        supervisor.register("locked", owner.clone());

        assert!(supervisor.optimize_now(secs(1)).is_empty());
    }

    #[test]
    fn test_update_runs_on_interval() {
        let owner = share(ScriptedOwner::new(10, 5));
        let mut supervisor = PoolSupervisor::new(SupervisorConfig::default(), Duration::ZERO);
        supervisor.register("steady", owner);

        assert!(supervisor.update(secs(4)).is_none());
        let report = supervisor.update(secs(5)).unwrap();
        assert!(report.optimizations.is_empty());
        assert!(report.emergency.is_empty());
        assert_eq!(supervisor.stats().monitor_passes, 1);

        let sample = supervisor.last_samples()[&OwnerId::from("steady")];
        assert!((sample.utilization - 0.5).abs() < 1e-9);
        assert!(!sample.needs_optimization);
        assert_eq!(sample.sampled_at, secs(5));
    }

    #[test]
    fn test_emergency_cleanup_under_memory_pressure() {
        let config = SupervisorConfig {
            memory_ceiling_mb: 10.0,
            auto_optimize: false,
            ..SupervisorConfig::default()
        };
        let mut idle = ScriptedOwner::new(100, 2);
        idle.memory_mb = 8.0;
        let mut busy = ScriptedOwner::new(50, 40);
        busy.memory_mb = 8.0;
        let idle = share(idle);
        let busy = share(busy);

        let mut supervisor = PoolSupervisor::new(config, Duration::ZERO);
        supervisor.register("idle", idle.clone());
        supervisor.register("busy", busy.clone());

        let report = supervisor.monitor_pass(secs(1));
        assert!(report.total_memory_mb > 10.0);
        assert_eq!(report.emergency.len(), 1);
        assert_eq!(report.emergency[0].owner, OwnerId::from("idle"));
        // max(active 2 + buffer 5, floor 5)
        assert_eq!(idle.lock().resizes, vec![7]);
        assert!(busy.lock().resizes.is_empty());
        assert_eq!(supervisor.stats().emergency_cleanups, 1);
    }

    #[test]
    fn test_declined_shrink_is_not_reported() {
        let config = SupervisorConfig {
            memory_ceiling_mb: 1.0,
            ..SupervisorConfig::default()
        };
        let mut clamped = ScriptedOwner::new(100, 2);
        clamped.floor = 100;
        clamped.memory_mb = 4.0;
        let clamped = share(clamped);

        let mut supervisor = PoolSupervisor::new(config, Duration::ZERO);
        supervisor.register("clamped", clamped.clone());

        for pass in 1..=3 {
            let report = supervisor.monitor_pass(secs(pass * 60));
            assert!(report.optimizations.is_empty());
            assert!(report.emergency.is_empty());
        }
        assert_eq!(clamped.lock().total, 100);
        assert_eq!(clamped.lock().resizes.len(), 6);
        let stats = supervisor.stats();
        assert_eq!(stats.shrink_commands, 0);
        assert_eq!(stats.optimization_passes, 0);
        assert_eq!(stats.emergency_cleanups, 3);
    }

    #[test]
    fn test_register_replaces_duplicate_id() {
        let mut supervisor = PoolSupervisor::new(SupervisorConfig::default(), Duration::ZERO);
        supervisor.register("pool", share(ScriptedOwner::new(1, 0)));
        supervisor.register("pool", share(ScriptedOwner::new(2, 0)));
        assert_eq!(supervisor.owner_count(), 1);
        assert_eq!(supervisor.owner("pool").unwrap().lock().total_count(), 2);

        assert!(supervisor.unregister("pool").is_some());
        assert!(supervisor.unregister("pool").is_none());
    }

    #[test]
    fn test_preload_and_clear_all() {
        let owner = share(ScriptedOwner::new(5, 0));
        let mut supervisor = PoolSupervisor::new(SupervisorConfig::default(), Duration::ZERO);
        supervisor.register("pool", owner.clone());

        assert_eq!(supervisor.preload("pool", 3), Some(3));
        assert_eq!(supervisor.preload("missing", 3), None);
        assert_eq!(owner.lock().total, 8);

        supervisor.clear_all();
        assert!(owner.lock().cleared);
    }

    #[test]
    fn test_report_mentions_every_owner() {
        let mut supervisor = PoolSupervisor::new(SupervisorConfig::default(), Duration::ZERO);
        supervisor.register("enemies", share(ScriptedOwner::new(10, 4)));
        supervisor.register("combat_text", share(ScriptedOwner::new(30, 3)));

        let report = supervisor.report();
        assert!(report.contains("[enemies] 40%"));
        assert!(report.contains("[combat_text] 10%"));
        assert!(report.contains("Total: 7/40 units active"));
    }
}
