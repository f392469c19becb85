//! # Wave Simulation
//!
//! Headless run of the full runtime: waves, combat text and the supervisor
//! on one clock, with a scripted player that walks and fights.
//!
//! Usage: `wave_simulation [config.toml] [seconds]`

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use respawn::spatial::{ArenaBounds, TrackedAnchor, Vec3};
use respawn::{GameEvent, GameLoop, RuntimeConfig, TextKind};
use respawn_core::PoolOwner;

/// Default simulated time.
const DEFAULT_SECONDS: u64 = 120;

/// Fixed frame step (60 FPS).
const FRAME: Duration = Duration::from_micros(16_666);

/// Player walking speed (units per second).
const WALK_SPEED: f32 = 4.0;

/// Chance per frame that the player lands a hit.
const HIT_CHANCE: f64 = 0.15;

fn load_config(path: Option<&str>) -> RuntimeConfig {
    let Some(path) = path else {
        return RuntimeConfig::default();
    };
    match RuntimeConfig::load(path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let config = load_config(args.get(1).map(String::as_str));
    let seconds = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SECONDS);

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║               RESPAWN WAVE SIMULATION                            ║");
    println!("║               Waves → Deaths → Combat Text → Supervisor          ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let mut rng = ChaCha8Rng::seed_from_u64(config.waves.seed ^ 0xC0FFEE);
    let anchor = TrackedAnchor::at(Vec3::ZERO);
    let arena = ArenaBounds { half_extent: 200.0 };

    let mut game = match GameLoop::new(config, Box::new(anchor.clone()), Box::new(arena)) {
        Ok(game) => game,
        Err(err) => {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    };
    let combat = game.combat_events();

    println!("Simulating {seconds}s at 60 FPS...");
    let wall_start = Instant::now();
    game.start();

    let frames = seconds * 60;
    let mut player = Vec3::ZERO;
    let mut heading = 0.0_f32;
    let mut kills = 0u64;

    for _ in 0..frames {
        // Wander; turning slowly keeps some enemies behind the despawn radius.
        heading += rng.gen_range(-0.05..0.05);
        player = player.offset_flat(heading, WALK_SPEED * FRAME.as_secs_f32());
        player.x = player.x.clamp(-arena.half_extent, arena.half_extent);
        player.z = player.z.clamp(-arena.half_extent, arena.half_extent);
        anchor.set(player);

        if rng.gen_bool(HIT_CHANCE) {
            let mut spawner = game.spawner().lock();
            let targets = spawner.active_handles();
            if !targets.is_empty() {
                let target = targets[rng.gen_range(0..targets.len())];
                let critical = rng.gen_bool(0.2);
                let damage = if critical { 90 } else { rng.gen_range(20..50) };
                if let Some(enemy) = spawner.enemy_mut(target) {
                    let position = enemy.position;
                    let kind = if critical { TextKind::Critical } else { TextKind::Damage };
                    combat.send(GameEvent::CombatFeedback { amount: damage, kind, position });
                    if enemy.take_damage(damage) {
                        kills += 1;
                        combat.send(GameEvent::CombatFeedback {
                            amount: 10,
                            kind: TextKind::Experience,
                            position,
                        });
                    }
                }
            } else {
                combat.send(GameEvent::CombatFeedback {
                    amount: 0,
                    kind: TextKind::Miss,
                    position: player,
                });
            }
        }

        game.tick(FRAME);
    }

    let wall = wall_start.elapsed();
    let state = game.spawner().lock().state();

    println!("Done in {:.2}s wall time.", wall.as_secs_f64());
    println!();
    game.stats().print_summary();
    println!();
    println!("┌─ WAVES ──────────────────────────────────────────────────────────┐");
    println!("│ Difficulty:         {}", state.difficulty_level);
    println!("│ Active / Ceiling:   {}/{}", state.active_count, state.max_active);
    println!("│ Spawned:            {}", state.total_spawned);
    println!("│ Recycled:           {}", state.total_recycled);
    println!("│ Kills:              {kills}");
    println!("│ Spawn Interval:     {:?}", state.spawn_interval);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();
    println!("{}", game.supervisor().report());
    println!();

    let texts = game.combat_text().lock().describe();
    println!("{texts}");

    game.shutdown();
}
