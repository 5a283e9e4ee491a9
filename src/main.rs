use anyhow::{bail, Result};
use creature_gym::{
    Aquarium, AquariumConfig, CreatureEnv, Design, PolicyController, RandomPolicy, RewardConfig,
    TaskConfig, TaskKind,
};
use rand::Rng;
use rapier2d::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const DEFAULT_STEPS: usize = 240;
const DEFAULT_MODE: &str = "run";
const PRINT_INTERVAL: usize = 30;
const TIME_STEP: Real = 1.0 / 60.0;
const WORM_SEGMENTS: usize = 4;
const AQUARIUM_CREATURES: usize = 4;

fn main() -> Result<()> {
    init_tracing();

    // Args: [1]=steps, [2]=mode (run | reach | aquarium)
    let steps = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<usize>().ok())
        .unwrap_or(DEFAULT_STEPS);
    let mode = std::env::args()
        .nth(2)
        .unwrap_or_else(|| DEFAULT_MODE.to_string());

    println!("Running headless creature simulation ({mode}) for {steps} steps...");

    let start_time = Instant::now();
    match mode.as_str() {
        "run" | "reach" => run_single(&mode, steps)?,
        "aquarium" => run_aquarium(steps)?,
        other => bail!("unknown mode {other:?}; expected run, reach or aquarium"),
    }

    let duration = start_time.elapsed();
    let steps_per_second = steps as f64 / duration.as_secs_f64().max(1e-9);

    println!("Simulation complete.");
    println!("Total time: {:.2} seconds", duration.as_secs_f64());
    println!("Steps per second: {:.2}", steps_per_second);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn run_single(mode: &str, steps: usize) -> Result<()> {
    let task = if mode == "reach" {
        TaskKind::Reach {
            target: [30.0, 2.0],
            completion_radius: 1.0,
        }
    } else {
        TaskKind::Run {
            initial_heading: None,
        }
    };
    let config = TaskConfig {
        task,
        ..TaskConfig::default()
    };

    let mut env = CreatureEnv::new(Design::worm(WORM_SEGMENTS), config, RewardConfig::default())?;
    let mut policy = RandomPolicy::new(env.action_size(), 0);
    let mut state = env.reset()?;
    let mut total_reward = 0.0;
    let mut episodes = 0;

    for step in 0..steps {
        let actions = policy.decide(&state.observations[0]);
        state = env.step(&[actions], TIME_STEP)?;
        total_reward += state.rewards[0];

        if step % PRINT_INTERVAL == 0 || step == steps - 1 {
            if let Some(mean) = env.mean_bone_position() {
                println!(
                    "step {:>4}: mean=({:+.2}, {:+.2}) reward={:+.3} total={:+.3}",
                    step + 1,
                    mean.x,
                    mean.y,
                    state.rewards[0],
                    total_reward,
                );
            }
        }

        if state.done {
            episodes += 1;
            info!(episode = episodes, outcome = ?state.outcome, total_reward, "episode finished");
            total_reward = 0.0;
            state = env.reset()?;
        }
    }

    env.destroy();
    Ok(())
}

fn run_aquarium(steps: usize) -> Result<()> {
    let config = AquariumConfig::default();
    let width = config.bounds.width;
    let height = config.bounds.height;
    let mut aquarium = Aquarium::new(config)?;
    let design = Arc::new(Design::worm(WORM_SEGMENTS));
    let mut rng = rand::thread_rng();

    for i in 0..AQUARIUM_CREATURES {
        let x = width * (i as Real + 1.0) / (AQUARIUM_CREATURES as Real + 1.0);
        aquarium.spawn_creature(Arc::clone(&design), vector![x, 3.0], None)?;
    }

    for step in 0..steps {
        if step % (PRINT_INTERVAL * 2) == 0 {
            let x = rng.gen_range(1.0..width - 1.0);
            aquarium.add_food(vector![x, height - 2.0]);
        }
        aquarium.tick(TIME_STEP)?;

        if step % PRINT_INTERVAL == 0 || step == steps - 1 {
            let eaten: u32 = aquarium.creatures().iter().map(|c| c.food_eaten).sum();
            println!(
                "step {:>4}: creatures={} food={} eaten={}",
                step + 1,
                aquarium.creatures().len(),
                aquarium.food_count(),
                eaten,
            );
        }
    }

    aquarium.log_summary();
    aquarium.clear();
    Ok(())
}
