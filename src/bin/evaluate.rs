use anyhow::Result;
use burn_ndarray::{NdArray, NdArrayDevice};
use creature_gym::{
    evaluate_policies, CreatureEnv, Design, MlpPolicy, RewardConfig, TaskConfig, TaskKind,
};
use rapier2d::prelude::Real;
use std::env;
use std::sync::Arc;

const TIME_STEP: Real = 1.0 / 30.0;
const HIDDEN_SIZE: usize = 32;
const INIT_GAIN: f64 = 3.0;
const SPARSITY: f32 = 0.5;

fn parse_arg_usize(args: &[String], index: usize, default: usize) -> usize {
    args.get(index)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_arg_string(args: &[String], index: usize, default: &str) -> String {
    args.get(index).cloned().unwrap_or_else(|| default.to_string())
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().collect();

    // Args: [0]=bin, [1]=population, [2]=segments, [3]=task (run | reach)
    let population = parse_arg_usize(&args, 1, 32);
    let segments = parse_arg_usize(&args, 2, 4);
    let task_name = parse_arg_string(&args, 3, "run");

    let task = TaskConfig {
        task: match task_name.as_str() {
            "reach" => TaskKind::Reach {
                target: [30.0, 2.0],
                completion_radius: 1.0,
            },
            _ => TaskKind::Run {
                initial_heading: Some([1.0, 0.0]),
            },
        },
        ..TaskConfig::default()
    };
    let reward = RewardConfig::default();
    let design = Arc::new(Design::worm(segments));

    let probe = CreatureEnv::new(Arc::clone(&design), task.clone(), reward.clone())?;
    let observation_size = probe.observation_size();
    let action_size = probe.action_size();
    drop(probe);

    println!(
        "Evaluating {population} random policies: segments={segments}, task={task_name}, observation_size={observation_size}, action_size={action_size}"
    );

    let device = NdArrayDevice::Cpu;
    let policies: Vec<MlpPolicy<NdArray>> = (0..population)
        .map(|_| {
            MlpPolicy::new(
                observation_size,
                HIDDEN_SIZE,
                action_size,
                INIT_GAIN,
                SPARSITY,
                &device,
            )
        })
        .collect();

    let results = evaluate_policies(design, &task, &reward, policies, TIME_STEP)?;

    for (rank, (summary, policy)) in results.iter().take(5).enumerate() {
        println!(
            "#{:<2} reward={:+.3} steps={} outcome={:?} parameters={}",
            rank + 1,
            summary.total_reward,
            summary.steps,
            summary.outcome,
            policy.parameter_count(),
        );
    }
    if let Some((worst, _)) = results.last() {
        println!("worst reward={:+.3}", worst.total_reward);
    }
    Ok(())
}
