use rapier2d::prelude::Real;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{RewardConfig, TaskConfig};
use crate::design::Design;
use crate::env::{CreatureEnv, Outcome};
use crate::error::EnvError;
use crate::policy::PolicyController;

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub total_reward: Real,
    pub steps: usize,
    pub outcome: Option<Outcome>,
}

/// Reset `env` and drive it with `policy` until the episode ends or
/// `max_steps` is reached.
pub fn run_episode<P: PolicyController + ?Sized>(
    env: &mut CreatureEnv,
    policy: &mut P,
    dt: Real,
    max_steps: usize,
) -> Result<EpisodeSummary, EnvError> {
    let mut state = env.reset()?;
    let mut total_reward = 0.0;
    let mut steps = 0;

    while steps < max_steps && !state.done {
        let actions = policy.decide(&state.observations[0]);
        state = env.step(&[actions], dt)?;
        total_reward += state.rewards.first().copied().unwrap_or(0.0);
        steps += 1;
    }

    let outcome = state
        .outcome
        .as_ref()
        .and_then(|outcomes| outcomes.first().copied());
    debug!(total_reward, steps, ?outcome, "episode finished");
    Ok(EpisodeSummary {
        total_reward,
        steps,
        outcome,
    })
}

/// Steps an episode needs to run out its time limit at `dt`.
pub fn steps_for_episode(task: &TaskConfig, dt: Real) -> usize {
    if dt <= 0.0 || !dt.is_finite() {
        return 0;
    }
    (task.max_episode_time / dt).ceil() as usize
}

/// Run one full episode per policy, in parallel, each in its own
/// environment. Results are sorted best total reward first.
pub fn evaluate_policies<P: PolicyController>(
    design: Arc<Design>,
    task: &TaskConfig,
    reward: &RewardConfig,
    policies: Vec<P>,
    dt: Real,
) -> Result<Vec<(EpisodeSummary, P)>, EnvError> {
    let started = Instant::now();
    let max_steps = steps_for_episode(task, dt);
    let count = policies.len();

    let scored: Result<Vec<(EpisodeSummary, P)>, EnvError> = policies
        .into_par_iter()
        .map(|mut policy| {
            let mut env = CreatureEnv::new(Arc::clone(&design), task.clone(), reward.clone())?;
            let summary = run_episode(&mut env, &mut policy, dt, max_steps)?;
            env.destroy();
            Ok((summary, policy))
        })
        .collect();
    let mut scored = scored?;

    scored.sort_by(|a, b| {
        b.0.total_reward
            .partial_cmp(&a.0.total_reward)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let elapsed = started.elapsed().as_secs_f64().max(1e-9);
    let total_steps: usize = scored.iter().map(|(summary, _)| summary.steps).sum();
    info!(
        policies = count,
        total_steps,
        steps_per_sec = total_steps as f64 / elapsed,
        best = scored.first().map(|(s, _)| s.total_reward),
        "evaluated policies"
    );
    Ok(scored)
}
