use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{RewardConfig, TaskConfig, TaskKind};
use crate::design::Design;
use crate::error::EnvError;
use crate::observation::{ObservationBuilder, ReachObservation, RunningObservation};
use crate::reward::{ReachReward, RewardCalculator, RunningReward};
use crate::task::{ReachTask, RunningTask, TaskEnvironment, TaskStatus};
use crate::world::SimulationWorld;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    Tie,
}

/// Bounds of one action slot. Every muscle slot is continuous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionSpace {
    Continuous { low: Real, high: Real },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepInfo {
    pub step_count: u64,
    pub elapsed_time: Real,
    pub distance_to_target: Option<Real>,
    pub distance_in_direction: Option<Real>,
}

/// Result of `reset` and `step`: one observation and reward per agent.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub observations: Vec<Vec<f32>>,
    pub rewards: Vec<f32>,
    pub done: bool,
    pub outcome: Option<Vec<Outcome>>,
    pub info: StepInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvPhase {
    Uninitialized,
    Ready,
    Stepping,
    Done,
    Destroyed,
}

/// The task, observation and reward strategies an environment runs with.
pub struct TaskStrategies {
    pub task: Box<dyn TaskEnvironment>,
    pub observation: Box<dyn ObservationBuilder>,
    pub reward: Box<dyn RewardCalculator>,
}

impl TaskStrategies {
    pub fn new(
        task: impl TaskEnvironment + 'static,
        observation: impl ObservationBuilder + 'static,
        reward: impl RewardCalculator + 'static,
    ) -> Self {
        Self {
            task: Box::new(task),
            observation: Box::new(observation),
            reward: Box::new(reward),
        }
    }

    /// Pick the matching strategies for the configured task kind.
    pub fn for_config(task: &TaskConfig, reward: &RewardConfig) -> Self {
        match &task.task {
            TaskKind::Reach {
                target,
                completion_radius,
            } => Self::new(
                ReachTask::new(
                    vector![target[0], target[1]],
                    *completion_radius,
                    task.max_episode_time,
                ),
                ReachObservation::new(),
                ReachReward::new(reward.clone()),
            ),
            TaskKind::Run { initial_heading } => {
                let running = match initial_heading {
                    Some(heading) => RunningTask::with_heading(
                        vector![heading[0], heading[1]],
                        task.max_episode_time,
                    ),
                    None => RunningTask::randomized(task.max_episode_time, task.seed),
                };
                Self::running(running, reward)
            }
        }
    }

    pub fn running(task: RunningTask, reward: &RewardConfig) -> Self {
        Self::new(task, RunningObservation::new(), RunningReward::new(reward.clone()))
    }
}

/// One creature, one task: the single-agent `reset`/`step` contract.
pub struct CreatureEnv {
    design: Arc<Design>,
    config: TaskConfig,
    world: Option<SimulationWorld>,
    strategies: TaskStrategies,
    phase: EnvPhase,
    step_count: u64,
    outcome: Option<Vec<Outcome>>,
    last_observation: Vec<f32>,
    observation_size: usize,
}

impl CreatureEnv {
    pub fn new(
        design: impl Into<Arc<Design>>,
        task: TaskConfig,
        reward: RewardConfig,
    ) -> Result<Self, EnvError> {
        let strategies = TaskStrategies::for_config(&task, &reward);
        Self::with_strategies(design, task, strategies)
    }

    /// Build an environment around pre-built strategies. The task kind in
    /// `task` is ignored; only its start position, bounds and timing are used.
    pub fn with_strategies(
        design: impl Into<Arc<Design>>,
        task: TaskConfig,
        strategies: TaskStrategies,
    ) -> Result<Self, EnvError> {
        let design = design.into();
        task.validate()?;
        if design.bones.is_empty() {
            return Err(EnvError::EmptyDesign(design.name.clone()));
        }
        for issue in design.validate() {
            warn!(design = %design.name, %issue, "design issue");
        }

        let world = SimulationWorld::new(&design, &task.bounds);
        let observation_size = strategies
            .observation
            .size(world.creature().bones().len());

        Ok(Self {
            design,
            config: task,
            world: Some(world),
            strategies,
            phase: EnvPhase::Uninitialized,
            step_count: 0,
            outcome: None,
            last_observation: Vec::new(),
            observation_size,
        })
    }

    pub fn design(&self) -> &Arc<Design> {
        &self.design
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn phase(&self) -> EnvPhase {
        self.phase
    }

    pub fn observation_size(&self) -> usize {
        self.observation_size
    }

    /// One action per design muscle.
    pub fn action_size(&self) -> usize {
        self.design.muscles.len()
    }

    pub fn action_spaces(&self) -> Vec<ActionSpace> {
        vec![ActionSpace::Continuous { low: -1.0, high: 1.0 }; self.action_size()]
    }

    pub fn outcome(&self) -> Option<&[Outcome]> {
        self.outcome.as_deref()
    }

    pub fn last_observation(&self) -> &[f32] {
        &self.last_observation
    }

    pub fn world(&self) -> Option<&SimulationWorld> {
        self.world.as_ref()
    }

    pub fn task(&self) -> &dyn TaskEnvironment {
        self.strategies.task.as_ref()
    }

    pub fn task_mut(&mut self) -> &mut dyn TaskEnvironment {
        self.strategies.task.as_mut()
    }

    pub fn mean_bone_position(&self) -> Option<Vector<Real>> {
        self.world.as_ref().map(SimulationWorld::mean_bone_position)
    }

    /// Displace the creature without integrating physics.
    pub fn translate_creature(&mut self, offset: Vector<Real>) -> Result<(), EnvError> {
        self.world_mut()?.translate_creature(offset);
        Ok(())
    }

    fn world_mut(&mut self) -> Result<&mut SimulationWorld, EnvError> {
        self.world.as_mut().ok_or(EnvError::Destroyed)
    }

    pub fn reset(&mut self) -> Result<GameState, EnvError> {
        let start = vector![self.config.start_position[0], self.config.start_position[1]];
        let world = self.world.as_mut().ok_or(EnvError::Destroyed)?;
        world.reset();
        world.place_creature_at(start);
        let mean_position = world.mean_bone_position();

        let strategies = &mut self.strategies;
        strategies.task.reset(mean_position);
        // Completion is only latched by `step`, so a start inside the target
        // still earns the bonus on the first step.
        let status = strategies.task.status(mean_position);
        strategies.observation.reset();
        strategies.reward.reset(&status);
        let observation = strategies
            .observation
            .build(&world.creature_state(), &status, world.bounds());

        self.step_count = 0;
        self.outcome = None;
        self.phase = EnvPhase::Ready;
        self.last_observation = observation.clone();
        debug!(design = %self.design.name, "environment reset");

        Ok(GameState {
            observations: vec![observation],
            rewards: vec![0.0],
            done: false,
            outcome: None,
            info: self.info(&status),
        })
    }

    /// Advance one step. `actions` holds one vector per agent; a single-agent
    /// environment reads the first.
    pub fn step(&mut self, actions: &[Vec<f32>], dt: Real) -> Result<GameState, EnvError> {
        match self.phase {
            EnvPhase::Uninitialized => return Err(EnvError::NotReset),
            EnvPhase::Destroyed => return Err(EnvError::Destroyed),
            EnvPhase::Ready | EnvPhase::Stepping | EnvPhase::Done => {}
        }
        if actions.len() > 1 {
            warn!(agents = actions.len(), "single-agent environment ignores extra action vectors");
        }
        let agent_actions = actions.first().map(Vec::as_slice).unwrap_or(&[]);

        let world = self.world.as_mut().ok_or(EnvError::Destroyed)?;
        world.apply_muscle_actions(agent_actions);
        let dt = world.step(dt);

        let strategies = &mut self.strategies;
        strategies.task.step(dt);
        let mean_position = world.mean_bone_position();
        let status = strategies.task.evaluate(mean_position);

        let reward = strategies.reward.calculate(&status, dt);
        strategies.reward.commit(&status);

        let observation = strategies
            .observation
            .build(&world.creature_state(), &status, world.bounds());

        let done = status.is_done();
        self.outcome = if status.completed {
            Some(vec![Outcome::Win])
        } else if status.time_limit_reached {
            Some(vec![Outcome::Loss])
        } else {
            None
        };
        self.phase = if done { EnvPhase::Done } else { EnvPhase::Stepping };
        self.step_count += 1;
        self.last_observation = observation.clone();

        Ok(GameState {
            observations: vec![observation],
            rewards: vec![reward],
            done,
            outcome: self.outcome.clone(),
            info: self.info(&status),
        })
    }

    fn info(&self, status: &TaskStatus) -> StepInfo {
        StepInfo {
            step_count: self.step_count,
            elapsed_time: status.elapsed_time,
            distance_to_target: status.distance_to_target,
            distance_in_direction: status.distance_in_direction,
        }
    }

    /// Release the physics world. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.phase == EnvPhase::Destroyed {
            return;
        }
        self.world = None;
        self.phase = EnvPhase::Destroyed;
        self.last_observation.clear();
        debug!(design = %self.design.name, "environment destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.phase == EnvPhase::Destroyed
    }
}
