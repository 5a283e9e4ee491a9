use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rapier2d::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{AquariumConfig, TaskConfig, TaskKind};
use crate::design::Design;
use crate::env::{CreatureEnv, GameState, TaskStrategies};
use crate::error::EnvError;
use crate::physics::clamp_time_step;
use crate::policy::PolicyController;
use crate::task::RunningTask;

/// Aquarium episodes never time out on their own.
const AQUARIUM_EPISODE_TIME: Real = Real::MAX;

/// A piece of food falling through the tank.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodBall {
    pub id: Uuid,
    pub position: Vector<Real>,
    pub velocity: Vector<Real>,
    pub radius: Real,
}

pub struct AquariumCreature {
    pub id: Uuid,
    pub design: Arc<Design>,
    pub policy: Option<Box<dyn PolicyController>>,
    pub spawn_position: Vector<Real>,
    pub heading: Vector<Real>,
    pub last_heading_change: Real,
    /// Seconds after `last_heading_change` at which the next random flip happens.
    pub heading_change_after: Real,
    pub food_eaten: u32,
    env: CreatureEnv,
    last_state: Option<GameState>,
}

impl AquariumCreature {
    pub fn env(&self) -> &CreatureEnv {
        &self.env
    }

    pub fn last_state(&self) -> Option<&GameState> {
        self.last_state.as_ref()
    }

    pub fn mean_position(&self) -> Vector<Real> {
        self.env.mean_bone_position().unwrap_or(self.spawn_position)
    }

    fn set_heading(&mut self, heading: Vector<Real>) {
        self.heading = heading;
        if let Some(task) = self.env.task_mut().as_running_mut() {
            task.set_heading(heading);
        }
    }
}

/// Many independent creatures sharing food and heading behaviour.
pub struct Aquarium {
    config: AquariumConfig,
    creatures: Vec<AquariumCreature>,
    food: VecDeque<FoodBall>,
    time: Real,
    rng: ChaCha8Rng,
}

impl Aquarium {
    pub fn new(config: AquariumConfig) -> Result<Self, EnvError> {
        config.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            creatures: Vec::new(),
            food: VecDeque::new(),
            time: 0.0,
            rng,
        })
    }

    pub fn config(&self) -> &AquariumConfig {
        &self.config
    }

    pub fn time(&self) -> Real {
        self.time
    }

    pub fn creatures(&self) -> &[AquariumCreature] {
        &self.creatures
    }

    pub fn creature(&self, id: Uuid) -> Option<&AquariumCreature> {
        self.creatures.iter().find(|creature| creature.id == id)
    }

    pub fn food(&self) -> impl Iterator<Item = &FoodBall> {
        self.food.iter()
    }

    pub fn food_count(&self) -> usize {
        self.food.len()
    }

    /// Add a creature whose mean bone position starts at `position`. Its
    /// environment always runs the running task, whatever task the
    /// single-agent trainer uses.
    pub fn spawn_creature(
        &mut self,
        design: Arc<Design>,
        position: Vector<Real>,
        policy: Option<Box<dyn PolicyController>>,
    ) -> Result<Uuid, EnvError> {
        let heading = vector![1.0, 0.0];
        let task = TaskConfig {
            start_position: [position.x, position.y],
            task: TaskKind::Run {
                initial_heading: Some([heading.x, heading.y]),
            },
            max_episode_time: AQUARIUM_EPISODE_TIME,
            bounds: self.config.bounds.clone(),
            seed: self.rng.gen(),
        };
        let strategies = TaskStrategies::running(
            RunningTask::with_heading(heading, AQUARIUM_EPISODE_TIME),
            &self.config.reward,
        );
        let mut env = CreatureEnv::with_strategies(Arc::clone(&design), task, strategies)?;
        let state = env.reset()?;

        let id = Uuid::new_v4();
        let heading_change_after = self.next_heading_interval();
        self.creatures.push(AquariumCreature {
            id,
            design,
            policy,
            spawn_position: position,
            heading,
            last_heading_change: self.time,
            heading_change_after,
            food_eaten: 0,
            env,
            last_state: Some(state),
        });
        info!(%id, creatures = self.creatures.len(), "spawned aquarium creature");
        Ok(id)
    }

    pub fn attach_policy(
        &mut self,
        id: Uuid,
        policy: Box<dyn PolicyController>,
    ) -> Result<(), EnvError> {
        let creature = self
            .creatures
            .iter_mut()
            .find(|creature| creature.id == id)
            .ok_or(EnvError::UnknownCreature(id))?;
        creature.policy = Some(policy);
        Ok(())
    }

    pub fn remove_creature(&mut self, id: Uuid) -> Result<(), EnvError> {
        let index = self
            .creatures
            .iter()
            .position(|creature| creature.id == id)
            .ok_or(EnvError::UnknownCreature(id))?;
        let mut creature = self.creatures.remove(index);
        creature.env.destroy();
        Ok(())
    }

    /// Remove every creature and every food ball.
    pub fn clear(&mut self) {
        for creature in &mut self.creatures {
            creature.env.destroy();
        }
        self.creatures.clear();
        self.food.clear();
        debug!("aquarium cleared");
    }

    /// Drop a food ball at `position`, evicting the oldest one at capacity.
    pub fn add_food(&mut self, position: Vector<Real>) -> Uuid {
        while self.food.len() >= self.config.food.capacity {
            if let Some(evicted) = self.food.pop_front() {
                debug!(id = %evicted.id, "evicted oldest food ball");
            }
        }
        let ball = FoodBall {
            id: Uuid::new_v4(),
            position,
            velocity: Vector::zeros(),
            radius: self.config.food.radius,
        };
        let id = ball.id;
        self.food.push_back(ball);
        id
    }

    fn next_heading_interval(&mut self) -> Real {
        let interval = self.config.heading_change_interval;
        let jitter = self.config.heading_change_jitter;
        if jitter <= 0.0 {
            return interval;
        }
        interval * self.rng.gen_range(1.0 - jitter..1.0 + jitter)
    }

    /// Advance every creature and food ball by one tick.
    pub fn tick(&mut self, dt: Real) -> Result<(), EnvError> {
        let dt = clamp_time_step(dt);
        self.time += dt;

        self.integrate_food(dt);
        self.update_headings();

        for index in 0..self.creatures.len() {
            let action_size = self.creatures[index].env.action_size();
            let random_actions: Vec<f32> = if self.creatures[index].policy.is_none() {
                (0..action_size)
                    .map(|_| self.rng.gen_range(-1.0..=1.0))
                    .collect()
            } else {
                Vec::new()
            };

            let creature = &mut self.creatures[index];
            let actions = match creature.policy.as_mut() {
                Some(policy) => policy.decide(creature.env.last_observation()),
                None => random_actions,
            };
            let state = creature.env.step(&[actions], dt)?;
            creature.last_state = Some(state);
        }

        self.consume_food();
        Ok(())
    }

    fn integrate_food(&mut self, dt: Real) {
        let gravity = self.config.bounds.gravity_vector();
        let ground = self.config.bounds.ground_level;
        let damping = (1.0 - self.config.food.drag * dt).max(0.0);
        for ball in &mut self.food {
            ball.velocity = (ball.velocity + gravity * dt) * damping;
            ball.position += ball.velocity * dt;
            if ball.position.y - ball.radius < ground {
                ball.position.y = ground + ball.radius;
                ball.velocity.y = ball.velocity.y.max(0.0);
            }
        }
    }

    fn update_headings(&mut self) {
        let time = self.time;
        let mut flipped = 0usize;
        for index in 0..self.creatures.len() {
            let mean = self.creatures[index].mean_position();
            let nearest_food = self
                .food
                .iter()
                .map(|ball| (ball, (ball.position - mean).norm()))
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(ball, _)| ball.position);

            if let Some(food) = nearest_food {
                let heading = if food.x >= mean.x {
                    vector![1.0, 0.0]
                } else {
                    vector![-1.0, 0.0]
                };
                let creature = &mut self.creatures[index];
                creature.set_heading(heading);
                // Chasing food restarts the wander timer.
                creature.last_heading_change = time;
                continue;
            }

            let creature = &self.creatures[index];
            if time - creature.last_heading_change >= creature.heading_change_after {
                let heading = -creature.heading;
                let next = self.next_heading_interval();
                let creature = &mut self.creatures[index];
                creature.set_heading(heading);
                creature.last_heading_change = time;
                creature.heading_change_after = next;
                flipped += 1;
            }
        }
        if flipped > 0 {
            debug!(flipped, time, "random heading changes");
        }
    }

    fn consume_food(&mut self) {
        let capture_radius = self.config.food.capture_radius;
        for creature in &mut self.creatures {
            let mean = creature.mean_position();
            let before = self.food.len();
            self.food
                .retain(|ball| (ball.position - mean).norm() > capture_radius);
            let eaten = before - self.food.len();
            if eaten > 0 {
                creature.food_eaten += eaten as u32;
                debug!(id = %creature.id, eaten, total = creature.food_eaten, "creature ate food");
            }
        }
    }

    /// Summary line per creature, for logging.
    pub fn log_summary(&self) {
        if self.creatures.is_empty() {
            warn!("aquarium has no creatures");
            return;
        }
        for creature in &self.creatures {
            let mean = creature.mean_position();
            info!(
                id = %creature.id,
                design = %creature.design.name,
                x = mean.x,
                y = mean.y,
                heading = creature.heading.x,
                food = creature.food_eaten,
                "aquarium creature"
            );
        }
    }
}
