use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// Physical extent of the world a creature lives in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvironmentBounds {
    /// Width of the world in meters. The ground is centred at `width / 2`.
    pub width: Real,
    /// Height of the world in meters, measured from `y = 0`.
    pub height: Real,
    /// Height of the ground's top surface.
    pub ground_level: Real,
    /// Gravity vector in m/s².
    pub gravity: [Real; 2],
}

impl Default for EnvironmentBounds {
    fn default() -> Self {
        Self {
            width: 40.0,
            height: 20.0,
            ground_level: 1.0,
            gravity: [0.0, -9.81],
        }
    }
}

impl EnvironmentBounds {
    pub fn gravity_vector(&self) -> Vector<Real> {
        vector![self.gravity[0], self.gravity[1]]
    }

    pub fn validate(&self) -> Result<(), EnvError> {
        if !(self.width > 0.0) || !(self.height > 0.0) {
            return Err(EnvError::InvalidConfig("world width and height must be positive"));
        }
        if self.ground_level < 0.0 || self.ground_level >= self.height {
            return Err(EnvError::InvalidConfig("ground level must lie inside the world"));
        }
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(EnvError::InvalidConfig("gravity must be finite"));
        }
        Ok(())
    }
}

/// Which task the creature is trained on.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    /// Reach `target` with the mean bone position, within `completion_radius`.
    Reach {
        target: [Real; 2],
        completion_radius: Real,
    },
    /// Cover as much distance as possible along a heading.
    ///
    /// With `initial_heading` unset the heading is re-drawn from `(±1, 0)` on
    /// every reset.
    Run { initial_heading: Option<[Real; 2]> },
}

impl Default for TaskKind {
    fn default() -> Self {
        TaskKind::Run {
            initial_heading: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskConfig {
    /// Where the mean bone position is placed on reset.
    pub start_position: [Real; 2],
    pub task: TaskKind,
    /// Episode length in seconds of simulated time.
    pub max_episode_time: Real,
    pub bounds: EnvironmentBounds,
    /// Seed for task-level randomness (heading draws).
    pub seed: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            start_position: [20.0, 4.0],
            task: TaskKind::default(),
            max_episode_time: 10.0,
            bounds: EnvironmentBounds::default(),
            seed: 0x5EED_C0DE,
        }
    }
}

impl TaskConfig {
    pub fn validate(&self) -> Result<(), EnvError> {
        self.bounds.validate()?;
        if !(self.max_episode_time > 0.0) {
            return Err(EnvError::InvalidConfig("max episode time must be positive"));
        }
        if !self.start_position.iter().all(|v| v.is_finite()) {
            return Err(EnvError::InvalidConfig("start position must be finite"));
        }
        match &self.task {
            TaskKind::Reach {
                target,
                completion_radius,
            } => {
                if !target.iter().all(|v| v.is_finite()) {
                    return Err(EnvError::InvalidConfig("target must be finite"));
                }
                if !(*completion_radius > 0.0) {
                    return Err(EnvError::InvalidConfig("completion radius must be positive"));
                }
            }
            TaskKind::Run {
                initial_heading: Some(heading),
            } => {
                if !(vector![heading[0], heading[1]].norm() > 1.0e-6) {
                    return Err(EnvError::InvalidConfig("heading must be a non-zero vector"));
                }
            }
            TaskKind::Run {
                initial_heading: None,
            } => {}
        }
        Ok(())
    }
}

/// Tunable reward factors. The running task only uses `progress_reward`
/// and `time_penalty`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RewardConfig {
    pub progress_reward: Real,
    pub distance_penalty: Real,
    pub time_penalty: Real,
    pub completion_bonus: Real,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            progress_reward: 1.0,
            distance_penalty: 0.01,
            time_penalty: 0.01,
            completion_bonus: 10.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FoodConfig {
    /// Maximum number of live food balls; the oldest is evicted beyond this.
    pub capacity: usize,
    pub radius: Real,
    /// Linear drag coefficient (1/s) applied to falling food.
    pub drag: Real,
    /// A creature whose mean bone position is this close eats the ball.
    pub capture_radius: Real,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            radius: 0.25,
            drag: 1.5,
            capture_radius: 1.5,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AquariumConfig {
    pub bounds: EnvironmentBounds,
    pub reward: RewardConfig,
    pub food: FoodConfig,
    /// Mean number of seconds between random heading flips when no food exists.
    pub heading_change_interval: Real,
    /// Relative jitter applied to each creature's flip interval, in `[0, 1)`.
    pub heading_change_jitter: Real,
    pub seed: u64,
}

impl Default for AquariumConfig {
    fn default() -> Self {
        Self {
            bounds: EnvironmentBounds::default(),
            reward: RewardConfig::default(),
            food: FoodConfig::default(),
            heading_change_interval: 5.0,
            heading_change_jitter: 0.5,
            seed: 0xAC0A_121D,
        }
    }
}

impl AquariumConfig {
    pub fn validate(&self) -> Result<(), EnvError> {
        self.bounds.validate()?;
        if self.food.capacity == 0 {
            return Err(EnvError::InvalidConfig("food capacity must be at least one"));
        }
        if !(self.food.radius > 0.0) || !(self.food.capture_radius > 0.0) {
            return Err(EnvError::InvalidConfig("food radii must be positive"));
        }
        if !(self.food.drag >= 0.0) {
            return Err(EnvError::InvalidConfig("food drag must be non-negative"));
        }
        if !(self.heading_change_interval > 0.0) {
            return Err(EnvError::InvalidConfig("heading change interval must be positive"));
        }
        if !(0.0..1.0).contains(&self.heading_change_jitter) {
            return Err(EnvError::InvalidConfig("heading change jitter must be in [0, 1)"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(TaskConfig::default().validate().is_ok());
        assert!(AquariumConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_episode_time() {
        let config = TaskConfig {
            max_episode_time: 0.0,
            ..TaskConfig::default()
        };
        assert!(matches!(config.validate(), Err(EnvError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_heading() {
        let config = TaskConfig {
            task: TaskKind::Run {
                initial_heading: Some([0.0, 0.0]),
            },
            ..TaskConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_ground_above_world() {
        let bounds = EnvironmentBounds {
            ground_level: 25.0,
            ..EnvironmentBounds::default()
        };
        assert!(bounds.validate().is_err());
    }

    #[test]
    fn task_config_parses_with_defaults() {
        let json = r#"{
            "start_position": [5.0, 3.0],
            "task": { "type": "reach", "target": [12.0, 3.0], "completion_radius": 0.5 }
        }"#;
        let config: TaskConfig = serde_json::from_str(json).expect("valid config json");
        assert_eq!(config.start_position, [5.0, 3.0]);
        assert_eq!(config.max_episode_time, TaskConfig::default().max_episode_time);
        assert!(matches!(config.task, TaskKind::Reach { .. }));
        assert!(config.validate().is_ok());
    }
}
