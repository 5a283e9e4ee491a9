use rapier2d::prelude::*;

use crate::config::RewardConfig;
use crate::task::TaskStatus;

pub trait RewardCalculator: Send {
    /// Start tracking a new episode from its initial status.
    fn reset(&mut self, status: &TaskStatus);

    /// Reward for the step that produced `status`. Does not mutate tracking
    /// state; call [`commit`](Self::commit) afterwards.
    fn calculate(&self, status: &TaskStatus, dt: Real) -> Real;

    /// Record `status` as the previous step for the next calculation.
    fn commit(&mut self, status: &TaskStatus);
}

/// Progress towards the target, minus distance and time penalties, plus a
/// one-off bonus when the target is reached.
#[derive(Debug, Clone)]
pub struct ReachReward {
    config: RewardConfig,
    previous_distance: Option<Real>,
}

impl ReachReward {
    pub fn new(config: RewardConfig) -> Self {
        Self {
            config,
            previous_distance: None,
        }
    }

    pub fn previous_distance(&self) -> Option<Real> {
        self.previous_distance
    }
}

impl RewardCalculator for ReachReward {
    fn reset(&mut self, status: &TaskStatus) {
        self.previous_distance = status.distance_to_target;
    }

    fn calculate(&self, status: &TaskStatus, dt: Real) -> Real {
        let Some(current) = status.distance_to_target else {
            return -self.config.time_penalty * dt;
        };
        let previous = self.previous_distance.unwrap_or(current);

        let mut reward = self.config.progress_reward * (previous - current)
            - self.config.distance_penalty * current * dt
            - self.config.time_penalty * dt;
        if status.just_completed {
            reward += self.config.completion_bonus;
        }
        reward
    }

    fn commit(&mut self, status: &TaskStatus) {
        if let Some(distance) = status.distance_to_target {
            self.previous_distance = Some(distance);
        }
    }
}

/// Distance gained along the heading minus a time penalty.
#[derive(Debug, Clone)]
pub struct RunningReward {
    config: RewardConfig,
}

impl RunningReward {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }
}

impl RewardCalculator for RunningReward {
    fn reset(&mut self, _status: &TaskStatus) {}

    fn calculate(&self, status: &TaskStatus, dt: Real) -> Real {
        let delta = status.delta_distance_in_direction.unwrap_or(0.0);
        self.config.progress_reward * delta - self.config.time_penalty * dt
    }

    fn commit(&mut self, _status: &TaskStatus) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reach_status(distance: Real) -> TaskStatus {
        TaskStatus {
            distance_to_target: Some(distance),
            ..TaskStatus::default()
        }
    }

    fn progress_only() -> RewardConfig {
        RewardConfig {
            progress_reward: 1.0,
            distance_penalty: 0.0,
            time_penalty: 0.0,
            completion_bonus: 10.0,
        }
    }

    #[test]
    fn moving_closer_is_rewarded() {
        let mut reward = ReachReward::new(progress_only());
        reward.reset(&reach_status(5.0));

        let closer = reach_status(4.0);
        let r = reward.calculate(&closer, 1.0 / 60.0);
        assert!(r > 0.0);
        assert!((r - 1.0).abs() < 1e-6);
        reward.commit(&closer);

        let further = reach_status(4.5);
        assert!(reward.calculate(&further, 1.0 / 60.0) <= 0.0);
    }

    #[test]
    fn calculate_does_not_advance_previous_distance() {
        let mut reward = ReachReward::new(progress_only());
        reward.reset(&reach_status(5.0));
        let status = reach_status(3.0);
        let first = reward.calculate(&status, 0.1);
        let second = reward.calculate(&status, 0.1);
        assert_eq!(first, second);
        assert_eq!(reward.previous_distance(), Some(5.0));

        reward.commit(&status);
        assert_eq!(reward.previous_distance(), Some(3.0));
        assert_eq!(reward.calculate(&status, 0.1), 0.0);
    }

    #[test]
    fn completion_bonus_is_paid_once() {
        let mut reward = ReachReward::new(progress_only());
        reward.reset(&reach_status(1.0));

        let latched = TaskStatus {
            completed: true,
            just_completed: true,
            ..reach_status(1.0)
        };
        assert_eq!(reward.calculate(&latched, 0.1), 10.0);
        reward.commit(&latched);

        let still_done = TaskStatus {
            completed: true,
            ..reach_status(1.0)
        };
        assert_eq!(reward.calculate(&still_done, 0.1), 0.0);
    }

    #[test]
    fn penalties_scale_with_dt() {
        let config = RewardConfig {
            progress_reward: 0.0,
            distance_penalty: 0.5,
            time_penalty: 2.0,
            completion_bonus: 0.0,
        };
        let mut reward = ReachReward::new(config);
        reward.reset(&reach_status(4.0));
        let r = reward.calculate(&reach_status(4.0), 0.5);
        assert!((r - (-0.5 * 4.0 * 0.5 - 2.0 * 0.5)).abs() < 1e-6);
    }

    #[test]
    fn running_reward_uses_delta_and_time() {
        let config = RewardConfig {
            progress_reward: 2.0,
            time_penalty: 1.0,
            ..RewardConfig::default()
        };
        let reward = RunningReward::new(config);
        let status = TaskStatus {
            delta_distance_in_direction: Some(0.25),
            completed: true,
            just_completed: true,
            ..TaskStatus::default()
        };
        assert!((reward.calculate(&status, 0.1) - (0.5 - 0.1)).abs() < 1e-6);
    }
}
