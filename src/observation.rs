use rapier2d::prelude::*;

use crate::config::EnvironmentBounds;
use crate::creature::wrap_angle;
use crate::task::TaskStatus;
use crate::world::CreatureState;

// Normalisation constants
pub const POSITION_SCALE: Real = 10.0;
pub const GROUND_CONTACT_THRESHOLD: Real = 0.5;
pub const RUNNING_OBSERVATION_SIZE: usize = 8;

pub trait ObservationBuilder: Send {
    /// Forget any remembered frame; called on every episode reset.
    fn reset(&mut self);

    /// Length of the vectors produced for a creature with `bone_count` bones.
    fn size(&self, bone_count: usize) -> usize;

    fn build(
        &mut self,
        state: &CreatureState,
        status: &TaskStatus,
        bounds: &EnvironmentBounds,
    ) -> Vec<f32>;
}

#[derive(Debug, Clone, PartialEq)]
struct ReachFrame {
    center_of_mass: Vector<Real>,
    bones_relative: Vec<Vector<Real>>,
    target_relative: Vector<Real>,
}

/// Positions divided by [`POSITION_SCALE`], for the current and the previous
/// frame: centre of mass, every bone relative to it, and the target relative
/// to it. `4 * bones + 8` values.
#[derive(Debug, Clone, Default)]
pub struct ReachObservation {
    previous: Option<ReachFrame>,
}

impl ReachObservation {
    pub fn new() -> Self {
        Self::default()
    }

    fn frame(state: &CreatureState, target: Vector<Real>) -> ReachFrame {
        let center_of_mass = state.mean_position();
        ReachFrame {
            center_of_mass,
            bones_relative: state
                .positions
                .iter()
                .map(|position| position - center_of_mass)
                .collect(),
            target_relative: target - center_of_mass,
        }
    }

    fn flatten_frame(frame: &ReachFrame, flat: &mut Vec<f32>) {
        let mut push = |v: Vector<Real>| {
            flat.push(v.x / POSITION_SCALE);
            flat.push(v.y / POSITION_SCALE);
        };
        push(frame.center_of_mass);
        for bone in &frame.bones_relative {
            push(*bone);
        }
        push(frame.target_relative);
    }
}

impl ObservationBuilder for ReachObservation {
    fn reset(&mut self) {
        self.previous = None;
    }

    fn size(&self, bone_count: usize) -> usize {
        bone_count * 4 + 8
    }

    fn build(
        &mut self,
        state: &CreatureState,
        status: &TaskStatus,
        _bounds: &EnvironmentBounds,
    ) -> Vec<f32> {
        let target = status.target.unwrap_or_else(|| state.mean_position());
        let current = Self::frame(state, target);
        // The first frame of an episode repeats itself so velocity-like
        // differences start at zero.
        let previous = match self.previous.take() {
            Some(frame) if frame.bones_relative.len() == current.bones_relative.len() => frame,
            _ => current.clone(),
        };

        let mut flat = Vec::with_capacity(self.size(state.bone_count()));
        Self::flatten_frame(&current, &mut flat);
        Self::flatten_frame(&previous, &mut flat);

        self.previous = Some(current);
        flat
    }
}

/// Eight body-level features for the running task.
#[derive(Debug, Clone, Default)]
pub struct RunningObservation;

impl RunningObservation {
    pub fn new() -> Self {
        Self
    }
}

impl ObservationBuilder for RunningObservation {
    fn reset(&mut self) {}

    fn size(&self, _bone_count: usize) -> usize {
        RUNNING_OBSERVATION_SIZE
    }

    fn build(
        &mut self,
        state: &CreatureState,
        status: &TaskStatus,
        bounds: &EnvironmentBounds,
    ) -> Vec<f32> {
        let heading = status.heading.unwrap_or_else(|| vector![1.0, 0.0]);
        let count = state.bone_count();
        if count == 0 {
            let mut flat = vec![0.0; RUNNING_OBSERVATION_SIZE];
            flat[6] = heading.x;
            flat[7] = heading.y;
            return flat;
        }
        let n = count as Real;

        let heights = state.positions.iter().map(|p| p.y - bounds.ground_level);
        let lowest = heights.clone().fold(Real::INFINITY, Real::min);
        let grounded = heights.filter(|&h| h <= GROUND_CONTACT_THRESHOLD).count();

        let mean_velocity = state
            .velocities
            .iter()
            .fold(Vector::zeros(), |acc: Vector<Real>, v| acc + v)
            / n;
        let mean_angular_velocity = state.angular_velocities.iter().sum::<Real>() / n;
        let mean_rotation = state.angles.iter().map(|&a| wrap_angle(a)).sum::<Real>() / n;

        vec![
            lowest,
            mean_velocity.x,
            mean_velocity.y,
            mean_angular_velocity,
            grounded as Real,
            mean_rotation / std::f32::consts::PI,
            heading.x,
            heading.y,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(positions: &[[Real; 2]]) -> CreatureState {
        CreatureState {
            positions: positions.iter().map(|p| vector![p[0], p[1]]).collect(),
            angles: vec![0.0; positions.len()],
            velocities: vec![Vector::zeros(); positions.len()],
            angular_velocities: vec![0.0; positions.len()],
        }
    }

    fn reach_status(target: [Real; 2]) -> TaskStatus {
        TaskStatus {
            target: Some(vector![target[0], target[1]]),
            ..TaskStatus::default()
        }
    }

    #[test]
    fn reach_observation_has_documented_size() {
        let mut builder = ReachObservation::new();
        let state = state(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);
        let obs = builder.build(&state, &reach_status([5.0, 0.0]), &EnvironmentBounds::default());
        assert_eq!(obs.len(), 3 * 4 + 8);
        assert_eq!(obs.len(), builder.size(3));
    }

    #[test]
    fn first_frame_repeats_current_values() {
        let mut builder = ReachObservation::new();
        let state = state(&[[10.0, 2.0], [12.0, 2.0]]);
        let obs = builder.build(&state, &reach_status([20.0, 2.0]), &EnvironmentBounds::default());

        let half = obs.len() / 2;
        assert_eq!(&obs[..half], &obs[half..]);
        assert!((obs[0] - 1.1).abs() < 1e-6);
        assert!((obs[half - 2] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn second_frame_remembers_previous_positions() {
        let mut builder = ReachObservation::new();
        let bounds = EnvironmentBounds::default();
        let status = reach_status([20.0, 2.0]);
        builder.build(&state(&[[10.0, 2.0], [12.0, 2.0]]), &status, &bounds);
        let obs = builder.build(&state(&[[11.0, 2.0], [13.0, 2.0]]), &status, &bounds);

        let half = obs.len() / 2;
        assert!((obs[0] - 1.2).abs() < 1e-6);
        assert!((obs[half] - 1.1).abs() < 1e-6);

        builder.reset();
        let fresh = builder.build(&state(&[[11.0, 2.0], [13.0, 2.0]]), &status, &bounds);
        assert_eq!(&fresh[..half], &fresh[half..]);
    }

    #[test]
    fn reach_observation_is_deterministic() {
        let bounds = EnvironmentBounds::default();
        let status = reach_status([3.0, 1.0]);
        let state = state(&[[0.5, 1.5], [1.5, 1.2]]);
        let a = ReachObservation::new().build(&state, &status, &bounds);
        let b = ReachObservation::new().build(&state, &status, &bounds);
        assert_eq!(a, b);
    }

    #[test]
    fn running_observation_features() {
        let bounds = EnvironmentBounds::default();
        let mut state = state(&[[5.0, 1.2], [6.0, 3.0]]);
        state.velocities = vec![vector![1.0, 0.0], vector![3.0, -2.0]];
        state.angular_velocities = vec![0.5, 1.5];
        state.angles = vec![std::f32::consts::FRAC_PI_2, std::f32::consts::FRAC_PI_2];
        let status = TaskStatus {
            heading: Some(vector![-1.0, 0.0]),
            ..TaskStatus::default()
        };

        let obs = RunningObservation::new().build(&state, &status, &bounds);
        assert_eq!(obs.len(), RUNNING_OBSERVATION_SIZE);
        assert!((obs[0] - 0.2).abs() < 1e-5);
        assert_eq!(obs[1], 2.0);
        assert_eq!(obs[2], -1.0);
        assert_eq!(obs[3], 1.0);
        assert_eq!(obs[4], 1.0);
        assert!((obs[5] - 0.5).abs() < 1e-6);
        assert_eq!(obs[6], -1.0);
        assert_eq!(obs[7], 0.0);
    }

    #[test]
    fn running_observation_handles_empty_state() {
        let obs = RunningObservation::new().build(
            &CreatureState::default(),
            &TaskStatus::default(),
            &EnvironmentBounds::default(),
        );
        assert_eq!(obs, vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }
}
