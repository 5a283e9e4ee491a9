use rapier2d::prelude::*;

use crate::config::EnvironmentBounds;
use crate::creature::Creature;
use crate::design::Design;
use crate::muscle::MuscleActuator;
use crate::physics::{PhysicsWorld, RigidBodySnapshot};

/// Parallel per-bone arrays describing the creature, in design order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatureState {
    pub positions: Vec<Vector<Real>>,
    pub angles: Vec<Real>,
    pub velocities: Vec<Vector<Real>>,
    pub angular_velocities: Vec<Real>,
}

impl CreatureState {
    pub fn bone_count(&self) -> usize {
        self.positions.len()
    }

    /// Mean bone position, or the origin for an empty state.
    pub fn mean_position(&self) -> Vector<Real> {
        mean(&self.positions)
    }
}

pub(crate) fn mean(values: &[Vector<Real>]) -> Vector<Real> {
    if values.is_empty() {
        return Vector::zeros();
    }
    values.iter().fold(Vector::zeros(), |acc, v| acc + v) / values.len() as Real
}

/// Ground, walls and one creature in a physics world.
pub struct SimulationWorld {
    physics: PhysicsWorld,
    creature: Creature,
    muscles: MuscleActuator,
    bounds: EnvironmentBounds,
    ground: RigidBodyHandle,
    walls: [RigidBodyHandle; 4],
}

impl SimulationWorld {
    pub fn new(design: &Design, bounds: &EnvironmentBounds) -> Self {
        let mut physics = PhysicsWorld::new(bounds.gravity_vector());
        let ground = physics.create_ground(bounds);
        let walls = physics.create_walls(bounds);
        let creature = Creature::build(design, &mut physics);
        let muscles = MuscleActuator::new(design, &creature);

        Self {
            physics,
            creature,
            muscles,
            bounds: bounds.clone(),
            ground,
            walls,
        }
    }

    pub fn creature(&self) -> &Creature {
        &self.creature
    }

    pub fn muscles(&self) -> &MuscleActuator {
        &self.muscles
    }

    pub fn bounds(&self) -> &EnvironmentBounds {
        &self.bounds
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn ground(&self) -> RigidBodyHandle {
        self.ground
    }

    pub fn walls(&self) -> [RigidBodyHandle; 4] {
        self.walls
    }

    pub fn time(&self) -> Real {
        self.physics.time()
    }

    pub fn set_gravity(&mut self, gravity: Vector<Real>) {
        self.physics.set_gravity(gravity);
    }

    /// Drive the muscles for the coming step.
    pub fn apply_muscle_actions(&mut self, actions: &[Real]) -> bool {
        self.muscles.apply_forces(actions, self.physics.bodies_mut())
    }

    /// Advance the physics by a clamped `dt`; returns the integrated delta.
    pub fn step(&mut self, dt: Real) -> Real {
        self.physics.step(dt)
    }

    pub fn creature_state(&self) -> CreatureState {
        let bodies = self.physics.bodies();
        let mut state = CreatureState::default();
        for body in self
            .creature
            .bones()
            .iter()
            .filter_map(|bone| bodies.get(bone.handle))
        {
            state.positions.push(*body.translation());
            state.angles.push(body.rotation().angle());
            state.velocities.push(*body.linvel());
            state.angular_velocities.push(body.angvel());
        }
        state
    }

    pub fn mean_bone_position(&self) -> Vector<Real> {
        mean(&self.creature.joint_positions(self.physics.bodies()))
    }

    pub fn bone_snapshot(&self, bone_id: &str) -> Option<RigidBodySnapshot> {
        self.physics.body_snapshot(self.creature.body(bone_id)?)
    }

    pub fn joint_angles(&self) -> Vec<(String, Real)> {
        self.creature.joint_angles(self.physics.bodies())
    }

    pub fn muscle_lengths(&self) -> Vec<Real> {
        self.muscles.muscle_lengths(self.physics.bodies())
    }

    /// Put every bone back in its design pose with zero velocity and no
    /// pending muscle force. Callers translate to the start position after.
    pub fn reset(&mut self) {
        self.muscles.release(self.physics.bodies_mut());
        let bodies = self.physics.bodies_mut();
        for bone in self.creature.bones() {
            if let Some(body) = bodies.get_mut(bone.handle) {
                body.set_position(Isometry::new(bone.rest_position, bone.rest_angle), true);
                body.set_linvel(Vector::zeros(), true);
                body.set_angvel(0.0, true);
            }
        }
    }

    /// Shift every bone by `offset`, keeping velocities.
    pub fn translate_creature(&mut self, offset: Vector<Real>) {
        let bodies = self.physics.bodies_mut();
        for bone in self.creature.bones() {
            if let Some(body) = bodies.get_mut(bone.handle) {
                let translation = body.translation() + offset;
                body.set_translation(translation, true);
            }
        }
    }

    /// Move the creature so its mean bone position lands on `target`.
    pub fn place_creature_at(&mut self, target: Vector<Real>) {
        let offset = target - self.mean_bone_position();
        self.translate_creature(offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{BoneSpec, JointSpec, MuscleSpec};

    fn zero_gravity_bounds() -> EnvironmentBounds {
        EnvironmentBounds {
            gravity: [0.0, 0.0],
            ..EnvironmentBounds::default()
        }
    }

    fn bent_pair(bend: Real) -> Design {
        let joint_x = 0.5;
        Design {
            name: "bent-pair".into(),
            bones: vec![
                BoneSpec {
                    id: "a".into(),
                    position: [0.0, 0.0],
                    size: [1.0, 0.2],
                    angle: 0.0,
                    density: 1.0,
                },
                BoneSpec {
                    id: "b".into(),
                    position: [joint_x + 0.5 * bend.cos(), 0.5 * bend.sin()],
                    size: [1.0, 0.2],
                    angle: bend,
                    density: 1.0,
                },
            ],
            joints: vec![JointSpec {
                id: "hinge".into(),
                bone_a: "a".into(),
                bone_b: "b".into(),
                anchor_a: [0.5, 0.0],
                anchor_b: [-0.5, 0.0],
                lower_angle: None,
                upper_angle: None,
                enable_limit: false,
            }],
            muscles: vec![MuscleSpec {
                id: "flexor".into(),
                bone_a: "a".into(),
                bone_b: "b".into(),
                max_force: 500.0,
                rest_length: 1.0,
            }],
        }
    }

    #[test]
    fn state_arrays_are_parallel() {
        let world = SimulationWorld::new(&Design::worm(4), &EnvironmentBounds::default());
        let state = world.creature_state();
        assert_eq!(state.bone_count(), 4);
        assert_eq!(state.angles.len(), 4);
        assert_eq!(state.velocities.len(), 4);
        assert_eq!(state.angular_velocities.len(), 4);
    }

    #[test]
    fn place_creature_moves_mean_position() {
        let mut world = SimulationWorld::new(&Design::worm(3), &zero_gravity_bounds());
        world.place_creature_at(vector![12.0, 6.0]);
        let mean = world.mean_bone_position();
        assert!((mean - vector![12.0, 6.0]).norm() < 1e-4);
    }

    #[test]
    fn reset_restores_design_pose_with_zero_velocity() {
        let design = Design::worm(3);
        let mut world = SimulationWorld::new(&design, &EnvironmentBounds::default());
        world.place_creature_at(vector![20.0, 8.0]);
        for _ in 0..30 {
            world.apply_muscle_actions(&[0.5, -0.5]);
            world.step(1.0 / 60.0);
        }

        world.reset();
        let state = world.creature_state();
        for (position, bone) in state.positions.iter().zip(&design.bones) {
            assert!((position - vector![bone.position[0], bone.position[1]]).norm() < 1e-5);
        }
        assert!(state.velocities.iter().all(|v| v.norm() == 0.0));
        assert!(state.angular_velocities.iter().all(|&w| w == 0.0));
    }

    #[test]
    fn joint_limits_hold_under_random_actuation() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(7);
        let design = Design::worm(4);
        let mut world = SimulationWorld::new(&design, &EnvironmentBounds::default());
        world.place_creature_at(vector![20.0, 3.0]);

        let tolerance = 0.1;
        for _ in 0..300 {
            let actions: Vec<Real> = (0..3).map(|_| rng.gen_range(-1.0..1.0)).collect();
            world.apply_muscle_actions(&actions);
            world.step(1.0 / 60.0);
            for (_, angle) in world.joint_angles() {
                assert!(angle >= -std::f32::consts::FRAC_PI_4 - tolerance);
                assert!(angle <= std::f32::consts::FRAC_PI_4 + tolerance);
            }
        }
    }

    #[test]
    fn relaxed_muscle_settles_at_rest_length() {
        let tolerance = 0.05;
        let mut world = SimulationWorld::new(&bent_pair(1.2), &zero_gravity_bounds());
        world.place_creature_at(vector![20.0, 10.0]);
        let initial_error = (world.muscle_lengths()[0] - 1.0).abs();
        assert!(initial_error > 3.0 * tolerance, "start pose too close to rest: {initial_error}");

        let mut lengths = Vec::with_capacity(60);
        for _ in 0..60 {
            world.apply_muscle_actions(&[0.0]);
            world.step(1.0 / 60.0);
            lengths.push(world.muscle_lengths()[0]);
        }

        // Settled, not merely passing through rest on an oscillation.
        for length in &lengths[50..] {
            let error = (length - 1.0).abs();
            assert!(error < tolerance, "muscle length {length} far from rest");
            assert!(error < 0.3 * initial_error);
        }
    }

    #[test]
    fn creature_does_not_fall_through_ground() {
        let bounds = EnvironmentBounds::default();
        let mut world = SimulationWorld::new(&Design::worm(3), &bounds);
        world.place_creature_at(vector![20.0, bounds.ground_level + 2.0]);
        for _ in 0..240 {
            world.step(1.0 / 60.0);
        }
        let state = world.creature_state();
        assert!(state
            .positions
            .iter()
            .all(|p| p.y > bounds.ground_level - 0.05));
    }
}
