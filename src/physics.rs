use rapier2d::{geometry::DefaultBroadPhase, prelude::*};
use std::num::NonZeroUsize;

use crate::config::EnvironmentBounds;

// Solver settings
pub const MAX_TIME_STEP: Real = 0.1;
pub const VELOCITY_ITERATIONS: usize = 8;
pub const POSITION_ITERATIONS: usize = 10;

// Collision groups
pub const GROUP_WORLD: u32 = 0b0001;
pub const GROUP_CREATURE: u32 = 0b0010;

// Static geometry
pub const GROUND_THICKNESS: Real = 1.0;
pub const WALL_THICKNESS: Real = 1.0;
pub const GROUND_FRICTION: Real = 0.9;

#[derive(Debug, Clone)]
pub struct RigidBodySnapshot {
    pub position: [Real; 2],
    pub velocity: [Real; 2],
    pub rotation: Real,
    pub angular_velocity: Real,
}

/// Clamp a frame delta into the range the solver stays stable in.
pub fn clamp_time_step(dt: Real) -> Real {
    if dt.is_nan() {
        return 0.0;
    }
    dt.clamp(0.0, MAX_TIME_STEP)
}

/// Owns one rapier pipeline and every set that goes with it.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pub(crate) island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    pub(crate) rigid_body_set: RigidBodySet,
    pub(crate) collider_set: ColliderSet,
    pub(crate) impulse_joint_set: ImpulseJointSet,
    pub(crate) multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    time: Real,
}

impl PhysicsWorld {
    pub fn new(gravity: Vector<Real>) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.num_solver_iterations =
            NonZeroUsize::new(VELOCITY_ITERATIONS).unwrap_or(NonZeroUsize::MIN);
        integration_parameters.num_internal_stabilization_iterations = POSITION_ITERATIONS;

        Self {
            pipeline: PhysicsPipeline::new(),
            gravity,
            integration_parameters,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            time: 0.0,
        }
    }

    /// Static ground whose top surface sits exactly at `ground_level`.
    pub fn create_ground(&mut self, bounds: &EnvironmentBounds) -> RigidBodyHandle {
        self.insert_static_box(
            vector![bounds.width / 2.0, bounds.ground_level - GROUND_THICKNESS / 2.0],
            [bounds.width / 2.0, GROUND_THICKNESS / 2.0],
        )
    }

    /// Left, right, top and bottom walls just outside the world rectangle.
    pub fn create_walls(&mut self, bounds: &EnvironmentBounds) -> [RigidBodyHandle; 4] {
        let half_wall = WALL_THICKNESS / 2.0;
        let vertical = [half_wall, bounds.height / 2.0 + WALL_THICKNESS];
        let horizontal = [bounds.width / 2.0 + WALL_THICKNESS, half_wall];
        [
            self.insert_static_box(vector![-half_wall, bounds.height / 2.0], vertical),
            self.insert_static_box(
                vector![bounds.width + half_wall, bounds.height / 2.0],
                vertical,
            ),
            self.insert_static_box(
                vector![bounds.width / 2.0, bounds.height + half_wall],
                horizontal,
            ),
            self.insert_static_box(vector![bounds.width / 2.0, -half_wall], horizontal),
        ]
    }

    fn insert_static_box(&mut self, center: Vector<Real>, half_extents: [Real; 2]) -> RigidBodyHandle {
        let body = RigidBodyBuilder::fixed().translation(center).build();
        let handle = self.rigid_body_set.insert(body);
        let collider = ColliderBuilder::cuboid(half_extents[0], half_extents[1])
            .restitution(0.0)
            .friction(GROUND_FRICTION)
            .collision_groups(InteractionGroups::new(
                Group::from_bits_truncate(GROUP_WORLD),
                Group::from_bits_truncate(GROUP_CREATURE),
            ))
            .build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);
        handle
    }

    /// Advance the world by `dt` seconds, clamped to [`MAX_TIME_STEP`].
    /// Returns the delta that was actually integrated.
    pub fn step(&mut self, dt: Real) -> Real {
        let dt = clamp_time_step(dt);
        if dt <= 0.0 {
            return 0.0;
        }
        self.integration_parameters.dt = dt;

        let physics_hooks = ();
        let event_handler = ();
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &physics_hooks,
            &event_handler,
        );
        self.time += dt;
        dt
    }

    pub fn time(&self) -> Real {
        self.time
    }

    pub fn gravity(&self) -> Vector<Real> {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vector<Real>) {
        self.gravity = gravity;
    }

    pub fn bodies(&self) -> &RigidBodySet {
        &self.rigid_body_set
    }

    pub fn bodies_mut(&mut self) -> &mut RigidBodySet {
        &mut self.rigid_body_set
    }

    pub fn body_snapshot(&self, handle: RigidBodyHandle) -> Option<RigidBodySnapshot> {
        self.rigid_body_set.get(handle).map(|body| RigidBodySnapshot {
            position: [body.translation().x, body.translation().y],
            velocity: [body.linvel().x, body.linvel().y],
            rotation: body.rotation().angle(),
            angular_velocity: body.angvel(),
        })
    }

    /// Remove a body together with its colliders and joints.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_large_and_negative_deltas() {
        assert_eq!(clamp_time_step(1.0), MAX_TIME_STEP);
        assert_eq!(clamp_time_step(-0.5), 0.0);
        assert_eq!(clamp_time_step(Real::NAN), 0.0);
        assert_eq!(clamp_time_step(0.016), 0.016);
    }

    #[test]
    fn ground_top_sits_at_ground_level() {
        let bounds = EnvironmentBounds::default();
        let mut world = PhysicsWorld::new(bounds.gravity_vector());
        let ground = world.create_ground(&bounds);

        let snapshot = world.body_snapshot(ground).expect("ground exists");
        let top = snapshot.position[1] + GROUND_THICKNESS / 2.0;
        assert!((top - bounds.ground_level).abs() < 1e-6);
        assert!((snapshot.position[0] - bounds.width / 2.0).abs() < 1e-6);
    }

    #[test]
    fn falling_ball_comes_to_rest_on_ground() {
        let bounds = EnvironmentBounds::default();
        let mut world = PhysicsWorld::new(bounds.gravity_vector());
        world.create_ground(&bounds);
        world.create_walls(&bounds);

        let body = RigidBodyBuilder::dynamic()
            .translation(vector![bounds.width / 2.0, bounds.ground_level + 2.0])
            .build();
        let handle = world.rigid_body_set.insert(body);
        let collider = ColliderBuilder::ball(0.25)
            .collision_groups(InteractionGroups::new(
                Group::from_bits_truncate(GROUP_CREATURE),
                Group::from_bits_truncate(GROUP_WORLD),
            ))
            .build();
        world
            .collider_set
            .insert_with_parent(collider, handle, &mut world.rigid_body_set);

        for _ in 0..240 {
            world.step(1.0 / 60.0);
        }

        let snapshot = world.body_snapshot(handle).expect("ball exists");
        assert!(snapshot.position[1] > bounds.ground_level);
        assert!(snapshot.position[1] < bounds.ground_level + 0.5);
    }

    #[test]
    fn step_reports_clamped_delta() {
        let mut world = PhysicsWorld::new(vector![0.0, 0.0]);
        assert_eq!(world.step(5.0), MAX_TIME_STEP);
        assert!((world.time() - MAX_TIME_STEP).abs() < 1e-6);
        assert_eq!(world.step(0.0), 0.0);
    }
}
