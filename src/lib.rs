mod physics;
mod design;
mod creature;
mod muscle;
mod world;
mod task;
mod observation;
mod reward;
mod env;
mod aquarium;
mod config;
mod error;
mod policy;
mod rollout;

// Re-export public items
pub use physics::{
    clamp_time_step, PhysicsWorld, RigidBodySnapshot, GROUND_FRICTION, GROUP_CREATURE, GROUP_WORLD,
    MAX_TIME_STEP, POSITION_ITERATIONS, VELOCITY_ITERATIONS,
};
pub use design::{
    BoneSpec, Design, DesignIssue, JointSpec, MuscleSpec, DEFAULT_BONE_DENSITY, DEFAULT_JOINT_LIMIT,
    DEFAULT_MUSCLE_MAX_FORCE,
};
pub use creature::{wrap_angle, Creature, CreatureBone, CreatureJoint};
pub use muscle::{
    spring_force, target_length, MuscleActuator, MuscleSlot, ACTION_LIMIT, MUSCLE_DAMPING,
    SPRING_CONSTANT,
};
pub use world::{CreatureState, SimulationWorld};
pub use task::{ReachTask, RunningTask, TaskEnvironment, TaskPhase, TaskStatus};
pub use observation::{
    ObservationBuilder, ReachObservation, RunningObservation, POSITION_SCALE,
    RUNNING_OBSERVATION_SIZE,
};
pub use reward::{ReachReward, RewardCalculator, RunningReward};
pub use env::{ActionSpace, CreatureEnv, EnvPhase, GameState, Outcome, StepInfo, TaskStrategies};
pub use aquarium::{Aquarium, AquariumCreature, FoodBall};
pub use config::{
    AquariumConfig, EnvironmentBounds, FoodConfig, RewardConfig, TaskConfig, TaskKind,
};
pub use error::EnvError;
pub use policy::{MlpPolicy, PolicyController, RandomPolicy};
pub use rollout::{evaluate_policies, run_episode, steps_for_episode, EpisodeSummary};
