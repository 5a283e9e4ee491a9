use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rapier2d::prelude::*;

/// Episode lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskPhase {
    #[default]
    Idle,
    Running,
    Done,
}

/// Task-level facts about the current step, shared with the reward and
/// observation strategies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskStatus {
    pub elapsed_time: Real,
    pub time_limit_reached: bool,
    pub completed: bool,
    /// True only on the step where `completed` first latched.
    pub just_completed: bool,
    pub mean_position: Vector<Real>,
    pub target: Option<Vector<Real>>,
    pub distance_to_target: Option<Real>,
    pub heading: Option<Vector<Real>>,
    pub distance_in_direction: Option<Real>,
    pub delta_distance_in_direction: Option<Real>,
}

impl TaskStatus {
    pub fn is_done(&self) -> bool {
        self.completed || self.time_limit_reached
    }
}

/// Time keeping shared by both task variants.
#[derive(Debug, Clone, Default)]
struct EpisodeClock {
    elapsed: Real,
    max_time: Real,
    phase: TaskPhase,
}

impl EpisodeClock {
    fn new(max_time: Real) -> Self {
        Self {
            elapsed: 0.0,
            max_time,
            phase: TaskPhase::Idle,
        }
    }

    fn reset(&mut self) {
        self.elapsed = 0.0;
        self.phase = TaskPhase::Running;
    }

    fn step(&mut self, dt: Real) {
        if self.phase == TaskPhase::Idle {
            return;
        }
        self.elapsed += dt.max(0.0);
    }

    fn limit_reached(&self) -> bool {
        self.elapsed >= self.max_time
    }
}

pub trait TaskEnvironment: Send {
    /// Start a new episode with the creature's mean position at `initial_position`.
    fn reset(&mut self, initial_position: Vector<Real>);

    /// Advance episode time.
    fn step(&mut self, dt: Real);

    /// Evaluate the episode against the creature's current mean bone position,
    /// latching completion and advancing per-step tracking.
    fn evaluate(&mut self, mean_position: Vector<Real>) -> TaskStatus;

    /// Status at `mean_position` without latching or advancing anything.
    fn status(&self, mean_position: Vector<Real>) -> TaskStatus;

    fn elapsed_time(&self) -> Real;

    fn max_episode_time(&self) -> Real;

    fn phase(&self) -> TaskPhase;

    fn is_time_limit_reached(&self) -> bool {
        self.elapsed_time() >= self.max_episode_time()
    }

    fn as_running_mut(&mut self) -> Option<&mut RunningTask> {
        None
    }
}

/// Reach a fixed target within a completion radius.
#[derive(Debug, Clone)]
pub struct ReachTask {
    clock: EpisodeClock,
    target: Vector<Real>,
    completion_radius: Real,
    completed: bool,
}

impl ReachTask {
    pub fn new(target: Vector<Real>, completion_radius: Real, max_episode_time: Real) -> Self {
        Self {
            clock: EpisodeClock::new(max_episode_time),
            target,
            completion_radius,
            completed: false,
        }
    }

    pub fn target(&self) -> Vector<Real> {
        self.target
    }

    pub fn completion_radius(&self) -> Real {
        self.completion_radius
    }

    pub fn distance_to_target(&self, mean_position: Vector<Real>) -> Real {
        (self.target - mean_position).norm()
    }

    /// Latches once the creature comes within the completion radius and
    /// stays true for the rest of the episode.
    pub fn is_completed(&mut self, mean_position: Vector<Real>) -> bool {
        if !self.completed && self.distance_to_target(mean_position) <= self.completion_radius {
            self.completed = true;
        }
        self.completed
    }
}

impl TaskEnvironment for ReachTask {
    fn reset(&mut self, _initial_position: Vector<Real>) {
        self.clock.reset();
        self.completed = false;
    }

    fn step(&mut self, dt: Real) {
        self.clock.step(dt);
    }

    fn evaluate(&mut self, mean_position: Vector<Real>) -> TaskStatus {
        let was_completed = self.completed;
        let completed = self.is_completed(mean_position);
        let mut status = self.status(mean_position);
        if self.clock.phase == TaskPhase::Running && status.is_done() {
            self.clock.phase = TaskPhase::Done;
        }
        status.just_completed = completed && !was_completed;
        status
    }

    fn status(&self, mean_position: Vector<Real>) -> TaskStatus {
        TaskStatus {
            elapsed_time: self.clock.elapsed,
            time_limit_reached: self.clock.limit_reached(),
            completed: self.completed,
            mean_position,
            target: Some(self.target),
            distance_to_target: Some(self.distance_to_target(mean_position)),
            ..TaskStatus::default()
        }
    }

    fn elapsed_time(&self) -> Real {
        self.clock.elapsed
    }

    fn max_episode_time(&self) -> Real {
        self.clock.max_time
    }

    fn phase(&self) -> TaskPhase {
        self.clock.phase
    }
}

/// Run as far as possible along a unit heading.
#[derive(Debug, Clone)]
pub struct RunningTask {
    clock: EpisodeClock,
    heading: Vector<Real>,
    randomize_on_reset: bool,
    start_position: Vector<Real>,
    last_position: Vector<Real>,
    rng: ChaCha8Rng,
}

impl RunningTask {
    /// A task with a fixed heading that only changes through [`set_heading`](Self::set_heading).
    pub fn with_heading(heading: Vector<Real>, max_episode_time: Real) -> Self {
        Self {
            clock: EpisodeClock::new(max_episode_time),
            heading: normalize_heading(heading),
            randomize_on_reset: false,
            start_position: Vector::zeros(),
            last_position: Vector::zeros(),
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }

    /// A task whose heading is drawn from `(1, 0)` / `(-1, 0)` on every reset.
    pub fn randomized(max_episode_time: Real, seed: u64) -> Self {
        Self {
            randomize_on_reset: true,
            rng: ChaCha8Rng::seed_from_u64(seed),
            ..Self::with_heading(vector![1.0, 0.0], max_episode_time)
        }
    }

    pub fn heading(&self) -> Vector<Real> {
        self.heading
    }

    pub fn set_heading(&mut self, heading: Vector<Real>) {
        self.heading = normalize_heading(heading);
    }

    /// Signed distance covered along the heading since the episode started.
    pub fn calculate_distance_in_direction(&self, position: Vector<Real>) -> Real {
        (position - self.start_position).dot(&self.heading)
    }

    /// Signed distance covered along the heading since the last evaluation.
    pub fn delta_distance_in_direction(&self, position: Vector<Real>) -> Real {
        (position - self.last_position).dot(&self.heading)
    }
}

fn normalize_heading(heading: Vector<Real>) -> Vector<Real> {
    let norm = heading.norm();
    if norm > 1.0e-6 && norm.is_finite() {
        heading / norm
    } else {
        vector![1.0, 0.0]
    }
}

impl TaskEnvironment for RunningTask {
    fn reset(&mut self, initial_position: Vector<Real>) {
        self.clock.reset();
        self.start_position = initial_position;
        self.last_position = initial_position;
        if self.randomize_on_reset {
            self.heading = if self.rng.gen_bool(0.5) {
                vector![1.0, 0.0]
            } else {
                vector![-1.0, 0.0]
            };
        }
    }

    fn step(&mut self, dt: Real) {
        self.clock.step(dt);
    }

    fn evaluate(&mut self, mean_position: Vector<Real>) -> TaskStatus {
        let status = self.status(mean_position);
        self.last_position = mean_position;
        if self.clock.phase == TaskPhase::Running && status.time_limit_reached {
            self.clock.phase = TaskPhase::Done;
        }
        status
    }

    fn status(&self, mean_position: Vector<Real>) -> TaskStatus {
        TaskStatus {
            elapsed_time: self.clock.elapsed,
            time_limit_reached: self.clock.limit_reached(),
            mean_position,
            heading: Some(self.heading),
            distance_in_direction: Some(self.calculate_distance_in_direction(mean_position)),
            delta_distance_in_direction: Some(self.delta_distance_in_direction(mean_position)),
            ..TaskStatus::default()
        }
    }

    fn elapsed_time(&self) -> Real {
        self.clock.elapsed
    }

    fn max_episode_time(&self) -> Real {
        self.clock.max_time
    }

    fn phase(&self) -> TaskPhase {
        self.clock.phase
    }

    fn as_running_mut(&mut self) -> Option<&mut RunningTask> {
        Some(self)
    }
}
