use creature_gym::{
    CreatureEnv, Design, EnvError, EnvPhase, Outcome, PolicyController, RandomPolicy,
    EnvironmentBounds, RewardConfig, TaskConfig, TaskKind,
};
use rapier2d::prelude::*;

const DT: Real = 1.0 / 60.0;

fn weightless() -> EnvironmentBounds {
    EnvironmentBounds {
        gravity: [0.0, 0.0],
        ..EnvironmentBounds::default()
    }
}

fn reach_task(start: [Real; 2], target: [Real; 2]) -> TaskConfig {
    TaskConfig {
        start_position: start,
        task: TaskKind::Reach {
            target,
            completion_radius: 0.5,
        },
        bounds: weightless(),
        ..TaskConfig::default()
    }
}

fn run_task(heading: [Real; 2]) -> TaskConfig {
    TaskConfig {
        start_position: [10.0, 5.0],
        task: TaskKind::Run {
            initial_heading: Some(heading),
        },
        bounds: weightless(),
        ..TaskConfig::default()
    }
}

#[test]
fn reset_places_creature_at_start_position() {
    for task in [reach_task([12.0, 6.0], [30.0, 6.0]), run_task([1.0, 0.0])] {
        let start = vector![task.start_position[0], task.start_position[1]];
        let mut env = CreatureEnv::new(Design::worm(4), task, RewardConfig::default())
            .expect("valid env");
        env.reset().expect("reset");
        let mean = env.mean_bone_position().expect("world alive");
        assert!((mean - start).norm() < 1e-4, "mean {mean:?} != start {start:?}");

        // A second reset after stepping lands on the same spot.
        for _ in 0..10 {
            env.step(&[vec![0.5, -0.5, 0.5]], DT).expect("step");
        }
        env.reset().expect("reset");
        let mean = env.mean_bone_position().expect("world alive");
        assert!((mean - start).norm() < 1e-4);
    }
}

#[test]
fn action_size_matches_muscle_count() {
    for segments in 1..6 {
        let design = Design::worm(segments);
        let muscles = design.muscles.len();
        let env = CreatureEnv::new(design, run_task([1.0, 0.0]), RewardConfig::default())
            .expect("valid env");
        assert_eq!(env.action_size(), muscles);
        assert_eq!(env.action_spaces().len(), muscles);
    }
}

#[test]
fn reach_reward_follows_progress() {
    let mut env = CreatureEnv::new(
        Design::worm(3),
        reach_task([10.0, 5.0], [30.0, 5.0]),
        RewardConfig::default(),
    )
    .expect("valid env");
    env.reset().expect("reset");

    env.translate_creature(vector![1.0, 0.0]).expect("world alive");
    let closer = env.step(&[vec![0.0, 0.0]], DT).expect("step");
    assert!(closer.rewards[0] > 0.0);

    env.translate_creature(vector![-2.0, 0.0]).expect("world alive");
    let further = env.step(&[vec![0.0, 0.0]], DT).expect("step");
    assert!(further.rewards[0] < 0.0);
}

#[test]
fn running_distance_tracks_displacement_along_heading() {
    let mut env = CreatureEnv::new(Design::worm(3), run_task([1.0, 0.0]), RewardConfig::default())
        .expect("valid env");
    env.reset().expect("reset");

    let mut last = None;
    for _ in 0..10 {
        env.translate_creature(vector![0.1, 0.0]).expect("world alive");
        last = Some(env.step(&[vec![0.0, 0.0]], DT).expect("step"));
    }
    let distance = last
        .and_then(|state| state.info.distance_in_direction)
        .expect("running task reports distance");
    assert!((distance - 1.0).abs() < 0.02, "distance {distance}");
}

#[test]
fn moving_against_heading_is_negative_distance() {
    let mut env = CreatureEnv::new(Design::worm(3), run_task([-1.0, 0.0]), RewardConfig::default())
        .expect("valid env");
    env.reset().expect("reset");
    env.translate_creature(vector![0.5, 0.0]).expect("world alive");
    let state = env.step(&[vec![0.0, 0.0]], DT).expect("step");
    assert!(state.info.distance_in_direction.unwrap_or(0.0) < -0.4);
    assert!(state.rewards[0] < 0.0);
}

#[test]
fn identical_seeds_give_identical_episodes() {
    let task = TaskConfig {
        bounds: EnvironmentBounds::default(),
        ..run_task([1.0, 0.0])
    };
    let rollout = |task: TaskConfig| {
        let mut env = CreatureEnv::new(Design::worm(4), task, RewardConfig::default())
            .expect("valid env");
        let mut policy = RandomPolicy::new(env.action_size(), 42);
        let mut state = env.reset().expect("reset");
        let mut trace = Vec::new();
        for _ in 0..60 {
            let actions = policy.decide(&state.observations[0]);
            state = env.step(&[actions], DT).expect("step");
            trace.push((state.observations[0].clone(), state.rewards[0]));
        }
        trace
    };
    assert_eq!(rollout(task.clone()), rollout(task));
}

#[test]
fn full_episode_lifecycle() {
    let task = TaskConfig {
        max_episode_time: 0.25,
        ..reach_task([10.0, 5.0], [30.0, 5.0])
    };
    let mut env = CreatureEnv::new(Design::worm(2), task, RewardConfig::default())
        .expect("valid env");
    assert_eq!(env.step(&[vec![0.0]], DT), Err(EnvError::NotReset));

    env.reset().expect("reset");
    let mut steps = 0;
    loop {
        let state = env.step(&[vec![0.0]], DT).expect("step");
        steps += 1;
        if state.done {
            assert_eq!(state.outcome, Some(vec![Outcome::Loss]));
            break;
        }
        assert!(steps < 100, "episode never ended");
    }
    assert_eq!(env.phase(), EnvPhase::Done);

    env.reset().expect("reset after done");
    assert_eq!(env.phase(), EnvPhase::Ready);
    assert!(env.outcome().is_none());

    env.destroy();
    assert_eq!(env.reset(), Err(EnvError::Destroyed));
}

#[test]
fn task_config_loads_from_json() {
    let json = r#"{
        "start_position": [5.0, 3.0],
        "task": { "type": "reach", "target": [15.0, 3.0], "completion_radius": 0.75 },
        "max_episode_time": 4.0
    }"#;
    let config: TaskConfig = serde_json::from_str(json).expect("valid json");
    assert_eq!(config.bounds, EnvironmentBounds::default());
    assert!(config.validate().is_ok());

    let mut env = CreatureEnv::new(Design::worm(3), config, RewardConfig::default())
        .expect("valid env");
    let state = env.reset().expect("reset");
    assert_eq!(state.observations[0].len(), 3 * 4 + 8);
}

#[test]
fn starting_inside_target_pays_bonus_on_first_step() {
    let bonus_only = RewardConfig {
        progress_reward: 0.0,
        distance_penalty: 0.0,
        time_penalty: 0.0,
        completion_bonus: 10.0,
    };
    let mut env = CreatureEnv::new(
        Design::worm(3),
        reach_task([10.0, 5.0], [10.2, 5.0]),
        bonus_only,
    )
    .expect("valid env");

    let state = env.reset().expect("reset");
    assert!(!state.done);
    assert_eq!(state.rewards, vec![0.0]);

    let state = env.step(&[vec![0.0, 0.0]], DT).expect("step");
    assert!(state.done);
    assert_eq!(state.outcome, Some(vec![Outcome::Win]));
    assert!((state.rewards[0] - 10.0).abs() < 1e-4, "reward {}", state.rewards[0]);
}
