//! Embodied agents: one body, one controller, one perceive→decide→act loop.

use crate::config::{Actuation, AgentConfig};
use crate::controller::{sanitize_perception, ControllerLogic};
use crate::physics::{signal, NeighborSummary, PhysicsEngine};
use edgeswarm_data::{Action, ControllerNetwork, ObjectId, Perception, Vector2};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Task an agent is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Task {
    /// Reach the target; bonus for getting within `completion_radius` early.
    Push { completion_radius: f64 },
    /// Stay close to the other agents while approaching the target.
    Gather,
    /// Hold the average neighbor signal at the level expected at `spacing`.
    Formation { spacing: f64 },
    /// Travel far from the spawn point.
    Explore,
}

impl Default for Task {
    fn default() -> Self {
        Task::Push {
            completion_radius: 0.5,
        }
    }
}

impl Task {
    pub fn validate(&self) -> anyhow::Result<()> {
        match *self {
            Task::Push { completion_radius } => anyhow::ensure!(
                completion_radius.is_finite() && completion_radius >= 0.0,
                "Completion radius must be non-negative"
            ),
            Task::Formation { spacing } => anyhow::ensure!(
                spacing.is_finite() && spacing >= 0.0,
                "Formation spacing must be non-negative"
            ),
            Task::Gather | Task::Explore => {}
        }
        Ok(())
    }
}

/// What an agent sensed this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub input: Perception,
    pub neighbors: NeighborSummary,
    /// Non-finite perception components replaced by zero.
    pub faults: u32,
}

/// Per-episode record used for scoring.
#[derive(Debug, Clone, Default)]
struct Episode {
    initial_distance: f64,
    final_distance: f64,
    /// Distance to target when each tick's command was issued.
    distances: Vec<f64>,
    /// Average neighbor signal and neighbor count seen each tick.
    signals: Vec<(f64, usize)>,
    path_length: f64,
    max_displacement: f64,
    last_position: Vector2,
}

#[derive(Debug, Clone)]
pub struct EmbodiedAgent {
    body: ObjectId,
    controller: ControllerNetwork,
    spawn: Vector2,
    target: Vector2,
    communication_range: f64,
    ticks: u32,
    episode: Episode,
    fitness: f64,
    fitness_history: Vec<f64>,
}

impl EmbodiedAgent {
    #[must_use]
    pub fn new(
        body: ObjectId,
        controller: ControllerNetwork,
        spawn: Vector2,
        config: &AgentConfig,
    ) -> Self {
        let initial_distance = spawn.distance(config.target);
        Self {
            body,
            controller,
            spawn,
            target: config.target,
            communication_range: config.communication_range,
            ticks: 0,
            episode: Episode {
                initial_distance,
                final_distance: initial_distance,
                last_position: spawn,
                ..Episode::default()
            },
            fitness: 0.0,
            fitness_history: Vec::new(),
        }
    }

    #[must_use]
    pub fn body(&self) -> ObjectId {
        self.body
    }

    #[must_use]
    pub fn controller(&self) -> &ControllerNetwork {
        &self.controller
    }

    #[must_use]
    pub fn communication_range(&self) -> f64 {
        self.communication_range
    }

    #[must_use]
    pub fn spawn(&self) -> Vector2 {
        self.spawn
    }

    #[must_use]
    pub fn target(&self) -> Vector2 {
        self.target
    }

    #[must_use]
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    #[must_use]
    pub fn fitness_history(&self) -> &[f64] {
        &self.fitness_history
    }

    #[must_use]
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Current exploration-noise amplitude, decaying exponentially per tick.
    #[must_use]
    pub fn noise_scale(&self, config: &AgentConfig) -> f64 {
        config.noise_scale * (-config.noise_decay * f64::from(self.ticks)).exp()
    }

    /// Installs a new controller and lineage history; used by selection.
    pub fn replace_controller(
        &mut self,
        controller: ControllerNetwork,
        fitness: f64,
        fitness_history: Vec<f64>,
    ) {
        self.controller = controller;
        self.fitness = fitness;
        self.fitness_history = fitness_history;
    }

    /// Returns the body to its spawn pose and clears the episode.
    pub fn reset(&mut self, engine: &mut PhysicsEngine) {
        engine.reset_body(self.body, self.spawn);
        let initial_distance = self.spawn.distance(self.target);
        self.episode.initial_distance = initial_distance;
        self.episode.final_distance = initial_distance;
        self.episode.distances.clear();
        self.episode.signals.clear();
        self.episode.path_length = 0.0;
        self.episode.max_displacement = 0.0;
        self.episode.last_position = self.spawn;
        self.ticks = 0;
        self.fitness = 0.0;
    }

    /// Reads the engine. Pure with respect to the agent, so all agents can
    /// perceive in parallel.
    ///
    /// Target and communication range are the ones fixed at construction, so
    /// perception and formation scoring see the same neighborhood.
    #[must_use]
    pub fn perceive(
        &self,
        engine: &PhysicsEngine,
        peers: &[ObjectId],
        config: &AgentConfig,
    ) -> Observation {
        let position = engine
            .object(self.body)
            .map_or(self.spawn, |body| body.position);
        let neighbors = engine.neighbors(self.body, peers, self.communication_range);
        let raw = [
            position.x / config.position_scale,
            position.y / config.position_scale,
            self.target.x / config.position_scale,
            self.target.y / config.position_scale,
            neighbors.count as f64 / config.neighbor_scale,
            neighbors.avg_signal,
        ];
        let (input, faults) = sanitize_perception(&raw);
        Observation {
            input,
            neighbors,
            faults,
        }
    }

    #[must_use]
    pub fn decide(&self, observation: &Observation) -> Action {
        self.controller.forward(&observation.input)
    }

    /// Turns `action` into a body command and records episode progress.
    ///
    /// Returns the command that was sent, in world units.
    pub fn act<R: Rng>(
        &mut self,
        observation: &Observation,
        action: Action,
        engine: &mut PhysicsEngine,
        rng: &mut R,
        config: &AgentConfig,
    ) -> Vector2 {
        let noise = self.noise_scale(config);
        let mut components = [0.0; 2];
        for (c, a) in components.iter_mut().zip(action) {
            let jitter = if noise > 0.0 {
                noise * rng.gen_range(-1.0..=1.0)
            } else {
                0.0
            };
            *c = a + jitter;
        }
        let mut command =
            (Vector2::new(components[0], components[1]) * config.max_speed).clamp_length(config.max_speed);
        if !command.is_finite() {
            command = Vector2::ZERO;
        }
        match config.actuation {
            Actuation::Force => engine.apply_force(self.body, command * config.force_gain),
            Actuation::Velocity => engine.set_velocity(self.body, command),
        };

        self.record(engine, observation);
        self.ticks += 1;
        command
    }

    fn record(&mut self, engine: &PhysicsEngine, observation: &Observation) {
        let position = engine
            .object(self.body)
            .map_or(self.episode.last_position, |b| b.position);
        self.track(position);
        self.episode
            .signals
            .push((observation.neighbors.avg_signal, observation.neighbors.count));
    }

    fn track(&mut self, position: Vector2) {
        let ep = &mut self.episode;
        let distance = position.distance(self.target);
        ep.distances.push(distance);
        ep.final_distance = distance;
        ep.path_length += ep.last_position.distance(position);
        ep.max_displacement = ep.max_displacement.max(position.distance(self.spawn));
        ep.last_position = position;
    }

    /// Records the pose after the episode's final physics step.
    pub fn settle(&mut self, engine: &PhysicsEngine) {
        if let Some(body) = engine.object(self.body) {
            let position = body.position;
            let ep = &mut self.episode;
            ep.final_distance = position.distance(self.target);
            ep.path_length += ep.last_position.distance(position);
            ep.max_displacement = ep.max_displacement.max(position.distance(self.spawn));
            ep.last_position = position;
        }
    }

    fn raw_fitness(&self, task: Task) -> f64 {
        let ep = &self.episode;
        let progress = (ep.initial_distance - ep.final_distance).max(0.0);
        match task {
            Task::Push { completion_radius } => {
                let reach = 1.0 / (1.0 + ep.final_distance);
                let completion = ep
                    .distances
                    .iter()
                    .position(|&d| d <= completion_radius)
                    .map_or(0.0, |tick| {
                        let len = ep.distances.len() as f64;
                        (len - tick as f64) / len
                    });
                progress * (1.0 + reach) + completion
            }
            Task::Gather => {
                let mean_signal = mean(ep.signals.iter().map(|&(s, _)| s));
                mean_signal + 0.5 * progress
            }
            Task::Formation { spacing } => {
                let expected = signal(spacing, self.communication_range);
                mean(ep.signals.iter().map(|&(s, count)| {
                    if count == 0 {
                        0.0
                    } else {
                        1.0 - (s - expected).abs()
                    }
                }))
            }
            Task::Explore => ep.max_displacement + 0.1 * ep.path_length,
        }
    }

    /// Fitness for `task` and whether the raw score had to be discarded.
    #[must_use]
    pub fn score(&self, task: Task) -> (f64, bool) {
        let raw = self.raw_fitness(task);
        if raw.is_finite() {
            (raw.max(0.0), false)
        } else {
            (0.0, true)
        }
    }

    /// Non-negative fitness for `task`; failed evaluations score zero.
    #[must_use]
    pub fn calculate_fitness(&self, task: Task) -> f64 {
        self.score(task).0
    }

    /// Stores the generation's fitness in the lineage history.
    pub fn record_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
        self.fitness_history.push(fitness);
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use edgeswarm_data::{BodyKind, Shape};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup(spawn: Vector2, config: &AgentConfig) -> (PhysicsEngine, EmbodiedAgent) {
        let mut engine = PhysicsEngine::new(PhysicsConfig {
            linear_damping: 0.0,
            ..PhysicsConfig::default()
        })
        .unwrap();
        let body = engine
            .spawn(
                BodyKind::Dynamic,
                Shape::Circle {
                    radius: config.body_radius,
                },
                spawn,
                config.body_mass,
            )
            .unwrap();
        let agent = EmbodiedAgent::new(body, ControllerNetwork::zeroed(), spawn, config);
        (engine, agent)
    }

    #[test]
    fn test_perception_layout() {
        let config = AgentConfig {
            target: Vector2::new(2.0, -4.0),
            ..AgentConfig::default()
        };
        let (mut engine, agent) = setup(Vector2::new(3.0, 1.0), &config);
        let other = engine
            .spawn(
                BodyKind::Dynamic,
                Shape::Circle { radius: 0.25 },
                Vector2::new(3.0, 3.5),
                1.0,
            )
            .unwrap();
        let obs = agent.perceive(&engine, &[agent.body(), other], &config);
        assert_eq!(obs.input[0], 0.3);
        assert_eq!(obs.input[1], 0.1);
        assert_eq!(obs.input[2], 0.2);
        assert_eq!(obs.input[3], -0.4);
        assert_eq!(obs.input[4], 0.1);
        assert!((obs.input[5] - 0.5).abs() < 1e-12);
        assert_eq!(obs.faults, 0);
    }

    #[test]
    fn test_noise_decays() {
        let config = AgentConfig::default();
        let (mut engine, mut agent) = setup(Vector2::new(3.0, 0.0), &config);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let start = agent.noise_scale(&config);
        for _ in 0..50 {
            let obs = agent.perceive(&engine, &[], &config);
            agent.act(&obs, [0.0, 0.0], &mut engine, &mut rng, &config);
        }
        assert!(agent.noise_scale(&config) < start);
        assert!((agent.noise_scale(&config) - 0.1 * (-0.5f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_command_clamped_to_max_speed() {
        let config = AgentConfig {
            actuation: Actuation::Velocity,
            noise_scale: 0.5,
            ..AgentConfig::default()
        };
        let (mut engine, mut agent) = setup(Vector2::new(3.0, 0.0), &config);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let obs = agent.perceive(&engine, &[], &config);
        let command = agent.act(&obs, [1.0, 1.0], &mut engine, &mut rng, &config);
        assert!(command.length() <= config.max_speed + 1e-12);
        assert_eq!(engine.object(agent.body()).unwrap().velocity, command);
    }

    #[test]
    fn test_huge_noise_scale_keeps_command_finite() {
        let config = AgentConfig {
            actuation: Actuation::Velocity,
            noise_scale: 1e308,
            ..AgentConfig::default()
        };
        let (mut engine, mut agent) = setup(Vector2::new(3.0, 0.0), &config);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..5 {
            let obs = agent.perceive(&engine, &[], &config);
            let command = agent.act(&obs, [0.5, -0.5], &mut engine, &mut rng, &config);
            assert!(command.is_finite());
            assert!(command.length() <= config.max_speed + 1e-12);
            engine.simulate_step(1.0 / 60.0);
        }
    }

    #[test]
    fn test_perception_uses_construction_range() {
        let config = AgentConfig {
            communication_range: 3.0,
            ..AgentConfig::default()
        };
        let (mut engine, agent) = setup(Vector2::new(0.0, 0.0), &config);
        let other = engine
            .spawn(
                BodyKind::Dynamic,
                Shape::Circle { radius: 0.25 },
                Vector2::new(4.0, 0.0),
                1.0,
            )
            .unwrap();
        let wider = AgentConfig {
            communication_range: 100.0,
            ..config.clone()
        };
        let obs = agent.perceive(&engine, &[agent.body(), other], &wider);
        assert_eq!(agent.communication_range(), 3.0);
        assert_eq!(obs.neighbors.count, 0);
        assert_eq!(obs.neighbors.avg_signal, 0.0);
    }

    #[test]
    fn test_push_rewards_progress() {
        let config = AgentConfig {
            actuation: Actuation::Velocity,
            noise_scale: 0.0,
            ..AgentConfig::default()
        };
        let task = Task::Push {
            completion_radius: 0.5,
        };
        let (mut engine, mut idle) = setup(Vector2::new(4.0, 0.0), &config);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..30 {
            let obs = idle.perceive(&engine, &[], &config);
            idle.act(&obs, [0.0, 0.0], &mut engine, &mut rng, &config);
            engine.simulate_step(1.0 / 60.0);
        }
        idle.settle(&engine);
        assert_eq!(idle.calculate_fitness(task), 0.0);

        let (mut engine, mut mover) = setup(Vector2::new(4.0, 0.0), &config);
        for _ in 0..30 {
            let obs = mover.perceive(&engine, &[], &config);
            mover.act(&obs, [-0.5, 0.0], &mut engine, &mut rng, &config);
            engine.simulate_step(1.0 / 60.0);
        }
        mover.settle(&engine);
        assert!(mover.calculate_fitness(task) > 0.0);
    }

    #[test]
    fn test_explore_rewards_distance() {
        let config = AgentConfig {
            actuation: Actuation::Velocity,
            noise_scale: 0.0,
            ..AgentConfig::default()
        };
        let (mut engine, mut agent) = setup(Vector2::new(4.0, 0.0), &config);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..10 {
            let obs = agent.perceive(&engine, &[], &config);
            agent.act(&obs, [0.0, 1.0], &mut engine, &mut rng, &config);
            engine.simulate_step(0.1);
        }
        agent.settle(&engine);
        let score = agent.calculate_fitness(Task::Explore);
        // 10 ticks at 5 units/s for 0.1 s each: 5 units out, 5 units travelled.
        assert!((score - 5.5).abs() < 1e-6, "{score}");
    }

    #[test]
    fn test_formation_without_neighbors_scores_zero() {
        let config = AgentConfig::default();
        let (mut engine, mut agent) = setup(Vector2::new(4.0, 0.0), &config);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let obs = agent.perceive(&engine, &[], &config);
        agent.act(&obs, [0.0, 0.0], &mut engine, &mut rng, &config);
        assert_eq!(agent.calculate_fitness(Task::Formation { spacing: 2.0 }), 0.0);
    }

    #[test]
    fn test_reset_restores_spawn_and_clears_episode() {
        let config = AgentConfig {
            actuation: Actuation::Velocity,
            ..AgentConfig::default()
        };
        let spawn = Vector2::new(4.0, 0.0);
        let (mut engine, mut agent) = setup(spawn, &config);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        for _ in 0..5 {
            let obs = agent.perceive(&engine, &[], &config);
            agent.act(&obs, [1.0, 0.0], &mut engine, &mut rng, &config);
            engine.simulate_step(0.1);
        }
        agent.record_fitness(1.0);
        agent.reset(&mut engine);
        assert_eq!(engine.object(agent.body()).unwrap().position, spawn);
        assert_eq!(engine.object(agent.body()).unwrap().velocity, Vector2::ZERO);
        assert_eq!(agent.ticks(), 0);
        assert_eq!(agent.fitness(), 0.0);
        assert_eq!(agent.fitness_history(), &[1.0]);
    }

    #[test]
    fn test_tasks_validate() {
        assert!(Task::Push {
            completion_radius: -1.0
        }
        .validate()
        .is_err());
        assert!(Task::Formation { spacing: f64::NAN }.validate().is_err());
        assert!(Task::Gather.validate().is_ok());
    }
}
