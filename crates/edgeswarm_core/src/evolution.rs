//! Generational search over controller weights.
//!
//! One generation resets every body to its spawn pose, runs a fixed number of
//! ticks, scores each agent once, keeps the top `elite_fraction` unchanged and
//! refills the rest with mutated elites. All randomness flows from a single
//! seeded ChaCha stream consumed in population order, so a run (or a resumed
//! run) is reproducible bit for bit.

use crate::agent::{EmbodiedAgent, Observation};
use crate::config::AppConfig;
use crate::controller::ControllerLogic;
use crate::metrics::Metrics;
use crate::physics::PhysicsEngine;
use chrono::Utc;
use edgeswarm_data::{
    Action, AgentRecord, BodyKind, Checkpoint, ControllerNetwork, GenerationStats, ObjectId,
    RngState, Shape, Vector2, CHECKPOINT_VERSION,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use uuid::Uuid;

/// ChaCha stream used for arena layout, separate from the evolution stream so
/// the layout can be rebuilt on resume without replaying the run.
const ARENA_STREAM: u64 = 1;

/// Population indices ordered by descending fitness; ties keep index order.
#[must_use]
pub fn rank_population(fitness: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..fitness.len()).collect();
    order.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));
    order
}

/// Number of survivors for a population of `population` at `fraction`;
/// always at least one.
#[must_use]
pub fn elite_count(population: usize, fraction: f64) -> usize {
    if population == 0 {
        return 0;
    }
    ((population as f64 * fraction).round() as usize).clamp(1, population)
}

/// Spawn points on a ring around `center`, one per slot.
fn arena_layout(config: &AppConfig, seed: u64) -> Vec<Vector2> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(ARENA_STREAM);
    let n = config.evolution.population_size;
    let agent = &config.agent;
    (0..n)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / n as f64;
            let radius = rng.gen_range(agent.spawn_radius_min..=agent.spawn_radius_max);
            agent.target + Vector2::new(angle.cos(), angle.sin()) * radius
        })
        .collect()
}

pub struct EvolutionManager {
    config: AppConfig,
    run_id: Uuid,
    seed: u64,
    engine: PhysicsEngine,
    agents: Vec<EmbodiedAgent>,
    bodies: Vec<ObjectId>,
    rng: ChaCha8Rng,
    generation: u32,
    history: Vec<GenerationStats>,
    best: Option<AgentRecord>,
    metrics: Metrics,
}

impl EvolutionManager {
    /// Seeds a fresh population from `config.evolution.seed`.
    pub fn new(mut config: AppConfig) -> anyhow::Result<Self> {
        config.normalize();
        config.validate()?;
        let seed = config.evolution.seed;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let controllers: Vec<ControllerNetwork> = (0..config.evolution.population_size)
            .map(|_| ControllerNetwork::new_random_with_rng(config.evolution.init_scale, &mut rng))
            .collect();
        let records = controllers
            .into_iter()
            .map(|network| AgentRecord {
                network,
                fitness: 0.0,
                fitness_history: Vec::new(),
            })
            .collect();
        let manager = Self::assemble(config, Uuid::new_v4(), seed, rng, records)?;
        tracing::info!(
            run_id = %manager.run_id,
            population = manager.agents.len(),
            seed,
            "Seeded population"
        );
        Ok(manager)
    }

    /// Restores a run from a checkpoint taken at a generation boundary.
    pub fn from_checkpoint(mut config: AppConfig, checkpoint: &Checkpoint) -> anyhow::Result<Self> {
        config.normalize();
        config.validate()?;
        anyhow::ensure!(
            checkpoint.version == CHECKPOINT_VERSION,
            "unsupported checkpoint version {}",
            checkpoint.version
        );
        anyhow::ensure!(
            checkpoint.agents.len() == config.evolution.population_size,
            "checkpoint holds {} agents but the population size is {}",
            checkpoint.agents.len(),
            config.evolution.population_size
        );
        for record in &checkpoint.agents {
            record.network.validate()?;
        }
        if checkpoint.config_fingerprint != config.fingerprint() {
            tracing::warn!(
                run_id = %checkpoint.run_id,
                "Resuming with a configuration that differs from the checkpoint"
            );
        }

        let mut rng = ChaCha8Rng::from_seed(checkpoint.rng_state.seed);
        rng.set_stream(checkpoint.rng_state.stream);
        rng.set_word_pos(checkpoint.rng_state.word_pos);

        let mut manager = Self::assemble(
            config,
            checkpoint.run_id,
            checkpoint.seed,
            rng,
            checkpoint.agents.clone(),
        )?;
        manager.generation = checkpoint.generation;
        manager.history = checkpoint.history.clone();
        manager.best = checkpoint.best.clone();
        tracing::info!(
            run_id = %manager.run_id,
            generation = manager.generation,
            "Resumed from checkpoint"
        );
        Ok(manager)
    }

    fn assemble(
        config: AppConfig,
        run_id: Uuid,
        seed: u64,
        rng: ChaCha8Rng,
        records: Vec<AgentRecord>,
    ) -> anyhow::Result<Self> {
        let mut engine = PhysicsEngine::new(config.physics.clone())?;
        let spawns = arena_layout(&config, seed);
        let mut agents = Vec::with_capacity(records.len());
        let mut bodies = Vec::with_capacity(records.len());
        for (record, spawn) in records.into_iter().zip(spawns) {
            let body = engine.spawn(
                BodyKind::Dynamic,
                Shape::Circle {
                    radius: config.agent.body_radius,
                },
                spawn,
                config.agent.body_mass,
            )?;
            let AgentRecord {
                network,
                fitness,
                fitness_history,
            } = record;
            let mut agent = EmbodiedAgent::new(body, ControllerNetwork::zeroed(), spawn, &config.agent);
            agent.replace_controller(network, fitness, fitness_history);
            agents.push(agent);
            bodies.push(body);
        }
        Ok(Self {
            config,
            run_id,
            seed,
            engine,
            agents,
            bodies,
            rng,
            generation: 0,
            history: Vec::new(),
            best: None,
            metrics: Metrics::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Index of the next generation to run.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.generation >= self.config.evolution.generations
    }

    #[must_use]
    pub fn agents(&self) -> &[EmbodiedAgent] {
        &self.agents
    }

    #[must_use]
    pub fn engine(&self) -> &PhysicsEngine {
        &self.engine
    }

    #[must_use]
    pub fn history(&self) -> &[GenerationStats] {
        &self.history
    }

    /// Best agent seen over the whole run.
    #[must_use]
    pub fn best(&self) -> Option<&AgentRecord> {
        self.best.as_ref()
    }

    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    #[must_use]
    pub fn mutation_rate_for(&self, generation: u32) -> f64 {
        let evo = &self.config.evolution;
        evo.schedule
            .rate(evo.mutation_rate, generation, evo.generations)
            .max(0.0)
    }

    /// Simulates, scores, selects and mutates one generation. Returns `None`
    /// once the run is finished.
    pub fn run_generation(&mut self) -> Option<GenerationStats> {
        if self.is_finished() {
            return None;
        }
        let started = Instant::now();
        let rate = self.mutation_rate_for(self.generation);
        let faults_before = self.engine.diagnostics().numeric_faults;

        for agent in &mut self.agents {
            agent.reset(&mut self.engine);
        }
        self.engine.clear_pending_pairs();
        self.engine.reset_metrics();

        let episode_length = self.config.evolution.episode_length;
        let dt = self.config.physics.timestep;
        let mut perception_faults = 0u64;
        for _ in 0..episode_length {
            let engine = &self.engine;
            let bodies = &self.bodies;
            let agent_config = &self.config.agent;
            let decisions: Vec<(Observation, Action)> = self
                .agents
                .par_iter()
                .map(|agent| {
                    let observation = agent.perceive(engine, bodies, agent_config);
                    let action = agent.decide(&observation);
                    (observation, action)
                })
                .collect();

            for (agent, (observation, action)) in self.agents.iter_mut().zip(&decisions) {
                perception_faults += u64::from(observation.faults);
                agent.act(
                    observation,
                    *action,
                    &mut self.engine,
                    &mut self.rng,
                    &self.config.agent,
                );
            }
            self.engine.simulate_step(dt);
        }
        for agent in &mut self.agents {
            agent.settle(&self.engine);
        }

        let task = self.config.evolution.task;
        let scores: Vec<(f64, bool)> = self.agents.par_iter().map(|a| a.score(task)).collect();
        let fitness: Vec<f64> = scores.iter().map(|&(f, _)| f).collect();
        let failures = scores.iter().filter(|&&(_, failed)| failed).count() as u64;
        for (agent, &f) in self.agents.iter_mut().zip(&fitness) {
            agent.record_fitness(f);
        }

        let mut stats = GenerationStats::from_fitness(self.generation, &fitness, rate)?;
        stats.numeric_faults =
            self.engine.diagnostics().numeric_faults - faults_before + perception_faults;
        stats.evaluation_failures = failures;

        self.update_best(&stats);
        self.history.push(stats.clone());
        self.metrics.record_generation(
            &stats,
            u64::from(episode_length),
            started.elapsed(),
        );

        self.select_and_replace(&fitness, rate);
        self.generation += 1;
        Some(stats)
    }

    fn update_best(&mut self, stats: &GenerationStats) {
        let improved = self.best.as_ref().map_or(true, |b| stats.best > b.fitness);
        if improved {
            let champion = &self.agents[stats.best_index];
            self.best = Some(AgentRecord {
                network: champion.controller().clone(),
                fitness: stats.best,
                fitness_history: champion.fitness_history().to_vec(),
            });
            tracing::debug!(
                generation = stats.generation,
                fitness = stats.best,
                "New best controller"
            );
        }
    }

    /// Elites keep slots `0..k` unchanged; every other slot receives a mutated
    /// copy of elite `(slot - k) % k`.
    fn select_and_replace(&mut self, fitness: &[f64], rate: f64) {
        let ranking = rank_population(fitness);
        let k = elite_count(self.agents.len(), self.config.evolution.elite_fraction);
        let elites: Vec<(ControllerNetwork, f64, Vec<f64>)> = ranking[..k]
            .iter()
            .map(|&i| {
                let agent = &self.agents[i];
                (
                    agent.controller().clone(),
                    agent.fitness(),
                    agent.fitness_history().to_vec(),
                )
            })
            .collect();

        let limit = self.config.evolution.weight_limit;
        for (slot, agent) in self.agents.iter_mut().enumerate() {
            if slot < k {
                let (network, f, history) = &elites[slot];
                agent.replace_controller(network.clone(), *f, history.clone());
            } else {
                let (parent, _, history) = &elites[(slot - k) % k];
                let child = parent.mutate_with_rng(rate, limit, &mut self.rng);
                agent.replace_controller(child, 0.0, history.clone());
            }
        }
    }

    /// Runs generations until the run finishes or `cancel` is set. The flag is
    /// checked only between generations.
    pub fn run(&mut self, cancel: &AtomicBool) -> Vec<GenerationStats> {
        let mut produced = Vec::new();
        while !cancel.load(Ordering::Relaxed) {
            match self.run_generation() {
                Some(stats) => produced.push(stats),
                None => break,
            }
        }
        produced
    }

    /// Snapshot of the current generation boundary.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            version: CHECKPOINT_VERSION,
            run_id: self.run_id,
            created_at: Utc::now(),
            config_fingerprint: self.config.fingerprint(),
            seed: self.seed,
            generation: self.generation,
            rng_state: RngState {
                seed: self.rng.get_seed(),
                stream: self.rng.get_stream(),
                word_pos: self.rng.get_word_pos(),
            },
            agents: self
                .agents
                .iter()
                .map(|a| AgentRecord {
                    network: a.controller().clone(),
                    fitness: a.fitness(),
                    fitness_history: a.fitness_history().to_vec(),
                })
                .collect(),
            history: self.history.clone(),
            best: self.best.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.evolution.population_size = 6;
        config.evolution.generations = 3;
        config.evolution.episode_length = 20;
        config
    }

    #[test]
    fn test_rank_is_stable_descending() {
        let order = rank_population(&[1.0, 3.0, 2.0, 3.0, 1.0]);
        assert_eq!(order, vec![1, 3, 2, 0, 4]);
    }

    #[test]
    fn test_elite_count_bounds() {
        assert_eq!(elite_count(10, 0.5), 5);
        assert_eq!(elite_count(10, 0.01), 1);
        assert_eq!(elite_count(10, 1.0), 10);
        assert_eq!(elite_count(3, 0.5), 2);
        assert_eq!(elite_count(0, 0.5), 0);
    }

    #[test]
    fn test_arena_layout_on_ring() {
        let config = small_config();
        let spawns = arena_layout(&config, 42);
        assert_eq!(spawns.len(), 6);
        for p in &spawns {
            let r = p.distance(config.agent.target);
            assert!((3.0..=6.0).contains(&r));
        }
        assert_eq!(spawns, arena_layout(&config, 42));
    }

    #[test]
    fn test_huge_noise_and_mutation_rate_complete_generation() {
        let mut config = small_config();
        config.agent.noise_scale = 1e308;
        config.evolution.mutation_rate = f64::MAX;
        config.validate().unwrap();
        let mut manager = EvolutionManager::new(config).unwrap();
        let stats = manager.run_generation().unwrap();
        assert!(stats.best.is_finite() && stats.mean.is_finite());
        assert!(manager
            .agents()
            .iter()
            .all(|a| a.controller().validate().is_ok()));
    }

    #[test]
    fn test_manager_clamps_material_coefficients() {
        let mut config = small_config();
        config.physics.default_friction = 1.5;
        config.physics.default_restitution = -0.2;
        let manager = EvolutionManager::new(config).unwrap();
        assert_eq!(manager.config().physics.default_friction, 1.0);
        assert_eq!(manager.config().physics.default_restitution, 0.0);
    }

    #[test]
    fn test_generation_advances_and_terminates() {
        let mut manager = EvolutionManager::new(small_config()).unwrap();
        assert_eq!(manager.generation(), 0);
        for g in 0..3 {
            let stats = manager.run_generation().unwrap();
            assert_eq!(stats.generation, g);
            assert!(stats.best + 1e-9 >= stats.mean && stats.mean + 1e-9 >= stats.worst);
        }
        assert!(manager.is_finished());
        assert!(manager.run_generation().is_none());
        assert_eq!(manager.history().len(), 3);
        assert!(manager.best().is_some());
    }

    #[test]
    fn test_elites_survive_unchanged() {
        let mut manager = EvolutionManager::new(small_config()).unwrap();
        let before: Vec<ControllerNetwork> =
            manager.agents().iter().map(|a| a.controller().clone()).collect();
        manager.run_generation().unwrap();

        let k = elite_count(6, 0.5);
        let agents = manager.agents();
        for w in agents[..k].windows(2) {
            assert!(w[0].fitness() >= w[1].fitness());
        }
        for elite in &agents[..k] {
            assert!(before.contains(elite.controller()));
            assert_eq!(elite.fitness_history().len(), 1);
        }
        for child in &agents[k..] {
            assert_eq!(child.fitness(), 0.0);
        }
        let best = manager.history()[0].best;
        assert_eq!(agents[0].fitness(), best);
    }

    #[test]
    fn test_cancel_before_start() {
        let mut manager = EvolutionManager::new(small_config()).unwrap();
        let cancel = AtomicBool::new(true);
        assert!(manager.run(&cancel).is_empty());
        assert_eq!(manager.generation(), 0);
    }

    #[test]
    fn test_checkpoint_captures_boundary() {
        let mut manager = EvolutionManager::new(small_config()).unwrap();
        manager.run_generation();
        let cp = manager.checkpoint();
        assert_eq!(cp.generation, 1);
        assert_eq!(cp.agents.len(), 6);
        assert_eq!(cp.history.len(), 1);
        assert_eq!(cp.seed, 42);
        assert_eq!(cp.rng_state.stream, 0);
        assert!(cp.rng_state.word_pos > 0);
    }

    #[test]
    fn test_population_mismatch_rejected() {
        let mut manager = EvolutionManager::new(small_config()).unwrap();
        manager.run_generation();
        let cp = manager.checkpoint();
        let mut other = small_config();
        other.evolution.population_size = 4;
        assert!(EvolutionManager::from_checkpoint(other, &cp).is_err());
    }
}
