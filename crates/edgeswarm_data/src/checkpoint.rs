use crate::controller::ControllerNetwork;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CHECKPOINT_VERSION: u32 = 1;

/// Full state of the ChaCha generator driving a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub seed: [u8; 32],
    pub stream: u64,
    pub word_pos: u128,
}

/// One population slot as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub network: ControllerNetwork,
    /// Fitness from the most recent evaluation of this lineage.
    pub fitness: f64,
    /// Fitness of every evaluation along this slot's lineage, oldest first.
    pub fitness_history: Vec<f64>,
}

/// Summary of one scored generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: u32,
    pub best: f64,
    pub mean: f64,
    pub worst: f64,
    pub std_dev: f64,
    /// Population index of the best agent before selection.
    pub best_index: usize,
    pub mutation_rate: f64,
    pub numeric_faults: u64,
    pub evaluation_failures: u64,
}

impl GenerationStats {
    /// Aggregates the fitness values of one generation. Returns `None` for an
    /// empty population.
    #[must_use]
    pub fn from_fitness(generation: u32, fitness: &[f64], mutation_rate: f64) -> Option<Self> {
        if fitness.is_empty() {
            return None;
        }
        let n = fitness.len() as f64;
        let mut best_index = 0;
        for (i, &f) in fitness.iter().enumerate() {
            if f > fitness[best_index] {
                best_index = i;
            }
        }
        let worst = fitness.iter().copied().fold(f64::INFINITY, f64::min);
        let mean = fitness.iter().sum::<f64>() / n;
        let variance = fitness.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            generation,
            best: fitness[best_index],
            mean,
            worst,
            std_dev: variance.sqrt(),
            best_index,
            mutation_rate,
            numeric_faults: 0,
            evaluation_failures: 0,
        })
    }
}

/// Snapshot taken at a generation boundary. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub config_fingerprint: String,
    pub seed: u64,
    /// Index of the next generation to run.
    pub generation: u32,
    pub rng_state: RngState,
    pub agents: Vec<AgentRecord>,
    pub history: Vec<GenerationStats>,
    pub best: Option<AgentRecord>,
}

impl Checkpoint {
    /// Best fitness seen so far according to the recorded history.
    #[must_use]
    pub fn best_fitness(&self) -> Option<f64> {
        self.history.iter().map(|s| s.best).reduce(f64::max)
    }
}
