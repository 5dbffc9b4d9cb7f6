pub mod macros;

use edgeswarm_lib::AppConfig;
use edgeswarm_core::evolution::EvolutionManager;
use std::path::PathBuf;
use uuid::Uuid;

/// Builds small, fast training configurations for integration tests.
#[allow(dead_code)]
pub struct ConfigBuilder {
    config: AppConfig,
}

#[allow(dead_code)]
impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.evolution.population_size = 6;
        config.evolution.generations = 4;
        config.evolution.episode_length = 30;
        config.evolution.checkpoint_interval = None;
        Self { config }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.evolution.seed = seed;
        self
    }

    pub fn with_population(mut self, size: usize) -> Self {
        self.config.evolution.population_size = size;
        self
    }

    pub fn with_generations(mut self, generations: u32) -> Self {
        self.config.evolution.generations = generations;
        self
    }

    pub fn with_episode_length(mut self, ticks: u32) -> Self {
        self.config.evolution.episode_length = ticks;
        self
    }

    pub fn with_config<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        modifier(&mut self.config);
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }

    pub fn build_manager(self) -> EvolutionManager {
        EvolutionManager::new(self.config).expect("test configuration must be valid")
    }
}

/// Fresh directory under the system temp dir.
#[allow(dead_code)]
pub fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("edgeswarm_{label}_{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    dir
}
