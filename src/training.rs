//! Training session: evolution, periodic checkpoints and final export.

use anyhow::Context;
use edgeswarm_core::config::AppConfig;
use edgeswarm_core::deploy::{export_format, export_network, fixed_point_error_bound, ExportReport};
use edgeswarm_core::evolution::EvolutionManager;
use edgeswarm_core::fixed::QFormat;
use edgeswarm_data::{AgentRecord, ExportFormat, GenerationStats};
use edgeswarm_io::{write_c_header, write_params_json, CheckpointStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

pub const DEFAULT_EXPORT_NAME: &str = "evo_agent";

/// Reads and validates a TOML configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<AppConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration {}", path.display()))?;
    AppConfig::from_toml(&content).with_context(|| format!("parsing {}", path.display()))
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Generations completed by this call.
    pub generations_run: u32,
    /// Stopped by the cancellation flag before the run finished.
    pub cancelled: bool,
    /// Full series, including generations from before a resume.
    pub history: Vec<GenerationStats>,
    pub best: Option<AgentRecord>,
    pub export: Option<ExportReport>,
    pub last_checkpoint: Option<PathBuf>,
}

pub struct TrainingSession {
    manager: EvolutionManager,
    store: Option<CheckpointStore>,
    export_dir: Option<PathBuf>,
    export_name: String,
}

impl TrainingSession {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        Ok(Self::from_manager(EvolutionManager::new(config)?))
    }

    /// Continues from the latest checkpoint in `store`, or starts fresh when
    /// the store is empty. Checkpoints keep going to `store`.
    pub fn resume(config: AppConfig, store: CheckpointStore) -> anyhow::Result<Self> {
        let manager = match store.latest()? {
            Some(checkpoint) => EvolutionManager::from_checkpoint(config, &checkpoint)
                .with_context(|| format!("restoring generation {}", checkpoint.generation))?,
            None => {
                tracing::info!(dir = %store.dir().display(), "No checkpoint found, starting fresh");
                EvolutionManager::new(config)?
            }
        };
        Ok(Self::from_manager(manager).with_store(store))
    }

    fn from_manager(manager: EvolutionManager) -> Self {
        Self {
            manager,
            store: None,
            export_dir: None,
            export_name: DEFAULT_EXPORT_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: CheckpointStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Writes `nca_params_<name>.json` and `.h` into `dir` after the run.
    #[must_use]
    pub fn with_export_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_export_name<S: Into<String>>(mut self, name: S) -> Self {
        self.export_name = name.into();
        self
    }

    #[must_use]
    pub fn manager(&self) -> &EvolutionManager {
        &self.manager
    }

    /// Runs until the configured generation count or until `cancel` is set.
    ///
    /// Checkpoints every `checkpoint_interval` generations and once more at the
    /// boundary where the run stops. The hall-of-fame controller is exported
    /// at the end either way.
    pub fn run(&mut self, cancel: &AtomicBool) -> anyhow::Result<TrainingOutcome> {
        let interval = self.manager.config().evolution.checkpoint_interval;
        let mut generations_run = 0;
        let mut last_checkpoint = None;
        let mut saved_at = None;
        let mut cancelled = false;

        while !self.manager.is_finished() {
            if cancel.load(Ordering::Relaxed) {
                cancelled = true;
                tracing::info!(generation = self.manager.generation(), "Training cancelled");
                break;
            }
            if self.manager.run_generation().is_none() {
                break;
            }
            generations_run += 1;
            let generation = self.manager.generation();
            if interval.is_some_and(|n| generation % n == 0) {
                if let Some(path) = self.save_checkpoint()? {
                    last_checkpoint = Some(path);
                    saved_at = Some(generation);
                }
            }
        }
        if saved_at != Some(self.manager.generation()) {
            if let Some(path) = self.save_checkpoint()? {
                last_checkpoint = Some(path);
            }
        }

        let export = self.export_best()?;
        Ok(TrainingOutcome {
            generations_run,
            cancelled,
            history: self.manager.history().to_vec(),
            best: self.manager.best().cloned(),
            export,
            last_checkpoint,
        })
    }

    fn save_checkpoint(&self) -> anyhow::Result<Option<PathBuf>> {
        match &self.store {
            Some(store) => Ok(Some(store.save(&self.manager.checkpoint())?)),
            None => Ok(None),
        }
    }

    /// Exports the best controller of the run in the configured format.
    pub fn export_best(&self) -> anyhow::Result<Option<ExportReport>> {
        let Some(best) = self.manager.best() else {
            return Ok(None);
        };
        let config = self.manager.config();
        let format = export_format(&config.deploy);
        let report = export_network(
            &best.network,
            format,
            config.agent.runtime_config(),
            &self.export_name,
        )?;
        if let ExportFormat::Fixed { frac_bits } = format {
            let bound = fixed_point_error_bound(&best.network, QFormat::new(frac_bits)?, 1.0);
            tracing::info!(frac_bits, bound, "Fixed-point deviation bound for unit inputs");
        }
        if let Some(dir) = &self.export_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating export directory {}", dir.display()))?;
            write_params_json(&report.params, dir)?;
            write_c_header(&report.params, dir)?;
        }
        Ok(Some(report))
    }
}
