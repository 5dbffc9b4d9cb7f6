//! Configuration for training and deployment.
//!
//! Every section has a `Default` and missing TOML keys fall back to it, so a
//! `config.toml` only needs to list what it changes.
//!
//! ## Example `config.toml`
//!
//! ```toml
//! [physics]
//! timestep = 0.016666666666666666
//! low_power = false
//!
//! [agent]
//! max_speed = 5.0
//! communication_range = 5.0
//!
//! [evolution]
//! population_size = 10
//! generations = 10
//! elite_fraction = 0.5
//! seed = 42
//!
//! [evolution.task]
//! kind = "push"
//! completion_radius = 0.5
//!
//! [deploy]
//! frac_bits = 16
//! ```

use crate::agent::Task;
use crate::fixed::{MAX_FRAC_BITS, MIN_FRAC_BITS};
use edgeswarm_data::{RuntimeConfig, Vector2};
use serde::{Deserialize, Serialize};

/// Physics sandbox configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: Vector2,
    /// Seconds advanced by one training tick.
    pub timestep: f64,
    pub default_friction: f64,
    pub default_restitution: f64,
    /// Floor drag applied to dynamic bodies, per second.
    pub linear_damping: f64,
    pub substeps: u32,
    /// Single substep and a capped number of collision pairs per tick.
    pub low_power: bool,
    pub low_power_max_pairs: usize,
    /// Collision pairs resolved per tick; the rest wait for the next tick.
    pub max_collision_pairs: Option<usize>,
    pub joint_iterations: u32,
    /// Integrate positions and velocities in scaled integers.
    pub fixed_point: bool,
    pub fixed_point_frac_bits: u8,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vector2::ZERO,
            timestep: 1.0 / 60.0,
            default_friction: 0.3,
            default_restitution: 0.2,
            linear_damping: 0.5,
            substeps: 2,
            low_power: false,
            low_power_max_pairs: 16,
            max_collision_pairs: None,
            joint_iterations: 8,
            fixed_point: false,
            fixed_point_frac_bits: 16,
        }
    }
}

/// How an agent's action reaches its body.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Actuation {
    #[default]
    Force,
    Velocity,
}

/// Embodied agent configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub body_radius: f64,
    pub body_mass: f64,
    pub max_speed: f64,
    pub actuation: Actuation,
    /// Multiplier from speed-scaled command to force in `Force` mode.
    pub force_gain: f64,
    pub noise_scale: f64,
    /// Exponential decay of the exploration noise per tick.
    pub noise_decay: f64,
    pub communication_range: f64,
    /// Divisor applied to positions before they reach the controller.
    pub position_scale: f64,
    /// Divisor applied to the neighbor count before it reaches the controller.
    pub neighbor_scale: f64,
    pub target: Vector2,
    pub spawn_radius_min: f64,
    pub spawn_radius_max: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            body_radius: 0.25,
            body_mass: 1.0,
            max_speed: 5.0,
            actuation: Actuation::Force,
            force_gain: 1.0,
            noise_scale: 0.1,
            noise_decay: 0.01,
            communication_range: 5.0,
            position_scale: 10.0,
            neighbor_scale: 10.0,
            target: Vector2::ZERO,
            spawn_radius_min: 3.0,
            spawn_radius_max: 6.0,
        }
    }
}

impl AgentConfig {
    /// The subset a deployed controller needs.
    #[must_use]
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            max_speed: self.max_speed,
            noise_scale: self.noise_scale,
            noise_decay: self.noise_decay,
            communication_range: self.communication_range,
            position_scale: self.position_scale,
            neighbor_scale: self.neighbor_scale,
        }
    }
}

/// Mutation-rate annealing across generations.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationSchedule {
    #[default]
    Constant,
    /// Linear interpolation from the base rate to `final_rate` over the run.
    Linear { final_rate: f64 },
    /// `rate * exp(-decay * generation)`.
    Exponential { decay: f64 },
}

impl MutationSchedule {
    #[must_use]
    pub fn rate(&self, base: f64, generation: u32, generations: u32) -> f64 {
        match *self {
            MutationSchedule::Constant => base,
            MutationSchedule::Linear { final_rate } => {
                let span = generations.saturating_sub(1).max(1) as f64;
                let t = (generation as f64 / span).min(1.0);
                base + (final_rate - base) * t
            }
            MutationSchedule::Exponential { decay } => base * (-decay * generation as f64).exp(),
        }
    }
}

/// Evolutionary search configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub generations: u32,
    /// Ticks simulated per generation.
    pub episode_length: u32,
    pub elite_fraction: f64,
    pub mutation_rate: f64,
    pub schedule: MutationSchedule,
    /// Parameters are clamped to `±weight_limit` after mutation.
    pub weight_limit: f64,
    /// Initial weights are drawn from `±init_scale`.
    pub init_scale: f64,
    pub seed: u64,
    pub task: Task,
    /// Save a checkpoint every this many generations.
    pub checkpoint_interval: Option<u32>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 10,
            generations: 10,
            episode_length: 100,
            elite_fraction: 0.5,
            mutation_rate: 0.05,
            schedule: MutationSchedule::Constant,
            weight_limit: 5.0,
            init_scale: 0.5,
            seed: 42,
            task: Task::default(),
            checkpoint_interval: Some(5),
        }
    }
}

/// Deployment runtime configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DeployConfig {
    /// Fractional bits of the fixed-point export; `None` exports f32.
    pub frac_bits: Option<u8>,
    pub control_hz: u32,
    pub low_power_hz: u32,
    /// Multiply-adds available per control tick.
    pub mac_budget: u32,
    /// Below this the runtime drops to simple-reactive mode.
    pub low_battery_volts: f64,
    /// Below this the runtime stops.
    pub critical_battery_volts: f64,
    /// Extra margin required before returning to a better mode.
    pub recovery_margin: f64,
    pub noise_seed: u64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            frac_bits: Some(16),
            control_hz: 60,
            low_power_hz: 30,
            mac_budget: 512,
            low_battery_volts: 3.5,
            critical_battery_volts: 3.2,
            recovery_margin: 0.1,
            noise_seed: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub physics: PhysicsConfig,
    pub agent: AgentConfig,
    pub evolution: EvolutionConfig,
    pub deploy: DeployConfig,
}

impl AppConfig {
    /// Validates all configuration parameters.
    ///
    /// Returns `Ok(())` if all parameters are valid, or `Err` describing the
    /// first failure.
    pub fn validate(&self) -> anyhow::Result<()> {
        let p = &self.physics;
        anyhow::ensure!(p.gravity.is_finite(), "Gravity must be finite");
        anyhow::ensure!(
            p.timestep.is_finite() && p.timestep > 0.0,
            "Timestep must be positive"
        );
        anyhow::ensure!(
            p.default_friction.is_finite(),
            "Default friction must be finite"
        );
        anyhow::ensure!(
            p.default_restitution.is_finite(),
            "Default restitution must be finite"
        );
        anyhow::ensure!(
            p.linear_damping.is_finite() && p.linear_damping >= 0.0,
            "Linear damping must be non-negative"
        );
        anyhow::ensure!(p.substeps >= 1, "Substeps must be at least 1");
        anyhow::ensure!(
            p.low_power_max_pairs >= 1,
            "Low power pair budget must be at least 1"
        );
        anyhow::ensure!(
            p.max_collision_pairs != Some(0),
            "Collision pair budget must be at least 1"
        );
        anyhow::ensure!(
            (MIN_FRAC_BITS..=MAX_FRAC_BITS).contains(&p.fixed_point_frac_bits),
            "Physics fractional bits must be in [{MIN_FRAC_BITS}, {MAX_FRAC_BITS}]"
        );

        let a = &self.agent;
        anyhow::ensure!(
            a.body_radius.is_finite() && a.body_radius > 0.0,
            "Body radius must be positive"
        );
        anyhow::ensure!(
            a.body_mass.is_finite() && a.body_mass > 0.0,
            "Body mass must be positive"
        );
        anyhow::ensure!(
            a.max_speed.is_finite() && a.max_speed > 0.0,
            "Max speed must be positive"
        );
        anyhow::ensure!(
            a.force_gain.is_finite() && a.force_gain >= 0.0,
            "Force gain must be non-negative"
        );
        anyhow::ensure!(
            a.noise_scale.is_finite() && a.noise_scale >= 0.0,
            "Noise scale must be non-negative"
        );
        anyhow::ensure!(
            a.noise_decay.is_finite() && a.noise_decay >= 0.0,
            "Noise decay must be non-negative"
        );
        anyhow::ensure!(
            a.communication_range.is_finite() && a.communication_range > 0.0,
            "Communication range must be positive"
        );
        anyhow::ensure!(
            a.position_scale.is_finite() && a.position_scale > 0.0,
            "Position scale must be positive"
        );
        anyhow::ensure!(
            a.neighbor_scale.is_finite() && a.neighbor_scale > 0.0,
            "Neighbor scale must be positive"
        );
        anyhow::ensure!(a.target.is_finite(), "Target must be finite");
        anyhow::ensure!(
            a.spawn_radius_min.is_finite()
                && a.spawn_radius_min >= 0.0
                && a.spawn_radius_max.is_finite()
                && a.spawn_radius_max >= a.spawn_radius_min,
            "Spawn radii must satisfy 0 <= min <= max"
        );

        let e = &self.evolution;
        anyhow::ensure!(e.population_size > 0, "Population size must be positive");
        anyhow::ensure!(
            e.population_size <= 10000,
            "Population size too large (max 10000)"
        );
        anyhow::ensure!(e.episode_length > 0, "Episode length must be positive");
        anyhow::ensure!(
            e.elite_fraction > 0.0 && e.elite_fraction <= 1.0,
            "Elite fraction must be in (0.0, 1.0]"
        );
        anyhow::ensure!(
            e.mutation_rate.is_finite() && e.mutation_rate >= 0.0,
            "Mutation rate must be non-negative"
        );
        match e.schedule {
            MutationSchedule::Constant => {}
            MutationSchedule::Linear { final_rate } => anyhow::ensure!(
                final_rate.is_finite() && final_rate >= 0.0,
                "Final mutation rate must be non-negative"
            ),
            MutationSchedule::Exponential { decay } => anyhow::ensure!(
                decay.is_finite() && decay >= 0.0,
                "Mutation decay must be non-negative"
            ),
        }
        anyhow::ensure!(
            e.weight_limit.is_finite() && e.weight_limit > 0.0,
            "Weight limit must be positive"
        );
        anyhow::ensure!(
            e.init_scale.is_finite() && e.init_scale >= 0.0 && e.init_scale <= e.weight_limit,
            "Init scale must be in [0.0, weight_limit]"
        );
        anyhow::ensure!(
            e.checkpoint_interval != Some(0),
            "Checkpoint interval must be positive"
        );
        e.task.validate()?;

        let d = &self.deploy;
        if let Some(bits) = d.frac_bits {
            anyhow::ensure!(
                (MIN_FRAC_BITS..=MAX_FRAC_BITS).contains(&bits),
                "Fractional bits must be in [{MIN_FRAC_BITS}, {MAX_FRAC_BITS}]"
            );
        }
        anyhow::ensure!(d.control_hz > 0, "Control rate must be positive");
        anyhow::ensure!(
            d.low_power_hz > 0 && d.low_power_hz <= d.control_hz,
            "Low power rate must be in (0, control_hz]"
        );
        anyhow::ensure!(
            d.critical_battery_volts < d.low_battery_volts,
            "Critical battery threshold must be below the low threshold"
        );
        anyhow::ensure!(
            d.recovery_margin.is_finite() && d.recovery_margin >= 0.0,
            "Recovery margin must be non-negative"
        );

        Ok(())
    }

    /// Clamps material coefficients into `[0.0, 1.0]`. Non-finite values are
    /// left for `validate` to reject.
    pub fn normalize(&mut self) {
        let p = &mut self.physics;
        if p.default_friction.is_finite() {
            p.default_friction = p.default_friction.clamp(0.0, 1.0);
        }
        if p.default_restitution.is_finite() {
            p.default_restitution = p.default_restitution.clamp(0.0, 1.0);
        }
    }

    /// Parses, normalizes and validates a TOML document.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let mut config = toml::from_str::<Self>(content)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Hash of the settings that shape a training run.
    ///
    /// Deployment settings are left out; they do not affect the trained weights.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.physics).as_bytes());
        hasher.update(format!("{:?}", self.agent).as_bytes());
        hasher.update(format!("{:?}", self.evolution).as_bytes());
        hex::encode(hasher.finalize())
    }
}
