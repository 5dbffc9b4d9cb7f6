//! # EdgeSwarm
//!
//! Evolves swarm controllers in a deterministic physics sandbox and exports
//! the fittest one for a microcontroller runtime.
//!
//! The heavy lifting lives in the workspace crates:
//! - `edgeswarm_data`: plain serde records
//! - `edgeswarm_core`: physics, controllers, evolution, deployment runtime
//! - `edgeswarm_io`: checkpoints and parameter files
//!
//! This crate wires them into a [`training::TrainingSession`].

pub mod training;

pub use edgeswarm_core::config::AppConfig;
pub use training::{load_config, TrainingOutcome, TrainingSession};
