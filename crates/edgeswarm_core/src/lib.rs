//! # EdgeSwarm Core
//!
//! Training and deployment logic for small swarm controllers.
//!
//! This crate contains:
//! - A deterministic 2D physics sandbox (collisions, friction, joints)
//! - The fixed 6→32→2 controller network and its mutation operators
//! - Embodied agents running perceive→decide→act against the sandbox
//! - The generational evolution loop with checkpoint capture and restore
//! - Fixed-point numerics and the constrained deployment runtime
//! - Metrics collection and structured logging
//!
//! ## Determinism
//!
//! Every stochastic draw comes from a seeded `ChaCha8Rng` and happens in
//! population order. Parallel sections (integration, perception, scoring) only
//! read shared state, so results do not depend on thread scheduling.
//!
//! ## Example
//!
//! ```
//! use edgeswarm_core::controller::ControllerLogic;
//! use edgeswarm_data::ControllerNetwork;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let network = ControllerNetwork::new_random_with_rng(0.5, &mut rng);
//! let action = network.forward(&[0.3, -0.1, 0.0, 0.0, 0.2, 0.5]);
//! assert!(action.iter().all(|a| (-1.0..=1.0).contains(a)));
//! ```

/// Embodied agents and fitness tasks
pub mod agent;
/// Configuration management for training and deployment
pub mod config;
/// Controller network logic: forward pass, initialization, mutation
pub mod controller;
/// Export and device-side runtime
pub mod deploy;
/// Generational search over controller weights
pub mod evolution;
/// Q-format fixed-point arithmetic and the tanh table
pub mod fixed;
/// Metrics collection and logging setup
pub mod metrics;
/// Physics sandbox
pub mod physics;

pub use agent::{EmbodiedAgent, Observation, Task};
pub use config::AppConfig;
pub use controller::ControllerLogic;
pub use deploy::{DeploymentRuntime, RunMode};
pub use evolution::EvolutionManager;
pub use metrics::{init_logging, Metrics};
pub use physics::PhysicsEngine;
