//! Plain data records shared by the simulation, training and deployment crates.
//!
//! Nothing in here owns behaviour beyond construction-time validation and small
//! value-type helpers; the logic lives in `edgeswarm_core`.

pub mod body;
pub mod checkpoint;
pub mod controller;
pub mod export;
pub mod vector;

pub use body::{BodyKind, ObjectId, PhysicsObject, Shape};
pub use checkpoint::{AgentRecord, Checkpoint, GenerationStats, RngState, CHECKPOINT_VERSION};
pub use controller::{
    Action, ControllerNetwork, Perception, CONTROLLER_HIDDEN, CONTROLLER_INPUTS,
    CONTROLLER_OUTPUTS,
};
pub use export::{ExportFormat, ExportedParams, NeighborMessage, NumericRepr, ParamSet, RuntimeConfig};
pub use vector::{Vector2, Vector3};
