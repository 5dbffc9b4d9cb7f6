//! Deployment: export of trained controllers and the constrained runtime that
//! executes them on a device.

pub mod export;
pub mod inbox;
pub mod pool;
pub mod power;
pub mod runtime;

pub use export::{export_network, fixed_point_error_bound, ExportReport};
pub use inbox::NeighborInbox;
pub use pool::BufferPool;
pub use power::{next_mode, PowerThresholds, ResourceReading, RunMode};
pub use runtime::{
    ControlOutput, DeploymentRuntime, RuntimeDiagnostics, SensorFrame, StepStatus,
    TelemetryRecord,
};

use crate::config::DeployConfig;
use edgeswarm_data::ExportFormat;

/// Numeric representation selected by the deployment settings.
#[must_use]
pub fn export_format(config: &DeployConfig) -> ExportFormat {
    match config.frac_bits {
        Some(frac_bits) => ExportFormat::Fixed { frac_bits },
        None => ExportFormat::Float,
    }
}
