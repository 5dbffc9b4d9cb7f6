use crate::controller::{
    ControllerNetwork, CONTROLLER_HIDDEN, CONTROLLER_INPUTS, CONTROLLER_OUTPUTS,
};
use serde::{Deserialize, Serialize};

/// Controller parameters in a deployable numeric type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSet<T> {
    pub w1: [[T; CONTROLLER_HIDDEN]; CONTROLLER_INPUTS],
    pub b1: [T; CONTROLLER_HIDDEN],
    pub w2: [[T; CONTROLLER_OUTPUTS]; CONTROLLER_HIDDEN],
    pub b2: [T; CONTROLLER_OUTPUTS],
}

impl<T: Copy> ParamSet<T> {
    /// Converts every parameter of `network` with `f`, biases included.
    pub fn from_network(network: &ControllerNetwork, mut f: impl FnMut(f64) -> T) -> Self {
        let w1 = network.w1();
        let w2 = network.w2();
        Self {
            w1: std::array::from_fn(|i| std::array::from_fn(|j| f(w1[i][j]))),
            b1: std::array::from_fn(|j| f(network.b1()[j])),
            w2: std::array::from_fn(|j| std::array::from_fn(|k| f(w2[j][k]))),
            b2: std::array::from_fn(|k| f(network.b2()[k])),
        }
    }

    /// Parameters in storage order: w1 row-major, b1, w2 row-major, b2.
    pub fn values(&self) -> impl Iterator<Item = T> + '_ {
        self.w1
            .iter()
            .flatten()
            .chain(self.b1.iter())
            .chain(self.w2.iter().flatten())
            .chain(self.b2.iter())
            .copied()
    }
}

/// Requested numeric representation for an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportFormat {
    Float,
    Fixed { frac_bits: u8 },
}

/// Exported parameters in their chosen representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NumericRepr {
    Float { params: ParamSet<f32> },
    Fixed { frac_bits: u8, params: ParamSet<i32> },
}

impl NumericRepr {
    #[must_use]
    pub fn format(&self) -> ExportFormat {
        match self {
            NumericRepr::Float { .. } => ExportFormat::Float,
            NumericRepr::Fixed { frac_bits, .. } => ExportFormat::Fixed {
                frac_bits: *frac_bits,
            },
        }
    }
}

/// Agent settings the device needs to reproduce training-time actuation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub max_speed: f64,
    pub noise_scale: f64,
    pub noise_decay: f64,
    pub communication_range: f64,
    pub position_scale: f64,
    pub neighbor_scale: f64,
}

/// What gets flashed: parameters plus the runtime configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedParams {
    pub name: String,
    pub repr: NumericRepr,
    pub config: RuntimeConfig,
}

/// Per-tick neighbor summary exchanged between devices.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NeighborMessage {
    pub neighbor_count: u32,
    pub avg_rssi: f64,
}
