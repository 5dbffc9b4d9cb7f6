use crate::fixed::{QFormat, TANH_TABLE_ERROR};
use edgeswarm_data::{
    ControllerNetwork, ExportFormat, ExportedParams, NumericRepr, ParamSet, RuntimeConfig,
};

/// Result of converting a trained network for deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub params: ExportedParams,
    /// Parameters clipped to the representable range.
    pub saturated: usize,
}

/// Converts `network` into `format`. Biases are always exported.
pub fn export_network(
    network: &ControllerNetwork,
    format: ExportFormat,
    config: RuntimeConfig,
    name: &str,
) -> anyhow::Result<ExportReport> {
    network.validate()?;
    anyhow::ensure!(!name.is_empty(), "export name must not be empty");
    anyhow::ensure!(
        name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        "export name must be alphanumeric or '_', got {name:?}"
    );

    let (repr, saturated) = match format {
        ExportFormat::Float => {
            let saturated = network
                .parameters()
                .filter(|v| v.abs() > f64::from(f32::MAX))
                .count();
            let limit = f64::from(f32::MAX);
            let params = ParamSet::from_network(network, |v| v.clamp(-limit, limit) as f32);
            (NumericRepr::Float { params }, saturated)
        }
        ExportFormat::Fixed { frac_bits } => {
            let q = QFormat::new(frac_bits)?;
            let saturated = network.parameters().filter(|&v| q.saturates(v)).count();
            let params = ParamSet::from_network(network, |v| q.to_fixed(v));
            (NumericRepr::Fixed { frac_bits, params }, saturated)
        }
    };
    if saturated > 0 {
        tracing::warn!(name, saturated, ?format, "Parameters saturated during export");
    }
    tracing::info!(name, ?format, "Exported controller");

    Ok(ExportReport {
        params: ExportedParams {
            name: name.to_string(),
            repr,
            config,
        },
        saturated,
    })
}

/// Worst-case absolute deviation of the fixed-point forward pass from the
/// float reference, for inputs bounded by `input_max_abs`.
///
/// Every quantization (inputs, weights, biases, narrowing) contributes at most
/// half an LSB; the tanh table adds `1.5` LSB plus its interpolation error and
/// is 1-Lipschitz, so hidden errors propagate through `|w2|`. Returns
/// infinity when an input or parameter would saturate.
#[must_use]
pub fn fixed_point_error_bound(
    network: &ControllerNetwork,
    format: QFormat,
    input_max_abs: f64,
) -> f64 {
    if !input_max_abs.is_finite()
        || format.saturates(input_max_abs)
        || network.parameters().any(|v| format.saturates(v))
    {
        return f64::INFINITY;
    }
    let half = format.resolution() / 2.0;
    let tanh_error = 1.5 * format.resolution() + TANH_TABLE_ERROR;
    let input = input_max_abs.abs();

    let w1 = network.w1();
    let hidden_error = (0..w1[0].len())
        .map(|j| {
            let products: f64 = w1
                .iter()
                .map(|row| input * half + row[j].abs() * half + half * half)
                .sum();
            products + half + half
        })
        .fold(0.0, f64::max)
        + tanh_error;

    let w2 = network.w2();
    (0..w2[0].len())
        .map(|k| {
            let products: f64 = w2
                .iter()
                .map(|row| half + row[k].abs() * hidden_error + half * hidden_error)
                .sum();
            products + half + half
        })
        .fold(0.0, f64::max)
        + tanh_error
}
