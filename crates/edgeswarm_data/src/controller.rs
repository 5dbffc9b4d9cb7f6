use serde::{Deserialize, Serialize};

pub const CONTROLLER_INPUTS: usize = 6;
pub const CONTROLLER_HIDDEN: usize = 32;
pub const CONTROLLER_OUTPUTS: usize = 2;

/// `[self_x, self_y, target_x, target_y, neighbor_count, avg_rssi]`, normalized.
pub type Perception = [f64; CONTROLLER_INPUTS];

/// `[dx, dy]` in `[-1, 1]`.
pub type Action = [f64; CONTROLLER_OUTPUTS];

/// Weights of the fixed 6→32→2 controller.
///
/// The topology never changes; only parameter values evolve. Instances are
/// never edited in place: mutation builds a new network through
/// [`ControllerNetwork::map_parameters`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerNetwork {
    w1: [[f64; CONTROLLER_HIDDEN]; CONTROLLER_INPUTS],
    b1: [f64; CONTROLLER_HIDDEN],
    w2: [[f64; CONTROLLER_OUTPUTS]; CONTROLLER_HIDDEN],
    b2: [f64; CONTROLLER_OUTPUTS],
}

impl ControllerNetwork {
    pub const PARAMETER_COUNT: usize = CONTROLLER_INPUTS * CONTROLLER_HIDDEN
        + CONTROLLER_HIDDEN
        + CONTROLLER_HIDDEN * CONTROLLER_OUTPUTS
        + CONTROLLER_OUTPUTS;

    #[must_use]
    pub fn new(
        w1: [[f64; CONTROLLER_HIDDEN]; CONTROLLER_INPUTS],
        b1: [f64; CONTROLLER_HIDDEN],
        w2: [[f64; CONTROLLER_OUTPUTS]; CONTROLLER_HIDDEN],
        b2: [f64; CONTROLLER_OUTPUTS],
    ) -> Self {
        Self { w1, b1, w2, b2 }
    }

    #[must_use]
    pub fn zeroed() -> Self {
        Self::new(
            [[0.0; CONTROLLER_HIDDEN]; CONTROLLER_INPUTS],
            [0.0; CONTROLLER_HIDDEN],
            [[0.0; CONTROLLER_OUTPUTS]; CONTROLLER_HIDDEN],
            [0.0; CONTROLLER_OUTPUTS],
        )
    }

    #[must_use]
    pub fn w1(&self) -> &[[f64; CONTROLLER_HIDDEN]; CONTROLLER_INPUTS] {
        &self.w1
    }

    #[must_use]
    pub fn b1(&self) -> &[f64; CONTROLLER_HIDDEN] {
        &self.b1
    }

    #[must_use]
    pub fn w2(&self) -> &[[f64; CONTROLLER_OUTPUTS]; CONTROLLER_HIDDEN] {
        &self.w2
    }

    #[must_use]
    pub fn b2(&self) -> &[f64; CONTROLLER_OUTPUTS] {
        &self.b2
    }

    /// All parameters in storage order: w1 row-major, b1, w2 row-major, b2.
    pub fn parameters(&self) -> impl Iterator<Item = f64> + '_ {
        self.w1
            .iter()
            .flatten()
            .chain(self.b1.iter())
            .chain(self.w2.iter().flatten())
            .chain(self.b2.iter())
            .copied()
    }

    /// Builds a new network by applying `f` to every parameter in storage order.
    #[must_use]
    pub fn map_parameters(&self, mut f: impl FnMut(f64) -> f64) -> Self {
        let mut next = self.clone();
        for w in next
            .w1
            .iter_mut()
            .flatten()
            .chain(next.b1.iter_mut())
            .chain(next.w2.iter_mut().flatten())
            .chain(next.b2.iter_mut())
        {
            *w = f(*w);
        }
        next
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.parameters().all(f64::is_finite)
    }

    #[must_use]
    pub fn max_abs_parameter(&self) -> f64 {
        self.parameters().fold(0.0, |acc, w| acc.max(w.abs()))
    }

    /// Rejects networks carrying NaN or infinite parameters.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.is_finite(), "controller network has non-finite parameters");
        Ok(())
    }
}

impl Default for ControllerNetwork {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_count() {
        let net = ControllerNetwork::zeroed();
        assert_eq!(net.parameters().count(), ControllerNetwork::PARAMETER_COUNT);
        assert_eq!(ControllerNetwork::PARAMETER_COUNT, 6 * 32 + 32 + 32 * 2 + 2);
    }

    #[test]
    fn test_map_parameters_visits_storage_order() {
        let mut counter = 0.0;
        let net = ControllerNetwork::zeroed().map_parameters(|_| {
            counter += 1.0;
            counter
        });
        assert_eq!(net.w1()[0][0], 1.0);
        assert_eq!(net.w1()[0][1], 2.0);
        assert_eq!(net.b1()[0], 6.0 * 32.0 + 1.0);
        assert_eq!(net.b2()[1], ControllerNetwork::PARAMETER_COUNT as f64);
    }

    #[test]
    fn test_map_leaves_original_untouched() {
        let original = ControllerNetwork::zeroed();
        let shifted = original.map_parameters(|w| w + 1.0);
        assert!(original.parameters().all(|w| w == 0.0));
        assert!(shifted.parameters().all(|w| w == 1.0));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let net = ControllerNetwork::zeroed().map_parameters(|_| f64::NAN);
        assert!(net.validate().is_err());
        assert!(ControllerNetwork::zeroed().validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_exact() {
        let net = ControllerNetwork::zeroed().map_parameters(|_| 0.1 + 0.2);
        let json = serde_json::to_string(&net).unwrap();
        let back: ControllerNetwork = serde_json::from_str(&json).unwrap();
        assert_eq!(net, back);
    }
}
