pub mod forward;
pub mod init;
pub mod mutation;

pub use edgeswarm_data::{
    Action, ControllerNetwork, Perception, CONTROLLER_HIDDEN, CONTROLLER_INPUTS,
    CONTROLLER_OUTPUTS,
};
pub use forward::{safe_output, sanitize_perception};
use rand::Rng;

/// Behaviour of the 6→32→2 controller.
pub trait ControllerLogic {
    /// Uniform weights in `±init_scale`, zero biases.
    fn new_random_with_rng<R: Rng>(init_scale: f64, rng: &mut R) -> Self;

    /// `tanh(W2ᵗ · tanh(W1ᵗ · x + b1) + b2)`, each output in `[-1, 1]`.
    #[must_use]
    fn forward(&self, input: &Perception) -> Action;

    /// Hidden-layer activations for `input`.
    #[must_use]
    fn hidden(&self, input: &Perception) -> [f64; CONTROLLER_HIDDEN];

    /// Independent copy with bounded zero-mean noise of amplitude `rate` added
    /// to every parameter. A zero rate reproduces the weights bit for bit.
    #[must_use]
    fn mutate_with_rng<R: Rng>(&self, rate: f64, weight_limit: f64, rng: &mut R) -> Self;

    /// Mean absolute parameter difference.
    fn distance(&self, other: &Self) -> f64;
}

impl ControllerLogic for ControllerNetwork {
    fn new_random_with_rng<R: Rng>(init_scale: f64, rng: &mut R) -> Self {
        init::create_random_with_rng(init_scale, rng)
    }

    fn forward(&self, input: &Perception) -> Action {
        forward::forward(self, input)
    }

    fn hidden(&self, input: &Perception) -> [f64; CONTROLLER_HIDDEN] {
        forward::hidden_layer(self, input)
    }

    fn mutate_with_rng<R: Rng>(&self, rate: f64, weight_limit: f64, rng: &mut R) -> Self {
        mutation::mutate_with_rng(self, rate, weight_limit, rng)
    }

    fn distance(&self, other: &Self) -> f64 {
        let total: f64 = self
            .parameters()
            .zip(other.parameters())
            .map(|(a, b)| (a - b).abs())
            .sum();
        total / ControllerNetwork::PARAMETER_COUNT as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_distance_to_self_is_zero() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let net = ControllerNetwork::new_random_with_rng(0.5, &mut rng);
        assert_eq!(net.distance(&net), 0.0);
    }

    #[test]
    fn test_mutated_child_differs() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let net = ControllerNetwork::new_random_with_rng(0.5, &mut rng);
        let child = net.mutate_with_rng(0.1, 5.0, &mut rng);
        let d = net.distance(&child);
        assert!(d > 0.0 && d <= 0.1);
    }

    #[test]
    fn test_hidden_layer_bounded() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let net = ControllerNetwork::new_random_with_rng(2.0, &mut rng);
        let hidden = net.hidden(&[1.0, -1.0, 0.5, 0.0, 0.3, 0.9]);
        assert!(hidden.iter().all(|h| (-1.0..=1.0).contains(h)));
        assert_eq!(ControllerNetwork::zeroed().hidden(&[1.0; 6]), [0.0; 32]);
    }
}
