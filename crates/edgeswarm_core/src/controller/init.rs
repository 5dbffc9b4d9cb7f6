use edgeswarm_data::{ControllerNetwork, CONTROLLER_HIDDEN, CONTROLLER_OUTPUTS};
use rand::Rng;

/// Draws every weight uniformly from `±init_scale`; biases start at zero.
///
/// Draw order is w1 row-major then w2 row-major, so a seed fixes the network.
pub fn create_random_with_rng<R: Rng>(init_scale: f64, rng: &mut R) -> ControllerNetwork {
    let scale = if init_scale.is_finite() {
        init_scale.abs()
    } else {
        0.0
    };
    let mut draw = || {
        if scale > 0.0 {
            scale * rng.gen_range(-1.0..=1.0)
        } else {
            0.0
        }
    };
    let w1 = std::array::from_fn(|_| std::array::from_fn::<f64, CONTROLLER_HIDDEN, _>(|_| draw()));
    let w2 = std::array::from_fn(|_| std::array::from_fn::<f64, CONTROLLER_OUTPUTS, _>(|_| draw()));
    ControllerNetwork::new(w1, [0.0; CONTROLLER_HIDDEN], w2, [0.0; CONTROLLER_OUTPUTS])
}
