use edgeswarm_data::ControllerNetwork;
use rand::Rng;

/// Adds independent uniform noise in `±rate` to every parameter, then clamps
/// to `±weight_limit`.
///
/// A zero rate returns an exact copy without consuming randomness. Non-finite
/// rates are treated as zero.
pub fn mutate_with_rng<R: Rng>(
    network: &ControllerNetwork,
    rate: f64,
    weight_limit: f64,
    rng: &mut R,
) -> ControllerNetwork {
    if rate == 0.0 || !rate.is_finite() {
        return network.clone();
    }
    let rate = rate.abs();
    let limit = if weight_limit.is_finite() && weight_limit > 0.0 {
        weight_limit
    } else {
        f64::MAX
    };
    network.map_parameters(|w| (w + rate * rng.gen_range(-1.0..=1.0)).clamp(-limit, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerLogic;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_zero_rate_is_bit_identical() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let net = ControllerNetwork::new_random_with_rng(0.5, &mut rng);
        let copy = mutate_with_rng(&net, 0.0, 5.0, &mut rng);
        assert!(net
            .parameters()
            .zip(copy.parameters())
            .all(|(a, b)| a.to_bits() == b.to_bits()));
    }

    #[test]
    fn test_noise_bounded_by_rate() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let net = ControllerNetwork::new_random_with_rng(0.5, &mut rng);
        let child = mutate_with_rng(&net, 0.05, 5.0, &mut rng);
        assert!(net
            .parameters()
            .zip(child.parameters())
            .all(|(a, b)| (a - b).abs() <= 0.05 + 1e-15));
        assert_ne!(net, child);
    }

    #[test]
    fn test_clamped_to_weight_limit() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let net = ControllerNetwork::zeroed().map_parameters(|_| 4.9);
        let child = mutate_with_rng(&net, 1.0, 5.0, &mut rng);
        assert!(child.parameters().all(|w| w.abs() <= 5.0));
    }

    #[test]
    fn test_huge_rate_stays_finite_and_clamped() {
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let child = mutate_with_rng(&ControllerNetwork::zeroed(), f64::MAX, 5.0, &mut rng);
        assert!(child.parameters().all(|w| w.is_finite() && w.abs() <= 5.0));
        assert!(child.validate().is_ok());
    }

    #[test]
    fn test_nan_rate_is_noop() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let net = ControllerNetwork::new_random_with_rng(0.5, &mut rng);
        assert_eq!(mutate_with_rng(&net, f64::NAN, 5.0, &mut rng), net);
    }
}
