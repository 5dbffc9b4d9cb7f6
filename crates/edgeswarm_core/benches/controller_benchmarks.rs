use criterion::{black_box, criterion_group, criterion_main, Criterion};
use edgeswarm_core::config::{AgentConfig, DeployConfig};
use edgeswarm_core::controller::ControllerLogic;
use edgeswarm_core::deploy::{export_network, DeploymentRuntime};
use edgeswarm_data::{ControllerNetwork, ExportFormat};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Benchmark the float reference forward pass.
fn bench_controller_forward(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let network = ControllerNetwork::new_random_with_rng(0.5, &mut rng);
    let input = [0.3, -0.2, 0.0, 0.0, 0.1, 0.5];

    c.bench_function("controller_forward", |b| {
        b.iter(|| black_box(network.forward(black_box(&input))))
    });
}

/// Benchmark mutation of a full parameter set.
fn bench_controller_mutation(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let network = ControllerNetwork::new_random_with_rng(0.5, &mut rng);

    c.bench_function("controller_mutate", |b| {
        b.iter(|| black_box(network.mutate_with_rng(0.05, 5.0, &mut rng)))
    });
}

fn bench_runtime_inference(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let network = ControllerNetwork::new_random_with_rng(0.5, &mut rng);
    let config = AgentConfig::default().runtime_config();
    let input = [0.3, -0.2, 0.0, 0.0, 0.1, 0.5];

    for (label, format) in [
        ("runtime_infer_float", ExportFormat::Float),
        ("runtime_infer_q16", ExportFormat::Fixed { frac_bits: 16 }),
    ] {
        let Ok(report) = export_network(&network, format, config, "bench") else {
            continue;
        };
        let Ok(runtime) = DeploymentRuntime::new(report.params, &DeployConfig::default()) else {
            continue;
        };
        c.bench_function(label, |b| b.iter(|| black_box(runtime.infer(black_box(&input)))));
    }
}

criterion_group!(
    benches,
    bench_controller_forward,
    bench_controller_mutation,
    bench_runtime_inference
);
criterion_main!(benches);
