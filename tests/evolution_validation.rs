use common::ConfigBuilder;
use edgeswarm_core::agent::Task;
use edgeswarm_core::config::MutationSchedule;
use edgeswarm_core::evolution::elite_count;
use edgeswarm_data::ControllerNetwork;
use std::sync::atomic::AtomicBool;

mod common;

#[test]
fn test_running_best_non_decreasing_end_to_end() {
    let mut manager = ConfigBuilder::new()
        .with_seed(2024)
        .with_population(10)
        .with_generations(10)
        .with_episode_length(100)
        .with_config(|c| c.evolution.elite_fraction = 0.5)
        .build_manager();

    let history = manager.run(&AtomicBool::new(false));
    assert_eq!(history.len(), 10);
    assert!(manager.is_finished());

    let mut running = f64::NEG_INFINITY;
    let mut series = Vec::new();
    for stats in &history {
        assert!(stats.best.is_finite() && stats.best >= 0.0);
        assert!(stats.worst <= stats.mean + 1e-9 && stats.mean <= stats.best + 1e-9);
        running = running.max(stats.best);
        series.push(running);
    }
    for pair in series.windows(2) {
        assert!(pair[1] >= pair[0]);
    }
    let hall_of_fame = manager.best().unwrap();
    assert_eq!(hall_of_fame.fitness, running);
}

#[test]
fn test_elites_carried_unchanged_and_children_near_parents() {
    let mut manager = ConfigBuilder::new()
        .with_population(8)
        .with_config(|c| c.evolution.elite_fraction = 0.25)
        .build_manager();
    let rate = manager.mutation_rate_for(0);

    let before: Vec<ControllerNetwork> = manager
        .agents()
        .iter()
        .map(|a| a.controller().clone())
        .collect();
    let stats = manager.run_generation().unwrap();

    let k = elite_count(8, 0.25);
    assert_eq!(k, 2);
    let agents = manager.agents();
    assert_eq!(agents[0].controller(), &before[stats.best_index]);
    assert_eq!(agents[0].fitness(), stats.best);
    for elite in &agents[..k] {
        assert!(before.contains(elite.controller()));
    }
    assert!(agents[0].fitness() >= agents[1].fitness());

    for (slot, child) in agents.iter().enumerate().skip(k) {
        let parent = agents[(slot - k) % k].controller();
        assert_eq!(child.fitness(), 0.0);
        assert_eq!(child.fitness_history(), agents[(slot - k) % k].fitness_history());
        for (c, p) in child.controller().parameters().zip(parent.parameters()) {
            assert!((c - p).abs() <= rate + 1e-12);
        }
    }
}

#[test]
fn test_every_task_scores_non_negative() {
    let tasks = [
        Task::Push {
            completion_radius: 0.5,
        },
        Task::Gather,
        Task::Formation { spacing: 1.5 },
        Task::Explore,
    ];
    for task in tasks {
        let mut manager = ConfigBuilder::new()
            .with_generations(2)
            .with_config(|c| c.evolution.task = task)
            .build_manager();
        for stats in manager.run(&AtomicBool::new(false)) {
            assert!(stats.worst >= 0.0, "{:?} produced negative fitness", task);
            assert_eq!(stats.evaluation_failures, 0);
        }
    }
}

#[test]
fn test_mutation_schedule_anneals() {
    let manager = ConfigBuilder::new()
        .with_generations(10)
        .with_config(|c| {
            c.evolution.mutation_rate = 0.1;
            c.evolution.schedule = MutationSchedule::Linear { final_rate: 0.0 };
        })
        .build_manager();
    let first = manager.mutation_rate_for(0);
    let last = manager.mutation_rate_for(9);
    assert!((first - 0.1).abs() < 1e-12);
    assert!(last < first);
}

#[test]
fn test_velocity_actuation_runs() {
    let mut manager = ConfigBuilder::new()
        .with_config(|c| c.agent.actuation = edgeswarm_core::config::Actuation::Velocity)
        .build_manager();
    let stats = manager.run_generation().unwrap();
    assert_eq!(stats.numeric_faults, 0);
    assert!(manager.engine().objects().all(|b| b.position.is_finite()));
}
