use std::collections::HashMap;

use rbdas_workflow::affinity::AffinityTable;
use rbdas_workflow::cost::{CostModel, FitnessWeights};
use rbdas_workflow::domain::profile::{ResourceProfile, WorkloadType};
use rbdas_workflow::domain::task::{Edge, Task, TaskId};
use rbdas_workflow::domain::vm::{VmCatalog, VmPricing, VmType};
use rbdas_workflow::domain::workflow::Workflow;
use rbdas_workflow::error::Error;
use rbdas_workflow::scheduler::optimizer::{MappingOptimizer, OptimizerState, PsoConfig};

fn mock_vm_type(id: &str, family: &str, vcpus: u32) -> VmType {
    VmType {
        id: id.to_string(),
        family: family.to_string(),
        vcpus,
        memory_gb: 4.0 * vcpus as f64,
        storage_gb: 500.0,
        network_gbps: 10.0,
        gpu: false,
        pricing: Some(VmPricing { on_demand: 0.05 * vcpus as f64, reserved: 0.03 * vcpus as f64, spot: 0.015 * vcpus as f64 }),
    }
}

fn mock_catalog() -> VmCatalog {
    VmCatalog::new(vec![mock_vm_type("small", "general", 2), mock_vm_type("large", "compute", 8)])
}

/// Diamond workflow 0 -> {1, 2} -> 3 with a generous deadline.
fn mock_workflow() -> Workflow {
    let tasks = vec![
        Task::new(0, "prepare", 2000.0),
        Task::new(1, "branch-a", 4000.0),
        Task::new(2, "branch-b", 6000.0),
        Task::new(3, "merge", 2000.0),
    ];
    let edges = vec![
        Edge { source: 0, target: 1, data_size: 50.0 },
        Edge { source: 0, target: 2, data_size: 50.0 },
        Edge { source: 1, target: 3, data_size: 25.0 },
        Edge { source: 2, target: 3, data_size: 25.0 },
    ];
    let mut workflow = Workflow::new(tasks, edges);
    workflow.set_deadline(3600.0);
    return workflow;
}

fn mock_profiles(workflow: &Workflow) -> HashMap<TaskId, ResourceProfile> {
    workflow
        .all_tasks()
        .iter()
        .map(|t| {
            let profile = ResourceProfile { cpu_intensity: 0.8, workload_type: WorkloadType::Cpu, ..ResourceProfile::default() };
            (t.id, profile)
        })
        .collect()
}

fn small_config() -> PsoConfig {
    PsoConfig { population: 10, iterations: 20, ..PsoConfig::default() }
}

#[test]
fn test_optimize_assigns_every_schedulable_task_once() {
    let workflow = mock_workflow();
    let catalog = mock_catalog();
    let profiles = mock_profiles(&workflow);
    let affinity = AffinityTable::default();
    let cost_model = CostModel::default();

    let mut optimizer =
        MappingOptimizer::new(&workflow, &catalog, &profiles, &affinity, &cost_model, FitnessWeights::default(), small_config());
    let mapping = optimizer.optimize().unwrap();

    assert_eq!(optimizer.state(), OptimizerState::Converged);
    assert_eq!(mapping.assignments.len(), 4);

    let mut assigned: Vec<TaskId> = mapping.assignments.iter().map(|a| a.task).collect();
    assigned.sort_unstable();
    assert_eq!(assigned, vec![0, 1, 2, 3]);
}

#[test]
fn test_schedule_respects_precedence() {
    let workflow = mock_workflow();
    let catalog = mock_catalog();
    let profiles = mock_profiles(&workflow);
    let affinity = AffinityTable::default();
    let cost_model = CostModel::default();

    let mut optimizer =
        MappingOptimizer::new(&workflow, &catalog, &profiles, &affinity, &cost_model, FitnessWeights::default(), small_config());
    let mapping = optimizer.optimize().unwrap();

    let finish_of: HashMap<TaskId, f64> = mapping.assignments.iter().map(|a| (a.task, a.finish)).collect();
    let start_of: HashMap<TaskId, f64> = mapping.assignments.iter().map(|a| (a.task, a.start)).collect();

    // The merge task never starts before either branch finished.
    assert!(start_of[&3] >= finish_of[&1] - 1e-9);
    assert!(start_of[&3] >= finish_of[&2] - 1e-9);
    assert!(mapping.makespan >= finish_of[&3] - 1e-9);
}

#[test]
fn test_fitness_history_is_non_increasing() {
    let workflow = mock_workflow();
    let catalog = mock_catalog();
    let profiles = mock_profiles(&workflow);
    let affinity = AffinityTable::default();
    let cost_model = CostModel::default();

    let mut optimizer =
        MappingOptimizer::new(&workflow, &catalog, &profiles, &affinity, &cost_model, FitnessWeights::default(), small_config());
    optimizer.optimize().unwrap();

    let history = optimizer.fitness_history();
    // One entry after initialization plus one per iteration.
    assert_eq!(history.len(), 21);
    for pair in history.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-12, "Global best regressed from {} to {}", pair[0], pair[1]);
    }
}

#[test]
fn test_identical_seeds_produce_identical_mappings() {
    let workflow = mock_workflow();
    let catalog = mock_catalog();
    let profiles = mock_profiles(&workflow);
    let affinity = AffinityTable::default();
    let cost_model = CostModel::default();

    let run = || {
        let mut optimizer = MappingOptimizer::new(
            &workflow,
            &catalog,
            &profiles,
            &affinity,
            &cost_model,
            FitnessWeights::default(),
            small_config(),
        );
        optimizer.optimize().unwrap()
    };

    let first = run();
    let second = run();

    // Byte-identical serialization, not just approximate equality.
    assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());
}

#[test]
fn test_different_seeds_may_explore_differently() {
    let workflow = mock_workflow();
    let catalog = mock_catalog();
    let profiles = mock_profiles(&workflow);
    let affinity = AffinityTable::default();
    let cost_model = CostModel::default();

    let run = |seed: u64| {
        let config = PsoConfig { seed, ..small_config() };
        let mut optimizer =
            MappingOptimizer::new(&workflow, &catalog, &profiles, &affinity, &cost_model, FitnessWeights::default(), config);
        optimizer.optimize().unwrap();
        optimizer.fitness_history().to_vec()
    };

    // Different seeds start from different swarms, so the initial global
    // best differs (the converged value may coincide).
    assert_ne!(run(1)[0], run(2)[0]);
}

#[test]
fn test_zero_population_fails_fast() {
    let workflow = mock_workflow();
    let catalog = mock_catalog();
    let profiles = mock_profiles(&workflow);
    let affinity = AffinityTable::default();
    let cost_model = CostModel::default();

    let config = PsoConfig { population: 0, ..small_config() };
    let mut optimizer =
        MappingOptimizer::new(&workflow, &catalog, &profiles, &affinity, &cost_model, FitnessWeights::default(), config);

    assert!(matches!(optimizer.optimize(), Err(Error::InvalidPopulationSize(0))));
    assert!(optimizer.fitness_history().is_empty());
}

#[test]
fn test_zero_iterations_fails_fast() {
    let workflow = mock_workflow();
    let catalog = mock_catalog();
    let profiles = mock_profiles(&workflow);
    let affinity = AffinityTable::default();
    let cost_model = CostModel::default();

    let config = PsoConfig { iterations: 0, ..small_config() };
    let mut optimizer =
        MappingOptimizer::new(&workflow, &catalog, &profiles, &affinity, &cost_model, FitnessWeights::default(), config);

    assert!(matches!(optimizer.optimize(), Err(Error::InvalidIterationCount(0))));
}

#[test]
fn test_empty_catalog_fails_fast() {
    let workflow = mock_workflow();
    let catalog = VmCatalog::new(vec![]);
    let profiles = mock_profiles(&workflow);
    let affinity = AffinityTable::default();
    let cost_model = CostModel::default();

    let mut optimizer =
        MappingOptimizer::new(&workflow, &catalog, &profiles, &affinity, &cost_model, FitnessWeights::default(), small_config());

    assert!(matches!(optimizer.optimize(), Err(Error::EmptyVmCatalog)));
}

#[test]
fn test_empty_workflow_yields_an_empty_mapping() {
    let workflow = Workflow::new(Vec::new(), Vec::new());
    let catalog = mock_catalog();
    let profiles = HashMap::new();
    let affinity = AffinityTable::default();
    let cost_model = CostModel::default();

    let mut optimizer =
        MappingOptimizer::new(&workflow, &catalog, &profiles, &affinity, &cost_model, FitnessWeights::default(), small_config());
    let mapping = optimizer.optimize().unwrap();

    assert!(mapping.assignments.is_empty());
    assert_eq!(mapping.fitness, 0.0);
    assert_eq!(optimizer.state(), OptimizerState::Converged);
}
