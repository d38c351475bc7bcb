use std::collections::HashMap;

use rbdas_workflow::affinity::{AffinityTable, DEFAULT_AFFINITY};
use rbdas_workflow::domain::profile::WorkloadType;
use rbdas_workflow::domain::vm::{VmCatalog, VmType};

fn mock_vm_type(id: &str, family: &str) -> VmType {
    VmType {
        id: id.to_string(),
        family: family.to_string(),
        vcpus: 4,
        memory_gb: 16.0,
        storage_gb: 100.0,
        network_gbps: 10.0,
        gpu: false,
        pricing: None,
    }
}

fn mock_table(entries: &[(WorkloadType, &str, f64)]) -> AffinityTable {
    let mut scores: HashMap<WorkloadType, HashMap<String, f64>> = HashMap::new();
    for &(workload, family, score) in entries {
        scores.entry(workload).or_default().insert(family.to_string(), score);
    }
    AffinityTable::new(scores)
}

#[test]
fn test_known_pair_returns_stored_score() {
    let table = mock_table(&[(WorkloadType::Cpu, "compute", 0.9)]);

    assert!((table.affinity(WorkloadType::Cpu, "compute") - 0.9).abs() < 1e-12);
}

#[test]
fn test_unknown_pair_returns_default() {
    let table = mock_table(&[(WorkloadType::Cpu, "compute", 0.9)]);

    // Unknown family and unknown workload both fall back to the default.
    assert_eq!(table.affinity(WorkloadType::Cpu, "storage"), DEFAULT_AFFINITY);
    assert_eq!(table.affinity(WorkloadType::Io, "compute"), DEFAULT_AFFINITY);
    assert_eq!(AffinityTable::default().affinity(WorkloadType::Mix, "anything"), DEFAULT_AFFINITY);
}

#[test]
fn test_out_of_range_scores_are_clamped_at_construction() {
    let table = mock_table(&[(WorkloadType::Cpu, "compute", 1.7), (WorkloadType::Mem, "memory", -0.3)]);

    assert_eq!(table.affinity(WorkloadType::Cpu, "compute"), 1.0);
    assert_eq!(table.affinity(WorkloadType::Mem, "memory"), 0.0);
}

#[test]
fn test_best_vm_type_picks_highest_affinity() {
    let catalog = VmCatalog::new(vec![
        mock_vm_type("m1", "memory"),
        mock_vm_type("c1", "compute"),
        mock_vm_type("s1", "storage"),
    ]);
    let table = mock_table(&[
        (WorkloadType::Cpu, "memory", 0.3),
        (WorkloadType::Cpu, "compute", 0.95),
        (WorkloadType::Cpu, "storage", 0.2),
    ]);

    let (index, vm_type) = table.best_vm_type(WorkloadType::Cpu, &catalog).unwrap();
    assert_eq!(index, 1);
    assert_eq!(vm_type.id, "c1");
}

#[test]
fn test_best_vm_type_ties_resolve_to_lowest_index() {
    let catalog = VmCatalog::new(vec![mock_vm_type("a", "general"), mock_vm_type("b", "general")]);
    let table = mock_table(&[(WorkloadType::Mix, "general", 0.6)]);

    let (index, vm_type) = table.best_vm_type(WorkloadType::Mix, &catalog).unwrap();
    assert_eq!(index, 0);
    assert_eq!(vm_type.id, "a");
}

#[test]
fn test_best_vm_type_on_empty_catalog_is_none() {
    let table = mock_table(&[]);
    assert!(table.best_vm_type(WorkloadType::Cpu, &VmCatalog::new(vec![])).is_none());
}

#[test]
fn test_affinity_by_index_out_of_range_is_default() {
    let catalog = VmCatalog::new(vec![mock_vm_type("c1", "compute")]);
    let table = mock_table(&[(WorkloadType::Cpu, "compute", 0.8)]);

    assert!((table.affinity_by_index(WorkloadType::Cpu, &catalog, 0) - 0.8).abs() < 1e-12);
    assert_eq!(table.affinity_by_index(WorkloadType::Cpu, &catalog, 5), DEFAULT_AFFINITY);
}
