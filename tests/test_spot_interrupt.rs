use rbdas_workflow::domain::vm::{PricingTier, VmCatalog, VmType};
use rbdas_workflow::pool::{VmInstanceId, VmPoolManager};
use rbdas_workflow::simulator::spot::{CHECKPOINT_OVERHEAD, GRACE_PERIOD_SECS, SpotConfig, SpotInterruptModel};

const EPSILON: f64 = 1e-9;

// Keys only come from a pool, so draw them from a throwaway pool.
fn mock_instance_ids(count: usize) -> Vec<VmInstanceId> {
    let catalog = VmCatalog::new(vec![VmType {
        id: "small".to_string(),
        family: "general".to_string(),
        vcpus: 2,
        memory_gb: 8.0,
        storage_gb: 100.0,
        network_gbps: 10.0,
        gpu: false,
        pricing: None,
    }]);
    let pool = VmPoolManager::new();
    pool.seed_spot(&catalog, count);
    (0..count).map(|_| pool.allocate(catalog.get(0).unwrap(), PricingTier::Spot).id).collect()
}

fn mock_instance_id() -> VmInstanceId {
    mock_instance_ids(1)[0]
}

fn model(probability: f64) -> SpotInterruptModel {
    SpotInterruptModel::new(SpotConfig { interruption_probability: probability, ..SpotConfig::default() })
}

#[test]
fn test_no_interruption_inside_the_grace_period() {
    let mut model = model(1.0);
    let id = mock_instance_id();

    // Certain interruption probability, but the instance is too young.
    assert!(!model.should_interrupt(id, 30.0, 0.0));
    assert!(!model.should_interrupt(id, GRACE_PERIOD_SECS - 0.001, 0.0));
    assert_eq!(model.interruption_count(), 0);
}

#[test]
fn test_certain_probability_interrupts_after_the_grace_period() {
    let mut model = model(1.0);
    let id = mock_instance_id();

    assert!(model.should_interrupt(id, GRACE_PERIOD_SECS, 0.0));
    assert_eq!(model.interruption_count(), 1);
    assert_eq!(model.events()[0].instance, id);
    assert!((model.events()[0].time - GRACE_PERIOD_SECS).abs() < EPSILON);
}

#[test]
fn test_zero_probability_never_interrupts() {
    let mut model = model(0.0);
    let id = mock_instance_id();

    for check in 0..100 {
        assert!(!model.should_interrupt(id, 1000.0 + check as f64 * 300.0, 0.0));
    }
    assert_eq!(model.interruption_count(), 0);
    assert_eq!(model.mean_time_to_interruption(), f64::INFINITY);
}

#[test]
fn test_probability_outside_unit_interval_is_clamped() {
    let mut too_high = model(3.5);
    let id = mock_instance_id();

    // Clamped to 1.0, so the first post-grace check always hits.
    assert!(too_high.should_interrupt(id, 100.0, 0.0));
    assert!((model(3.5).mean_time_to_interruption() - 1.0).abs() < EPSILON);
}

#[test]
fn test_mean_time_to_interruption_is_the_inverse_probability() {
    assert!((model(0.1).mean_time_to_interruption() - 10.0).abs() < EPSILON);
    assert!((model(0.5).mean_time_to_interruption() - 2.0).abs() < EPSILON);
}

#[test]
fn test_simulate_window_removes_interrupted_instances() {
    let mut model = model(1.0);
    let ids = mock_instance_ids(2);

    // Checks at 0s (grace), 300s and 600s; both instances fall at 300s.
    let events = model.simulate_window(&ids, 0.0, 600.0);

    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| (e.time - 300.0).abs() < EPSILON));
    assert_eq!(model.interruption_count(), 2);
}

#[test]
fn test_identical_seeds_reproduce_the_interruption_pattern() {
    let config = SpotConfig { interruption_probability: 0.3, seed: 7, ..SpotConfig::default() };
    let id = mock_instance_id();

    let draw = || {
        let mut model = SpotInterruptModel::new(config);
        (0..50).map(|check| model.should_interrupt(id, 1000.0 + check as f64 * 300.0, 0.0)).collect::<Vec<bool>>()
    };

    assert_eq!(draw(), draw());
}

#[test]
fn test_checkpoint_records_the_completed_fraction() {
    let mut model = model(0.5);

    let checkpoint = model.create_checkpoint(3, 75.0, 300.0, 500.0);

    assert!((checkpoint.completed_fraction - 0.25).abs() < EPSILON);
    assert!((checkpoint.completion_percentage() - 25.0).abs() < EPSILON);
    assert!((checkpoint.remaining_work() - 225.0).abs() < EPSILON);
    assert_eq!(model.checkpoint_count(), 1);
}

#[test]
fn test_completed_fraction_caps_at_one() {
    let mut model = model(0.5);

    let over = model.create_checkpoint(1, 500.0, 300.0, 600.0);
    assert_eq!(over.completed_fraction, 1.0);
    assert_eq!(over.remaining_work(), 0.0);

    // A zero-work task checkpoints at zero progress instead of dividing
    // by zero.
    let empty = model.create_checkpoint(2, 0.0, 0.0, 600.0);
    assert_eq!(empty.completed_fraction, 0.0);
}

#[test]
fn test_resume_applies_the_overhead_and_consumes_the_checkpoint() {
    let mut model = model(0.5);
    model.create_checkpoint(4, 100.0, 400.0, 900.0);

    let remaining = model.resume_from_checkpoint(4).unwrap();
    assert!((remaining - 300.0 * (1.0 + CHECKPOINT_OVERHEAD)).abs() < EPSILON);

    // Consumed: a second resume finds nothing, but the lifetime creation
    // count is unaffected.
    assert!(model.resume_from_checkpoint(4).is_none());
    assert_eq!(model.checkpoint_count(), 0);
    assert_eq!(model.checkpoints_created(), 1);
}

#[test]
fn test_a_new_checkpoint_replaces_the_previous_one() {
    let mut model = model(0.5);
    model.create_checkpoint(5, 50.0, 200.0, 100.0);
    model.create_checkpoint(5, 150.0, 200.0, 400.0);

    assert_eq!(model.checkpoint_count(), 1);
    assert_eq!(model.checkpoints_created(), 2);
    assert!((model.live_checkpoint(5).unwrap().completed_fraction - 0.75).abs() < EPSILON);
}

#[test]
fn test_work_lost_without_a_checkpoint_is_everything_executed() {
    assert_eq!(SpotInterruptModel::work_lost(240.0, false), 240.0);
    assert_eq!(SpotInterruptModel::work_lost(240.0, true), 0.0);
}
