use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::affinity::AffinityTable;
use crate::cost::{CostModel, FitnessWeights, capacity_fragmentation};
use crate::domain::solution::Mapping;
use crate::domain::task::Task;
use crate::domain::vm::{PricingTier, VmCatalog};
use crate::domain::workflow::Workflow;
use crate::error::Result;
use crate::pool::VmPoolManager;
use crate::profiling::classifier::{ClassifierThresholds, RuleBasedClassifier};
use crate::profiling::profiler::{ProfilingStrategy, ResourceProfiler};
use crate::scheduler::optimizer::{MappingOptimizer, PsoConfig, WORK_UNITS_PER_VCPU_SECOND};
use crate::scheduler::packer::{AffinityPacker, PackerConfig};
use crate::simulator::spot::{SpotConfig, SpotInterruptModel};

/// Interrupted spot tasks are assumed to have reached this progress when
/// the checkpoint is taken.
const CHECKPOINT_PROGRESS: f64 = 0.7;

const DEFAULT_RESERVED_PER_TYPE: usize = 2;
const DEFAULT_SPOT_PER_TYPE: usize = 5;

/// End-to-end broker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Deadline as a multiple of the critical-path execution time on an
    /// average catalog VM.
    pub deadline_factor: f64,

    pub profiling_strategy: ProfilingStrategy,
    pub thresholds: ClassifierThresholds,
    pub packer: PackerConfig,
    pub pso: PsoConfig,
    pub weights: FitnessWeights,

    pub spot_enabled: bool,
    pub checkpointing_enabled: bool,
    pub spot: SpotConfig,

    /// Pre-reserved instances seeded per catalog type.
    pub reserved_per_type: usize,

    /// Spot instances seeded per catalog type when spot is enabled.
    pub spot_per_type: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            deadline_factor: 2.0,
            profiling_strategy: ProfilingStrategy::default(),
            thresholds: ClassifierThresholds::default(),
            packer: PackerConfig::default(),
            pso: PsoConfig::default(),
            weights: FitnessWeights::default(),
            spot_enabled: false,
            checkpointing_enabled: true,
            spot: SpotConfig::default(),
            reserved_per_type: DEFAULT_RESERVED_PER_TYPE,
            spot_per_type: DEFAULT_SPOT_PER_TYPE,
        }
    }
}

/// Outcome of one brokered scheduling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub mapping: Mapping,

    pub total_cost: f64,
    pub makespan: f64,

    /// Allocations opened by the initial packing.
    pub vm_count: usize,
    pub avg_utilization: f64,

    pub task_success_count: usize,
    pub task_failure_count: usize,
    pub interruption_count: usize,

    /// Named auxiliary metrics; a sorted map so serialized results compare
    /// byte-for-byte between runs.
    pub metrics: BTreeMap<String, f64>,
}

/// Orchestrates the full pipeline: profiling, classification, affinity
/// packing, PSO refinement and a simulated execution pass.
pub struct AffinityBroker {
    catalog: VmCatalog,
    affinity: AffinityTable,
    cost_model: CostModel,
    config: BrokerConfig,
    pool: VmPoolManager,
}

impl AffinityBroker {
    pub fn new(catalog: VmCatalog, affinity: AffinityTable, cost_model: CostModel, config: BrokerConfig) -> Self {
        let pool = VmPoolManager::new();
        pool.seed_pre_reserved(&catalog, config.reserved_per_type);
        if config.spot_enabled {
            pool.seed_spot(&catalog, config.spot_per_type);
        }
        pool.seed_on_demand(&catalog);
        Self { catalog, affinity, cost_model, config, pool }
    }

    pub fn pool(&self) -> &VmPoolManager {
        &self.pool
    }

    /// Deadline derived from the workflow's critical path: the factor times
    /// the critical-path execution time on a catalog-average VM.
    pub fn derive_deadline(&self, workflow: &Workflow) -> f64 {
        let avg_vcpus = self.catalog.average_vcpus().max(1.0);
        let critical_secs = workflow.critical_path() / (avg_vcpus * WORK_UNITS_PER_VCPU_SECOND);
        return self.config.deadline_factor * critical_secs;
    }

    /// Runs the pipeline on one workflow. A missing deadline (zero or
    /// negative) is replaced by the derived one before optimization.
    pub fn run(&self, workflow: &mut Workflow) -> Result<ExecutionResult> {
        if workflow.deadline() <= 0.0 {
            let deadline = self.derive_deadline(workflow);
            log::info!("No deadline set, derived {:.2}s from the critical path", deadline);
            workflow.set_deadline(deadline);
        }

        // Phase 1: profile and classify every task.
        let profiler = ResourceProfiler::new(self.config.profiling_strategy);
        let classifier = RuleBasedClassifier::new(self.config.thresholds);
        let mut profiles = profiler.profile(workflow);
        for profile in profiles.values_mut() {
            profile.workload_type = classifier.classify_profile(profile);
        }

        // Phase 2: initial affinity packing for the capacity picture. The
        // drawn instances are handed back afterwards, so the measurement
        // leaves the pool untouched.
        let packer = AffinityPacker::new(&self.affinity, &self.catalog, self.config.packer);
        let tasks: Vec<&Task> = workflow.schedulable_tasks().collect();
        let allocations = packer.pack(&tasks, &profiles, &self.pool);

        let vm_count = allocations.len();
        let avg_utilization = if allocations.is_empty() {
            0.0
        } else {
            allocations.iter().map(|a| a.avg_utilization()).sum::<f64>() / allocations.len() as f64
        };
        let packing_fragmentation = AffinityPacker::fragmentation_penalty(&allocations);

        for allocation in &allocations {
            if let Some(instance) = allocation.instance {
                self.pool.release(instance);
            }
        }

        // Phase 3: PSO refinement of the mapping.
        let mut pso = self.config.pso;
        if self.config.spot_enabled {
            pso.tier = PricingTier::Spot;
        }
        let mut optimizer = MappingOptimizer::new(
            workflow,
            &self.catalog,
            &profiles,
            &self.affinity,
            &self.cost_model,
            self.config.weights,
            pso,
        );
        let mapping = optimizer.optimize()?;

        // Phase 4: simulated execution with spot interruptions.
        let result = self.execute(workflow, mapping, vm_count, avg_utilization, packing_fragmentation);
        return Ok(result);
    }

    /// Replays the mapping as a simulated execution, applying the spot
    /// interruption model to every assignment when spot is enabled.
    fn execute(
        &self,
        workflow: &Workflow,
        mapping: Mapping,
        vm_count: usize,
        avg_utilization: f64,
        packing_fragmentation: f64,
    ) -> ExecutionResult {
        let tier = if self.config.spot_enabled { PricingTier::Spot } else { self.config.pso.tier };

        let mut spot_model = SpotInterruptModel::new(self.config.spot);
        let egress_cost = self.cost_model.egress_cost(cross_slot_data_mb(workflow, &mapping) / 1024.0);
        let mut total_cost = mapping.cost + egress_cost;
        let mut makespan = mapping.makespan;
        let mut success = 0usize;
        let mut failure = 0usize;

        for assignment in &mapping.assignments {
            let duration = (assignment.finish - assignment.start).max(0.0);
            if !self.config.spot_enabled {
                success += 1;
                continue;
            }

            let instance = match self.catalog.iter().find(|t| t.id == assignment.vm_type) {
                Some(vm_type) => self.pool.allocate(vm_type, tier),
                None => {
                    // Unknown type id means a synthesized placeholder; run
                    // it uninterrupted.
                    success += 1;
                    continue;
                }
            };

            let checkpoint_time = assignment.start + CHECKPOINT_PROGRESS * duration;
            let interrupted = spot_model.should_interrupt(instance.id, checkpoint_time, assignment.start);

            if !interrupted {
                success += 1;
            } else if self.config.checkpointing_enabled {
                spot_model.create_checkpoint(assignment.task, CHECKPOINT_PROGRESS * duration, duration, checkpoint_time);
                if let Some(recovery) = spot_model.resume_from_checkpoint(assignment.task) {
                    total_cost += self.cost_model.vm_cost(&instance.vm_type, recovery, tier);
                    makespan = makespan.max(assignment.finish + recovery);
                }
                success += 1;
            } else {
                let lost = SpotInterruptModel::work_lost(CHECKPOINT_PROGRESS * duration, false);
                log::warn!("Task {} lost {:.1}s of work to a spot interruption", assignment.task, lost);
                failure += 1;
            }

            self.pool.release(instance.id);
        }

        let interruption_count = spot_model.interruption_count();
        let stats = self.pool.statistics();

        let mut metrics = BTreeMap::new();
        metrics.insert("fitness".to_string(), mapping.fitness);
        metrics.insert("avg_affinity".to_string(), mapping.avg_affinity);
        metrics.insert("load_fragmentation".to_string(), mapping.fragmentation);
        metrics.insert("packing_fragmentation".to_string(), packing_fragmentation);
        metrics.insert(
            "capacity_fragmentation".to_string(),
            capacity_fragmentation(stats.reserved.total + stats.spot.total + stats.on_demand.total, vm_count, avg_utilization),
        );
        metrics.insert("deadline".to_string(), workflow.deadline());
        metrics.insert("deadline_penalty".to_string(), self.cost_model.deadline_penalty(makespan, workflow.deadline()));
        metrics.insert("egress_cost".to_string(), egress_cost);
        metrics.insert("checkpoint_count".to_string(), spot_model.checkpoints_created() as f64);
        for tier in PricingTier::FALLBACK_ORDER {
            metrics.insert(format!("pool_{}_total", tier), stats.tier(tier).total as f64);
        }

        log::info!(
            "Execution finished: cost {:.4}, makespan {:.2}s, {} ok / {} failed, {} interruptions",
            total_cost,
            makespan,
            success,
            failure,
            interruption_count
        );

        ExecutionResult {
            mapping,
            total_cost,
            makespan,
            vm_count,
            avg_utilization,
            task_success_count: success,
            task_failure_count: failure,
            interruption_count,
            metrics,
        }
    }
}

/// Data volume in MB crossing VM-slot boundaries under a mapping; only this
/// share of the workflow's edge data leaves a machine and is billed as
/// egress.
fn cross_slot_data_mb(workflow: &Workflow, mapping: &Mapping) -> f64 {
    let slot_of: BTreeMap<usize, usize> = mapping.assignments.iter().map(|a| (a.task, a.vm_slot)).collect();

    let mut crossing = 0.0;
    for task in workflow.schedulable_tasks() {
        for edge in &task.out_edges {
            match (slot_of.get(&edge.source), slot_of.get(&edge.target)) {
                (Some(source), Some(target)) if source != target => crossing += edge.data_size,
                _ => {}
            }
        }
    }
    return crossing;
}
