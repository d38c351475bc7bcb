use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::affinity::AffinityTable;
use crate::cost::{CostModel, FitnessWeights, load_stddev_fragmentation};
use crate::domain::profile::{ResourceProfile, WorkloadType};
use crate::domain::solution::{Mapping, TaskAssignment};
use crate::domain::task::TaskId;
use crate::domain::vm::{PricingTier, VmCatalog};
use crate::domain::workflow::Workflow;
use crate::error::{Error, Result};

/// Work units a single vCPU processes per second; turns task sizes into
/// execution times.
pub const WORK_UNITS_PER_VCPU_SECOND: f64 = 1000.0;

/// MB per second assumed for inter-VM data transfers.
const DEFAULT_BANDWIDTH_MB_PER_SEC: f64 = 100.0;

/// PSO run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PsoConfig {
    pub population: usize,
    pub iterations: usize,
    pub inertia: f64,
    pub cognitive: f64,
    pub social: f64,
    pub seed: u64,

    /// Pricing tier assumed for every VM of a candidate mapping.
    pub tier: PricingTier,

    /// Inter-VM transfer bandwidth in MB/s used by the schedule decoder.
    pub bandwidth_mb_per_sec: f64,
}

impl Default for PsoConfig {
    fn default() -> Self {
        Self {
            population: 50,
            iterations: 100,
            inertia: 0.7,
            cognitive: 1.5,
            social: 1.5,
            seed: 42,
            tier: PricingTier::OnDemand,
            bandwidth_mb_per_sec: DEFAULT_BANDWIDTH_MB_PER_SEC,
        }
    }
}

/// Optimizer lifecycle. The run always walks Initialized -> Iterating ->
/// Converged; there is no early-exit criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Initialized,
    Iterating,
    Converged,
}

/// One particle of the swarm. Position and velocity buffers are owned by
/// exactly one particle; there is no aliasing between particles.
struct Particle {
    position: Vec<f64>,
    velocity: Vec<f64>,
    best_position: Vec<f64>,
    best_fitness: f64,
}

/// Particle-swarm refinement of the task -> VM mapping (HNSPSO).
///
/// Decoding is fixed for a run: each position coordinate rounds into an
/// index of a per-run VM option pool holding `max_parallel` replicas of
/// every catalog type. The random generator is a single sequentially
/// consumed `StdRng` stream, so for a fixed seed and fixed inputs two runs
/// produce identical mappings; output does not depend on any parallelism
/// because evaluation is sequential by construction.
pub struct MappingOptimizer<'a> {
    workflow: &'a Workflow,
    catalog: &'a VmCatalog,
    profiles: &'a HashMap<TaskId, ResourceProfile>,
    affinity: &'a AffinityTable,
    cost_model: &'a CostModel,
    weights: FitnessWeights,
    config: PsoConfig,

    state: OptimizerState,

    /// Global-best fitness after initialization and after every iteration.
    fitness_history: Vec<f64>,
}

impl<'a> MappingOptimizer<'a> {
    pub fn new(
        workflow: &'a Workflow,
        catalog: &'a VmCatalog,
        profiles: &'a HashMap<TaskId, ResourceProfile>,
        affinity: &'a AffinityTable,
        cost_model: &'a CostModel,
        weights: FitnessWeights,
        config: PsoConfig,
    ) -> Self {
        Self {
            workflow,
            catalog,
            profiles,
            affinity,
            cost_model,
            weights,
            config,
            state: OptimizerState::Initialized,
            fitness_history: Vec::new(),
        }
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    /// Global-best fitness trace: one entry after initialization plus one
    /// per iteration. Non-increasing by construction.
    pub fn fitness_history(&self) -> &[f64] {
        &self.fitness_history
    }

    /// Runs the swarm for the configured iteration budget and returns the
    /// global-best mapping.
    ///
    /// Fails fast on a non-positive population size or iteration count and
    /// on an empty catalog; no optimization work happens in that case.
    pub fn optimize(&mut self) -> Result<Mapping> {
        if self.config.population == 0 {
            return Err(Error::InvalidPopulationSize(self.config.population));
        }
        if self.config.iterations == 0 {
            return Err(Error::InvalidIterationCount(self.config.iterations));
        }
        if self.catalog.is_empty() {
            return Err(Error::EmptyVmCatalog);
        }

        let dimension = self.workflow.task_count();
        if dimension == 0 {
            log::warn!("Optimizing an empty workflow; returning an empty mapping");
            self.state = OptimizerState::Converged;
            return Ok(Mapping::empty());
        }

        let options = self.build_option_pool();
        let x_max = (options.len() - 1) as f64;
        let v_max = x_max;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        log::info!(
            "HNSPSO start: {} tasks, {} VM slots, population {}, {} iterations, seed {}",
            dimension,
            options.len(),
            self.config.population,
            self.config.iterations,
            self.config.seed
        );

        // Initialization: random positions and velocities, evaluate, seed
        // the personal and global bests.
        let mut particles: Vec<Particle> = Vec::with_capacity(self.config.population);
        let mut global_best_position: Vec<f64> = Vec::new();
        let mut global_best_fitness = f64::INFINITY;

        for _ in 0..self.config.population {
            let position: Vec<f64> = (0..dimension).map(|_| rng.random::<f64>() * x_max).collect();
            let velocity: Vec<f64> = (0..dimension).map(|_| (rng.random::<f64>() * 2.0 - 1.0) * v_max).collect();

            let decoded = decode(&position, options.len());
            let (fitness, _) = self.evaluate(&decoded, &options);

            if fitness < global_best_fitness {
                global_best_fitness = fitness;
                global_best_position = position.clone();
            }
            particles.push(Particle { best_position: position.clone(), position, velocity, best_fitness: fitness });
        }
        self.fitness_history.push(global_best_fitness);

        // Iterations: standard velocity/position update with clamping, then
        // strict-improvement best updates. Sequential evaluation keeps the
        // global best the true minimum of the iteration.
        self.state = OptimizerState::Iterating;
        for iteration in 0..self.config.iterations {
            for particle in particles.iter_mut() {
                for j in 0..dimension {
                    let r1 = rng.random::<f64>();
                    let r2 = rng.random::<f64>();

                    let mut v = self.config.inertia * particle.velocity[j]
                        + self.config.cognitive * r1 * (particle.best_position[j] - particle.position[j])
                        + self.config.social * r2 * (global_best_position[j] - particle.position[j]);
                    v = v.clamp(-v_max, v_max);
                    particle.velocity[j] = v;
                    particle.position[j] = (particle.position[j] + v).clamp(0.0, x_max);
                }

                let decoded = decode(&particle.position, options.len());
                let (fitness, _) = self.evaluate(&decoded, &options);

                if fitness < particle.best_fitness {
                    particle.best_fitness = fitness;
                    particle.best_position.copy_from_slice(&particle.position);
                }
                if fitness < global_best_fitness {
                    global_best_fitness = fitness;
                    global_best_position.copy_from_slice(&particle.position);
                }
            }

            self.fitness_history.push(global_best_fitness);
            if (iteration + 1) % 25 == 0 {
                log::debug!("Iteration {}: global best fitness {:.4}", iteration + 1, global_best_fitness);
            }
        }

        self.state = OptimizerState::Converged;

        let decoded = decode(&global_best_position, options.len());
        let (fitness, mapping) = self.evaluate(&decoded, &options);
        log::info!("HNSPSO converged: fitness {:.4}, makespan {:.1}s, cost {:.2}", fitness, mapping.makespan, mapping.cost);
        return Ok(mapping);
    }

    /// Per-run VM option pool: `max_parallel` replicas of every catalog
    /// type, so one topological level can spread over distinct instances.
    fn build_option_pool(&self) -> Vec<usize> {
        let replicas = self.workflow.max_parallel();
        let mut options = Vec::with_capacity(self.catalog.len() * replicas);
        for type_index in 0..self.catalog.len() {
            for _ in 0..replicas {
                options.push(type_index);
            }
        }
        return options;
    }

    /// Decodes per-task slot indices into a schedule and scores it.
    ///
    /// Each VM slot runs its tasks one at a time in topological order; a
    /// task starts once its predecessors finished and their data arrived
    /// (transfers between distinct slots take `data / bandwidth`).
    fn evaluate(&self, slots: &[usize], options: &[usize]) -> (f64, Mapping) {
        debug_assert!(slots.iter().all(|&s| s < options.len()));

        let mut finish_at: HashMap<TaskId, f64> = HashMap::new();
        let mut slot_of: HashMap<TaskId, usize> = HashMap::new();
        let mut slot_free: HashMap<usize, f64> = HashMap::new();
        let mut assignments: Vec<TaskAssignment> = Vec::with_capacity(slots.len());

        let mut affinity_sum = 0.0;

        for (dim, task) in self.workflow.schedulable_tasks().enumerate() {
            let slot = slots[dim];
            let type_index = options[slot];
            let vm_type = self.catalog.get(type_index).expect("slot maps into the catalog");

            let exec_time = task.size / (vm_type.vcpus.max(1) as f64 * WORK_UNITS_PER_VCPU_SECOND);

            let mut earliest = slot_free.get(&slot).copied().unwrap_or(0.0);
            for edge in &task.in_edges {
                let pred_finish = finish_at.get(&edge.source).copied().unwrap_or(0.0);
                let transfer = match slot_of.get(&edge.source) {
                    Some(&pred_slot) if pred_slot == slot => 0.0,
                    _ => edge.data_size / self.config.bandwidth_mb_per_sec,
                };
                earliest = earliest.max(pred_finish + transfer);
            }

            let finish = earliest + exec_time;
            finish_at.insert(task.id, finish);
            slot_of.insert(task.id, slot);
            slot_free.insert(slot, finish);

            let profile = self.profiles.get(&task.id);
            let workload = profile.map(|p| p.workload_type).unwrap_or(WorkloadType::Mix);
            affinity_sum += self.affinity.affinity(workload, &vm_type.family);

            assignments.push(TaskAssignment { task: task.id, vm_slot: slot, vm_type: vm_type.id.clone(), start: earliest, finish });
        }

        // Cost: per used slot, the billing span is max finish - min start.
        // Ordered maps keep the floating-point summation order, and with it
        // the fitness value, reproducible between runs.
        let mut slot_span: BTreeMap<usize, (f64, f64)> = BTreeMap::new();
        let mut slot_load: BTreeMap<usize, usize> = BTreeMap::new();
        for assignment in &assignments {
            let span = slot_span.entry(assignment.vm_slot).or_insert((assignment.start, assignment.finish));
            span.0 = span.0.min(assignment.start);
            span.1 = span.1.max(assignment.finish);
            *slot_load.entry(assignment.vm_slot).or_insert(0) += 1;
        }

        let mut cost = 0.0;
        for (&slot, &(start, end)) in &slot_span {
            let vm_type = self.catalog.get(options[slot]).expect("slot maps into the catalog");
            cost += self.cost_model.vm_cost(vm_type, end - start, self.config.tier);
        }

        let makespan = finish_at.values().fold(0.0, |acc: f64, &v| acc.max(v));
        let task_count = assignments.len().max(1);
        let avg_affinity = affinity_sum / task_count as f64;
        let loads: Vec<usize> = slot_load.values().copied().collect();
        let fragmentation = load_stddev_fragmentation(&loads);
        let deadline_penalty = self.cost_model.deadline_penalty(makespan, self.workflow.deadline());

        let fitness = self.cost_model.fitness(cost, deadline_penalty, avg_affinity, fragmentation, &self.weights);

        let mapping = Mapping { assignments, fitness, cost, makespan, avg_affinity, fragmentation };
        return (fitness, mapping);
    }
}

/// Rounds a continuous position into VM slot indices.
fn decode(position: &[f64], option_count: usize) -> Vec<usize> {
    position.iter().map(|&x| (x.round() as usize).min(option_count - 1)).collect()
}
