use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::affinity::AffinityTable;
use crate::cost::load_stddev_fragmentation;
use crate::domain::profile::{ResourceProfile, WorkloadType};
use crate::domain::task::{Task, TaskId};
use crate::domain::vm::{PricingTier, VmCatalog, VmType};
use crate::pool::{VmInstanceId, VmPoolManager};

/// Scaling from profile intensities to concrete resource demand.
///
/// The defaults match normalized `[0, 1]` intensities: a fully CPU-bound
/// task asks for 2 vCPUs and a fully memory-bound task for 4 GB. The
/// `raw_units` preset mirrors the divisors of the raw-unit profiling
/// strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackerConfig {
    /// vCPUs demanded per unit of CPU intensity.
    pub cpu_demand_scale: f64,
    /// GB of memory demanded per unit of memory intensity.
    pub mem_demand_scale: f64,
    /// GB of storage demanded per MB of incident data.
    pub storage_demand_scale: f64,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self { cpu_demand_scale: 2.0, mem_demand_scale: 4.0, storage_demand_scale: 1.0 / 1024.0 }
    }
}

impl PackerConfig {
    pub fn raw_units() -> Self {
        Self { cpu_demand_scale: 1.0 / 1000.0, mem_demand_scale: 1.0 / 1024.0, storage_demand_scale: 1.0 / (1024.0 * 1024.0) }
    }
}

/// Estimated multidimensional demand of one task.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TaskDemand {
    cpu: f64,
    mem_gb: f64,
    storage_gb: f64,
}

impl TaskDemand {
    fn from_profile(profile: &ResourceProfile, config: &PackerConfig) -> Self {
        Self {
            cpu: profile.cpu_intensity * config.cpu_demand_scale,
            mem_gb: profile.mem_intensity * config.mem_demand_scale,
            storage_gb: profile.data_size * config.storage_demand_scale,
        }
    }
}

/// An open bin of the packer: a chosen VM type paired with its assigned
/// tasks and running resource-usage accumulators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmAllocation {
    pub vm_type: VmType,
    pub tier: PricingTier,

    /// Pool instance backing this allocation, when one was drawn.
    pub instance: Option<VmInstanceId>,

    pub tasks: Vec<TaskId>,
    pub cpu_used: f64,
    pub mem_used: f64,
    pub storage_used: f64,
}

impl VmAllocation {
    pub fn new(vm_type: VmType, tier: PricingTier, instance: Option<VmInstanceId>) -> Self {
        Self { vm_type, tier, instance, tasks: Vec::new(), cpu_used: 0.0, mem_used: 0.0, storage_used: 0.0 }
    }

    pub fn cpu_utilization(&self) -> f64 {
        if self.vm_type.vcpus > 0 { self.cpu_used / self.vm_type.vcpus as f64 } else { 0.0 }
    }

    pub fn mem_utilization(&self) -> f64 {
        if self.vm_type.memory_gb > 0.0 { self.mem_used / self.vm_type.memory_gb } else { 0.0 }
    }

    pub fn storage_utilization(&self) -> f64 {
        if self.vm_type.storage_gb > 0.0 { self.storage_used / self.vm_type.storage_gb } else { 0.0 }
    }

    pub fn avg_utilization(&self) -> f64 {
        (self.cpu_utilization() + self.mem_utilization() + self.storage_utilization()) / 3.0
    }

    fn fits(&self, demand: &TaskDemand) -> bool {
        self.cpu_used + demand.cpu <= self.vm_type.vcpus as f64
            && self.mem_used + demand.mem_gb <= self.vm_type.memory_gb
            && self.storage_used + demand.storage_gb <= self.vm_type.storage_gb
    }

    fn add(&mut self, task: TaskId, demand: &TaskDemand) {
        self.tasks.push(task);
        self.cpu_used += demand.cpu;
        self.mem_used += demand.mem_gb;
        self.storage_used += demand.storage_gb;
    }
}

/// Affinity-aware multidimensional best-fit-decreasing packer (A2MDBFD).
///
/// Produces the initial feasible task -> VM allocation that the PSO
/// optimizer later refines. New bins draw concrete instances from the
/// [`VmPoolManager`] in tier priority order.
pub struct AffinityPacker<'a> {
    affinity: &'a AffinityTable,
    catalog: &'a VmCatalog,
    config: PackerConfig,
}

impl<'a> AffinityPacker<'a> {
    pub fn new(affinity: &'a AffinityTable, catalog: &'a VmCatalog, config: PackerConfig) -> Self {
        Self { affinity, catalog, config }
    }

    /// Packs the given tasks into VM allocations.
    ///
    /// Every input task is placed exactly once; the returned allocations
    /// are tagged with the pricing tier their instance was drawn from.
    pub fn pack(&self, tasks: &[&Task], profiles: &HashMap<TaskId, ResourceProfile>, pool: &VmPoolManager) -> Vec<VmAllocation> {
        // Best-fit decreasing: heaviest combined demand first. Sort is
        // stable, so equal demands keep their workflow order.
        let mut ordered: Vec<&Task> = tasks.to_vec();
        ordered.sort_by(|a, b| {
            let da = combined_demand(profiles.get(&a.id));
            let db = combined_demand(profiles.get(&b.id));
            db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut allocations: Vec<VmAllocation> = Vec::new();

        for task in ordered {
            let default_profile = ResourceProfile::default();
            let profile = profiles.get(&task.id).unwrap_or(&default_profile);
            let demand = TaskDemand::from_profile(profile, &self.config);
            let workload = profile.workload_type;

            match self.find_best_fit(&allocations, workload, &demand) {
                Some(index) => {
                    allocations[index].add(task.id, &demand);
                }
                None => {
                    let mut allocation = self.open_allocation(workload, pool);
                    allocation.add(task.id, &demand);
                    allocations.push(allocation);
                }
            }
        }

        log::debug!(
            "Packed {} tasks into {} allocations (fragmentation {:.3})",
            tasks.len(),
            allocations.len(),
            Self::fragmentation_penalty(&allocations)
        );
        return allocations;
    }

    /// Best-fitting open allocation for a task, if any candidate has room on
    /// every dimension. Score is `(1 - affinity) + (1 - avg_utilization)`,
    /// lower is better.
    fn find_best_fit(&self, allocations: &[VmAllocation], workload: WorkloadType, demand: &TaskDemand) -> Option<usize> {
        let mut best: Option<usize> = None;
        let mut best_score = f64::INFINITY;

        for (index, allocation) in allocations.iter().enumerate() {
            if !allocation.fits(demand) {
                continue;
            }
            let affinity = self.affinity.affinity(workload, &allocation.vm_type.family);
            let score = (1.0 - affinity) + (1.0 - allocation.avg_utilization());
            if score < best_score {
                best_score = score;
                best = Some(index);
            }
        }
        return best;
    }

    /// Opens a new allocation from the first non-exhausted pool tier,
    /// picking the free VM type with maximal affinity for the workload.
    /// The on-demand tier is elastic and never exhausted.
    fn open_allocation(&self, workload: WorkloadType, pool: &VmPoolManager) -> VmAllocation {
        for tier in PricingTier::FALLBACK_ORDER {
            let free = pool.free_types(tier);
            let mut best: Option<&VmType> = None;
            let mut best_score = f64::NEG_INFINITY;
            for vm_type in &free {
                let score = self.affinity.affinity(workload, &vm_type.family);
                if score > best_score {
                    best_score = score;
                    best = Some(vm_type);
                }
            }

            if let Some(vm_type) = best.cloned() {
                let instance = pool.allocate(&vm_type, tier);
                return VmAllocation::new(instance.vm_type.clone(), instance.tier, Some(instance.id));
            }
        }

        // All pre-populated pools are empty: fabricate an on-demand instance
        // of the best catalog type for this workload.
        let vm_type = match self.affinity.best_vm_type(workload, self.catalog) {
            Some((_, vm_type)) => vm_type.clone(),
            None => {
                log::warn!("Empty VM catalog while opening an allocation; using a unit placeholder type");
                VmType {
                    id: "fallback".to_string(),
                    family: "fallback".to_string(),
                    vcpus: 1,
                    memory_gb: 1.0,
                    storage_gb: 1.0,
                    network_gbps: 1.0,
                    gpu: false,
                    pricing: None,
                }
            }
        };
        let instance = pool.allocate(&vm_type, PricingTier::OnDemand);
        VmAllocation::new(instance.vm_type.clone(), instance.tier, Some(instance.id))
    }

    /// Fragmentation of a packing: standard deviation of per-allocation task
    /// counts.
    pub fn fragmentation_penalty(allocations: &[VmAllocation]) -> f64 {
        let counts: Vec<usize> = allocations.iter().map(|a| a.tasks.len()).collect();
        load_stddev_fragmentation(&counts)
    }
}

fn combined_demand(profile: Option<&ResourceProfile>) -> f64 {
    match profile {
        Some(p) => p.cpu_intensity + p.mem_intensity + p.io_intensity,
        None => 0.0,
    }
}
