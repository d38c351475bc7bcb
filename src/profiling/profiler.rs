use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::profile::{ResourceProfile, WorkloadType};
use crate::domain::task::{Task, TaskId};
use crate::domain::workflow::Workflow;

/// Task names matching any of these substrings are treated as GPU workloads.
const GPU_KEYWORDS: [&str; 6] = ["gpu", "cuda", "render", "ml", "ai", "neural"];

/// Weights of the exponential-moving-average refinement path.
const EMA_RETAIN: f64 = 0.7;
const EMA_BLEND: f64 = 0.3;

/// Selects how task intensities are estimated from the DAG structure.
///
/// Both formulations exist in the literature behind this scheduler; they are
/// deliberately kept as named strategies instead of silently differing
/// copies. `NormalizedByMax` is the default and produces `[0, 1]`
/// intensities; `RawUnits` keeps source units and must be paired with
/// matching classifier thresholds ([`ClassifierThresholds::raw_units`]).
///
/// [`ClassifierThresholds::raw_units`]: crate::profiling::classifier::ClassifierThresholds::raw_units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfilingStrategy {
    #[default]
    NormalizedByMax,
    RawUnits,
}

/// Workflow-wide statistics computed once and reused for every task profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkflowStats {
    pub max_task_size: f64,
    pub avg_task_size: f64,
    pub max_edge_data: f64,
    pub avg_edge_data: f64,
}

impl WorkflowStats {
    pub fn collect(workflow: &Workflow) -> Self {
        let mut max_task_size: f64 = 0.0;
        let mut task_sum = 0.0;
        let mut task_count = 0usize;
        let mut max_edge_data: f64 = 0.0;
        let mut edge_sum = 0.0;
        let mut edge_count = 0usize;

        for task in workflow.schedulable_tasks() {
            max_task_size = max_task_size.max(task.size);
            task_sum += task.size;
            task_count += 1;

            // Each edge shows up exactly once as an out-edge.
            for edge in &task.out_edges {
                max_edge_data = max_edge_data.max(edge.data_size);
                edge_sum += edge.data_size;
                edge_count += 1;
            }
        }

        Self {
            max_task_size,
            avg_task_size: if task_count > 0 { task_sum / task_count as f64 } else { 0.0 },
            max_edge_data,
            avg_edge_data: if edge_count > 0 { edge_sum / edge_count as f64 } else { 0.0 },
        }
    }
}

/// An observed runtime sample used to refine a stored profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileSample {
    pub cpu: f64,
    pub mem: f64,
    pub io: f64,
    pub net: f64,
}

/// Estimates per-task resource intensities from structural DAG properties.
///
/// Profiling is pure: it depends only on task sizes and incident edge data
/// volumes, never on external randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceProfiler {
    strategy: ProfilingStrategy,
}

impl ResourceProfiler {
    pub fn new(strategy: ProfilingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ProfilingStrategy {
        self.strategy
    }

    /// Profiles every task of the workflow. Sentinels receive a neutral
    /// profile.
    pub fn profile(&self, workflow: &Workflow) -> HashMap<TaskId, ResourceProfile> {
        let stats = WorkflowStats::collect(workflow);
        log::debug!(
            "Profiling {} tasks (strategy {:?}, max task size {:.1}, max edge data {:.1})",
            workflow.task_count(),
            self.strategy,
            stats.max_task_size,
            stats.max_edge_data
        );

        let mut profiles = HashMap::with_capacity(workflow.all_tasks().len());
        for task in workflow.all_tasks() {
            let profile = if workflow.is_sentinel(task.id) {
                ResourceProfile::neutral()
            } else {
                self.profile_task(task, &stats)
            };
            profiles.insert(task.id, profile);
        }
        return profiles;
    }

    fn profile_task(&self, task: &Task, stats: &WorkflowStats) -> ResourceProfile {
        match self.strategy {
            ProfilingStrategy::NormalizedByMax => profile_normalized(task, stats),
            ProfilingStrategy::RawUnits => profile_raw(task),
        }
    }

    /// Blends an observed runtime sample into a stored profile with a fixed
    /// exponential moving average (0.7 old / 0.3 new).
    pub fn refine(profile: &mut ResourceProfile, sample: &ProfileSample) {
        profile.cpu_intensity = EMA_RETAIN * profile.cpu_intensity + EMA_BLEND * sample.cpu;
        profile.mem_intensity = EMA_RETAIN * profile.mem_intensity + EMA_BLEND * sample.mem;
        profile.io_intensity = EMA_RETAIN * profile.io_intensity + EMA_BLEND * sample.io;
        profile.net_intensity = EMA_RETAIN * profile.net_intensity + EMA_BLEND * sample.net;
    }
}

/// Default formulation: every intensity is normalized against the workflow
/// maximum and capped at 1.
fn profile_normalized(task: &Task, stats: &WorkflowStats) -> ResourceProfile {
    let mut profile = ResourceProfile::neutral();
    let total_data = task.total_incident_data();

    if stats.max_task_size > 0.0 {
        profile.cpu_intensity = (task.size / stats.max_task_size).min(1.0);
    }
    if stats.max_edge_data > 0.0 {
        profile.net_intensity = (total_data / stats.max_edge_data).min(1.0);
    }
    if task.size > 0.0 {
        // Tasks moving a lot of data relative to their computation are
        // I/O bound; the ratio is scaled down so that 10x data-to-compute
        // saturates the intensity.
        profile.io_intensity = ((total_data / task.size) / 10.0).min(1.0);
    }
    profile.mem_intensity = (0.4 * profile.cpu_intensity + 0.6 * profile.io_intensity).min(1.0);
    profile.data_size = total_data;
    profile.gpu_required = is_gpu_task(&task.name);
    return profile;
}

/// Alternate formulation keeping raw source units; pair with
/// `ClassifierThresholds::raw_units`.
fn profile_raw(task: &Task) -> ResourceProfile {
    let total_data = task.total_incident_data();
    let io = total_data / 1024.0;

    ResourceProfile {
        cpu_intensity: task.size,
        mem_intensity: task.size * 0.5,
        io_intensity: io,
        net_intensity: io,
        data_size: total_data,
        gpu_required: task.size > 10_000.0,
        workload_type: WorkloadType::Mix,
    }
}

fn is_gpu_task(name: &str) -> bool {
    let lower = name.to_lowercase();
    GPU_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
