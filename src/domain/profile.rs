use serde::{Deserialize, Serialize};

/// Workload classification label assigned to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadType {
    Cpu,
    Mem,
    Io,
    Net,
    Gpu,
    Mix,
}

impl WorkloadType {
    pub const ALL: [WorkloadType; 6] =
        [WorkloadType::Cpu, WorkloadType::Mem, WorkloadType::Io, WorkloadType::Net, WorkloadType::Gpu, WorkloadType::Mix];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadType::Cpu => "CPU",
            WorkloadType::Mem => "MEM",
            WorkloadType::Io => "IO",
            WorkloadType::Net => "NET",
            WorkloadType::Gpu => "GPU",
            WorkloadType::Mix => "MIX",
        }
    }
}

impl std::fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-task resource-intensity estimate.
///
/// Under the default profiling strategy all intensities are normalized into
/// `[0, 1]`; the raw-unit strategy keeps them in their source units (see
/// [`ProfilingStrategy`]). Attached 1:1 to a task and immutable after
/// classification, except for the EMA refinement path of the profiler.
///
/// [`ProfilingStrategy`]: crate::profiling::profiler::ProfilingStrategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceProfile {
    pub cpu_intensity: f64,
    pub mem_intensity: f64,
    pub io_intensity: f64,
    pub net_intensity: f64,

    /// Total incident data volume in MB, kept for storage-demand estimation.
    pub data_size: f64,

    pub gpu_required: bool,
    pub workload_type: WorkloadType,
}

impl ResourceProfile {
    /// Neutral profile, assigned to the entry/exit sentinels.
    pub fn neutral() -> Self {
        Self {
            cpu_intensity: 0.5,
            mem_intensity: 0.5,
            io_intensity: 0.5,
            net_intensity: 0.5,
            data_size: 0.0,
            gpu_required: false,
            workload_type: WorkloadType::Mix,
        }
    }
}

impl Default for ResourceProfile {
    fn default() -> Self {
        Self {
            cpu_intensity: 0.0,
            mem_intensity: 0.0,
            io_intensity: 0.0,
            net_intensity: 0.0,
            data_size: 0.0,
            gpu_required: false,
            workload_type: WorkloadType::Mix,
        }
    }
}
