use serde::{Deserialize, Serialize};

use crate::domain::profile::{ResourceProfile, WorkloadType};

/// Classification thresholds. Configuration, not constants: experiments set
/// them per invocation for reproducibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierThresholds {
    pub cpu: f64,
    pub mem: f64,
    pub io: f64,
    pub net: f64,

    /// Below this maximum intensity a profile with no dominant resource is
    /// treated as mixed.
    pub mixed: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self { cpu: 0.7, mem: 0.7, io: 0.6, net: 0.6, mixed: 0.5 }
    }
}

impl ClassifierThresholds {
    /// Threshold preset matching [`ProfilingStrategy::RawUnits`] profiles.
    ///
    /// [`ProfilingStrategy::RawUnits`]: crate::profiling::profiler::ProfilingStrategy::RawUnits
    pub fn raw_units() -> Self {
        Self { cpu: 1000.0, mem: 512.0, io: 100.0, net: 50.0, mixed: 0.0 }
    }
}

/// Rule-based mapping from a resource profile to a workload type.
///
/// Classification is total: every profile (including an absent one) yields
/// exactly one of the six workload types.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedClassifier {
    thresholds: ClassifierThresholds,
}

impl RuleBasedClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> ClassifierThresholds {
        self.thresholds
    }

    /// Classifies a profile; an absent profile defaults to MIX.
    pub fn classify(&self, profile: Option<&ResourceProfile>) -> WorkloadType {
        match profile {
            Some(p) => self.classify_profile(p),
            None => WorkloadType::Mix,
        }
    }

    pub fn classify_profile(&self, profile: &ResourceProfile) -> WorkloadType {
        // Rule 1: GPU requirement overrides everything else.
        if profile.gpu_required {
            return WorkloadType::Gpu;
        }

        let t = &self.thresholds;
        let ranked = [
            (WorkloadType::Cpu, profile.cpu_intensity, t.cpu),
            (WorkloadType::Mem, profile.mem_intensity, t.mem),
            (WorkloadType::Io, profile.io_intensity, t.io),
            (WorkloadType::Net, profile.net_intensity, t.net),
        ];

        // Rule 2/3: count resources above their threshold.
        let high: Vec<WorkloadType> = ranked.iter().filter(|(_, v, th)| v >= th).map(|(w, _, _)| *w).collect();
        if high.len() >= 2 {
            return WorkloadType::Mix;
        }
        if let [single] = high[..] {
            return single;
        }

        // Rule 4: nothing is high. Low overall intensity means mixed,
        // otherwise the strongest resource wins; ties break by the fixed
        // precedence CPU > MEM > IO > NET because of the strict comparison.
        let (mut dominant, mut max_intensity) = (WorkloadType::Mix, f64::NEG_INFINITY);
        for (workload, value, _) in ranked {
            if value > max_intensity {
                max_intensity = value;
                dominant = workload;
            }
        }

        if max_intensity < t.mixed {
            return WorkloadType::Mix;
        }
        return dominant;
    }
}
