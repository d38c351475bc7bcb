use serde::{Deserialize, Serialize};

use crate::domain::vm::{PricingTier, VmType};

pub const DEFAULT_BILLING_INTERVAL_SECS: f64 = 3600.0;
pub const DEFAULT_EGRESS_PRICE_PER_GB: f64 = 0.09;

/// Neutral hourly rate used when a VM type carries no pricing entry.
pub const FALLBACK_HOURLY_RATE: f64 = 0.1;

/// Selects the deadline-penalty formulation.
///
/// The two forms change the effective magnitude of the deadline weight in
/// the fitness function, so the choice is fixed at cost-model construction
/// and never varies within a run. `Absolute` is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeadlinePenaltyMode {
    /// `max(0, makespan - deadline)` in absolute time units.
    #[default]
    Absolute,
    /// `max(0, makespan - deadline) / deadline`.
    Normalized,
}

/// Weights of the aggregate fitness function minimized by the optimizer.
///
/// Defaults favor a heavy deadline penalty, a moderate affinity weight and a
/// light fragmentation weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessWeights {
    pub cost: f64,
    pub deadline: f64,
    pub affinity: f64,
    pub fragmentation: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self { cost: 1.0, deadline: 100.0, affinity: 10.0, fragmentation: 5.0 }
    }
}

/// Pricing, billing-interval rounding, deadline penalty, fragmentation and
/// fitness aggregation. Pure functions over the loaded configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    billing_interval_secs: f64,
    egress_price_per_gb: f64,
    deadline_mode: DeadlinePenaltyMode,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            billing_interval_secs: DEFAULT_BILLING_INTERVAL_SECS,
            egress_price_per_gb: DEFAULT_EGRESS_PRICE_PER_GB,
            deadline_mode: DeadlinePenaltyMode::default(),
        }
    }
}

impl CostModel {
    pub fn new(billing_interval_secs: f64, egress_price_per_gb: f64, deadline_mode: DeadlinePenaltyMode) -> Self {
        Self { billing_interval_secs, egress_price_per_gb, deadline_mode }
    }

    pub fn billing_interval_secs(&self) -> f64 {
        self.billing_interval_secs
    }

    pub fn deadline_mode(&self) -> DeadlinePenaltyMode {
        self.deadline_mode
    }

    /// Hourly rate of a VM type at a pricing tier, falling back to
    /// [`FALLBACK_HOURLY_RATE`] when the catalog entry has no pricing.
    pub fn hourly_rate(&self, vm_type: &VmType, tier: PricingTier) -> f64 {
        match &vm_type.pricing {
            Some(pricing) => pricing.rate(tier),
            None => {
                log::debug!("VM type '{}' has no pricing entry, using fallback rate {}", vm_type.id, FALLBACK_HOURLY_RATE);
                FALLBACK_HOURLY_RATE
            }
        }
    }

    /// Cost of running a VM for a duration at a pricing tier.
    ///
    /// The duration is rounded up to whole billing intervals; cost is flat
    /// within one interval, non-negative and non-decreasing in duration.
    pub fn vm_cost(&self, vm_type: &VmType, duration_secs: f64, tier: PricingTier) -> f64 {
        let duration = duration_secs.max(0.0);
        let intervals = (duration / self.billing_interval_secs).ceil();
        self.hourly_rate(vm_type, tier) * intervals
    }

    pub fn egress_cost(&self, data_gb: f64) -> f64 {
        data_gb.max(0.0) * self.egress_price_per_gb
    }

    /// Deadline penalty under the mode fixed at construction.
    pub fn deadline_penalty(&self, makespan: f64, deadline: f64) -> f64 {
        let overrun = (makespan - deadline).max(0.0);
        match self.deadline_mode {
            DeadlinePenaltyMode::Absolute => overrun,
            DeadlinePenaltyMode::Normalized => {
                if deadline > 0.0 {
                    overrun / deadline
                } else {
                    overrun
                }
            }
        }
    }

    /// Aggregate fitness, lower is better:
    /// `w.cost * cost + w.deadline * penalty + w.affinity * (1 - avg_affinity)
    ///  + w.fragmentation * fragmentation`.
    pub fn fitness(&self, cost: f64, deadline_penalty: f64, avg_affinity: f64, fragmentation: f64, weights: &FitnessWeights) -> f64 {
        weights.cost * cost
            + weights.deadline * deadline_penalty
            + weights.affinity * (1.0 - avg_affinity)
            + weights.fragmentation * fragmentation
    }
}

/// Fragmentation as the standard deviation of per-allocation task counts.
///
/// This is the load-balance metric used by the packer report and the
/// optimizer fitness.
pub fn load_stddev_fragmentation(task_counts: &[usize]) -> f64 {
    if task_counts.is_empty() {
        return 0.0;
    }
    let n = task_counts.len() as f64;
    let mean = task_counts.iter().sum::<usize>() as f64 / n;
    let variance = task_counts.iter().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Fragmentation as unused capacity: `1 - (used/total) * avg_utilization`,
/// clamped into `[0, 1]`.
///
/// A distinct metric from [`load_stddev_fragmentation`]; the two are never
/// conflated within one fitness evaluation.
pub fn capacity_fragmentation(total_vm_slots: usize, used_vm_slots: usize, avg_utilization: f64) -> f64 {
    if total_vm_slots == 0 {
        return 0.0;
    }
    let used_ratio = used_vm_slots as f64 / total_vm_slots as f64;
    (1.0 - used_ratio * avg_utilization).clamp(0.0, 1.0)
}
