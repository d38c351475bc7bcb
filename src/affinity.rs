use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::profile::WorkloadType;
use crate::domain::vm::{VmCatalog, VmType};

/// Neutral score returned for any (workload, family) pair absent from the
/// table.
pub const DEFAULT_AFFINITY: f64 = 0.5;

/// Lookup table scoring how well a workload type suits a VM family.
///
/// Loaded once from external configuration by the caller and passed by
/// reference into every consumer; immutable thereafter. Scores are clamped
/// into `[0, 1]` at construction so the table invariant holds regardless of
/// the input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffinityTable {
    scores: HashMap<WorkloadType, HashMap<String, f64>>,
}

impl AffinityTable {
    pub fn new(scores: HashMap<WorkloadType, HashMap<String, f64>>) -> Self {
        let clamped = scores
            .into_iter()
            .map(|(workload, families)| {
                let families = families
                    .into_iter()
                    .map(|(family, score)| {
                        if !(0.0..=1.0).contains(&score) {
                            log::warn!("Affinity score {:.3} for ({}, {}) outside [0,1], clamping", score, workload, family);
                        }
                        (family, score.clamp(0.0, 1.0))
                    })
                    .collect();
                (workload, families)
            })
            .collect();

        Self { scores: clamped }
    }

    /// Affinity score for a (workload, family) pair.
    ///
    /// # Returns
    /// A value in `[0, 1]`; exactly [`DEFAULT_AFFINITY`] when the pair is
    /// not present in the table.
    pub fn affinity(&self, workload: WorkloadType, family: &str) -> f64 {
        self.scores.get(&workload).and_then(|families| families.get(family)).copied().unwrap_or(DEFAULT_AFFINITY)
    }

    /// Affinity score addressed by catalog index instead of family name.
    pub fn affinity_by_index(&self, workload: WorkloadType, catalog: &VmCatalog, index: usize) -> f64 {
        match catalog.get(index) {
            Some(vm_type) => self.affinity(workload, &vm_type.family),
            None => DEFAULT_AFFINITY,
        }
    }

    /// The catalog entry maximizing affinity for a workload type.
    ///
    /// Scans the full catalog; ties resolve to the lowest catalog index.
    pub fn best_vm_type<'a>(&self, workload: WorkloadType, catalog: &'a VmCatalog) -> Option<(usize, &'a VmType)> {
        let mut best: Option<(usize, &VmType)> = None;
        let mut best_score = f64::NEG_INFINITY;

        for (index, vm_type) in catalog.iter().enumerate() {
            let score = self.affinity(workload, &vm_type.family);
            if score > best_score {
                best_score = score;
                best = Some((index, vm_type));
            }
        }
        return best;
    }
}
