use serde::{Deserialize, Serialize};

use crate::domain::task::TaskId;

/// Assignment of one task to a VM slot of the optimizer's option pool,
/// together with the decoded schedule times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task: TaskId,

    /// Index into the optimizer's per-run VM option pool.
    pub vm_slot: usize,

    /// Catalog id of the assigned VM type.
    pub vm_type: String,

    pub start: f64,
    pub finish: f64,
}

/// Final task -> VM mapping returned by the optimizer.
///
/// Invariant: every schedulable task of the input workflow appears exactly
/// once in `assignments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub assignments: Vec<TaskAssignment>,
    pub fitness: f64,
    pub cost: f64,
    pub makespan: f64,
    pub avg_affinity: f64,
    pub fragmentation: f64,
}

impl Mapping {
    pub fn empty() -> Self {
        Self { assignments: Vec::new(), fitness: 0.0, cost: 0.0, makespan: 0.0, avg_affinity: 0.0, fragmentation: 0.0 }
    }
}
