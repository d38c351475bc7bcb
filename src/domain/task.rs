use serde::{Deserialize, Serialize};

pub type TaskId = usize;

/// A directed data-transfer edge between two tasks of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: TaskId,
    pub target: TaskId,

    /// Transferred data volume in MB.
    pub data_size: f64,
}

/// A single workflow task. Immutable once the owning [`Workflow`] is built.
///
/// [`Workflow`]: crate::domain::workflow::Workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,

    /// Computational size in abstract work units.
    pub size: f64,

    pub in_edges: Vec<Edge>,
    pub out_edges: Vec<Edge>,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>, size: f64) -> Self {
        Self { id, name: name.into(), size, in_edges: Vec::new(), out_edges: Vec::new() }
    }

    /// Sum of the data sizes over all incoming and outgoing edges.
    pub fn total_incident_data(&self) -> f64 {
        let incoming: f64 = self.in_edges.iter().map(|e| e.data_size).sum();
        let outgoing: f64 = self.out_edges.iter().map(|e| e.data_size).sum();
        return incoming + outgoing;
    }

    pub fn predecessor_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.in_edges.iter().map(|e| e.source)
    }

    pub fn successor_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.out_edges.iter().map(|e| e.target)
    }
}
