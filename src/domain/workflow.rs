use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::task::{Edge, Task, TaskId};

pub const ENTRY_NAME: &str = "entry";
pub const EXIT_NAME: &str = "exit";

/// An ordered DAG of tasks with entry/exit sentinels, a caller-set deadline
/// and a cached critical-path length.
///
/// The workflow owns its tasks; its lifetime spans one scheduling invocation.
/// Tasks are immutable once the workflow has been constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// All tasks, sentinels included. Stored in topological order.
    tasks: Vec<Task>,

    entry: TaskId,
    exit: TaskId,

    /// Deadline in seconds, set by the caller.
    deadline: f64,

    /// Longest entry-to-exit chain, measured in summed task work units.
    critical_path: f64,
}

impl Workflow {
    /// Builds a workflow from caller-supplied tasks and edges.
    ///
    /// Tasks must carry ids `0..tasks.len()`. Edges are wired into the
    /// adjacency lists of their endpoints; entry/exit sentinel tasks are
    /// appended and connected to all roots and leaves with zero-data edges.
    /// Upstream validation (acyclicity, id consistency) is the caller's
    /// responsibility.
    pub fn new(mut tasks: Vec<Task>, edges: Vec<Edge>) -> Self {
        // Phase 1: wire edges into the task adjacency lists.
        for edge in &edges {
            if edge.source >= tasks.len() || edge.target >= tasks.len() {
                log::warn!("Dropping edge {} -> {}: endpoint not part of the workflow", edge.source, edge.target);
                continue;
            }
            tasks[edge.source].out_edges.push(edge.clone());
            tasks[edge.target].in_edges.push(edge.clone());
        }

        // Phase 2: append entry/exit sentinels around the roots and leaves.
        let entry = tasks.len();
        let exit = tasks.len() + 1;

        let mut entry_task = Task::new(entry, ENTRY_NAME, 0.0);
        let mut exit_task = Task::new(exit, EXIT_NAME, 0.0);

        for task in tasks.iter_mut() {
            if task.in_edges.is_empty() {
                let edge = Edge { source: entry, target: task.id, data_size: 0.0 };
                entry_task.out_edges.push(edge.clone());
                task.in_edges.push(edge);
            }
            if task.out_edges.is_empty() {
                let edge = Edge { source: task.id, target: exit, data_size: 0.0 };
                exit_task.in_edges.push(edge.clone());
                task.out_edges.push(edge);
            }
        }

        // An empty workflow still needs a connected entry -> exit pair so
        // the ordering below reaches both sentinels.
        if entry_task.out_edges.is_empty() {
            let edge = Edge { source: entry, target: exit, data_size: 0.0 };
            entry_task.out_edges.push(edge.clone());
            exit_task.in_edges.push(edge);
        }

        tasks.push(entry_task);
        tasks.push(exit_task);

        // Phase 3: bring the task list into topological order and cache the
        // critical-path length.
        let order = topological_order(&tasks, entry);
        let critical_path = critical_path_length(&tasks, &order);
        let tasks = reorder(tasks, &order);

        Self { tasks, entry, exit, deadline: 0.0, critical_path }
    }

    pub fn get(&self, id: TaskId) -> &Task {
        // Topological reordering keeps an id -> position scan cheap enough
        // for the workflow sizes this crate targets.
        self.tasks.iter().find(|t| t.id == id).unwrap_or_else(|| panic!("Unknown task id {}", id))
    }

    /// All tasks in topological order, sentinels included.
    pub fn all_tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// All tasks in topological order, excluding the entry/exit sentinels.
    pub fn schedulable_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| !self.is_sentinel(t.id))
    }

    /// Number of schedulable (non-sentinel) tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len() - 2
    }

    pub fn is_sentinel(&self, id: TaskId) -> bool {
        id == self.entry || id == self.exit
    }

    pub fn entry_id(&self) -> TaskId {
        self.entry
    }

    pub fn exit_id(&self) -> TaskId {
        self.exit
    }

    pub fn deadline(&self) -> f64 {
        self.deadline
    }

    pub fn set_deadline(&mut self, deadline: f64) {
        self.deadline = deadline;
    }

    /// Cached critical-path length in summed work units.
    pub fn critical_path(&self) -> f64 {
        self.critical_path
    }

    /// Widest topological level of the DAG, sentinels excluded.
    ///
    /// Used by the optimizer to size its per-type VM replica pool; a level
    /// can run fully in parallel, so no mapping needs more instances of one
    /// type than this.
    pub fn max_parallel(&self) -> usize {
        let mut level: HashMap<TaskId, usize> = HashMap::new();
        let mut width: HashMap<usize, usize> = HashMap::new();

        for task in &self.tasks {
            let depth = task.predecessor_ids().map(|p| level.get(&p).copied().unwrap_or(0) + 1).max().unwrap_or(0);
            level.insert(task.id, depth);
            if !self.is_sentinel(task.id) {
                *width.entry(depth).or_insert(0) += 1;
            }
        }

        width.values().copied().max().unwrap_or(1).max(1)
    }
}

/// Kahn topological ordering over the task ids, entry sentinel first.
fn topological_order(tasks: &[Task], entry: TaskId) -> Vec<TaskId> {
    let mut in_degree: HashMap<TaskId, usize> = tasks.iter().map(|t| (t.id, t.in_edges.len())).collect();
    let by_id: HashMap<TaskId, &Task> = tasks.iter().map(|t| (t.id, t)).collect();

    let mut ready = vec![entry];
    let mut order = Vec::with_capacity(tasks.len());

    while let Some(id) = ready.pop() {
        order.push(id);
        for succ in by_id[&id].successor_ids() {
            let degree = in_degree.get_mut(&succ).expect("Edge target missing from workflow");
            *degree -= 1;
            if *degree == 0 {
                ready.push(succ);
            }
        }
    }

    if order.len() != tasks.len() {
        log::warn!("Workflow ordering visited {} of {} tasks; input was not a DAG", order.len(), tasks.len());
    }
    return order;
}

/// Longest entry-to-exit path, summing task sizes. Sentinels contribute zero.
fn critical_path_length(tasks: &[Task], order: &[TaskId]) -> f64 {
    let by_id: HashMap<TaskId, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
    let mut finish: HashMap<TaskId, f64> = HashMap::new();

    let mut longest: f64 = 0.0;
    for id in order {
        let task = by_id[id];
        let start = task.predecessor_ids().map(|p| finish.get(&p).copied().unwrap_or(0.0)).fold(0.0, f64::max);
        let end = start + task.size;
        finish.insert(*id, end);
        longest = longest.max(end);
    }
    return longest;
}

fn reorder(tasks: Vec<Task>, order: &[TaskId]) -> Vec<Task> {
    let mut by_id: HashMap<TaskId, Task> = tasks.into_iter().map(|t| (t.id, t)).collect();
    order.iter().filter_map(|id| by_id.remove(id)).collect()
}
