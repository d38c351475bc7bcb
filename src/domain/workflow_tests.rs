/// Unit tests for the `workflow.rs` module.
///
/// Construction, sentinel wiring, ordering and the cached critical-path
/// length are each tested in isolation; the end-to-end pipeline is covered
/// by the integration tests under `tests/`.
#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::domain::task::{Edge, Task, TaskId};
    use crate::domain::workflow::{ENTRY_NAME, EXIT_NAME, Workflow};

    // --- HELPER FUNCTIONS FOR TEST SETUP ---

    /// A helper to create tasks 0..n with the given sizes.
    fn mock_tasks(sizes: &[f64]) -> Vec<Task> {
        sizes.iter().enumerate().map(|(id, &size)| Task::new(id, format!("task-{}", id), size)).collect()
    }

    fn edge(source: TaskId, target: TaskId, data_size: f64) -> Edge {
        Edge { source, target, data_size }
    }

    /// Diamond: 0 -> {1, 2} -> 3.
    fn diamond() -> Workflow {
        let tasks = mock_tasks(&[100.0, 200.0, 300.0, 100.0]);
        let edges = vec![edge(0, 1, 10.0), edge(0, 2, 20.0), edge(1, 3, 5.0), edge(2, 3, 5.0)];
        Workflow::new(tasks, edges)
    }

    #[test]
    fn sentinels_are_appended_and_wired() {
        let workflow = diamond();

        let entry = workflow.get(workflow.entry_id());
        let exit = workflow.get(workflow.exit_id());

        assert_eq!(entry.name, ENTRY_NAME);
        assert_eq!(exit.name, EXIT_NAME);
        assert_eq!(entry.size, 0.0);

        // Entry feeds the single root, exit drains the single leaf.
        let entry_successors: Vec<TaskId> = entry.successor_ids().collect();
        assert_eq!(entry_successors, vec![0]);
        let exit_predecessors: Vec<TaskId> = exit.predecessor_ids().collect();
        assert_eq!(exit_predecessors, vec![3]);
    }

    #[test]
    fn task_count_excludes_sentinels() {
        let workflow = diamond();

        assert_eq!(workflow.task_count(), 4);
        assert_eq!(workflow.all_tasks().len(), 6);
        assert_eq!(workflow.schedulable_tasks().count(), 4);
    }

    #[test]
    fn tasks_are_stored_in_topological_order() {
        let workflow = diamond();

        let mut seen: HashSet<TaskId> = HashSet::new();
        for task in workflow.all_tasks() {
            for pred in task.predecessor_ids() {
                assert!(seen.contains(&pred), "Task {} appeared before its predecessor {}", task.id, pred);
            }
            seen.insert(task.id);
        }
    }

    #[test]
    fn critical_path_sums_task_sizes_along_longest_chain() {
        let workflow = diamond();

        // Longest chain is 0 -> 2 -> 3 with sizes 100 + 300 + 100.
        assert!((workflow.critical_path() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn max_parallel_is_the_widest_level() {
        let workflow = diamond();
        assert_eq!(workflow.max_parallel(), 2);

        // A linear chain is never wider than one.
        let chain = Workflow::new(mock_tasks(&[10.0, 10.0, 10.0]), vec![edge(0, 1, 0.0), edge(1, 2, 0.0)]);
        assert_eq!(chain.max_parallel(), 1);
    }

    #[test]
    fn multiple_roots_and_leaves_all_touch_the_sentinels() {
        // Two independent chains: 0 -> 2 and 1 -> 3.
        let tasks = mock_tasks(&[1.0, 2.0, 3.0, 4.0]);
        let edges = vec![edge(0, 2, 1.0), edge(1, 3, 1.0)];
        let workflow = Workflow::new(tasks, edges);

        let entry_successors: HashSet<TaskId> = workflow.get(workflow.entry_id()).successor_ids().collect();
        let exit_predecessors: HashSet<TaskId> = workflow.get(workflow.exit_id()).predecessor_ids().collect();

        assert_eq!(entry_successors, HashSet::from([0, 1]));
        assert_eq!(exit_predecessors, HashSet::from([2, 3]));
    }

    #[test]
    fn out_of_range_edges_are_dropped() {
        let tasks = mock_tasks(&[1.0, 2.0]);
        let edges = vec![edge(0, 1, 1.0), edge(0, 99, 1.0)];
        let workflow = Workflow::new(tasks, edges);

        let successors: Vec<TaskId> = workflow.get(0).successor_ids().collect();
        assert_eq!(successors, vec![1]);
    }

    #[test]
    fn deadline_defaults_to_zero_and_is_settable() {
        let mut workflow = diamond();

        assert_eq!(workflow.deadline(), 0.0);
        workflow.set_deadline(3600.0);
        assert_eq!(workflow.deadline(), 3600.0);
    }

    #[test]
    fn empty_workflow_still_has_both_sentinels() {
        let workflow = Workflow::new(Vec::new(), Vec::new());

        assert_eq!(workflow.task_count(), 0);
        assert_eq!(workflow.all_tasks().len(), 2);
        assert_eq!(workflow.critical_path(), 0.0);
        assert_eq!(workflow.max_parallel(), 1);
    }
}
