//! TaskList - an ordered collection of Tasks with dependency-aware scheduling.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{Task, TaskId, TaskStatus};

/// A TaskList tracks its tasks plus the derived execution order and the
/// running sets of completed/failed task ids (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskList {
    tasks: Vec<Task>,
    pub execution_order: Vec<TaskId>,
    pub completed_task_ids: BTreeSet<TaskId>,
    pub failed_task_ids: BTreeSet<TaskId>,
}

impl TaskList {
    pub fn new(tasks: Vec<Task>) -> Self {
        let mut list = Self {
            tasks,
            execution_order: Vec::new(),
            completed_task_ids: BTreeSet::new(),
            failed_task_ids: BTreeSet::new(),
        };
        list.recompute_execution_order();
        list
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn is_complete(&self) -> bool {
        self.completed_task_ids.len() == self.tasks.len()
    }

    pub fn mark_completed(&mut self, id: TaskId) {
        self.completed_task_ids.insert(id);
        self.failed_task_ids.remove(&id);
    }

    pub fn mark_failed(&mut self, id: TaskId) {
        self.failed_task_ids.insert(id);
    }

    /// Recomputes `execution_order`: a topological sort over `dependencies`
    /// with cycles detected and elided (never hard-fails), ties among ready
    /// vertices broken by `(-priority_value, created_at)` ascending (§4.2).
    pub fn recompute_execution_order(&mut self) {
        let back_edges = detect_and_break_cycles(&self.tasks);

        let mut remaining_deps: HashMap<TaskId, BTreeSet<TaskId>> = self
            .tasks
            .iter()
            .map(|t| {
                let mut deps = t.dependencies.clone();
                for &(from, to) in &back_edges {
                    if from == t.id {
                        deps.remove(&to);
                    }
                }
                (t.id, deps)
            })
            .collect();

        let by_id: HashMap<TaskId, &Task> = self.tasks.iter().map(|t| (t.id, t)).collect();
        let mut emitted: HashSet<TaskId> = HashSet::new();
        let mut order = Vec::with_capacity(self.tasks.len());

        while emitted.len() < self.tasks.len() {
            let mut ready: Vec<TaskId> = remaining_deps
                .iter()
                .filter(|(id, deps)| !emitted.contains(*id) && deps.is_empty())
                .map(|(id, _)| *id)
                .collect();

            if ready.is_empty() {
                // Every remaining task is blocked by a real (non-cyclic)
                // unsatisfied dependency outside this list; emit the rest in
                // id order rather than looping forever.
                let mut rest: Vec<TaskId> = remaining_deps
                    .keys()
                    .filter(|id| !emitted.contains(*id))
                    .copied()
                    .collect();
                rest.sort();
                order.extend(rest.iter().copied());
                for id in rest {
                    emitted.insert(id);
                }
                break;
            }

            ready.sort_by_key(|id| {
                let task = by_id[id];
                (-task.priority.value(), task.created_at)
            });

            let next = ready[0];
            order.push(next);
            emitted.insert(next);
            remaining_deps.remove(&next);
            for deps in remaining_deps.values_mut() {
                deps.remove(&next);
            }
        }

        self.execution_order = order;
    }
}

/// DFS cycle detection with a recursion stack. Returns the set of back-edges
/// to elide; the caller drops them from the working dependency graph rather
/// than failing.
fn detect_and_break_cycles(tasks: &[Task]) -> Vec<(TaskId, TaskId)> {
    let adjacency: HashMap<TaskId, Vec<TaskId>> = tasks
        .iter()
        .map(|t| (t.id, t.dependencies.iter().copied().collect()))
        .collect();

    let mut visited: HashSet<TaskId> = HashSet::new();
    let mut on_stack: HashSet<TaskId> = HashSet::new();
    let mut back_edges = Vec::new();

    fn visit(
        node: TaskId,
        adjacency: &HashMap<TaskId, Vec<TaskId>>,
        visited: &mut HashSet<TaskId>,
        on_stack: &mut HashSet<TaskId>,
        back_edges: &mut Vec<(TaskId, TaskId)>,
    ) {
        visited.insert(node);
        on_stack.insert(node);

        if let Some(deps) = adjacency.get(&node) {
            for &dep in deps {
                if on_stack.contains(&dep) {
                    tracing::warn!(from = %node, to = %dep, "cycle detected in task dependency graph, eliding back-edge");
                    back_edges.push((node, dep));
                } else if !visited.contains(&dep) {
                    visit(dep, adjacency, visited, on_stack, back_edges);
                }
            }
        }

        on_stack.remove(&node);
    }

    for task in tasks {
        if !visited.contains(&task.id) {
            visit(task.id, &adjacency, &mut visited, &mut on_stack, &mut back_edges);
        }
    }

    back_edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::TaskPriority;
    use proptest::prelude::*;

    fn task(title: &str) -> Task {
        Task::new(title, "").unwrap()
    }

    #[test]
    fn execution_order_is_a_valid_topological_sort() {
        let a = task("a");
        let mut b = task("b");
        b.add_dependency(a.id);
        let mut c = task("c");
        c.add_dependency(b.id);

        let a_id = a.id;
        let b_id = b.id;
        let c_id = c.id;

        let list = TaskList::new(vec![c, a, b]);
        let pos = |id: TaskId| list.execution_order.iter().position(|x| *x == id).unwrap();

        assert!(pos(a_id) < pos(b_id));
        assert!(pos(b_id) < pos(c_id));
    }

    #[test]
    fn ties_broken_by_descending_priority_then_creation_time() {
        let low = task("low").with_priority(TaskPriority::Low);
        let high = task("high").with_priority(TaskPriority::Critical);

        let low_id = low.id;
        let high_id = high.id;

        let list = TaskList::new(vec![low, high]);
        assert_eq!(list.execution_order[0], high_id);
        assert_eq!(list.execution_order[1], low_id);
    }

    #[test]
    fn cycle_is_detected_and_both_tasks_still_appear_in_order() {
        let mut a = task("a");
        let mut b = task("b");
        a.add_dependency(b.id);
        b.add_dependency(a.id);

        let a_id = a.id;
        let b_id = b.id;

        let list = TaskList::new(vec![a, b]);
        assert_eq!(list.execution_order.len(), 2);
        assert!(list.execution_order.contains(&a_id));
        assert!(list.execution_order.contains(&b_id));
    }

    #[test]
    fn mark_completed_and_failed_are_disjoint() {
        let a = task("a");
        let a_id = a.id;
        let mut list = TaskList::new(vec![a]);

        list.mark_failed(a_id);
        assert!(list.failed_task_ids.contains(&a_id));

        list.mark_completed(a_id);
        assert!(list.completed_task_ids.contains(&a_id));
        assert!(!list.failed_task_ids.contains(&a_id));
    }

    #[test]
    fn is_complete_tracks_completed_count() {
        let a = task("a");
        let b = task("b");
        let a_id = a.id;
        let b_id = b.id;

        let mut list = TaskList::new(vec![a, b]);
        assert!(!list.is_complete());

        list.mark_completed(a_id);
        assert!(!list.is_complete());

        list.mark_completed(b_id);
        assert!(list.is_complete());
    }

    proptest! {
        // For up to 7 tasks, draw a random DAG (dependency edges only run
        // from a later index to an earlier one, so the graph is acyclic by
        // construction) and check every dependency is scheduled before its
        // dependent (§8).
        #[test]
        fn execution_order_respects_every_dependency_in_random_dags(
            n in 2usize..8,
            edge_bits in prop::collection::vec(any::<bool>(), 21),
        ) {
            let mut tasks: Vec<Task> = (0..n).map(|i| task(&format!("t{i}"))).collect();
            let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();

            let mut bit = 0;
            let mut deps_by_index: Vec<BTreeSet<TaskId>> = vec![BTreeSet::new(); n];
            for i in 0..n {
                for j in 0..i {
                    if edge_bits[bit] {
                        tasks[i].add_dependency(ids[j]);
                        deps_by_index[i].insert(ids[j]);
                    }
                    bit += 1;
                }
            }

            let list = TaskList::new(tasks);
            prop_assert_eq!(list.execution_order.len(), n);

            let pos = |id: TaskId| list.execution_order.iter().position(|x| *x == id).unwrap();
            for i in 0..n {
                for &dep in &deps_by_index[i] {
                    prop_assert!(pos(dep) < pos(ids[i]));
                }
            }
        }
    }
}
