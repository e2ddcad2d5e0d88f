//! DAG Builder (C4): validate a team task list and turn it into a
//! node map with edges and initial readiness resolved.

use std::collections::{HashMap, HashSet, VecDeque};

use parallel_types::{DagNode, DagNodeMap, NodeStatus, ParallelError, TeamMember, TeamTask};

/// Build and validate a DAG from a flat task list and the team's
/// member map. Steps run in the order documented on C4; the first
/// failing step returns its descriptive error.
#[tracing::instrument(name = "dag_builder", skip_all, fields(task_count = tasks.len()))]
pub fn build_dag(
    tasks: &[TeamTask],
    members: &HashMap<String, TeamMember>,
) -> Result<DagNodeMap, ParallelError> {
    let mut seen_ids = HashSet::new();
    for task in tasks {
        if !seen_ids.insert(task.id.as_str()) {
            return Err(ParallelError::duplicate_task_id(&task.id));
        }
    }

    let mut nodes: DagNodeMap = HashMap::new();
    for task in tasks {
        let assignee = task
            .assignee
            .as_ref()
            .and_then(|name| members.get(name))
            .cloned();
        nodes.insert(task.id.clone(), DagNode::new(task.clone(), assignee));
    }

    for task in tasks {
        for dep in &task.depends {
            if !nodes.contains_key(dep) {
                return Err(ParallelError::unknown_dependency(&task.id, dep));
            }
        }
    }
    for task in tasks {
        for dep in &task.depends {
            if let Some(dep_node) = nodes.get_mut(dep) {
                dep_node.depended_by.push(task.id.clone());
            }
        }
    }

    for task in tasks {
        if let Some(assignee) = &task.assignee {
            if !members.contains_key(assignee) {
                return Err(ParallelError::unknown_assignee(&task.id, assignee));
            }
        }
        if let Some(review) = &task.review {
            if !members.contains_key(&review.assignee) {
                return Err(ParallelError::unknown_assignee(&task.id, &review.assignee));
            }
        }
    }

    check_acyclic(&nodes)?;
    recompute_readiness(&mut nodes);
    Ok(nodes)
}

fn check_acyclic(nodes: &DagNodeMap) -> Result<(), ParallelError> {
    let mut indegree: HashMap<String, usize> = nodes
        .iter()
        .map(|(id, node)| (id.clone(), node.depends_on.len()))
        .collect();

    let mut queue: VecDeque<String> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| id.clone())
        .collect();

    let mut visited = 0usize;
    while let Some(id) = queue.pop_front() {
        visited += 1;
        if let Some(node) = nodes.get(&id) {
            for dependent in &node.depended_by {
                if let Some(degree) = indegree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent.clone());
                    }
                }
            }
        }
    }

    if visited < nodes.len() {
        let mut residual: Vec<String> = indegree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id)
            .collect();
        residual.sort();
        return Err(ParallelError::cycle_detected(&residual));
    }
    Ok(())
}

/// Re-derive `pending` nodes' readiness from their dependencies'
/// current status. Called after DAG construction and after every
/// batch resolves during execution.
pub fn recompute_readiness(nodes: &mut DagNodeMap) {
    let statuses: HashMap<String, NodeStatus> =
        nodes.iter().map(|(id, node)| (id.clone(), node.status)).collect();

    for node in nodes.values_mut() {
        if node.status != NodeStatus::Pending {
            continue;
        }
        let mut any_failed = false;
        let mut all_completed = true;
        for dep in &node.depends_on {
            match statuses.get(dep) {
                Some(NodeStatus::Failed) => any_failed = true,
                Some(NodeStatus::Completed) => {}
                _ => all_completed = false,
            }
        }
        if any_failed {
            node.status = NodeStatus::Blocked;
        } else if all_completed {
            node.status = NodeStatus::Ready;
        }
    }
}
