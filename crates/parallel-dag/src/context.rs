//! `{task:id}` reference resolution and the layered per-node context
//! string assembled before a DAG node's worker is spawned.

use std::sync::OnceLock;

use regex::Regex;

use parallel_types::DagNodeMap;

fn task_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{task:([^{}]+)\}").expect("valid regex"))
}

/// Replace every `{task:ID}` occurrence in `text` with that node's
/// output. A reference to a missing node, or to one with no output
/// yet, is left verbatim.
pub fn resolve_task_refs(text: &str, nodes: &DagNodeMap) -> String {
    task_ref_pattern()
        .replace_all(text, |caps: &regex::Captures| {
            let id = &caps[1];
            match nodes.get(id).and_then(|n| n.result.as_ref()) {
                Some(result) if !result.output.is_empty() => result.output.clone(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Build the layered context string for one node's run, in the order
/// objective, shared context, workspace root, then each dependency's
/// output, separated by `\n\n---\n\n`.
pub fn build_layered_context(
    objective: &str,
    shared_context: &str,
    workspace_root: Option<&str>,
    node_id: &str,
    nodes: &DagNodeMap,
) -> String {
    let mut sections = Vec::new();

    if !objective.is_empty() {
        sections.push(format!("## Team Objective\n\n{objective}"));
    }
    if !shared_context.is_empty() {
        sections.push(shared_context.to_string());
    }
    if let Some(root) = workspace_root {
        sections.push(format!("## Shared Workspace\n\n{root}"));
    }

    if let Some(node) = nodes.get(node_id) {
        for dep_id in &node.depends_on {
            if let Some(dep) = nodes.get(dep_id) {
                if let Some(result) = &dep.result {
                    let label = match &dep.assignee {
                        Some(assignee) => format!("{} ({})", assignee.role, dep_id),
                        None => dep_id.clone(),
                    };
                    sections.push(format!(
                        "## Output from prerequisite task \"{label}\"\n\n{}",
                        result.output
                    ));
                }
            }
        }
    }

    sections.join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use parallel_types::{DagNode, TaskResult, TeamMember, TeamTask};

    fn node_with_output(id: &str, output: &str) -> DagNode {
        let task = TeamTask {
            id: id.to_string(),
            task: "x".into(),
            assignee: None,
            depends: vec![],
            requires_approval: false,
            review: None,
        };
        let mut node = DagNode::new(task, None);
        node.result = Some(TaskResult {
            id: id.to_string(),
            name: None,
            task: "x".into(),
            model: None,
            exit_code: 0,
            output: output.to_string(),
            full_output_path: None,
            stderr: String::new(),
            truncated: false,
            duration_ms: 0,
            usage: Default::default(),
            error: None,
            aborted: false,
            step: None,
        });
        node
    }

    #[test]
    fn resolves_a_reference_to_its_dependency_output() {
        let mut nodes = HashMap::new();
        nodes.insert("x".to_string(), node_with_output("x", "O"));
        assert_eq!(resolve_task_refs("see {task:x}", &nodes), "see O");
    }

    #[test]
    fn leaves_unresolvable_references_verbatim() {
        let nodes: DagNodeMap = HashMap::new();
        assert_eq!(resolve_task_refs("see {task:missing}", &nodes), "see {task:missing}");
    }

    #[test]
    fn leaves_reference_verbatim_when_dependency_output_is_empty() {
        let mut nodes = HashMap::new();
        nodes.insert("x".to_string(), node_with_output("x", ""));
        assert_eq!(resolve_task_refs("see {task:x}", &nodes), "see {task:x}");
    }

    #[test]
    fn layers_sections_in_fixed_order_separated_by_rule() {
        let mut nodes = HashMap::new();
        let mut dep = node_with_output("a", "dep output");
        dep.assignee = Some(TeamMember {
            role: "writer".into(),
            ..Default::default()
        });
        nodes.insert("a".to_string(), dep);

        let mut consumer_task = TeamTask {
            id: "b".into(),
            task: "consume".into(),
            assignee: None,
            depends: vec!["a".into()],
            requires_approval: false,
            review: None,
        };
        consumer_task.depends = vec!["a".into()];
        let mut consumer = DagNode::new(consumer_task, None);
        consumer.depends_on = vec!["a".into()];
        nodes.insert("b".to_string(), consumer);

        let context = build_layered_context("Ship it", "shared ctx", Some("/tmp/ws"), "b", &nodes);
        let sections: Vec<&str> = context.split("\n\n---\n\n").collect();
        assert_eq!(sections[0], "## Team Objective\n\nShip it");
        assert_eq!(sections[1], "shared ctx");
        assert_eq!(sections[2], "## Shared Workspace\n\n/tmp/ws");
        assert!(sections[3].contains("writer (a)"));
        assert!(sections[3].contains("dep output"));
    }
}
