use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::task::TaskResult;

/// A configured member of a team, mirroring an agent's effective
/// settings after merging agent-definition defaults with inline
/// overrides (see mode-dispatcher settings resolution).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Name of the agent definition that supplied defaults, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// Per-review configuration on a `TeamTask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewConfig {
    pub assignee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
}

pub fn default_max_iterations() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamTask {
    pub id: String,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Blocked,
    Ready,
    Running,
    Completed,
    Failed,
    AwaitingApproval,
    Reviewing,
    Revising,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Completed | NodeStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRound {
    pub iteration: u32,
    pub worker_output: String,
    pub reviewer_output: String,
    pub approved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagNode {
    pub task: TeamTask,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<TeamMember>,
    pub depends_on: Vec<String>,
    pub depended_by: Vec<String>,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    #[serde(default)]
    pub review_history: Vec<ReviewRound>,
    #[serde(default)]
    pub iteration_results: Vec<TaskResult>,
}

impl DagNode {
    pub fn new(task: TeamTask, assignee: Option<TeamMember>) -> Self {
        let depends_on = task.depends.clone();
        Self {
            task,
            assignee,
            depends_on,
            depended_by: Vec::new(),
            status: NodeStatus::Pending,
            result: None,
            iteration: None,
            review_history: Vec::new(),
            iteration_results: Vec::new(),
        }
    }
}

pub type DagNodeMap = HashMap<String, DagNode>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub task_id: String,
    pub plan: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecision {
    pub approved: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dag_node_seeds_depends_on_from_task() {
        let task = TeamTask {
            id: "b".into(),
            task: "do b".into(),
            assignee: None,
            depends: vec!["a".into()],
            requires_approval: false,
            review: None,
        };
        let node = DagNode::new(task, None);
        assert_eq!(node.depends_on, vec!["a".to_string()]);
        assert!(node.depended_by.is_empty());
        assert_eq!(node.status, NodeStatus::Pending);
    }

    #[test]
    fn node_status_terminal_classification() {
        assert!(NodeStatus::Completed.is_terminal());
        assert!(NodeStatus::Failed.is_terminal());
        assert!(!NodeStatus::Ready.is_terminal());
        assert!(!NodeStatus::AwaitingApproval.is_terminal());
    }
}
