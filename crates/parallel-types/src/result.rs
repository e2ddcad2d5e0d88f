use serde::{Deserialize, Serialize};

use crate::task::{TaskProgress, TaskResult};
use crate::team::NodeStatus;
use crate::usage::UsageStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Single,
    Parallel,
    Chain,
    Race,
    Team,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagTaskInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub depends: Vec<String>,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagInfo {
    pub objective: String,
    pub members: Vec<String>,
    pub tasks: Vec<DagTaskInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_approval: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelToolDetails {
    pub mode: ExecutionMode,
    pub results: Vec<TaskResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Vec<TaskProgress>>,
    pub total_duration_ms: u64,
    pub usage: UsageStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dag_info: Option<DagInfo>,
    #[serde(default)]
    pub aborted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocationResult {
    pub content: Vec<ContentBlock>,
    pub details: ParallelToolDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolInvocationResult {
    pub fn validation_error(text: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            details: ParallelToolDetails {
                mode,
                results: Vec::new(),
                progress: None,
                total_duration_ms: 0,
                usage: UsageStats::default(),
                winner: None,
                dag_info: None,
                aborted: false,
            },
            is_error: Some(true),
        }
    }
}
