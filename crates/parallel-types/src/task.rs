use serde::{Deserialize, Serialize};

use crate::usage::UsageStats;

/// Immutable result of a single agent run, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub exit_code: i32,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_output_path: Option<String>,
    pub stderr: String,
    pub truncated: bool,
    pub duration_ms: u64,
    pub usage: UsageStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub aborted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
}

impl TaskResult {
    /// A result has "succeeded" in the race/success-predicate sense
    /// used by C3 and C5: no recorded error, non-zero-but-unaborted
    /// exit codes do not count.
    pub fn succeeded(&self) -> bool {
        !self.aborted && self.error.is_none() && self.exit_code == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Aborted,
}

/// Mutable, published-through-a-callback view of a task in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: TaskStatus,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tool_args: Option<String>,
    pub recent_tools: Vec<RecentTool>,
    pub recent_output: Vec<String>,
    pub tool_count: u32,
    pub tokens: UsageStats,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTool {
    pub tool: String,
    pub args: String,
}

pub const MAX_RECENT_TOOLS: usize = 10;
pub const MAX_RECENT_OUTPUT: usize = 5;

impl TaskProgress {
    pub fn new(id: impl Into<String>, task: impl Into<String>, model: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            status: TaskStatus::Pending,
            task: task.into(),
            model,
            current_tool: None,
            current_tool_args: None,
            recent_tools: Vec::new(),
            recent_output: Vec::new(),
            tool_count: 0,
            tokens: UsageStats::default(),
            duration_ms: 0,
        }
    }

    pub fn push_recent_tool(&mut self, tool: String, args: String) {
        self.recent_tools.push(RecentTool { tool, args });
        if self.recent_tools.len() > MAX_RECENT_TOOLS {
            self.recent_tools.remove(0);
        }
    }

    pub fn push_recent_output(&mut self, preview: String) {
        self.recent_output.push(preview);
        if self.recent_output.len() > MAX_RECENT_OUTPUT {
            self.recent_output.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_caps_recent_tools_at_ten() {
        let mut p = TaskProgress::new("t1", "do work", None);
        for i in 0..15 {
            p.push_recent_tool(format!("tool{i}"), "args".into());
        }
        assert_eq!(p.recent_tools.len(), MAX_RECENT_TOOLS);
        assert_eq!(p.recent_tools[0].tool, "tool5");
        assert_eq!(p.recent_tools.last().unwrap().tool, "tool14");
    }

    #[test]
    fn progress_caps_recent_output_at_five() {
        let mut p = TaskProgress::new("t1", "do work", None);
        for i in 0..8 {
            p.push_recent_output(format!("line{i}"));
        }
        assert_eq!(p.recent_output.len(), MAX_RECENT_OUTPUT);
        assert_eq!(p.recent_output[0], "line3");
    }

    #[test]
    fn succeeded_requires_zero_exit_no_error_not_aborted() {
        let mut r = TaskResult {
            id: "t".into(),
            name: None,
            task: "x".into(),
            model: None,
            exit_code: 0,
            output: String::new(),
            full_output_path: None,
            stderr: String::new(),
            truncated: false,
            duration_ms: 0,
            usage: UsageStats::default(),
            error: None,
            aborted: false,
            step: None,
        };
        assert!(r.succeeded());
        r.exit_code = 1;
        assert!(!r.succeeded());
        r.exit_code = 0;
        r.error = Some("boom".into());
        assert!(!r.succeeded());
        r.error = None;
        r.aborted = true;
        assert!(!r.succeeded());
    }
}
