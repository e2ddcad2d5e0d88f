use thiserror::Error;

/// Errors surfaced across the crate's public boundary. Only
/// `Validation` is returned to callers before any subprocess is
/// spawned; everything else is captured into `TaskResult.error`
/// rather than propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParallelError {
    #[error("{0}")]
    Validation(String),
}

impl ParallelError {
    pub fn mode_count(n: usize) -> Self {
        ParallelError::Validation(format!(
            "exactly one of task/tasks/chain/race/team must be set, got {n}"
        ))
    }

    pub fn unknown_agents(names: &[String], available: &[&str]) -> Self {
        let preview: Vec<&str> = available.iter().take(5).copied().collect();
        ParallelError::Validation(format!(
            "unknown agent reference(s): {} (available: {}{})",
            names.join(", "),
            preview.join(", "),
            if available.len() > preview.len() {
                ", ..."
            } else {
                ""
            }
        ))
    }

    pub fn duplicate_task_id(id: &str) -> Self {
        ParallelError::Validation(format!("duplicate task id: {id}"))
    }

    pub fn unknown_dependency(task_id: &str, dep_id: &str) -> Self {
        ParallelError::Validation(format!(
            "task `{task_id}` depends on unknown task `{dep_id}`"
        ))
    }

    pub fn unknown_assignee(task_id: &str, assignee: &str) -> Self {
        ParallelError::Validation(format!(
            "task `{task_id}` assigned to unknown member `{assignee}`"
        ))
    }

    pub fn cycle_detected(ids: &[String]) -> Self {
        ParallelError::Validation(format!(
            "Dependency cycle detected involving tasks: {}",
            ids.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_agents_lists_available_preview() {
        let err = ParallelError::unknown_agents(
            &["ghost".to_string()],
            &["a", "b", "c", "d", "e", "f"],
        );
        let msg = err.to_string();
        assert!(msg.contains("ghost"));
        assert!(msg.contains("..."));
    }

    #[test]
    fn cycle_detected_names_every_task() {
        let err = ParallelError::cycle_detected(&["x".to_string(), "y".to_string()]);
        assert!(err.to_string().contains("x, y"));
    }
}
