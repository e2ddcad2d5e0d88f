//! Markdown summary assembly shared by parallel and team mode: one
//! heading per task with a status glyph, usage line, tool roll-up,
//! and either the output or a spill pointer (C8).

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use parallel_executor::{sanitize_name, spill_if_long};
use parallel_types::{TaskProgress, TaskResult};

fn status_glyph(result: &TaskResult) -> &'static str {
    if result.aborted {
        "\u{26a0}\u{fe0f}" // ⚠️
    } else if result.succeeded() {
        "\u{2705}" // ✅
    } else {
        "\u{274c}" // ❌
    }
}

fn usage_line(result: &TaskResult) -> String {
    format!(
        "{} in / {} out tokens, {} turn(s), ${:.4}, {} ms",
        result.usage.input, result.usage.output, result.usage.turns, result.usage.cost, result.duration_ms
    )
}

fn tool_rollup(progress: Option<&TaskProgress>) -> Option<String> {
    let progress = progress?;
    if progress.recent_tools.is_empty() {
        return None;
    }
    let mut counts: Vec<(String, usize)> = Vec::new();
    for tool in &progress.recent_tools {
        match counts.iter_mut().find(|(name, _)| name == &tool.tool) {
            Some((_, n)) => *n += 1,
            None => counts.push((tool.tool.clone(), 1)),
        }
    }
    let parts: Vec<String> = counts.iter().map(|(name, n)| format!("{name} x{n}")).collect();
    Some(format!("Tools: {} ({} call(s) total)", parts.join(", "), progress.tool_count))
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Render one task's section: heading, usage, tool roll-up, and the
/// output (inline or spilled). `full_output_path` is written back
/// into the returned `TaskResult` clone when a spill occurs.
pub fn render_task_section(
    result: &TaskResult,
    progress: Option<&TaskProgress>,
    spill_prefix: &str,
    temp_dir: &Path,
) -> (String, Option<String>) {
    let heading_name = result.name.clone().unwrap_or_else(|| result.id.clone());
    let mut lines = vec![format!("### {} {}", status_glyph(result), heading_name)];
    lines.push(usage_line(result));
    if let Some(rollup) = tool_rollup(progress) {
        lines.push(rollup);
    }
    if let Some(err) = &result.error {
        lines.push(format!("Error: {err}"));
    }

    let safe_name = sanitize_name(&heading_name);
    let spill = spill_if_long(&result.output, spill_prefix, &safe_name, epoch_ms(), temp_dir);
    lines.push(spill.inline_text);

    (lines.join("\n\n"), spill.full_output_path)
}

/// One result per task, run-order preserved; returns the joined
/// Markdown body plus the (possibly spill-updated) results.
pub fn render_parallel_summary(
    results: &[TaskResult],
    progress_by_id: impl Fn(&str) -> Option<TaskProgress>,
    temp_dir: &Path,
) -> (String, Vec<TaskResult>) {
    let mut sections = Vec::with_capacity(results.len());
    let mut updated = Vec::with_capacity(results.len());

    for result in results {
        let progress = progress_by_id(&result.id);
        let (section, spill_path) =
            render_task_section(result, progress.as_ref(), "parallel", temp_dir);
        sections.push(section);
        let mut result = result.clone();
        if spill_path.is_some() {
            result.full_output_path = spill_path;
        }
        updated.push(result);
    }

    (sections.join("\n\n"), updated)
}

/// Team-mode summary: primary task sections (declared IDs), a
/// separate section for review/revision sub-results (`:review:` /
/// `:revision:` IDs), and a distinct callout for blocked tasks.
pub fn render_team_summary(
    objective: &str,
    declared_ids: &[String],
    nodes: &parallel_types::DagNodeMap,
    temp_dir: &Path,
) -> String {
    let mut primary = Vec::new();
    let mut sub_results = Vec::new();
    let mut blocked = Vec::new();

    for id in declared_ids {
        let Some(node) = nodes.get(id) else { continue };
        if node.status == parallel_types::NodeStatus::Blocked {
            blocked.push(id.clone());
            continue;
        }
        if let Some(result) = &node.result {
            let (section, _) = render_task_section(result, None, "team", temp_dir);
            primary.push(section);
        }
        for iteration_result in &node.iteration_results {
            let (section, _) = render_task_section(iteration_result, None, "team", temp_dir);
            sub_results.push(section);
        }
    }

    let mut body = vec![format!("## Team: {objective}")];
    if !primary.is_empty() {
        body.push(primary.join("\n\n"));
    }
    if !sub_results.is_empty() {
        body.push(format!("### Review / Revision Sub-results\n\n{}", sub_results.join("\n\n")));
    }
    if !blocked.is_empty() {
        body.push(format!("### Blocked Tasks\n\n{}", blocked.join(", ")));
    }
    body.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallel_types::UsageStats;

    fn ok_result(id: &str, output: &str) -> TaskResult {
        TaskResult {
            id: id.to_string(),
            name: Some(id.to_string()),
            task: "x".into(),
            model: None,
            exit_code: 0,
            output: output.to_string(),
            full_output_path: None,
            stderr: String::new(),
            truncated: false,
            duration_ms: 10,
            usage: UsageStats::default(),
            error: None,
            aborted: false,
            step: None,
        }
    }

    #[test]
    fn renders_success_glyph_and_usage_line() {
        let dir = tempfile::tempdir().unwrap();
        let (section, spill) = render_task_section(&ok_result("a", "short output"), None, "parallel", dir.path());
        assert!(section.contains("\u{2705}"));
        assert!(section.contains("short output"));
        assert!(spill.is_none());
    }

    #[test]
    fn renders_failure_glyph_with_error_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut result = ok_result("a", "partial");
        result.exit_code = 1;
        result.error = Some("boom".into());
        let (section, _) = render_task_section(&result, None, "parallel", dir.path());
        assert!(section.contains("\u{274c}"));
        assert!(section.contains("Error: boom"));
    }

    #[test]
    fn long_output_spills_to_a_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ok_result("a", &"y".repeat(3000));
        let (section, spill) = render_task_section(&result, None, "parallel", dir.path());
        assert!(spill.is_some());
        assert!(section.contains("truncated"));
    }

    #[test]
    fn parallel_summary_joins_one_section_per_result_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![ok_result("task_1", "first"), ok_result("task_2", "second")];
        let (body, updated) = render_parallel_summary(&results, |_| None, dir.path());
        assert!(body.find("first").unwrap() < body.find("second").unwrap());
        assert_eq!(updated.len(), 2);
    }

    #[test]
    fn team_summary_separates_blocked_from_completed() {
        use parallel_types::{DagNode, DagNodeMap, NodeStatus, TeamTask};

        let dir = tempfile::tempdir().unwrap();
        let mut nodes: DagNodeMap = DagNodeMap::new();
        let mut a = DagNode::new(
            TeamTask {
                id: "a".into(),
                task: "do a".into(),
                assignee: None,
                depends: vec![],
                requires_approval: false,
                review: None,
            },
            None,
        );
        a.status = NodeStatus::Completed;
        a.result = Some(ok_result("a", "done"));
        nodes.insert("a".into(), a);

        let mut b = DagNode::new(
            TeamTask {
                id: "b".into(),
                task: "do b".into(),
                assignee: None,
                depends: vec!["a".into()],
                requires_approval: false,
                review: None,
            },
            None,
        );
        b.status = NodeStatus::Blocked;
        nodes.insert("b".into(), b);

        let body = render_team_summary(
            "ship it",
            &["a".to_string(), "b".to_string()],
            &nodes,
            dir.path(),
        );
        assert!(body.contains("done"));
        assert!(body.contains("Blocked Tasks"));
        assert!(body.contains('b'));
    }
}
