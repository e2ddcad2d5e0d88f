//! Parallel mode: map C2's bounded worker pool over `tasks[]`, with
//! cross-task `{task_N}` / `{result_N}` reference substitution forced
//! to serial execution when any task text uses one.

use std::sync::{Arc, Mutex, OnceLock};

use regex::Regex;
use tokio_util::sync::CancellationToken;

use parallel_executor::{AgentRunner, ProgressSink, RunInput};
use parallel_scheduler::{map_with_concurrency_limit, PoolOutcome};
use parallel_types::{AgentCatalog, Settings, TaskSpec};

use crate::settings_resolution;

fn cross_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{(?:task|result)_(\d+)\}").expect("valid regex"))
}

/// True if any task's text references another task by position,
/// `{task_N}` or `{result_N}` (1-indexed, matching declared order).
pub fn has_cross_refs(tasks: &[TaskSpec]) -> bool {
    tasks.iter().any(|t| cross_ref_pattern().is_match(&t.task))
}

/// Substitute every `{task_N}`/`{result_N}` in `text` against
/// `results` (1-indexed). A reference to a task that hasn't completed
/// yet, or is out of range, is left verbatim.
fn substitute_cross_refs(text: &str, results: &[Option<String>]) -> String {
    cross_ref_pattern()
        .replace_all(text, |caps: &regex::Captures| {
            let idx: usize = caps[1].parse().unwrap_or(0);
            match idx.checked_sub(1).and_then(|i| results.get(i)) {
                Some(Some(output)) => output.clone(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Run `tasks` through the bounded worker pool. `requested_concurrency`
/// is the caller's request, clamped against the concurrency ceiling
/// except for the cross-ref override, which is applied here (forced to
/// 1 whenever any task text contains a positional reference).
pub async fn run_parallel_tasks(
    tasks: &[TaskSpec],
    catalog: &AgentCatalog,
    shared_context: Option<String>,
    requested_concurrency: usize,
    runner: Arc<dyn AgentRunner>,
    progress: ProgressSink,
    cancel: CancellationToken,
    settings: &Settings,
) -> PoolOutcome {
    let concurrency = if has_cross_refs(tasks) {
        1
    } else {
        settings.clamp_concurrency(requested_concurrency, tasks.len())
    };

    let effective: Vec<_> = tasks
        .iter()
        .map(|t| {
            settings_resolution::resolve(
                t.agent.as_deref(),
                t.provider.clone(),
                t.model.clone(),
                t.tools.clone(),
                t.system_prompt.clone(),
                t.thinking.clone(),
                catalog,
            )
        })
        .collect();

    let shared_outputs: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(vec![None; tasks.len()]));

    let items: Vec<(usize, TaskSpec)> = tasks.iter().cloned().enumerate().collect();

    map_with_concurrency_limit(
        items,
        concurrency,
        move |(idx, spec), token| {
            let runner = runner.clone();
            let progress = progress.clone();
            let shared_context = shared_context.clone();
            let effective = effective[idx].clone();
            let shared_outputs = shared_outputs.clone();
            async move {
                let resolved_task = {
                    let outputs = shared_outputs.lock().unwrap();
                    substitute_cross_refs(&spec.task, &outputs)
                };
                let input = RunInput {
                    id: format!("task_{}", idx + 1),
                    name: spec.name.clone(),
                    task: resolved_task,
                    cwd: spec.cwd.clone(),
                    provider: effective.provider,
                    model: effective.model,
                    tools: effective.tools,
                    system_prompt: effective.system_prompt,
                    thinking: effective.thinking,
                    context: shared_context,
                    step: None,
                };
                let result = runner.run(input, Some(progress), token).await;
                shared_outputs.lock().unwrap()[idx] = Some(result.output.clone());
                result
            }
        },
        cancel,
    )
    .await
}
