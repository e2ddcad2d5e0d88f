//! Mode Dispatcher (C6): the crate's single public entry point. Runs
//! pre-flight validation, builds the shared context once, picks the
//! one active mode, and assembles the `ToolInvocationResult` the host
//! surfaces back to the model.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use parallel_dag::ApprovalCallback;
use parallel_executor::{AgentRunner, ProgressSink, SubprocessAgentRunner};
use parallel_types::{
    AgentCatalog, ContentBlock, DagInfo, DagTaskInfo, ExecutionMode, NodeStatus, ParallelParams,
    ParallelToolDetails, Settings, TaskResult, TeamMember, TeamSpec, ToolInvocationResult,
    UsageStats,
};

use crate::context_builder::build_shared_context;
use crate::progress_collector::ProgressCollector;
use crate::validation::{validate_agent_refs, validate_mode_count};
use crate::{chain, multi_task, race, single, summary, team};

/// Best-effort mode for a validation error raised before a mode could
/// be determined at all (e.g. zero or more than one set).
fn mode_guess(params: &ParallelParams) -> ExecutionMode {
    if params.tasks.is_some() {
        ExecutionMode::Parallel
    } else if params.chain.is_some() {
        ExecutionMode::Chain
    } else if params.race.is_some() {
        ExecutionMode::Race
    } else if params.team.is_some() {
        ExecutionMode::Team
    } else {
        ExecutionMode::Single
    }
}

fn sum_usage(results: &[TaskResult]) -> UsageStats {
    let mut usage = UsageStats::default();
    for r in results {
        usage.accumulate(&r.usage);
    }
    usage
}

/// Declared task order for team mode: explicit `tasks[]` in the order
/// given, or one auto-generated entry per member with a `task` field.
fn declared_task_ids(team: &TeamSpec) -> Vec<String> {
    match &team.tasks {
        Some(tasks) => tasks.iter().map(|t| t.id.clone()).collect(),
        None => team
            .members
            .iter()
            .filter(|m| m.task.is_some())
            .map(|m| m.role.clone())
            .collect(),
    }
}

fn build_dag_info(
    team: &TeamSpec,
    nodes: &parallel_types::DagNodeMap,
    declared_ids: &[String],
    members: &HashMap<String, TeamMember>,
) -> DagInfo {
    let mut tasks = Vec::with_capacity(declared_ids.len());
    let mut pending_approval = None;

    for id in declared_ids {
        let Some(node) = nodes.get(id) else { continue };
        if node.status == NodeStatus::AwaitingApproval && pending_approval.is_none() {
            pending_approval = Some(id.clone());
        }
        tasks.push(DagTaskInfo {
            id: id.clone(),
            assignee: node.task.assignee.clone(),
            depends: node.task.depends.clone(),
            status: node.status,
            iteration: node.iteration,
            max_iterations: node.task.review.as_ref().map(|r| r.max_iterations),
        });
    }

    let mut member_names: Vec<String> = members.keys().cloned().collect();
    member_names.sort();

    DagInfo {
        objective: team.objective.clone(),
        members: member_names,
        tasks,
        pending_approval,
    }
}

/// Production entry point: builds a real `SubprocessAgentRunner` from
/// process-environment settings and delegates to the runner-injectable
/// core so hosts never construct either by hand.
pub async fn run_parallel_tool(
    params: ParallelParams,
    catalog: AgentCatalog,
    progress: Option<ProgressSink>,
    approval: Option<ApprovalCallback>,
    cancel: CancellationToken,
) -> ToolInvocationResult {
    let settings = Settings::from_env();
    let runner: Arc<dyn AgentRunner> = Arc::new(SubprocessAgentRunner::new(settings.clone()));
    run_parallel_tool_with_runner(params, catalog, progress, approval, cancel, runner, &settings).await
}

/// Core dispatcher, parameterized over the `AgentRunner` so tests can
/// inject a deterministic stub instead of spawning a real child.
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(name = "mode_dispatcher", skip_all, fields(mode = ?mode_guess(&params)))]
pub async fn run_parallel_tool_with_runner(
    params: ParallelParams,
    catalog: AgentCatalog,
    progress: Option<ProgressSink>,
    approval: Option<ApprovalCallback>,
    cancel: CancellationToken,
    runner: Arc<dyn AgentRunner>,
    settings: &Settings,
) -> ToolInvocationResult {
    if let Err(e) = validate_mode_count(&params) {
        return ToolInvocationResult::validation_error(e.to_string(), mode_guess(&params));
    }
    if let Err(e) = validate_agent_refs(&params, &catalog) {
        return ToolInvocationResult::validation_error(e.to_string(), mode_guess(&params));
    }

    let start = Instant::now();
    let shared_context = build_shared_context(
        params.context.as_deref(),
        params.context_files.as_deref(),
        params.git_context.as_ref(),
        params.cwd.as_deref(),
    )
    .await;
    let shared_context = if shared_context.is_empty() { None } else { Some(shared_context) };

    let collector = ProgressCollector::new();

    if params.task.is_some() {
        let sink = collector.sink(progress.clone());
        let result = single::run_single(&params, &catalog, shared_context, &runner, sink, cancel.clone()).await;
        let aborted = result.aborted;
        let text = result.output.clone();
        let usage = sum_usage(std::slice::from_ref(&result));
        return ToolInvocationResult {
            content: vec![ContentBlock::text(text)],
            details: ParallelToolDetails {
                mode: ExecutionMode::Single,
                results: vec![result],
                progress: Some(collector.snapshot_all()),
                total_duration_ms: start.elapsed().as_millis() as u64,
                usage,
                winner: None,
                dag_info: None,
                aborted,
            },
            is_error: None,
        };
    }

    if let Some(tasks) = &params.tasks {
        let sink = collector.sink(progress.clone());
        let requested = params.max_concurrency.unwrap_or(settings.default_concurrency);
        let outcome = multi_task::run_parallel_tasks(
            tasks,
            &catalog,
            shared_context,
            requested,
            runner.clone(),
            sink,
            cancel.clone(),
            settings,
        )
        .await;
        let raw_results: Vec<TaskResult> = outcome.results.into_iter().flatten().collect();
        let (body, results) =
            summary::render_parallel_summary(&raw_results, |id| collector.get(id), &settings.temp_dir);
        let usage = sum_usage(&results);
        return ToolInvocationResult {
            content: vec![ContentBlock::text(body)],
            details: ParallelToolDetails {
                mode: ExecutionMode::Parallel,
                results,
                progress: Some(collector.snapshot_all()),
                total_duration_ms: start.elapsed().as_millis() as u64,
                usage,
                winner: None,
                dag_info: None,
                aborted: outcome.aborted,
            },
            is_error: None,
        };
    }

    if let Some(steps) = &params.chain {
        let sink = collector.sink(progress.clone());
        let outcome = chain::run_chain(steps, &catalog, shared_context, &runner, sink, cancel.clone()).await;
        let aborted = outcome.stopped_at.is_some();
        let (body, results) =
            summary::render_parallel_summary(&outcome.results, |id| collector.get(id), &settings.temp_dir);
        let usage = sum_usage(&results);
        let text = match outcome.stopped_at {
            Some(i) => format!("Chain stopped at step {i}.\n\n{body}"),
            None => body,
        };
        return ToolInvocationResult {
            content: vec![ContentBlock::text(text)],
            details: ParallelToolDetails {
                mode: ExecutionMode::Chain,
                results,
                progress: Some(collector.snapshot_all()),
                total_duration_ms: start.elapsed().as_millis() as u64,
                usage,
                winner: None,
                dag_info: None,
                aborted,
            },
            is_error: None,
        };
    }

    if let Some(race_spec) = &params.race {
        let outcome = race::run_race(race_spec, shared_context, &runner, &collector, progress.clone(), cancel.clone()).await;
        let results: Vec<TaskResult> = outcome.all_results.into_iter().flatten().collect();
        let usage = sum_usage(&results);
        let winner_model = outcome.winner.as_ref().and_then(|w| w.model.clone());
        let no_winner = outcome.winner.is_none();
        let text = match &outcome.winner {
            Some(w) => w.output.clone(),
            None => "No candidate model produced a successful result.".to_string(),
        };
        return ToolInvocationResult {
            content: vec![ContentBlock::text(text)],
            details: ParallelToolDetails {
                mode: ExecutionMode::Race,
                results,
                progress: Some(collector.snapshot_all()),
                total_duration_ms: start.elapsed().as_millis() as u64,
                usage,
                winner: winner_model,
                dag_info: None,
                aborted: outcome.aborted,
            },
            is_error: if no_winner { Some(true) } else { None },
        };
    }

    if let Some(team_spec) = &params.team {
        let shared = shared_context.unwrap_or_default();
        return match team::run_team(
            team_spec,
            &catalog,
            &shared,
            runner.clone(),
            progress.clone(),
            approval,
            settings,
            cancel.clone(),
        )
        .await
        {
            Ok(outcome) => {
                let declared_ids = declared_task_ids(team_spec);
                let body = summary::render_team_summary(
                    &team_spec.objective,
                    &declared_ids,
                    &outcome.run.nodes,
                    &settings.temp_dir,
                );
                let mut usage = UsageStats::default();
                let mut results = Vec::new();
                for id in &declared_ids {
                    let Some(node) = outcome.run.nodes.get(id) else { continue };
                    if let Some(r) = &node.result {
                        usage.accumulate(&r.usage);
                        results.push(r.clone());
                    }
                    for ir in &node.iteration_results {
                        usage.accumulate(&ir.usage);
                    }
                }
                let dag_info = build_dag_info(team_spec, &outcome.run.nodes, &declared_ids, &outcome.members);
                ToolInvocationResult {
                    content: vec![ContentBlock::text(body)],
                    details: ParallelToolDetails {
                        mode: ExecutionMode::Team,
                        results,
                        progress: Some(collector.snapshot_all()),
                        total_duration_ms: start.elapsed().as_millis() as u64,
                        usage,
                        winner: None,
                        dag_info: Some(dag_info),
                        aborted: outcome.run.aborted,
                    },
                    is_error: None,
                }
            }
            Err(e) => ToolInvocationResult::validation_error(e.to_string(), ExecutionMode::Team),
        };
    }

    unreachable!("validate_mode_count guarantees exactly one mode is set")
}
