//! Team mode: build the member map and task graph from a `TeamSpec`,
//! run it through the DAG executor, and persist results to a per-run
//! workspace.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use parallel_dag::{build_dag, run_dag, ApprovalCallback, DagRunOutcome};
use parallel_executor::{AgentRunner, ProgressSink};
use parallel_types::{AgentCatalog, NodeStatus, ParallelError, Settings, TeamMember, TeamSpec, TeamTask};
use parallel_workspace::TeamWorkspace;

use crate::settings_resolution;

pub struct TeamOutcome {
    pub run: DagRunOutcome,
    pub members: HashMap<String, TeamMember>,
    pub workspace_root: Option<String>,
}

fn status_str(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Pending => "pending",
        NodeStatus::Blocked => "blocked",
        NodeStatus::Ready => "ready",
        NodeStatus::Running => "running",
        NodeStatus::Completed => "completed",
        NodeStatus::Failed => "failed",
        NodeStatus::AwaitingApproval => "awaiting_approval",
        NodeStatus::Reviewing => "reviewing",
        NodeStatus::Revising => "revising",
    }
}

fn build_members(team: &TeamSpec, catalog: &AgentCatalog) -> HashMap<String, TeamMember> {
    team.members
        .iter()
        .map(|m| {
            let effective = settings_resolution::resolve(
                m.agent.as_deref(),
                m.provider.clone(),
                m.model.clone(),
                m.tools.clone(),
                m.system_prompt.clone(),
                m.thinking.clone(),
                catalog,
            );
            (
                m.role.clone(),
                TeamMember {
                    role: m.role.clone(),
                    provider: effective.provider,
                    model: effective.model,
                    tools: effective.tools,
                    system_prompt: effective.system_prompt,
                    thinking: effective.thinking,
                    agent: m.agent.clone(),
                },
            )
        })
        .collect()
}

/// Explicit `tasks[]` when supplied; otherwise one auto-generated task
/// per member that carries a `task` field.
fn build_tasks(team: &TeamSpec) -> Vec<TeamTask> {
    match &team.tasks {
        Some(tasks) => tasks.clone(),
        None => team
            .members
            .iter()
            .filter_map(|m| {
                m.task.as_ref().map(|task| TeamTask {
                    id: m.role.clone(),
                    task: task.clone(),
                    assignee: Some(m.role.clone()),
                    depends: Vec::new(),
                    requires_approval: false,
                    review: None,
                })
            })
            .collect(),
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn run_team(
    team: &TeamSpec,
    catalog: &AgentCatalog,
    shared_context: &str,
    runner: Arc<dyn AgentRunner>,
    progress: Option<ProgressSink>,
    approval: Option<ApprovalCallback>,
    settings: &Settings,
    cancel: CancellationToken,
) -> Result<TeamOutcome, ParallelError> {
    let members = build_members(team, catalog);
    let tasks = build_tasks(team);
    let nodes = build_dag(&tasks, &members)?;

    let workspace = TeamWorkspace::create(&settings.temp_dir, &team.objective).ok();
    let workspace_root = workspace.as_ref().map(|w| w.root.display().to_string());

    let max_concurrency = settings.clamp_concurrency(
        team.max_concurrency.unwrap_or(settings.default_concurrency),
        nodes.len(),
    );

    let run = run_dag(
        nodes,
        &members,
        &team.objective,
        shared_context,
        workspace_root.as_deref(),
        max_concurrency,
        runner,
        progress,
        approval,
        cancel,
    )
    .await;

    if let Some(ws) = &workspace {
        for (id, node) in &run.nodes {
            if let Some(result) = &node.result {
                if let Err(e) = ws.write_task_result(id, &result.output, status_str(node.status)) {
                    tracing::warn!(task_id = %id, error = %e, "failed to persist team task result");
                }
            }
        }
    }
    if let Some(ws) = workspace {
        ws.teardown();
    }

    Ok(TeamOutcome {
        run,
        members,
        workspace_root,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parallel_executor::RunInput;
    use parallel_types::{TaskResult, TeamMemberSpec, UsageStats};

    struct EchoRunner;

    #[async_trait]
    impl AgentRunner for EchoRunner {
        async fn run(&self, input: RunInput, _progress: Option<ProgressSink>, _cancel: CancellationToken) -> TaskResult {
            TaskResult {
                id: input.id,
                name: input.name,
                task: input.task.clone(),
                model: None,
                exit_code: 0,
                output: input.task,
                full_output_path: None,
                stderr: String::new(),
                truncated: false,
                duration_ms: 0,
                usage: UsageStats::default(),
                error: None,
                aborted: false,
                step: None,
            }
        }
    }

    #[tokio::test]
    async fn auto_generates_one_task_per_member_with_a_task_field() {
        let team = TeamSpec {
            objective: "ship it".into(),
            members: vec![
                TeamMemberSpec {
                    role: "writer".into(),
                    task: Some("draft the doc".into()),
                    ..Default::default()
                },
                TeamMemberSpec {
                    role: "observer".into(),
                    ..Default::default()
                },
            ],
            tasks: None,
            max_concurrency: None,
        };
        let catalog = AgentCatalog::default();
        let settings = Settings::default();
        let outcome = run_team(
            &team,
            &catalog,
            "",
            Arc::new(EchoRunner),
            None,
            None,
            &settings,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.run.nodes.len(), 1);
        assert_eq!(outcome.run.nodes["writer"].status, NodeStatus::Completed);
        let root = outcome.workspace_root.expect("workspace created for team run");
        assert!(!std::path::Path::new(&root).exists(), "workspace must be torn down");
    }

    #[tokio::test]
    async fn explicit_tasks_build_a_validated_dag_and_reject_unknown_assignees() {
        let team = TeamSpec {
            objective: "ship it".into(),
            members: vec![TeamMemberSpec {
                role: "writer".into(),
                ..Default::default()
            }],
            tasks: Some(vec![TeamTask {
                id: "t1".into(),
                task: "draft".into(),
                assignee: Some("ghost".into()),
                depends: Vec::new(),
                requires_approval: false,
                review: None,
            }]),
            max_concurrency: None,
        };
        let catalog = AgentCatalog::default();
        let settings = Settings::default();
        let err = run_team(
            &team,
            &catalog,
            "",
            Arc::new(EchoRunner),
            None,
            None,
            &settings,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }
}
