//! DAG Executor (C5): the team-mode scheduling loop. Drives approval
//! gates, launches ready nodes up to the concurrency cap, and runs the
//! review/revision sub-protocol for nodes that carry one.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use tokio_util::sync::CancellationToken;

use parallel_executor::{AgentRunner, ProgressSink, RunInput};
use parallel_scheduler::MAX_CONCURRENCY;
use parallel_types::{ApprovalDecision, ApprovalRequest, DagNodeMap, NodeStatus, ReviewRound, TeamMember};

use crate::builder::recompute_readiness;
use crate::context::{build_layered_context, resolve_task_refs};
use crate::review::{
    iteration_note, parse_decision, previous_feedback_note, render_review_prompt, revision_prompt,
    FINAL_ITERATION_NOTE, REVIEW_PROTOCOL_BLOCK,
};

/// Tools a node is restricted to on its first pass when it requires
/// approval, so the plan it proposes can't have already mutated
/// anything before a human signs off on it.
pub const READ_ONLY_TOOLS: &[&str] = &["read", "bash", "grep", "find", "mcp"];

pub type ApprovalCallback = Arc<dyn Fn(ApprovalRequest) -> BoxFuture<'static, ApprovalDecision> + Send + Sync>;

pub struct DagRunOutcome {
    pub nodes: DagNodeMap,
    pub completion_order: Vec<String>,
    pub aborted: bool,
}

fn record_if_terminal(id: &str, nodes: &DagNodeMap, completion_order: &mut Vec<String>) {
    if nodes[id].status.is_terminal() && !completion_order.iter().any(|x| x == id) {
        completion_order.push(id.to_string());
    }
}

/// Run the whole DAG to completion (or exhaustion): repeatedly resolve
/// approval gates, launch every `ready` node up to the concurrency
/// cap, and let each batch's review cycle (if any) run to its own
/// conclusion before the loop re-evaluates readiness.
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(name = "dag_executor", skip_all, fields(team = %objective, node_count = nodes.len(), max_concurrency))]
pub async fn run_dag(
    mut nodes: DagNodeMap,
    members: &HashMap<String, TeamMember>,
    objective: &str,
    shared_context: &str,
    workspace_root: Option<&str>,
    max_concurrency: usize,
    runner: Arc<dyn AgentRunner>,
    progress: Option<ProgressSink>,
    approval: Option<ApprovalCallback>,
    cancel: CancellationToken,
) -> DagRunOutcome {
    let mut completion_order: Vec<String> = Vec::new();
    let cap = max_concurrency.max(1).min(MAX_CONCURRENCY);

    loop {
        if cancel.is_cancelled() {
            return DagRunOutcome {
                nodes,
                completion_order,
                aborted: true,
            };
        }

        let awaiting: Vec<String> = nodes
            .iter()
            .filter(|(_, n)| n.status == NodeStatus::AwaitingApproval)
            .map(|(id, _)| id.clone())
            .collect();

        if !awaiting.is_empty() {
            for id in awaiting {
                let plan = nodes
                    .get(&id)
                    .and_then(|n| n.result.as_ref())
                    .map(|r| r.output.clone())
                    .unwrap_or_default();
                let decision = match &approval {
                    Some(cb) => cb(ApprovalRequest { task_id: id.clone(), plan }).await,
                    None => ApprovalDecision {
                        approved: true,
                        feedback: None,
                    },
                };
                apply_approval_decision(&mut nodes, &id, decision);
                record_if_terminal(&id, &nodes, &mut completion_order);
            }
            recompute_readiness(&mut nodes);
            continue;
        }

        let ready_ids: Vec<String> = {
            let mut ids: Vec<String> = nodes
                .iter()
                .filter(|(_, n)| n.status == NodeStatus::Ready)
                .map(|(id, _)| id.clone())
                .collect();
            ids.sort();
            ids.truncate(cap);
            ids
        };

        if ready_ids.is_empty() {
            break;
        }

        for id in &ready_ids {
            nodes.get_mut(id).unwrap().status = NodeStatus::Running;
        }

        let mut launches = Vec::with_capacity(ready_ids.len());
        for id in &ready_ids {
            let node = &nodes[id];
            let resolved_task = resolve_task_refs(&node.task.task, &nodes);
            let context = build_layered_context(objective, shared_context, workspace_root, id, &nodes);
            let first_pass = node.result.is_none();
            let tools = if node.task.requires_approval && first_pass {
                Some(READ_ONLY_TOOLS.iter().map(|s| s.to_string()).collect())
            } else {
                node.assignee.as_ref().and_then(|a| a.tools.clone())
            };

            let run_input = RunInput {
                id: id.clone(),
                name: node.assignee.as_ref().map(|a| a.role.clone()),
                task: resolved_task,
                cwd: None,
                provider: node.assignee.as_ref().and_then(|a| a.provider.clone()),
                model: node.assignee.as_ref().and_then(|a| a.model.clone()),
                tools,
                system_prompt: node.assignee.as_ref().and_then(|a| a.system_prompt.clone()),
                thinking: node.assignee.as_ref().and_then(|a| a.thinking.clone()),
                context: Some(context),
                step: None,
            };

            let runner = runner.clone();
            let progress = progress.clone();
            let child_token = cancel.child_token();
            let id = id.clone();
            launches.push(async move {
                let result = runner.run(run_input, progress, child_token).await;
                (id, result)
            });
        }

        let batch_results = join_all(launches).await;

        for (id, result) in batch_results {
            {
                let node = nodes.get_mut(&id).unwrap();
                node.result = Some(result.clone());
            }

            if result.aborted || !result.succeeded() {
                nodes.get_mut(&id).unwrap().status = NodeStatus::Failed;
            } else if nodes[&id].task.requires_approval {
                nodes.get_mut(&id).unwrap().status = NodeStatus::AwaitingApproval;
            } else if nodes[&id].task.review.is_some() {
                nodes.get_mut(&id).unwrap().status = NodeStatus::Reviewing;
                run_review_cycle(&id, &mut nodes, members, &runner, &progress, &cancel).await;
            } else {
                nodes.get_mut(&id).unwrap().status = NodeStatus::Completed;
            }
            record_if_terminal(&id, &nodes, &mut completion_order);
        }

        recompute_readiness(&mut nodes);
    }

    DagRunOutcome {
        nodes,
        completion_order,
        aborted: false,
    }
}

fn apply_approval_decision(nodes: &mut DagNodeMap, id: &str, decision: ApprovalDecision) {
    let node = nodes.get_mut(id).unwrap();
    if decision.approved {
        node.status = NodeStatus::Completed;
        return;
    }
    if let Some(feedback) = decision.feedback.filter(|f| !f.is_empty()) {
        node.task.task = format!("{}\n\nReviewer feedback: {feedback}", node.task.task);
    }
    node.status = NodeStatus::Ready;
}

/// Run the review/revision loop for one just-completed node until it
/// is approved, hits `maxIterations`, or a reviewer/reviser itself
/// fails. Mutates `nodes[id]` in place and always leaves it in a
/// terminal state.
async fn run_review_cycle(
    id: &str,
    nodes: &mut DagNodeMap,
    members: &HashMap<String, TeamMember>,
    runner: &Arc<dyn AgentRunner>,
    progress: &Option<ProgressSink>,
    cancel: &CancellationToken,
) {
    let review_config = nodes[id].task.review.clone().expect("node has review config");
    let max_iterations = review_config.max_iterations.max(1);
    let original_task = nodes[id].task.task.clone();
    let mut worker_output = nodes[id]
        .result
        .as_ref()
        .map(|r| r.output.clone())
        .unwrap_or_default();
    let mut previous_reviewer_output: Option<String> = None;
    let reviewer_member = members.get(&review_config.assignee).cloned().unwrap_or_default();

    let mut iteration = 1u32;
    loop {
        let mut review_prompt =
            render_review_prompt(review_config.task.as_deref(), &original_task, &worker_output);
        review_prompt.push_str(&iteration_note(iteration, max_iterations));
        if let Some(prev) = &previous_reviewer_output {
            review_prompt.push_str(&previous_feedback_note(prev));
        }
        if iteration == max_iterations {
            review_prompt.push_str(FINAL_ITERATION_NOTE);
        }

        let reviewer_input = RunInput {
            id: format!("{id}:review:{iteration}"),
            name: Some(reviewer_member.role.clone()),
            task: review_prompt,
            cwd: None,
            provider: review_config.provider.clone().or_else(|| reviewer_member.provider.clone()),
            model: review_config.model.clone().or_else(|| reviewer_member.model.clone()),
            tools: review_config.tools.clone().or_else(|| reviewer_member.tools.clone()),
            system_prompt: Some(format!(
                "{}{REVIEW_PROTOCOL_BLOCK}",
                reviewer_member.system_prompt.clone().unwrap_or_default()
            )),
            thinking: reviewer_member.thinking.clone(),
            context: None,
            step: None,
        };

        let reviewer_result = runner.run(reviewer_input, progress.clone(), cancel.child_token()).await;

        if !reviewer_result.succeeded() {
            nodes.get_mut(id).unwrap().status = NodeStatus::Completed;
            return;
        }

        let decision = parse_decision(&reviewer_result.output);
        {
            let node = nodes.get_mut(id).unwrap();
            node.review_history.push(ReviewRound {
                iteration,
                worker_output: worker_output.clone(),
                reviewer_output: reviewer_result.output.clone(),
                approved: decision.approved,
            });
            node.iteration = Some(iteration);
        }

        if decision.approved || iteration >= max_iterations {
            nodes.get_mut(id).unwrap().status = NodeStatus::Completed;
            return;
        }

        nodes.get_mut(id).unwrap().status = NodeStatus::Revising;
        previous_reviewer_output = Some(reviewer_result.output.clone());

        let worker_member = nodes[id].assignee.clone();
        let revision_input = RunInput {
            id: format!("{id}:revision:{iteration}"),
            name: worker_member.as_ref().map(|m| m.role.clone()),
            task: revision_prompt(&original_task, &worker_output, &decision.feedback),
            cwd: None,
            provider: worker_member.as_ref().and_then(|m| m.provider.clone()),
            model: worker_member.as_ref().and_then(|m| m.model.clone()),
            tools: worker_member.as_ref().and_then(|m| m.tools.clone()),
            system_prompt: worker_member.as_ref().and_then(|m| m.system_prompt.clone()),
            thinking: worker_member.as_ref().and_then(|m| m.thinking.clone()),
            context: None,
            step: None,
        };

        let revision_result = runner.run(revision_input, progress.clone(), cancel.child_token()).await;
        if !revision_result.succeeded() {
            let node = nodes.get_mut(id).unwrap();
            node.status = NodeStatus::Failed;
            node.result = Some(revision_result);
            return;
        }

        worker_output = revision_result.output.clone();
        {
            let node = nodes.get_mut(id).unwrap();
            node.result = Some(revision_result.clone());
            node.iteration_results.push(revision_result);
        }
        iteration += 1;
    }
}
