//! Chain mode: sequential agent execution with a step's output piped
//! into the next via a `{previous}` placeholder.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use parallel_executor::{AgentRunner, ProgressSink, RunInput};
use parallel_types::{AgentCatalog, ChainStep, TaskResult};

use crate::settings_resolution;

pub struct ChainOutcome {
    pub results: Vec<TaskResult>,
    /// Set when a step failed or aborted before the chain ran to completion.
    pub stopped_at: Option<usize>,
}

/// Run every step in order, substituting `{previous}` with the prior
/// step's output (empty on step 0). Stops at the first step whose
/// result did not succeed; later steps are never started.
pub async fn run_chain(
    steps: &[ChainStep],
    catalog: &AgentCatalog,
    shared_context: Option<String>,
    runner: &Arc<dyn AgentRunner>,
    progress: ProgressSink,
    cancel: CancellationToken,
) -> ChainOutcome {
    let mut results = Vec::with_capacity(steps.len());
    let mut previous = String::new();
    let mut stopped_at = None;

    for (i, step) in steps.iter().enumerate() {
        if cancel.is_cancelled() {
            stopped_at = Some(i);
            break;
        }

        let effective = settings_resolution::resolve(
            step.agent.as_deref(),
            step.provider.clone(),
            step.model.clone(),
            step.tools.clone(),
            step.system_prompt.clone(),
            step.thinking.clone(),
            catalog,
        );

        let input = RunInput {
            id: format!("step-{i}"),
            name: None,
            task: step.task.replace("{previous}", &previous),
            cwd: None,
            provider: effective.provider,
            model: effective.model,
            tools: effective.tools,
            system_prompt: effective.system_prompt,
            thinking: effective.thinking,
            context: shared_context.clone(),
            step: Some(i),
        };

        let result = runner.run(input, Some(progress.clone()), cancel.child_token()).await;
        let halted = result.aborted || !result.succeeded();
        previous = result.output.clone();
        results.push(result);

        if halted {
            stopped_at = Some(i);
            break;
        }
    }

    ChainOutcome { results, stopped_at }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parallel_types::UsageStats;

    struct EchoPreviousRunner;

    #[async_trait]
    impl AgentRunner for EchoPreviousRunner {
        async fn run(&self, input: RunInput, _progress: Option<ProgressSink>, _cancel: CancellationToken) -> TaskResult {
            let output = input.task.strip_prefix("Task: ").unwrap_or(&input.task).to_string();
            TaskResult {
                id: input.id,
                name: None,
                task: input.task,
                model: None,
                exit_code: 0,
                output,
                full_output_path: None,
                stderr: String::new(),
                truncated: false,
                duration_ms: 0,
                usage: UsageStats::default(),
                error: None,
                aborted: false,
                step: input.step,
            }
        }
    }

    #[tokio::test]
    async fn propagates_output_through_previous_placeholder() {
        let steps = vec![
            ChainStep {
                task: "emit FOO".into(),
                agent: None,
                provider: None,
                model: None,
                tools: None,
                system_prompt: None,
                thinking: None,
            },
            ChainStep {
                task: "echo {previous}".into(),
                agent: None,
                provider: None,
                model: None,
                tools: None,
                system_prompt: None,
                thinking: None,
            },
        ];
        let catalog = AgentCatalog::default();
        let runner: Arc<dyn AgentRunner> = Arc::new(EchoPreviousRunner);
        let outcome = run_chain(&steps, &catalog, None, &runner, Arc::new(|_| {}), CancellationToken::new()).await;
        assert!(outcome.stopped_at.is_none());
        assert_eq!(outcome.results.last().unwrap().output, "echo emit FOO");
    }

    struct FailingRunner;

    #[async_trait]
    impl AgentRunner for FailingRunner {
        async fn run(&self, input: RunInput, _progress: Option<ProgressSink>, _cancel: CancellationToken) -> TaskResult {
            TaskResult {
                id: input.id,
                name: None,
                task: input.task,
                model: None,
                exit_code: 1,
                output: String::new(),
                full_output_path: None,
                stderr: String::new(),
                truncated: false,
                duration_ms: 0,
                usage: UsageStats::default(),
                error: Some("boom".into()),
                aborted: false,
                step: input.step,
            }
        }
    }

    #[tokio::test]
    async fn halts_at_the_first_failing_step() {
        let steps = vec![
            ChainStep {
                task: "first".into(),
                agent: None,
                provider: None,
                model: None,
                tools: None,
                system_prompt: None,
                thinking: None,
            },
            ChainStep {
                task: "second".into(),
                agent: None,
                provider: None,
                model: None,
                tools: None,
                system_prompt: None,
                thinking: None,
            },
        ];
        let catalog = AgentCatalog::default();
        let runner: Arc<dyn AgentRunner> = Arc::new(FailingRunner);
        let outcome = run_chain(&steps, &catalog, None, &runner, Arc::new(|_| {}), CancellationToken::new()).await;
        assert_eq!(outcome.stopped_at, Some(0));
        assert_eq!(outcome.results.len(), 1);
    }
}
