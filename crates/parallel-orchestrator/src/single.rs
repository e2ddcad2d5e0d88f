//! Single mode: one C1 call, direct return.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use parallel_executor::{AgentRunner, ProgressSink, RunInput};
use parallel_types::{AgentCatalog, ParallelParams, TaskResult};

use crate::settings_resolution;

pub async fn run_single(
    params: &ParallelParams,
    catalog: &AgentCatalog,
    shared_context: Option<String>,
    runner: &Arc<dyn AgentRunner>,
    progress: ProgressSink,
    cancel: CancellationToken,
) -> TaskResult {
    let effective = settings_resolution::resolve(
        params.agent.as_deref(),
        params.provider.clone(),
        params.model.clone(),
        params.tools.clone(),
        params.system_prompt.clone(),
        params.thinking.clone(),
        catalog,
    );

    let input = RunInput {
        id: "single".to_string(),
        name: None,
        task: params.task.clone().unwrap_or_default(),
        cwd: params.cwd.clone(),
        provider: effective.provider,
        model: effective.model,
        tools: effective.tools,
        system_prompt: effective.system_prompt,
        thinking: effective.thinking,
        context: shared_context,
        step: None,
    };

    runner.run(input, Some(progress), cancel).await
}
