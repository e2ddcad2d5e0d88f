//! Race mode: run the same task across every candidate model, return
//! the first success, and surface every other candidate's terminal
//! progress state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use parallel_executor::{AgentRunner, ProgressSink, RunInput};
use parallel_scheduler::{race_with_abort, RaceOutcome};
use parallel_types::{RaceSpec, TaskProgress};

use crate::progress_collector::ProgressCollector;

/// Run `race.models` concurrently via C3, seeding a `pending` progress
/// entry for every candidate before any of them starts so the caller
/// always sees an entry per model, win or lose.
pub async fn run_race(
    race: &RaceSpec,
    shared_context: Option<String>,
    runner: &Arc<dyn AgentRunner>,
    collector: &ProgressCollector,
    external_progress: Option<ProgressSink>,
    cancel: CancellationToken,
) -> RaceOutcome {
    let sink = collector.sink(external_progress);

    let items: Vec<(String, String)> = race
        .models
        .iter()
        .enumerate()
        .map(|(i, model)| (format!("race-{i}"), model.clone()))
        .collect();

    for (id, model) in &items {
        sink(TaskProgress::new(id.clone(), race.task.clone(), Some(model.clone())));
    }

    let race = race.clone();
    let runner = runner.clone();
    let shared_context = shared_context.clone();

    race_with_abort(
        items,
        move |(id, model), token| {
            let race = race.clone();
            let runner = runner.clone();
            let sink = sink.clone();
            let shared_context = shared_context.clone();
            async move {
                let input = RunInput {
                    id,
                    name: None,
                    task: race.task.clone(),
                    cwd: None,
                    provider: race.provider.clone(),
                    model: Some(model),
                    tools: race.tools.clone(),
                    system_prompt: race.system_prompt.clone(),
                    thinking: race.thinking.clone(),
                    context: shared_context,
                    step: None,
                };
                runner.run(input, Some(sink), token).await
            }
        },
        cancel,
    )
    .await
}
