//! Race Selector (C3): launch every candidate together, return the
//! first to succeed, and abort the rest.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use parallel_types::TaskResult;

pub struct RaceOutcome {
    pub winner_index: Option<usize>,
    pub winner: Option<TaskResult>,
    pub aborted: bool,
    /// Every result that did arrive, input-ordered; a race loser may be
    /// missing if it never observed its derived token in time to
    /// return a `TaskResult` — callers must not assume this is
    /// fully populated.
    pub all_results: Vec<Option<TaskResult>>,
}

/// Run every item concurrently; the first `TaskResult::succeeded()`
/// wins and every other item's derived token is cancelled immediately.
#[tracing::instrument(name = "race_selector", skip_all, fields(candidate_count = items.len()))]
pub async fn race_with_abort<T, F, Fut>(
    items: Vec<T>,
    worker: F,
    token: CancellationToken,
) -> RaceOutcome
where
    T: Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    let n = items.len();
    if n == 0 {
        return RaceOutcome {
            winner_index: None,
            winner: None,
            aborted: token.is_cancelled(),
            all_results: Vec::new(),
        };
    }

    let worker = Arc::new(worker);
    let mut join_set: JoinSet<(usize, TaskResult)> = JoinSet::new();
    let mut child_tokens: Vec<CancellationToken> = Vec::with_capacity(n);

    for (idx, item) in items.into_iter().enumerate() {
        let child = token.child_token();
        child_tokens.push(child.clone());
        let worker = worker.clone();
        join_set.spawn(async move {
            let result = worker(item, child).await;
            (idx, result)
        });
    }

    let mut all_results: Vec<Option<TaskResult>> = (0..n).map(|_| None).collect();
    let mut winner: Option<(usize, TaskResult)> = None;

    while let Some(joined) = join_set.join_next().await {
        let Ok((idx, result)) = joined else { continue };
        let succeeded = result.succeeded();
        all_results[idx] = Some(result.clone());
        if succeeded && winner.is_none() {
            winner = Some((idx, result));
            for (i, child) in child_tokens.iter().enumerate() {
                if i != idx {
                    child.cancel();
                }
            }
        }
    }

    match winner {
        Some((idx, result)) => RaceOutcome {
            winner_index: Some(idx),
            winner: Some(result),
            aborted: false,
            all_results,
        },
        None => RaceOutcome {
            winner_index: None,
            winner: None,
            aborted: true,
            all_results,
        },
    }
}
