//! Bounded Worker Pool (C2): map a task list over an async worker with
//! at most `K` in flight at once, preserving input order in the
//! result array.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use parallel_types::TaskResult;

/// Hard ceiling on concurrency regardless of what a caller requests.
pub const MAX_CONCURRENCY: usize = 8;

pub struct PoolOutcome {
    pub results: Vec<Option<TaskResult>>,
    pub aborted: bool,
}

/// Run `worker` over every item in `items`, never more than
/// `min(requested_concurrency, MAX_CONCURRENCY, items.len())` at once.
/// A position whose worker never started (cancelled first) or whose
/// task join failed stays `None`; the caller filters those out.
#[tracing::instrument(name = "worker_pool", skip_all, fields(item_count = items.len(), requested_concurrency))]
pub async fn map_with_concurrency_limit<T, F, Fut>(
    items: Vec<T>,
    requested_concurrency: usize,
    worker: F,
    token: CancellationToken,
) -> PoolOutcome
where
    T: Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    let n = items.len();
    if n == 0 {
        return PoolOutcome {
            results: Vec::new(),
            aborted: token.is_cancelled(),
        };
    }

    let k = requested_concurrency.max(1).min(MAX_CONCURRENCY).min(n);
    let semaphore = Arc::new(Semaphore::new(k));
    let worker = Arc::new(worker);
    let mut join_set: JoinSet<(usize, TaskResult)> = JoinSet::new();
    let mut results: Vec<Option<TaskResult>> = (0..n).map(|_| None).collect();

    let mut items = items.into_iter().enumerate();
    'launch: loop {
        if token.is_cancelled() {
            break 'launch;
        }
        let (idx, item) = match items.next() {
            Some(pair) => pair,
            None => break 'launch,
        };

        let permit = tokio::select! {
            biased;
            _ = token.cancelled() => break 'launch,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break 'launch,
            },
        };

        let worker = worker.clone();
        let item_token = token.child_token();
        join_set.spawn(async move {
            let _permit = permit;
            let result = worker(item, item_token).await;
            (idx, result)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        if let Ok((idx, result)) = joined {
            results[idx] = Some(result);
        }
    }

    PoolOutcome {
        results,
        aborted: token.is_cancelled(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ok_result(id: &str) -> TaskResult {
        TaskResult {
            id: id.to_string(),
            name: None,
            task: id.to_string(),
            model: None,
            exit_code: 0,
            output: id.to_string(),
            full_output_path: None,
            stderr: String::new(),
            truncated: false,
            duration_ms: 0,
            usage: Default::default(),
            error: None,
            aborted: false,
            step: None,
        }
    }

    #[tokio::test]
    async fn preserves_input_order_regardless_of_completion_order() {
        let items = vec![("a", 30u64), ("b", 5u64), ("c", 15u64)];
        let outcome = map_with_concurrency_limit(
            items,
            8,
            |(name, delay_ms), _token| async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                ok_result(name)
            },
            CancellationToken::new(),
        )
        .await;

        assert!(!outcome.aborted);
        let ids: Vec<&str> = outcome
            .results
            .iter()
            .map(|r| r.as_ref().unwrap().id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn never_exceeds_concurrency_cap() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..10).collect();

        let active_clone = active.clone();
        let max_seen_clone = max_seen.clone();
        let outcome = map_with_concurrency_limit(
            items,
            3,
            move |idx, _token| {
                let active = active_clone.clone();
                let max_seen = max_seen_clone.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    ok_result(&idx.to_string())
                }
            },
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.results.len(), 10);
        assert!(max_seen.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn requested_concurrency_is_clamped_to_max_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..20).collect();

        let active_clone = active.clone();
        let max_seen_clone = max_seen.clone();
        map_with_concurrency_limit(
            items,
            100,
            move |_idx, _token| {
                let active = active_clone.clone();
                let max_seen = max_seen_clone.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    ok_result("x")
                }
            },
            CancellationToken::new(),
        )
        .await;

        assert!(max_seen.load(Ordering::SeqCst) <= MAX_CONCURRENCY);
    }

    #[tokio::test]
    async fn cancellation_stops_launching_new_workers() {
        let launched = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let items: Vec<usize> = (0..10).collect();
        let launched_clone = launched.clone();
        let token_clone = token.clone();

        let outcome = map_with_concurrency_limit(
            items,
            1,
            move |idx, _task_token| {
                let launched = launched_clone.clone();
                let token = token_clone.clone();
                async move {
                    launched.fetch_add(1, Ordering::SeqCst);
                    if idx == 0 {
                        token.cancel();
                    }
                    ok_result(&idx.to_string())
                }
            },
            token,
        )
        .await;

        assert!(outcome.aborted);
        assert!(launched.load(Ordering::SeqCst) < 10);
        assert!(outcome.results.iter().any(|r| r.is_none()));
    }

    #[tokio::test]
    async fn empty_items_returns_empty_results() {
        let outcome = map_with_concurrency_limit(
            Vec::<usize>::new(),
            4,
            |_idx: usize, _token| async move { ok_result("unused") },
            CancellationToken::new(),
        )
        .await;
        assert!(outcome.results.is_empty());
        assert!(!outcome.aborted);
    }
}
