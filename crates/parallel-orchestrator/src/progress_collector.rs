//! Wraps a caller-supplied `ProgressSink` so the dispatcher can also
//! keep its own coherent snapshot to embed in the response (`dagInfo`
//! and the Markdown tool-usage roll-up both read from this, not from
//! the caller's sink).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use parallel_executor::ProgressSink;
use parallel_types::TaskProgress;

#[derive(Clone)]
pub struct ProgressCollector {
    snapshots: Arc<Mutex<HashMap<String, TaskProgress>>>,
}

impl ProgressCollector {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Build a sink that records every update here and, if `external`
    /// is set, forwards it too. Serialized behind a single mutex since
    /// updates can arrive from concurrently running tasks.
    pub fn sink(&self, external: Option<ProgressSink>) -> ProgressSink {
        let snapshots = self.snapshots.clone();
        Arc::new(move |progress: TaskProgress| {
            snapshots
                .lock()
                .unwrap()
                .insert(progress.id.clone(), progress.clone());
            if let Some(sink) = &external {
                sink(progress);
            }
        })
    }

    pub fn get(&self, id: &str) -> Option<TaskProgress> {
        self.snapshots.lock().unwrap().get(id).cloned()
    }

    pub fn snapshot_all(&self) -> Vec<TaskProgress> {
        let map = self.snapshots.lock().unwrap();
        let mut entries: Vec<TaskProgress> = map.values().cloned().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }
}

impl Default for ProgressCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallel_types::TaskStatus;

    #[test]
    fn records_the_latest_snapshot_per_task_id() {
        let collector = ProgressCollector::new();
        let sink = collector.sink(None);
        let mut p = TaskProgress::new("t1", "do it", None);
        p.status = TaskStatus::Running;
        sink(p.clone());
        p.status = TaskStatus::Completed;
        sink(p);
        assert_eq!(collector.get("t1").unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn forwards_to_an_external_sink_when_present() {
        let collector = ProgressCollector::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let external: ProgressSink = Arc::new(move |p: TaskProgress| {
            seen_clone.lock().unwrap().push(p.id);
        });
        let sink = collector.sink(Some(external));
        sink(TaskProgress::new("t2", "x", None));
        assert_eq!(seen.lock().unwrap().as_slice(), ["t2".to_string()]);
    }
}
