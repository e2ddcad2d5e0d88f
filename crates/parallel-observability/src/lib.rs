//! Tracing setup and log-safe redaction for the `parallel` orchestrator.
//!
//! A JSON-lines rolling file sink plus a compact console sink, gated
//! by `RUST_LOG`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Serialize)]
pub struct LoggingInitInfo {
    pub logs_dir: String,
    pub prefix: String,
    pub retention_days: u64,
    pub initialized_at: DateTime<Utc>,
}

/// Initialize process-wide logging: JSON file sink (daily rotation,
/// pruned past `retention_days`) plus a compact console sink, filtered
/// by `RUST_LOG` (default `info`).
pub fn init_process_logging(
    logs_dir: &Path,
    retention_days: u64,
) -> anyhow::Result<(WorkerGuard, LoggingInitInfo)> {
    fs::create_dir_all(logs_dir)?;
    cleanup_old_jsonl(logs_dir, retention_days)?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("parallel")
        .filename_suffix("jsonl")
        .build(logs_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_current_span(false)
        .with_span_list(false);

    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(true)
        .with_ansi(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();

    let info = LoggingInitInfo {
        logs_dir: logs_dir.display().to_string(),
        prefix: "parallel".to_string(),
        retention_days,
        initialized_at: Utc::now(),
    };

    Ok((guard, info))
}

fn cleanup_old_jsonl(logs_dir: &Path, retention_days: u64) -> anyhow::Result<()> {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
    let prefix = "parallel.";

    for entry in fs::read_dir(logs_dir)? {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(prefix) || !name.ends_with(".jsonl") {
            continue;
        }
        let date_part = name.trim_start_matches(prefix).trim_end_matches(".jsonl");
        let Ok(date) = chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d") else {
            continue;
        };
        let Some(dt) = date.and_hms_opt(0, 0, 0) else {
            continue;
        };
        if DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc) < cutoff {
            let _ = fs::remove_file(path);
        }
    }
    Ok(())
}

pub fn canonical_logs_dir_from_root(root: &Path) -> PathBuf {
    root.join("logs")
}

/// Mask raw text (task prompts, child stdout) before it is logged at
/// `debug`+: only a length and a stable hash are retained, never
/// content.
pub fn redact_text(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("[redacted len={} sha={}]", trimmed.len(), short_hash(trimmed))
}

fn short_hash(input: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    input.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_text_masks_content() {
        let raw = "the task is: delete all customer records";
        let redacted = redact_text(raw);
        assert!(redacted.contains("[redacted len="));
        assert!(!redacted.contains("customer"));
    }

    #[test]
    fn redact_text_empty_input_is_empty() {
        assert_eq!(redact_text("   "), "");
    }

    #[test]
    fn canonical_logs_dir_joins_logs_folder() {
        let root = PathBuf::from("/tmp/parallel-state");
        assert_eq!(
            canonical_logs_dir_from_root(&root),
            PathBuf::from("/tmp/parallel-state").join("logs")
        );
    }

    #[test]
    fn cleanup_removes_only_expired_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("parallel.2000-01-01.jsonl");
        fs::write(&stale, "{}").unwrap();
        let unrelated = dir.path().join("notes.txt");
        fs::write(&unrelated, "keep me").unwrap();
        cleanup_old_jsonl(dir.path(), 7).unwrap();
        assert!(!stale.exists());
        assert!(unrelated.exists());
    }
}
