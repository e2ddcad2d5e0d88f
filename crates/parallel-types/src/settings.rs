use std::path::PathBuf;

/// Process-wide tunables for the orchestrator. Loaded once from the
/// environment with compiled-in defaults; never from a project/global
/// config file — this crate has no persisted, per-project state of
/// its own.
#[derive(Debug, Clone)]
pub struct Settings {
    pub max_concurrency_ceiling: usize,
    pub default_concurrency: usize,
    pub max_output_lines: usize,
    pub max_output_bytes: usize,
    pub child_binary: String,
    pub approval_grace_ms: u64,
    pub temp_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrency_ceiling: 8,
            default_concurrency: 4,
            max_output_lines: 2000,
            max_output_bytes: 50 * 1024,
            child_binary: "pi".to_string(),
            approval_grace_ms: 5000,
            temp_dir: std::env::temp_dir(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let mut settings = Settings::default();
        if let Some(v) = env_usize("PI_PARALLEL_MAX_CONCURRENCY") {
            settings.max_concurrency_ceiling = v;
        }
        if let Some(v) = env_usize("PI_PARALLEL_DEFAULT_CONCURRENCY") {
            settings.default_concurrency = v;
        }
        if let Some(v) = env_usize("PI_PARALLEL_MAX_OUTPUT_LINES") {
            settings.max_output_lines = v;
        }
        if let Some(v) = env_usize("PI_PARALLEL_MAX_OUTPUT_BYTES") {
            settings.max_output_bytes = v;
        }
        if let Ok(v) = std::env::var("PI_PARALLEL_CHILD_BIN") {
            if !v.is_empty() {
                settings.child_binary = v;
            }
        }
        if let Some(v) = env_u64("PI_PARALLEL_APPROVAL_GRACE_MS") {
            settings.approval_grace_ms = v;
        }
        settings
    }

    /// Clamp a caller-requested concurrency to `[1, ceiling, item_count]`.
    pub fn clamp_concurrency(&self, requested: usize, item_count: usize) -> usize {
        requested
            .max(1)
            .min(self.max_concurrency_ceiling)
            .min(item_count.max(1))
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_concurrency_respects_ceiling_and_item_count() {
        let settings = Settings::default();
        assert_eq!(settings.clamp_concurrency(100, 3), 3);
        assert_eq!(settings.clamp_concurrency(100, 100), 8);
        assert_eq!(settings.clamp_concurrency(0, 100), 1);
    }
}
