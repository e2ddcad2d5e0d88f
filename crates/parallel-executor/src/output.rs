//! Output shaping (C8): a single cap per `TaskResult` — at most
//! `max_output_lines` lines AND at most `max_output_bytes` bytes.
//!
//! The line cap is applied first (keep the newest lines), then the
//! byte cap is applied by bisecting the remaining string in half
//! until it fits. The bisection is lossy and can split a UTF-8
//! code point; we re-align to the nearest following boundary rather
//! than pretend the cut is line-aligned.

use parallel_types::Settings;

#[derive(Debug, Clone)]
pub struct ShapedOutput {
    pub text: String,
    pub truncated: bool,
}

pub fn shape_output(raw: &str, settings: &Settings) -> ShapedOutput {
    let mut truncated = false;
    let mut text = cap_lines(raw, settings.max_output_lines, &mut truncated);
    cap_bytes(&mut text, settings.max_output_bytes, &mut truncated);
    ShapedOutput { text, truncated }
}

fn cap_lines(raw: &str, max_lines: usize, truncated: &mut bool) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    if lines.len() <= max_lines {
        return raw.to_string();
    }
    *truncated = true;
    let start = lines.len() - max_lines;
    lines[start..].join("\n")
}

fn cap_bytes(text: &mut String, max_bytes: usize, truncated: &mut bool) {
    while text.len() > max_bytes {
        *truncated = true;
        let cut = text.len().saturating_sub(text.len() / 2);
        let aligned = realign_to_char_boundary(text, cut);
        *text = text.split_off(aligned);
    }
}

fn realign_to_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx.min(s.len())
}

/// Markdown-assembly spill threshold: outputs longer than this are
/// summarized inline with a pointer to a spilled file (see
/// `spill_if_long`).
pub const SPILL_THRESHOLD_CHARS: usize = 2000;

pub struct SpillResult {
    pub inline_text: String,
    pub full_output_path: Option<String>,
}

/// If `output` exceeds `SPILL_THRESHOLD_CHARS`, write the full text to
/// `<temp_dir>/<prefix>-<safe_name>-<epoch_ms>.md` and return the
/// first 2000 chars plus a pointer; on write failure, fall back to
/// in-line truncation only.
pub fn spill_if_long(
    output: &str,
    prefix: &str,
    safe_name: &str,
    epoch_ms: u64,
    temp_dir: &std::path::Path,
) -> SpillResult {
    if output.chars().count() <= SPILL_THRESHOLD_CHARS {
        return SpillResult {
            inline_text: output.to_string(),
            full_output_path: None,
        };
    }
    let head: String = output.chars().take(SPILL_THRESHOLD_CHARS).collect();
    let file_name = format!("{prefix}-{safe_name}-{epoch_ms}.md");
    let path = temp_dir.join(&file_name);
    match std::fs::write(&path, output) {
        Ok(()) => SpillResult {
            inline_text: format!(
                "{head}\n\n... (truncated, full output written to {})",
                path.display()
            ),
            full_output_path: Some(path.display().to_string()),
        },
        Err(_) => SpillResult {
            inline_text: head,
            full_output_path: None,
        },
    }
}

/// Sanitize a free-form name into a filesystem-safe fragment.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        "task".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_cap_keeps_newest_lines() {
        let raw = (0..2500).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let mut truncated = false;
        let capped = cap_lines(&raw, 2000, &mut truncated);
        assert!(truncated);
        let lines: Vec<&str> = capped.split('\n').collect();
        assert_eq!(lines.len(), 2000);
        assert_eq!(lines[0], "500");
        assert_eq!(lines.last().unwrap(), &"2499");
    }

    #[test]
    fn line_cap_noop_under_limit() {
        let raw = "a\nb\nc";
        let mut truncated = false;
        let capped = cap_lines(raw, 2000, &mut truncated);
        assert!(!truncated);
        assert_eq!(capped, raw);
    }

    #[test]
    fn byte_cap_bisects_until_under_limit() {
        let mut text = "x".repeat(200_000);
        let mut truncated = false;
        cap_bytes(&mut text, 50 * 1024, &mut truncated);
        assert!(truncated);
        assert!(text.len() <= 50 * 1024);
    }

    #[test]
    fn byte_cap_realigns_utf8_boundary() {
        // Multi-byte chars clustered near the midpoint of the string.
        let mut text = format!("{}{}", "a".repeat(60_000), "é".repeat(5000));
        let before_len = text.len();
        let mut truncated = false;
        cap_bytes(&mut text, 50 * 1024, &mut truncated);
        assert!(truncated);
        assert!(text.len() < before_len);
        // Must still be valid UTF-8 (would panic on an unaligned split).
        assert!(std::str::from_utf8(text.as_bytes()).is_ok());
    }

    #[test]
    fn shape_output_sets_truncated_only_when_a_cap_fires() {
        let settings = Settings::default();
        let shaped = shape_output("short output", &settings);
        assert!(!shaped.truncated);
        assert_eq!(shaped.text, "short output");
    }

    #[test]
    fn spill_if_long_writes_file_and_returns_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let long = "y".repeat(5000);
        let result = spill_if_long(&long, "parallel", "task-1", 12345, dir.path());
        assert!(result.full_output_path.is_some());
        assert!(result.inline_text.contains("truncated"));
        let path = result.full_output_path.unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents, long);
    }

    #[test]
    fn spill_if_long_short_output_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let result = spill_if_long("short", "parallel", "task-1", 1, dir.path());
        assert!(result.full_output_path.is_none());
        assert_eq!(result.inline_text, "short");
    }

    #[test]
    fn sanitize_name_replaces_unsafe_chars() {
        assert_eq!(sanitize_name("my task/1"), "my-task-1");
        assert_eq!(sanitize_name(""), "task");
    }
}
