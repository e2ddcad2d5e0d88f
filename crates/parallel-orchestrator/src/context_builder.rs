//! Shared-context assembly: free-form `context`, inlined
//! `contextFiles`, and optional `gitContext` sections, built once per
//! dispatcher call and handed to every task in parallel/team mode.

use parallel_types::{GitContextOptions, GitContextSpec};
use tokio::process::Command;

async fn run_git(cwd: Option<&str>, args: &[&str]) -> Option<String> {
    let mut command = Command::new("git");
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    let output = command.output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

async fn git_section(cwd: Option<&str>, options: &GitContextOptions) -> String {
    let mut sections = Vec::new();

    if options.branch {
        if let Some(branch) = run_git(cwd, &["rev-parse", "--abbrev-ref", "HEAD"]).await {
            sections.push(format!("Branch: {branch}"));
        }
    }
    if options.status {
        if let Some(status) = run_git(cwd, &["status", "--short"]).await {
            sections.push(format!("Status:\n{status}"));
        }
    }
    if options.diff {
        if let Some(diff) = run_git(cwd, &["diff"]).await {
            sections.push(format!("Diff:\n{diff}"));
        }
    }
    if options.diff_stats {
        if let Some(stats) = run_git(cwd, &["diff", "--stat"]).await {
            sections.push(format!("Diff stats:\n{stats}"));
        }
    }
    if let Some(n) = options.log {
        let n_arg = format!("-{n}");
        if let Some(log) = run_git(cwd, &["log", &n_arg, "--oneline"]).await {
            sections.push(format!("Log (last {n}):\n{log}"));
        }
    }

    if sections.is_empty() {
        String::new()
    } else {
        format!("## Git Context\n\n{}", sections.join("\n\n"))
    }
}

fn default_git_options() -> GitContextOptions {
    GitContextOptions {
        branch: true,
        diff: false,
        diff_stats: false,
        log: None,
        status: true,
    }
}

async fn context_files_section(paths: &[String]) -> String {
    let mut sections = Vec::new();
    for path in paths {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => sections.push(format!("## File: {path}\n\n{contents}")),
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "failed to read context file");
            }
        }
    }
    sections.join("\n\n---\n\n")
}

/// Build the shared context string once for the whole call: free-form
/// `context`, then inlined `contextFiles`, then an optional git
/// snapshot. Empty sections are omitted.
pub async fn build_shared_context(
    context: Option<&str>,
    context_files: Option<&[String]>,
    git_context: Option<&GitContextSpec>,
    cwd: Option<&str>,
) -> String {
    let mut sections = Vec::new();

    if let Some(ctx) = context {
        if !ctx.is_empty() {
            sections.push(ctx.to_string());
        }
    }

    if let Some(paths) = context_files {
        let files = context_files_section(paths).await;
        if !files.is_empty() {
            sections.push(files);
        }
    }

    match git_context {
        Some(GitContextSpec::Enabled(true)) => {
            let git = git_section(cwd, &default_git_options()).await;
            if !git.is_empty() {
                sections.push(git);
            }
        }
        Some(GitContextSpec::Enabled(false)) | None => {}
        Some(GitContextSpec::Options(options)) => {
            let git = git_section(cwd, options).await;
            if !git.is_empty() {
                sections.push(git);
            }
        }
    }

    sections.join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_context_passes_through_verbatim() {
        let out = build_shared_context(Some("shared notes"), None, None, None).await;
        assert_eq!(out, "shared notes");
    }

    #[tokio::test]
    async fn git_context_false_adds_nothing() {
        let out = build_shared_context(Some("x"), None, Some(&GitContextSpec::Enabled(false)), None).await;
        assert_eq!(out, "x");
    }

    #[tokio::test]
    async fn inlines_context_files_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        tokio::fs::write(&path, "hello").await.unwrap();
        let out = build_shared_context(None, Some(&[path.display().to_string()]), None, None).await;
        assert!(out.contains("## File:"));
        assert!(out.contains("hello"));
    }

    #[tokio::test]
    async fn missing_context_file_is_skipped_not_fatal() {
        let out = build_shared_context(None, Some(&["/no/such/file".to_string()]), None, None).await;
        assert_eq!(out, "");
    }
}
