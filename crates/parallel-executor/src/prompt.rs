//! Composite prompt construction and the private system-prompt temp
//! file (written so its path, not its content, crosses the process
//! boundary on the command line).

use std::path::PathBuf;

use uuid::Uuid;

/// Build `"<context>\n\nTask: <task>"` when context is non-empty, or
/// just `"Task: <task>"` otherwise.
pub fn composite_prompt(context: Option<&str>, task: &str) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() => format!("{ctx}\n\nTask: {task}"),
        _ => format!("Task: {task}"),
    }
}

pub struct SystemPromptFile {
    dir: PathBuf,
    pub path: PathBuf,
}

impl SystemPromptFile {
    /// Write `content` to a freshly created private-mode temp file
    /// under `<temp_dir>/pi-parallel-<uuid>/prompt-<safe_id>.md`.
    pub async fn write(temp_dir: &std::path::Path, safe_id: &str, content: &str) -> anyhow::Result<Self> {
        let dir = temp_dir.join(format!("pi-parallel-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await?;
        set_owner_only(&dir)?;
        let path = dir.join(format!("prompt-{safe_id}.md"));
        tokio::fs::write(&path, content).await?;
        set_owner_only(&path)?;
        Ok(Self { dir, path })
    }

    /// Remove the temp file and its containing directory. Called on
    /// every exit path (success, failure, or abort).
    pub async fn cleanup(self) {
        let _ = tokio::fs::remove_dir_all(&self.dir).await;
    }
}

#[cfg(unix)]
fn set_owner_only(path: &std::path::Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = std::fs::metadata(path)?;
    let mut perms = metadata.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &std::path::Path) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_prompt_includes_context_when_present() {
        let prompt = composite_prompt(Some("background info"), "do the thing");
        assert_eq!(prompt, "background info\n\nTask: do the thing");
    }

    #[test]
    fn composite_prompt_omits_context_when_empty() {
        assert_eq!(composite_prompt(Some(""), "do it"), "Task: do it");
        assert_eq!(composite_prompt(None, "do it"), "Task: do it");
    }

    #[tokio::test]
    async fn system_prompt_file_is_written_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let file = SystemPromptFile::write(dir.path(), "abc123", "You are helpful.")
            .await
            .unwrap();
        let contents = tokio::fs::read_to_string(&file.path).await.unwrap();
        assert_eq!(contents, "You are helpful.");
        let parent = file.path.parent().unwrap().to_path_buf();
        file.cleanup().await;
        assert!(!parent.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_prompt_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let file = SystemPromptFile::write(dir.path(), "abc", "secret").await.unwrap();
        let mode = tokio::fs::metadata(&file.path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        file.cleanup().await;
    }
}
