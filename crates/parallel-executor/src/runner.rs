//! Agent Executor (C1): spawn one child agent subprocess, multiplex
//! its line-delimited JSON event stream into progress updates and
//! usage accounting, and return exactly one `TaskResult`. Never
//! raises on child-process failure — failure is expressed via
//! `exit_code != 0`/`error`, or `aborted = true`.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant as TokioInstant;
use tokio_util::sync::CancellationToken;

use parallel_types::{Settings, TaskProgress, TaskResult, TaskStatus, UsageStats};

use crate::event::{parse_event_line, ChildEvent, ContentPart, LineAccumulator};
use crate::output::shape_output;
use crate::prompt::{composite_prompt, SystemPromptFile};
use crate::tool_preview::preview_tool_args;

pub type ProgressSink = Arc<dyn Fn(TaskProgress) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct RunInput {
    pub id: String,
    pub name: Option<String>,
    pub task: String,
    pub cwd: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub tools: Option<Vec<String>>,
    pub system_prompt: Option<String>,
    pub thinking: Option<String>,
    pub context: Option<String>,
    pub step: Option<usize>,
}

/// Abstraction over "spawn one child and stream its events", so
/// schedulers (C2/C3/C5) can be exercised against a deterministic
/// stub instead of a real `pi` subprocess.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(
        &self,
        input: RunInput,
        progress: Option<ProgressSink>,
        cancel: CancellationToken,
    ) -> TaskResult;
}

pub struct SubprocessAgentRunner {
    pub settings: Settings,
}

impl SubprocessAgentRunner {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl AgentRunner for SubprocessAgentRunner {
    async fn run(
        &self,
        input: RunInput,
        progress: Option<ProgressSink>,
        cancel: CancellationToken,
    ) -> TaskResult {
        run_agent(&self.settings, input, progress, cancel).await
    }
}

/// Build the child command equivalent to:
/// `<bin> --mode json -p --no-session [--provider P] [--model M]
/// [--tools t1,t2] [--thinking V] [--append-system-prompt <file>] <prompt>`.
pub fn build_command(
    settings: &Settings,
    input: &RunInput,
    system_prompt_path: Option<&std::path::Path>,
    prompt: &str,
) -> Command {
    let mut command = Command::new(&settings.child_binary);
    command.args(["--mode", "json", "-p", "--no-session"]);
    if let Some(provider) = &input.provider {
        command.args(["--provider", provider]);
    }
    if let Some(model) = &input.model {
        command.args(["--model", model]);
    }
    if let Some(tools) = &input.tools {
        if !tools.is_empty() {
            command.args(["--tools", &tools.join(",")]);
        }
    }
    if let Some(thinking) = &input.thinking {
        command.args(["--thinking", thinking]);
    }
    if let Some(path) = system_prompt_path {
        command.args(["--append-system-prompt", &path.display().to_string()]);
    }
    command.arg(prompt);
    if let Some(cwd) = &input.cwd {
        command.current_dir(cwd);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command
}

fn safe_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

#[tracing::instrument(name = "agent_executor", skip_all, fields(task_id = %input.id, model = input.model.as_deref().unwrap_or("default")))]
pub async fn run_agent(
    settings: &Settings,
    input: RunInput,
    progress: Option<ProgressSink>,
    cancel: CancellationToken,
) -> TaskResult {
    let prompt = composite_prompt(input.context.as_deref(), &input.task);

    let system_prompt_file = match &input.system_prompt {
        Some(sp) if !sp.is_empty() => {
            match SystemPromptFile::write(&settings.temp_dir, &safe_id(&input.id), sp).await {
                Ok(file) => Some(file),
                Err(e) => {
                    return error_result(&input, format!("failed to write system prompt: {e}"));
                }
            }
        }
        _ => None,
    };

    let command = build_command(
        settings,
        &input,
        system_prompt_file.as_ref().map(|f| f.path.as_path()),
        &prompt,
    );

    let result = run_agent_with_command(command, input, progress, cancel, settings).await;

    if let Some(file) = system_prompt_file {
        file.cleanup().await;
    }

    result
}

fn error_result(input: &RunInput, message: String) -> TaskResult {
    TaskResult {
        id: input.id.clone(),
        name: input.name.clone(),
        task: input.task.clone(),
        model: input.model.clone(),
        exit_code: 1,
        output: String::new(),
        full_output_path: None,
        stderr: String::new(),
        truncated: false,
        duration_ms: 0,
        usage: UsageStats::default(),
        error: Some(message),
        aborted: false,
        step: input.step,
    }
}

fn emit(progress: &Option<ProgressSink>, state: &TaskProgress) {
    if let Some(sink) = progress {
        sink(state.clone());
    }
}

fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Core event loop, decoupled from command construction so tests can
/// drive a real (but fake) child process without needing the actual
/// `pi` binary on PATH.
pub async fn run_agent_with_command(
    mut command: Command,
    input: RunInput,
    progress: Option<ProgressSink>,
    cancel: CancellationToken,
    settings: &Settings,
) -> TaskResult {
    let start = Instant::now();
    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => {
            return error_result(&input, e.to_string());
        }
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    let stdout_task = stdout.map(|mut stdout| {
        tokio::spawn(async move {
            let mut acc = LineAccumulator::new();
            let mut buf = [0u8; 4096];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        for line in acc.feed(&buf[..n]) {
                            if line_tx.send(line).is_err() {
                                return;
                            }
                        }
                    }
                    Err(_) => break,
                }
            }
            if let Some(last) = acc.flush() {
                let _ = line_tx.send(last);
            }
        })
    });

    let stderr_task = stderr.map(|mut stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        })
    });

    let mut progress_state = TaskProgress::new(input.id.clone(), input.task.clone(), input.model.clone());
    progress_state.name = input.name.clone();
    progress_state.status = TaskStatus::Running;
    emit(&progress, &progress_state);

    let mut usage = UsageStats::default();
    let mut last_text: Option<String> = None;
    let mut api_error: Option<String> = None;
    let mut aborted = false;
    let mut grace_deadline: Option<TokioInstant> = None;
    let mut exit_code_result: Option<i32> = None;
    let mut stdout_closed = stdout_task.is_none();

    loop {
        if exit_code_result.is_some() {
            break;
        }
        let sleep_fut = async {
            match grace_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled(), if grace_deadline.is_none() && !aborted => {
                aborted = true;
                progress_state.status = TaskStatus::Aborted;
                progress_state.duration_ms = start.elapsed().as_millis() as u64;
                emit(&progress, &progress_state);
                soft_terminate(&child);
                grace_deadline = Some(TokioInstant::now() + Duration::from_millis(settings.approval_grace_ms));
            }
            _ = sleep_fut, if grace_deadline.is_some() => {
                let _ = child.start_kill();
                grace_deadline = None;
            }
            maybe_line = line_rx.recv(), if !stdout_closed => {
                match maybe_line {
                    Some(line) => handle_line(
                        &line,
                        &mut usage,
                        &mut last_text,
                        &mut api_error,
                        &mut progress_state,
                        &progress,
                        start,
                    ),
                    None => stdout_closed = true,
                }
            }
            status = child.wait() => {
                exit_code_result = Some(match status {
                    Ok(s) => s.code().unwrap_or(-1),
                    Err(_) => -1,
                });
            }
        }
    }

    // Join the reader task so every line it already read is queued up,
    // then drain whatever arrived right before the child exited.
    if let Some(task) = stdout_task {
        let _ = task.await;
    }
    while let Ok(line) = line_rx.try_recv() {
        handle_line(
            &line,
            &mut usage,
            &mut last_text,
            &mut api_error,
            &mut progress_state,
            &progress,
            start,
        );
    }

    let stderr_text = if let Some(task) = stderr_task {
        task.await.unwrap_or_default()
    } else {
        String::new()
    };

    let mut exit_code = exit_code_result.unwrap();
    let mut error: Option<String> = None;

    if !aborted {
        if exit_code != 0 {
            error = Some(if !stderr_text.is_empty() {
                stderr_text.clone()
            } else {
                format!("Exit code: {exit_code}")
            });
        } else if let Some(api_err) = api_error.clone() {
            exit_code = 1;
            error = Some(api_err);
        }
    }

    let shaped = shape_output(last_text.as_deref().unwrap_or(""), settings);

    progress_state.status = if aborted {
        TaskStatus::Aborted
    } else if exit_code == 0 && error.is_none() {
        TaskStatus::Completed
    } else {
        TaskStatus::Failed
    };
    progress_state.duration_ms = start.elapsed().as_millis() as u64;
    progress_state.tokens = usage;
    emit(&progress, &progress_state);

    TaskResult {
        id: input.id,
        name: input.name,
        task: input.task,
        model: input.model,
        exit_code,
        output: shaped.text,
        full_output_path: None,
        stderr: stderr_text,
        truncated: shaped.truncated,
        duration_ms: progress_state.duration_ms,
        usage,
        error,
        aborted,
        step: input.step,
    }
}

fn handle_line(
    line: &str,
    usage: &mut UsageStats,
    last_text: &mut Option<String>,
    api_error: &mut Option<String>,
    progress_state: &mut TaskProgress,
    progress: &Option<ProgressSink>,
    start: Instant,
) {
    let Some(event) = parse_event_line(line) else {
        return;
    };
    match event {
        ChildEvent::MessageEnd { message } if message.role == "assistant" => {
            usage.turns += 1;
            if let Some(u) = &message.usage {
                usage.input += u.input;
                usage.output += u.output;
                usage.cache_read += u.cache_read;
                usage.cache_write += u.cache_write;
                usage.cost += u.cost.as_ref().map(|c| c.total).unwrap_or(0.0);
                if u.total_tokens > 0 {
                    usage.context_tokens = u.total_tokens;
                }
            }
            for part in &message.content {
                if let ContentPart::Text { text } = part {
                    *last_text = Some(text.clone());
                    progress_state.push_recent_output(truncate_preview(text, 100));
                }
            }
            if message.stop_reason.as_deref() == Some("error") {
                if let Some(err) = &message.error_message {
                    if !err.is_empty() {
                        *api_error = Some(err.clone());
                    }
                }
            }
            progress_state.tokens = *usage;
            progress_state.duration_ms = start.elapsed().as_millis() as u64;
            emit(progress, progress_state);
        }
        ChildEvent::ToolExecutionStart { tool, args } => {
            progress_state.current_tool_args = Some(preview_tool_args(&tool, &args));
            progress_state.current_tool = Some(tool);
            progress_state.duration_ms = start.elapsed().as_millis() as u64;
            emit(progress, progress_state);
        }
        ChildEvent::ToolExecutionEnd { tool, args } => {
            let preview = preview_tool_args(&tool, &args);
            progress_state.push_recent_tool(tool, preview);
            progress_state.tool_count += 1;
            progress_state.current_tool = None;
            progress_state.current_tool_args = None;
            progress_state.duration_ms = start.elapsed().as_millis() as u64;
            emit(progress, progress_state);
        }
        ChildEvent::ToolResultEnd { .. } => {
            progress_state.duration_ms = start.elapsed().as_millis() as u64;
            emit(progress, progress_state);
        }
        _ => {}
    }
}

#[cfg(unix)]
fn soft_terminate(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
}

#[cfg(not(unix))]
fn soft_terminate(_child: &Child) {
    // No graceful-termination signal outside unix; the grace-period
    // timer below still escalates to a hard kill.
}
