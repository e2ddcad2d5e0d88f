//! Heuristic, length-capped (<=60 chars) formatting of a tool call's
//! arguments for display in `TaskProgress.current_tool_args`.

use serde_json::Value;

const MAX_PREVIEW: usize = 60;

pub fn preview_tool_args(tool: &str, args: &Value) -> String {
    let preview = match tool {
        "read" => preview_read(args),
        "write" => preview_write(args),
        "edit" => preview_edit(args),
        "bash" => str_field(args, "command").unwrap_or_default(),
        "grep" => preview_grep(args),
        "find" => preview_find(args),
        "mcp" => preview_mcp(args),
        "subagent" => preview_subagent(args),
        "todo" => preview_todo(args),
        _ => preview_fallback(args),
    };
    truncate_chars(&preview, MAX_PREVIEW)
}

fn preview_read(args: &Value) -> String {
    let path = elide_left(&str_field(args, "path").unwrap_or_default(), 50);
    let offset = args.get("offset").and_then(Value::as_i64);
    let limit = args.get("limit").and_then(Value::as_i64);
    match (offset, limit) {
        (Some(o), Some(l)) => format!("{path} [{o}-{}]", o + l),
        _ => path,
    }
}

fn preview_write(args: &Value) -> String {
    let path = truncate_chars(&str_field(args, "path").unwrap_or_default(), 40);
    let len = str_field(args, "content").map(|s| s.chars().count()).unwrap_or(0);
    format!("{path} ({len} chars)")
}

fn preview_edit(args: &Value) -> String {
    elide_left(&str_field(args, "path").unwrap_or_default(), 50)
}

fn preview_grep(args: &Value) -> String {
    let pattern = str_field(args, "pattern").unwrap_or_default();
    match str_field(args, "path") {
        Some(path) if !path.is_empty() => format!("{pattern} in {path}"),
        _ => pattern,
    }
}

fn preview_find(args: &Value) -> String {
    let path = str_field(args, "path").unwrap_or_default();
    match str_field(args, "name") {
        Some(name) if !name.is_empty() => format!("{path} -name \"{name}\""),
        _ => path,
    }
}

fn preview_mcp(args: &Value) -> String {
    for key in ["tool", "search", "server"] {
        if let Some(value) = str_field(args, key) {
            if !value.is_empty() {
                return format!("{key}: {value}");
            }
        }
    }
    String::new()
}

fn preview_subagent(args: &Value) -> String {
    match str_field(args, "task") {
        Some(task) if !task.is_empty() => truncate_chars(&task, 50),
        _ => match str_field(args, "agent") {
            Some(agent) => format!("agent:{agent}"),
            None => String::new(),
        },
    }
}

fn preview_todo(args: &Value) -> String {
    let label = str_field(args, "title")
        .or_else(|| str_field(args, "id"))
        .unwrap_or_default();
    format!("{}: {label}", str_field(args, "action").unwrap_or_default())
}

const FALLBACK_KEYS: &[&str] = &[
    "command", "path", "file", "pattern", "query", "url", "task", "prompt", "name", "action",
];

fn preview_fallback(args: &Value) -> String {
    for key in FALLBACK_KEYS {
        if let Some(value) = str_field(args, key) {
            if !value.is_empty() {
                return value;
            }
        }
    }
    if let Some(map) = args.as_object() {
        if let Some((key, value)) = map.iter().find(|(_, v)| v.is_string()) {
            return format!("{key}: {}", value.as_str().unwrap_or_default());
        }
    }
    String::new()
}

fn str_field(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn elide_left(path: &str, max: usize) -> String {
    if path.chars().count() <= max {
        return path.to_string();
    }
    let tail: String = path
        .chars()
        .rev()
        .take(max.saturating_sub(1))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("\u{2026}{tail}")
}
