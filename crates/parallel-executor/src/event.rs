//! Line-delimited JSON event protocol emitted by the child agent on
//! stdout. Unparseable lines and unrecognized `type`s are ignored.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ChildEvent {
    #[serde(rename = "message_end")]
    MessageEnd { message: Message },
    #[serde(rename = "tool_execution_start")]
    ToolExecutionStart {
        tool: String,
        #[serde(default)]
        args: Value,
    },
    #[serde(rename = "tool_execution_end")]
    ToolExecutionEnd {
        tool: String,
        #[serde(default)]
        args: Value,
    },
    #[serde(rename = "tool_result_end")]
    ToolResultEnd { message: Message },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Message {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(default)]
    pub usage: Option<MessageUsage>,
    #[serde(default, rename = "stopReason")]
    pub stop_reason: Option<String>,
    #[serde(default, rename = "errorMessage")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MessageUsage {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default, rename = "cacheRead")]
    pub cache_read: u64,
    #[serde(default, rename = "cacheWrite")]
    pub cache_write: u64,
    #[serde(default)]
    pub cost: Option<CostInfo>,
    #[serde(default, rename = "totalTokens")]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CostInfo {
    #[serde(default)]
    pub total: f64,
}

/// Parse one stdout line into an event; returns `None` for blank or
/// unparseable lines (discarded silently per the protocol).
pub fn parse_event_line(line: &str) -> Option<ChildEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Incrementally accumulate bytes from a child stream and split on
/// newline boundaries. The child may emit partial lines across stdout
/// buffers; only the tail is processed on stream close.
#[derive(Debug, Default)]
pub struct LineAccumulator {
    buf: Vec<u8>,
}

impl LineAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning any complete lines found.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]).to_string();
            lines.push(line);
        }
        lines
    }

    /// Flush whatever remains as a final (possibly partial) line,
    /// called when the stream closes.
    pub fn flush(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let remaining = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&remaining).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_message_end_assistant() {
        let line = r#"{"type":"message_end","message":{"role":"assistant","content":[{"type":"text","text":"hi"}],"usage":{"input":1,"output":2,"totalTokens":10,"cost":{"total":0.01}}}}"#;
        match parse_event_line(line).unwrap() {
            ChildEvent::MessageEnd { message } => {
                assert_eq!(message.role, "assistant");
                assert_eq!(message.usage.unwrap().total_tokens, 10);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unparseable_line_is_ignored() {
        assert!(parse_event_line("not json at all").is_none());
    }

    #[test]
    fn blank_line_is_ignored() {
        assert!(parse_event_line("   ").is_none());
    }

    #[test]
    fn unknown_type_parses_as_other() {
        let line = r#"{"type":"some_future_event","payload":1}"#;
        assert!(matches!(parse_event_line(line).unwrap(), ChildEvent::Other));
    }

    #[test]
    fn line_accumulator_splits_on_newlines_across_chunks() {
        let mut acc = LineAccumulator::new();
        let mut lines = acc.feed(b"{\"type\":\"a\"}\n{\"type\"");
        assert_eq!(lines.len(), 1);
        lines.extend(acc.feed(b":\"b\"}\n"));
        assert_eq!(lines.len(), 2);
        assert!(acc.flush().is_none());
    }

    #[test]
    fn line_accumulator_flushes_trailing_partial_line_on_close() {
        let mut acc = LineAccumulator::new();
        let lines = acc.feed(b"{\"type\":\"a\"}\n{\"partial");
        assert_eq!(lines.len(), 1);
        assert_eq!(acc.flush().unwrap(), "{\"partial");
    }
}
