//! Agent Executor (C1) and Output Shaping (C8): everything needed to
//! run one agent as a subprocess and turn its raw output into
//! something safe to embed in a Markdown summary.

pub mod event;
pub mod output;
pub mod prompt;
pub mod runner;
pub mod tool_preview;

pub use event::{parse_event_line, ChildEvent, ContentPart, CostInfo, LineAccumulator, Message, MessageUsage};
pub use output::{sanitize_name, shape_output, spill_if_long, ShapedOutput, SpillResult, SPILL_THRESHOLD_CHARS};
pub use prompt::{composite_prompt, SystemPromptFile};
pub use runner::{
    build_command, run_agent, run_agent_with_command, AgentRunner, ProgressSink, RunInput,
    SubprocessAgentRunner,
};
pub use tool_preview::preview_tool_args;
