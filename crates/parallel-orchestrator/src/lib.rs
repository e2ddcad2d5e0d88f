//! Mode Dispatcher (C6): the orchestrator crate's public surface.
//! Validates a `ParallelParams` call, resolves per-task settings,
//! builds the shared context once, runs the one active mode (single,
//! parallel, chain, race, team), and assembles the `ToolInvocationResult`
//! handed back to the host.

pub mod chain;
pub mod context_builder;
pub mod dispatcher;
pub mod multi_task;
pub mod progress_collector;
pub mod race;
pub mod settings_resolution;
pub mod single;
pub mod summary;
pub mod team;
pub mod validation;

pub use chain::{run_chain, ChainOutcome};
pub use context_builder::build_shared_context;
pub use dispatcher::{run_parallel_tool, run_parallel_tool_with_runner};
pub use multi_task::{has_cross_refs, run_parallel_tasks};
pub use progress_collector::ProgressCollector;
pub use race::run_race;
pub use single::run_single;
pub use summary::{render_parallel_summary, render_task_section, render_team_summary};
pub use team::{run_team, TeamOutcome};
pub use validation::{collect_agent_refs, validate_agent_refs, validate_mode_count};
