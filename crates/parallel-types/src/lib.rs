//! Data model shared across the `parallel` orchestrator crates:
//! usage accounting, task results/progress, team/DAG structures,
//! agent catalogs, tool parameters, and response shapes.

pub mod agent;
pub mod error;
pub mod params;
pub mod result;
pub mod settings;
pub mod task;
pub mod team;
pub mod usage;

pub use agent::{
    resolve_settings, AgentCatalog, AgentDefinition, AgentScope, EffectiveSettings,
    InlineOverrides,
};
pub use error::ParallelError;
pub use params::{
    mode_count, ChainStep, GitContextOptions, GitContextSpec, ParallelParams, RaceSpec, TaskSpec,
    TeamMemberSpec, TeamSpec,
};
pub use result::{
    ContentBlock, DagInfo, DagTaskInfo, ExecutionMode, ParallelToolDetails, ToolInvocationResult,
};
pub use settings::Settings;
pub use task::{RecentTool, TaskProgress, TaskResult, TaskStatus};
pub use team::{
    ApprovalDecision, ApprovalRequest, DagNode, DagNodeMap, NodeStatus, ReviewConfig, ReviewRound,
    TeamMember, TeamTask,
};
pub use usage::UsageStats;
