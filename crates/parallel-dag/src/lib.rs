//! DAG Builder (C4) and DAG Executor (C5) for team mode: dependency
//! validation, `{task:id}` context layering, approval gates, and the
//! review/revision loop.

pub mod builder;
pub mod context;
pub mod executor;
pub mod review;

pub use builder::{build_dag, recompute_readiness};
pub use context::{build_layered_context, resolve_task_refs};
pub use executor::{run_dag, ApprovalCallback, DagRunOutcome, READ_ONLY_TOOLS};
pub use review::{parse_decision, Decision};
