//! Bounded Worker Pool (C2) and Race Selector (C3).

pub mod pool;
pub mod race;

pub use pool::{map_with_concurrency_limit, PoolOutcome, MAX_CONCURRENCY};
pub use race::{race_with_abort, RaceOutcome};
