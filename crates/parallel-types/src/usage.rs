use serde::{Deserialize, Serialize};

/// Accumulator of token and cost counters for one or more agent runs.
///
/// Addition is componentwise except `context_tokens`, which tracks the
/// most recent value: the child agent reports a cumulative context size,
/// not an increment, on every `message_end` event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
    pub cache_write: u64,
    pub cost: f64,
    pub context_tokens: u64,
    pub turns: u32,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another sample in place, replacing `context_tokens`.
    pub fn accumulate(&mut self, other: &UsageStats) {
        self.input += other.input;
        self.output += other.output;
        self.cache_read += other.cache_read;
        self.cache_write += other.cache_write;
        self.cost += other.cost;
        self.turns += other.turns;
        if other.context_tokens > 0 {
            self.context_tokens = other.context_tokens;
        }
    }
}

impl std::ops::Add for UsageStats {
    type Output = UsageStats;
    fn add(self, rhs: UsageStats) -> UsageStats {
        let mut out = self;
        out.accumulate(&rhs);
        out
    }
}

impl std::ops::AddAssign for UsageStats {
    fn add_assign(&mut self, rhs: UsageStats) {
        self.accumulate(&rhs);
    }
}
