//! Pre-flight validation: mode-count and agent-reference checks that
//! must pass before any subprocess is spawned. Failures here are the
//! crate's only non-throwing "validation error" response class.

use parallel_types::{mode_count, AgentCatalog, ParallelError, ParallelParams};

pub fn validate_mode_count(params: &ParallelParams) -> Result<(), ParallelError> {
    let n = mode_count(params);
    if n != 1 {
        return Err(ParallelError::mode_count(n));
    }
    Ok(())
}

/// Every `agent` name referenced anywhere in the active mode's
/// payload. `RaceSpec` has no `agent` field (races are keyed by
/// `models`, not named agent definitions) so it's not scanned here.
pub fn collect_agent_refs(params: &ParallelParams) -> Vec<String> {
    let mut refs = Vec::new();
    if let Some(agent) = &params.agent {
        refs.push(agent.clone());
    }
    if let Some(tasks) = &params.tasks {
        refs.extend(tasks.iter().filter_map(|t| t.agent.clone()));
    }
    if let Some(chain) = &params.chain {
        refs.extend(chain.iter().filter_map(|s| s.agent.clone()));
    }
    if let Some(team) = &params.team {
        refs.extend(team.members.iter().filter_map(|m| m.agent.clone()));
    }
    refs
}

pub fn validate_agent_refs(params: &ParallelParams, catalog: &AgentCatalog) -> Result<(), ParallelError> {
    let mut missing: Vec<String> = collect_agent_refs(params)
        .into_iter()
        .filter(|name| catalog.get(name).is_none())
        .collect();
    missing.sort();
    missing.dedup();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ParallelError::unknown_agents(&missing, &catalog.names()))
    }
}
