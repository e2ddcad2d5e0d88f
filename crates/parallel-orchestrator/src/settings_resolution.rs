//! Per-task settings resolution: merge a named agent definition's
//! defaults with inline overrides. `provider` is always inline.

use parallel_types::{resolve_settings, AgentCatalog, EffectiveSettings, InlineOverrides};

#[allow(clippy::too_many_arguments)]
pub fn resolve(
    agent: Option<&str>,
    provider: Option<String>,
    model: Option<String>,
    tools: Option<Vec<String>>,
    system_prompt: Option<String>,
    thinking: Option<String>,
    catalog: &AgentCatalog,
) -> EffectiveSettings {
    let overrides = InlineOverrides {
        provider,
        model,
        tools,
        system_prompt,
        thinking,
    };
    // Unknown-agent references are already rejected during validation,
    // before any settings are resolved; a miss here can't happen on
    // the success path, so fall back to the overrides alone.
    resolve_settings(agent, &overrides, catalog).unwrap_or(EffectiveSettings {
        provider: overrides.provider,
        model: overrides.model,
        tools: overrides.tools,
        system_prompt: overrides.system_prompt,
        thinking: overrides.thinking,
    })
}
