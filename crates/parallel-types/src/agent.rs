use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which agent-definition scope a caller consulted when building the
/// catalog passed into the dispatcher. This crate never scans the
/// filesystem itself; discovery is the host's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentScope {
    #[default]
    User,
    Project,
    Both,
}

/// Defaults supplied by a named, on-disk agent definition. Inline
/// per-task overrides always take precedence over these, except
/// `provider`, which is inline-only and never sourced from here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

/// Name-addressed catalog of known agent definitions, resolved by the
/// caller for the requested `AgentScope` before invoking the tool.
#[derive(Debug, Clone, Default)]
pub struct AgentCatalog {
    pub scope: AgentScope,
    definitions: HashMap<String, AgentDefinition>,
}

impl AgentCatalog {
    pub fn new(scope: AgentScope, definitions: HashMap<String, AgentDefinition>) -> Self {
        Self { scope, definitions }
    }

    pub fn get(&self, name: &str) -> Option<&AgentDefinition> {
        self.definitions.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Per-task effective settings, after merging an `AgentDefinition`
/// (if the task named one) with inline overrides. `provider` is
/// always inline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub tools: Option<Vec<String>>,
    pub system_prompt: Option<String>,
    pub thinking: Option<String>,
}

/// Inline overrides a caller may specify alongside an `agent` name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

/// Resolve effective settings for a task entry naming `agent` (if
/// any) in `catalog`, with `overrides` taking precedence over the
/// agent definition's defaults. Returns an error naming the unknown
/// agent so the caller can surface a validation response.
pub fn resolve_settings(
    agent: Option<&str>,
    overrides: &InlineOverrides,
    catalog: &AgentCatalog,
) -> Result<EffectiveSettings, String> {
    let base = match agent {
        Some(name) => match catalog.get(name) {
            Some(def) => def.clone(),
            None => return Err(name.to_string()),
        },
        None => AgentDefinition::default(),
    };
    Ok(EffectiveSettings {
        provider: overrides.provider.clone(),
        model: overrides.model.clone().or(base.model),
        tools: overrides.tools.clone().or(base.tools),
        system_prompt: overrides.system_prompt.clone().or(base.system_prompt),
        thinking: overrides.thinking.clone().or(base.thinking),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> AgentCatalog {
        let mut defs = HashMap::new();
        defs.insert(
            "reviewer".to_string(),
            AgentDefinition {
                name: "reviewer".into(),
                model: Some("base-model".into()),
                tools: Some(vec!["read".into(), "grep".into()]),
                system_prompt: Some("You review code.".into()),
                thinking: None,
            },
        );
        AgentCatalog::new(AgentScope::User, defs)
    }

    #[test]
    fn inline_overrides_win_over_agent_defaults() {
        let overrides = InlineOverrides {
            model: Some("override-model".into()),
            ..Default::default()
        };
        let settings = resolve_settings(Some("reviewer"), &overrides, &catalog()).unwrap();
        assert_eq!(settings.model.as_deref(), Some("override-model"));
        assert_eq!(settings.tools.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn unknown_agent_is_an_error_naming_it() {
        let err = resolve_settings(Some("ghost"), &InlineOverrides::default(), &catalog())
            .unwrap_err();
        assert_eq!(err, "ghost");
    }

    #[test]
    fn provider_is_never_sourced_from_agent_definition() {
        let overrides = InlineOverrides {
            provider: Some("anthropic".into()),
            ..Default::default()
        };
        let settings = resolve_settings(Some("reviewer"), &overrides, &catalog()).unwrap();
        assert_eq!(settings.provider.as_deref(), Some("anthropic"));
    }
}
