//! Keyword-based agent selection.

use bitte_common::AgentDescriptor;
use tracing::debug;

use crate::config::{SelectorConfig, SelectorRule};

/// Why an agent was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReason {
    /// The caller named the agent explicitly
    Requested,
    /// A configured rule matched this keyword
    Rule(String),
    /// One of the agent's own keywords matched
    AgentKeyword(String),
    /// Nothing matched; configured default
    Default,
    /// Nothing matched and the default is absent; first listed agent
    FirstAvailable,
}

#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub agent: &'a AgentDescriptor,
    pub reason: SelectionReason,
}

/// Maps a message to one agent. Pure and deterministic: the same message
/// and the same agent list always give the same answer.
#[derive(Debug, Clone)]
pub struct AgentSelector {
    rules: Vec<SelectorRule>,
    default_agent: String,
}

impl AgentSelector {
    pub fn new(config: &SelectorConfig) -> Self {
        Self {
            rules: config
                .rules
                .iter()
                .map(|rule| SelectorRule {
                    agent_id: rule.agent_id.clone(),
                    keywords: rule.keywords.iter().map(|k| k.to_lowercase()).collect(),
                })
                .collect(),
            default_agent: config.default_agent.clone(),
        }
    }

    pub fn select<'a>(&self, message: &str, agents: &'a [AgentDescriptor]) -> Option<&'a AgentDescriptor> {
        self.select_with_reason(message, agents).map(|s| s.agent)
    }

    pub fn select_with_reason<'a>(
        &self,
        message: &str,
        agents: &'a [AgentDescriptor],
    ) -> Option<Selection<'a>> {
        if agents.is_empty() {
            return None;
        }

        let lower = message.to_lowercase();
        let find = |id: &str| agents.iter().find(|a| a.id == id);

        // Configured rules, in order. A rule naming an absent agent is skipped.
        for rule in &self.rules {
            let Some(keyword) = rule.keywords.iter().find(|k| lower.contains(k.as_str())) else {
                continue;
            };
            if let Some(agent) = find(&rule.agent_id) {
                debug!(agent = %agent.id, keyword = %keyword, "Selector rule matched");
                return Some(Selection {
                    agent,
                    reason: SelectionReason::Rule(keyword.clone()),
                });
            }
        }

        // Agents' own keywords, visited by id so list order does not matter.
        let mut by_id: Vec<&AgentDescriptor> = agents.iter().collect();
        by_id.sort_by(|a, b| a.id.cmp(&b.id));
        for agent in by_id {
            if let Some(keyword) = agent
                .keywords
                .iter()
                .find(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
            {
                debug!(agent = %agent.id, keyword = %keyword, "Agent keyword matched");
                return Some(Selection {
                    agent,
                    reason: SelectionReason::AgentKeyword(keyword.clone()),
                });
            }
        }

        match find(&self.default_agent) {
            Some(agent) => Some(Selection {
                agent,
                reason: SelectionReason::Default,
            }),
            None => agents.first().map(|agent| Selection {
                agent,
                reason: SelectionReason::FirstAvailable,
            }),
        }
    }

    /// Resolve an explicitly requested agent id, if it is in the list.
    pub fn requested<'a>(&self, agent_id: &str, agents: &'a [AgentDescriptor]) -> Option<Selection<'a>> {
        agents
            .iter()
            .find(|a| a.id == agent_id)
            .map(|agent| Selection {
                agent,
                reason: SelectionReason::Requested,
            })
    }
}

impl Default for AgentSelector {
    fn default() -> Self {
        Self::new(&SelectorConfig::default())
    }
}
