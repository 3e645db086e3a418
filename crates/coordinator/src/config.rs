//! Configuration for the coordinator.
//!
//! Every section has defaults matching the production deployment, so an
//! empty TOML file is a valid configuration.

use bitte_common::AgentNetwork;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

pub const FALLBACK_API_KEY_ENV: &str = "BITTE_FALLBACK_API_KEY";

/// Main coordinator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub selector: SelectorConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub composer: ComposerConfig,

    #[serde(default)]
    pub fallback_backend: FallbackBackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Maximum accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// A registry listing agents of one network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL; agents are listed at `{url}/agents`
    pub url: String,

    pub network: AgentNetwork,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_registries")]
    pub registries: Vec<RegistryConfig>,

    /// Timeout for one registry fetch
    #[serde(default = "default_registry_timeout")]
    pub timeout_ms: u64,

    /// How long a successful registry listing is reused. 0 disables caching.
    #[serde(default)]
    pub cache_ttl_secs: u64,
}

fn default_registries() -> Vec<RegistryConfig> {
    vec![
        RegistryConfig {
            url: "http://registry.masumi.network".into(),
            network: AgentNetwork::Masumi,
        },
        RegistryConfig {
            url: "https://shade-agents-registry.near.org".into(),
            network: AgentNetwork::Shade,
        },
    ]
}

fn default_registry_timeout() -> u64 {
    5000
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            registries: default_registries(),
            timeout_ms: default_registry_timeout(),
            cache_ttl_secs: 0,
        }
    }
}

impl DirectoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }
}

/// Routes messages containing any of `keywords` to `agent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorRule {
    pub agent_id: String,
    pub keywords: Vec<String>,
}

impl SelectorRule {
    pub fn new(agent_id: &str, keywords: &[&str]) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Agent used when no rule matches, if present in the directory
    #[serde(default = "default_agent_id")]
    pub default_agent: String,

    /// Evaluated in order; the first match wins
    #[serde(default = "default_rules")]
    pub rules: Vec<SelectorRule>,
}

fn default_agent_id() -> String {
    "shade-agent-coordinator".into()
}

fn default_rules() -> Vec<SelectorRule> {
    vec![
        SelectorRule::new("near-defi-agent", &["near", "stake", "staking", "ref finance"]),
        SelectorRule::new(
            "chain-signature-agent",
            &["chain signature", "cross-chain", "bridge", "multichain"],
        ),
        SelectorRule::new("cardano-expert", &["cardano", "ada"]),
        SelectorRule::new("defi-analyst", &["defi", "yield", "liquidity"]),
        SelectorRule::new("midnight-specialist", &["privacy", "midnight", "zero-knowledge"]),
    ]
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            default_agent: default_agent_id(),
            rules: default_rules(),
        }
    }
}

/// What to do when the input schema cannot be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaPolicy {
    /// Log and submit with the default payload shape
    #[default]
    BestEffort,
    /// Fail the job
    Required,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_availability_timeout")]
    pub availability_timeout_ms: u64,

    #[serde(default = "default_schema_timeout")]
    pub schema_timeout_ms: u64,

    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_ms: u64,

    /// Timeout for a single status request
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,

    /// Wait between status requests
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Turns forwarded to the agent as conversational context
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    #[serde(default)]
    pub schema_policy: SchemaPolicy,
}

fn default_availability_timeout() -> u64 {
    3000
}

fn default_schema_timeout() -> u64 {
    3000
}

fn default_submit_timeout() -> u64 {
    10_000
}

fn default_poll_timeout() -> u64 {
    5000
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_max_poll_attempts() -> u32 {
    30
}

fn default_context_window() -> usize {
    3
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            availability_timeout_ms: default_availability_timeout(),
            schema_timeout_ms: default_schema_timeout(),
            submit_timeout_ms: default_submit_timeout(),
            poll_timeout_ms: default_poll_timeout(),
            poll_interval_ms: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
            context_window: default_context_window(),
            schema_policy: SchemaPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// How a reply is produced when the selected agent fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Static description of what the assistant can do
    #[default]
    Canned,
    /// Ask the secondary chat backend
    ChatBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Appended to every reply
    #[serde(default = "default_footer")]
    pub footer: String,

    #[serde(default)]
    pub fallback: FallbackStrategy,

    #[serde(default = "default_canned_message")]
    pub canned_message: String,
}

fn default_footer() -> String {
    "\n\n---\n*Powered by Telegram-Bitte - NEAR Protocol, Shade Agents & Chain Signatures*".into()
}

fn default_canned_message() -> String {
    "I couldn't reach a specialist agent for this request right now. \
     Telegram-Bitte can help you with:\n\n\
     - **NEAR DeFi**: staking, swaps and liquidity on NEAR Protocol\n\
     - **Chain Signatures**: signing cross-chain transactions from a NEAR account\n\
     - **Shade Agents**: coordinating multi-chain operations\n\
     - **Cardano, DeFi analysis and Midnight privacy** through the Masumi network\n\n\
     Please try again in a moment or rephrase your question."
        .into()
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            footer: default_footer(),
            fallback: FallbackStrategy::default(),
            canned_message: default_canned_message(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackBackendConfig {
    /// Full completion URL; defaults to the hackathon backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Used when the request does not name a model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// If not set, read from `BITTE_FALLBACK_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_backend_timeout")]
    pub timeout_ms: u64,
}

fn default_model() -> String {
    "gpt-3.5-turbo".into()
}

fn default_backend_timeout() -> u64 {
    30_000
}

impl Default for FallbackBackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            default_model: default_model(),
            api_key: None,
            timeout_ms: default_backend_timeout(),
        }
    }
}

impl FallbackBackendConfig {
    /// Explicit config key first, then the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var(FALLBACK_API_KEY_ENV).ok().filter(|k| !k.is_empty())
    }
}

impl CoordinatorConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config = Self::from_toml(&content)?;

        if config.fallback_backend.api_key.is_some() {
            warn!(
                "API key found in config file '{}'. Prefer the {} environment variable.",
                path.display(),
                FALLBACK_API_KEY_ENV
            );
        }

        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.orchestrator.max_poll_attempts == 0 {
            anyhow::bail!("orchestrator.max_poll_attempts must be at least 1");
        }
        if self.orchestrator.context_window == 0 {
            anyhow::bail!("orchestrator.context_window must be at least 1");
        }
        if let Some(registry) = self.directory.registries.iter().find(|r| r.url.trim().is_empty()) {
            anyhow::bail!("directory registry for {} has an empty url", registry.network);
        }
        if let Some(rule) = self.selector.rules.iter().find(|r| r.keywords.is_empty()) {
            anyhow::bail!("selector rule for '{}' has no keywords", rule.agent_id);
        }
        if let Some(rule) = self
            .selector
            .rules
            .iter()
            .find(|r| r.keywords.iter().any(|k| k.trim().is_empty()))
        {
            anyhow::bail!("selector rule for '{}' has a blank keyword", rule.agent_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CoordinatorConfig::from_toml("").unwrap();
        assert_eq!(config.orchestrator.max_poll_attempts, 30);
        assert_eq!(config.orchestrator.poll_interval_ms, 1000);
        assert_eq!(config.orchestrator.availability_timeout_ms, 3000);
        assert_eq!(config.orchestrator.submit_timeout_ms, 10_000);
        assert_eq!(config.orchestrator.context_window, 3);
        assert_eq!(config.orchestrator.schema_policy, SchemaPolicy::BestEffort);
        assert_eq!(config.directory.registries.len(), 2);
        assert!(config.directory.cache_ttl().is_none());
        assert_eq!(config.composer.fallback, FallbackStrategy::Canned);
        assert!(config.composer.footer.contains("Powered by Telegram-Bitte"));
        assert_eq!(config.selector.default_agent, "shade-agent-coordinator");
        assert_eq!(config.fallback_backend.default_model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_full_config_from_toml() {
        let toml_str = r#"
[directory]
timeout_ms = 1500
cache_ttl_secs = 60

[[directory.registries]]
url = "http://localhost:9000"
network = "shade"

[selector]
default_agent = "near-defi-agent"

[[selector.rules]]
agent_id = "near-defi-agent"
keywords = ["stake"]

[orchestrator]
poll_interval_ms = 250
max_poll_attempts = 10
schema_policy = "required"

[composer]
footer = "\n-- bitte"
fallback = "chat_backend"

[fallback_backend]
url = "http://localhost:9100/chat"
default_model = "gpt-4"
"#;
        let config = CoordinatorConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.directory.registries.len(), 1);
        assert_eq!(config.directory.registries[0].network, AgentNetwork::Shade);
        assert_eq!(config.directory.cache_ttl(), Some(Duration::from_secs(60)));
        assert_eq!(config.selector.rules.len(), 1);
        assert_eq!(config.orchestrator.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.orchestrator.max_poll_attempts, 10);
        assert_eq!(config.orchestrator.schema_policy, SchemaPolicy::Required);
        // Unset fields in a present section keep their defaults
        assert_eq!(config.orchestrator.submit_timeout_ms, 10_000);
        assert_eq!(config.composer.fallback, FallbackStrategy::ChatBackend);
        assert_eq!(config.composer.footer, "\n-- bitte");
        assert_eq!(config.fallback_backend.default_model, "gpt-4");
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let err = CoordinatorConfig::from_toml("[orchestrator]\nmax_poll_attempts = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_poll_attempts"));
    }

    #[test]
    fn test_validation_rejects_empty_rule() {
        let toml_str = "[[selector.rules]]\nagent_id = \"x\"\nkeywords = []\n";
        assert!(CoordinatorConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_validation_rejects_blank_keyword() {
        let toml_str = "[[selector.rules]]\nagent_id = \"x\"\nkeywords = [\"stake\", \" \"]\n";
        let err = CoordinatorConfig::from_toml(toml_str).unwrap_err();
        assert!(err.to_string().contains("blank keyword"), "{err}");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[orchestrator]\ncontext_window = 5").unwrap();
        let config = CoordinatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.orchestrator.context_window, 5);
    }

    #[test]
    fn test_from_missing_file() {
        assert!(CoordinatorConfig::from_file("/nonexistent/bitte.toml").is_err());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let config = FallbackBackendConfig {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-test"));
    }
}
