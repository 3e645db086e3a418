//! Agent directory backed by remote registries with a static fallback.
//!
//! Listing agents never fails: a registry that cannot be reached, answers
//! with an error or returns nothing usable is replaced by the fallback
//! descriptors of its network.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use bitte_common::{AgentDescriptor, AgentNetwork, BitteError, Result};
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{DirectoryConfig, RegistryConfig};

struct CachedListing {
    fetched_at: Instant,
    agents: Vec<AgentDescriptor>,
}

pub struct AgentDirectory {
    config: DirectoryConfig,
    http_client: reqwest::Client,
    /// Successful listings keyed by registry URL
    cache: Mutex<HashMap<String, CachedListing>>,
}

impl AgentDirectory {
    pub fn new(config: DirectoryConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn registries(&self) -> &[RegistryConfig] {
        &self.config.registries
    }

    /// Snapshot of every known agent, registries first in configured order,
    /// de-duplicated by id.
    pub async fn list_agents(&self) -> Vec<AgentDescriptor> {
        if self.config.registries.is_empty() {
            return fallback_agents();
        }

        let listings = join_all(
            self.config
                .registries
                .iter()
                .map(|registry| self.registry_agents(registry)),
        )
        .await;

        let mut seen = HashSet::new();
        listings
            .into_iter()
            .flatten()
            .filter(|agent| seen.insert(agent.id.clone()))
            .collect()
    }

    /// Agents of one network only.
    pub async fn list_network(&self, network: AgentNetwork) -> Vec<AgentDescriptor> {
        self.list_agents()
            .await
            .into_iter()
            .filter(|agent| agent.network == network)
            .collect()
    }

    async fn registry_agents(&self, registry: &RegistryConfig) -> Vec<AgentDescriptor> {
        if let Some(agents) = self.cached(&registry.url) {
            debug!(registry = %registry.url, count = agents.len(), "Using cached registry listing");
            return agents;
        }

        match self.fetch_registry(registry).await {
            Ok(agents) => {
                debug!(registry = %registry.url, count = agents.len(), "Fetched registry listing");
                if self.config.cache_ttl().is_some() {
                    self.cache.lock().insert(
                        registry.url.clone(),
                        CachedListing {
                            fetched_at: Instant::now(),
                            agents: agents.clone(),
                        },
                    );
                }
                agents
            }
            Err(e) => {
                warn!(
                    registry = %registry.url,
                    network = %registry.network,
                    error = %e,
                    "Registry unavailable, using fallback agents"
                );
                fallback_agents_for(registry.network)
            }
        }
    }

    fn cached(&self, url: &str) -> Option<Vec<AgentDescriptor>> {
        let ttl = self.config.cache_ttl()?;
        let mut cache = self.cache.lock();
        match cache.get(url) {
            Some(entry) if entry.fetched_at.elapsed() < ttl => Some(entry.agents.clone()),
            Some(_) => {
                cache.remove(url);
                None
            }
            None => None,
        }
    }

    async fn fetch_registry(&self, registry: &RegistryConfig) -> Result<Vec<AgentDescriptor>> {
        let url = format!("{}/agents", registry.url.trim_end_matches('/'));

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BitteError::NetworkTimeout(format!("registry {url}"))
                } else {
                    BitteError::RegistryUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BitteError::RegistryUnavailable(format!("HTTP {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BitteError::MalformedResponse(format!("registry {url}: {e}")))?;

        let agents = normalize_registry_body(&body, registry.network);
        if agents.is_empty() {
            return Err(BitteError::RegistryUnavailable(
                "registry returned no usable agents".into(),
            ));
        }
        Ok(agents)
    }
}

/// Normalize a registry body: either a bare array of records or an object
/// with an `agents` array. Records without an id or endpoint are dropped.
pub fn normalize_registry_body(body: &Value, network: AgentNetwork) -> Vec<AgentDescriptor> {
    let records: &[Value] = match body {
        Value::Array(records) => records.as_slice(),
        Value::Object(map) => match map.get("agents") {
            Some(Value::Array(records)) => records.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    records
        .iter()
        .filter_map(|record| normalize_record(record, network))
        .collect()
}

fn first_str<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| record.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn normalize_record(record: &Value, network: AgentNetwork) -> Option<AgentDescriptor> {
    let id = first_str(record, &["id", "agentId"])?;
    let base_endpoint = first_str(record, &["serviceUrl", "endpoint", "baseUrl", "base_url"])?;
    let name = first_str(record, &["name", "title"]).unwrap_or(id);

    let mut agent = AgentDescriptor::new(id, name, base_endpoint, network)
        .with_description(first_str(record, &["description"]).unwrap_or_default());

    for key in ["capabilities", "keywords"] {
        if let Some(Value::Array(values)) = record.get(key) {
            agent.keywords = values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            break;
        }
    }

    agent.price = match record.get("price") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    agent.payment_address = first_str(record, &["paymentAddress", "payment_address"]).map(str::to_string);

    Some(agent)
}

/// The fixed agent list used whenever a registry is unavailable.
pub fn fallback_agents() -> Vec<AgentDescriptor> {
    vec![
        AgentDescriptor::new(
            "cardano-expert",
            "Cardano Expert",
            "https://cardano-agent.example.com",
            AgentNetwork::Masumi,
        )
        .with_description("Specialized in Cardano blockchain operations and ADA transactions")
        .with_price(0.5),
        AgentDescriptor::new(
            "defi-analyst",
            "DeFi Analyst",
            "https://defi-agent.example.com",
            AgentNetwork::Masumi,
        )
        .with_description("Expert in decentralized finance protocols and yield farming")
        .with_price(0.8),
        AgentDescriptor::new(
            "midnight-specialist",
            "Midnight Specialist",
            "https://midnight-agent.example.com",
            AgentNetwork::Masumi,
        )
        .with_description("Privacy-focused blockchain solutions and zero-knowledge proofs")
        .with_price(1.0),
        AgentDescriptor::new(
            "near-defi-agent",
            "NEAR DeFi Agent",
            "https://near-defi-agent.shade.network",
            AgentNetwork::Shade,
        )
        .with_description(
            "Specialized in NEAR Protocol DeFi operations and cross-chain transactions",
        )
        .with_keywords(["swap", "ref finance", "burrow"]),
        AgentDescriptor::new(
            "shade-agent-coordinator",
            "Shade Agent Coordinator",
            "https://coordinator.shade.network",
            AgentNetwork::Shade,
        )
        .with_description("Coordinates multiple Shade Agents for complex multi-chain operations")
        .with_keywords(["multi-chain", "coordinate"]),
        AgentDescriptor::new(
            "chain-signature-agent",
            "Chain Signature Agent",
            "https://chain-sig.shade.network",
            AgentNetwork::Shade,
        )
        .with_description("Handles cross-chain transactions using NEAR Chain Signatures")
        .with_keywords(["signature", "sign transaction"]),
    ]
}

pub fn fallback_agents_for(network: AgentNetwork) -> Vec<AgentDescriptor> {
    fallback_agents()
        .into_iter()
        .filter(|agent| agent.network == network)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fallback_ids_are_unique() {
        let agents = fallback_agents();
        let ids: HashSet<_> = agents.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids.len(), agents.len());
        assert_eq!(agents.len(), 6);
    }

    #[test]
    fn test_fallback_per_network() {
        let shade = fallback_agents_for(AgentNetwork::Shade);
        assert_eq!(shade.len(), 3);
        assert!(shade.iter().all(|a| a.network == AgentNetwork::Shade));
        assert!(shade.iter().any(|a| a.id == "near-defi-agent"));
    }

    #[test]
    fn test_normalize_alternate_field_names() {
        let body = json!([
            {
                "agentId": "yield-bot",
                "title": "Yield Bot",
                "endpoint": "https://yield.example.com",
                "price": "0.25",
                "paymentAddress": "addr1qxy"
            },
            {
                "id": "sig",
                "name": "Signer",
                "serviceUrl": "https://sig.example.com",
                "capabilities": ["bridge", "sign"]
            }
        ]);
        let agents = normalize_registry_body(&body, AgentNetwork::Masumi);
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].id, "yield-bot");
        assert_eq!(agents[0].name, "Yield Bot");
        assert_eq!(agents[0].base_endpoint, "https://yield.example.com");
        assert_eq!(agents[0].price, Some(0.25));
        assert_eq!(agents[0].payment_address.as_deref(), Some("addr1qxy"));
        assert_eq!(agents[1].keywords, vec!["bridge", "sign"]);
    }

    #[test]
    fn test_normalize_wrapped_body_and_skips_incomplete() {
        let body = json!({
            "agents": [
                {"id": "no-endpoint", "name": "Broken"},
                {"name": "No id", "baseUrl": "https://x"},
                {"id": "ok", "baseUrl": "https://ok.example.com"}
            ]
        });
        let agents = normalize_registry_body(&body, AgentNetwork::Shade);
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].id, "ok");
        // Name falls back to the id
        assert_eq!(agents[0].name, "ok");
        assert_eq!(agents[0].network, AgentNetwork::Shade);
    }

    #[test]
    fn test_normalize_unexpected_shape() {
        assert!(normalize_registry_body(&json!("nope"), AgentNetwork::Masumi).is_empty());
        assert!(normalize_registry_body(&json!({"data": []}), AgentNetwork::Masumi).is_empty());
    }

    #[tokio::test]
    async fn test_no_registries_returns_fallback() {
        let directory = AgentDirectory::new(DirectoryConfig {
            registries: vec![],
            ..Default::default()
        });
        assert_eq!(directory.list_agents().await, fallback_agents());
    }

    #[tokio::test]
    async fn test_unreachable_registry_falls_back_repeatably() {
        // Port 9 (discard) on localhost is not listening in test environments
        let directory = AgentDirectory::new(DirectoryConfig {
            registries: vec![
                RegistryConfig {
                    url: "http://127.0.0.1:9".into(),
                    network: AgentNetwork::Masumi,
                },
                RegistryConfig {
                    url: "http://127.0.0.1:9/shade".into(),
                    network: AgentNetwork::Shade,
                },
            ],
            timeout_ms: 500,
            cache_ttl_secs: 0,
        });

        let first = directory.list_agents().await;
        let second = directory.list_agents().await;
        assert_eq!(first, fallback_agents());
        assert_eq!(first, second);
    }
}
