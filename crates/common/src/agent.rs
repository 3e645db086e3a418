//! Remote agent descriptors.

use serde::{Deserialize, Serialize};

/// Agent ecosystem a descriptor belongs to. Selects the protocol adapter
/// used to talk to the agent and is reported back to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentNetwork {
    #[default]
    Masumi,
    Shade,
}

impl AgentNetwork {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Masumi => "Masumi",
            Self::Shade => "Shade",
        }
    }
}

impl std::fmt::Display for AgentNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for AgentNetwork {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "masumi" => Ok(Self::Masumi),
            "shade" => Ok(Self::Shade),
            other => Err(format!("unknown agent network: {other}")),
        }
    }
}

/// Identifies one remote assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    /// Unique within a directory snapshot
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// URL prefix for every protocol call
    #[serde(rename = "baseUrl")]
    pub base_endpoint: String,

    /// Ordered selector keywords
    #[serde(default, alias = "capabilities", skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_address: Option<String>,

    #[serde(default)]
    pub network: AgentNetwork,
}

impl AgentDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        base_endpoint: impl Into<String>,
        network: AgentNetwork,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            base_endpoint: base_endpoint.into(),
            keywords: Vec::new(),
            price: None,
            payment_address: None,
            network,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Join a protocol path onto the base endpoint.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joining() {
        let agent = AgentDescriptor::new("a", "A", "https://agent.example.com/", AgentNetwork::Masumi);
        assert_eq!(agent.endpoint("/availability"), "https://agent.example.com/availability");
        assert_eq!(agent.endpoint("start_job"), "https://agent.example.com/start_job");
    }

    #[test]
    fn test_descriptor_wire_shape() {
        let agent = AgentDescriptor::new("near-defi-agent", "NEAR DeFi Agent", "https://x", AgentNetwork::Shade)
            .with_keywords(["stake"])
            .with_price(0.5);
        let json = serde_json::to_value(&agent).unwrap();
        assert_eq!(json["baseUrl"], "https://x");
        assert_eq!(json["network"], "shade");
        assert_eq!(json["keywords"][0], "stake");
        assert_eq!(json["price"], 0.5);
        assert!(json.get("paymentAddress").is_none());
    }

    #[test]
    fn test_capabilities_alias() {
        let json = r#"{"id": "x", "name": "X", "baseUrl": "http://x", "capabilities": ["bridge"]}"#;
        let agent: AgentDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(agent.keywords, vec!["bridge".to_string()]);
        assert_eq!(agent.network, AgentNetwork::Masumi);
    }

    #[test]
    fn test_network_parsing() {
        assert_eq!("Shade".parse::<AgentNetwork>().unwrap(), AgentNetwork::Shade);
        assert_eq!("masumi".parse::<AgentNetwork>().unwrap(), AgentNetwork::Masumi);
        assert!("solana".parse::<AgentNetwork>().is_err());
        assert_eq!(AgentNetwork::Shade.to_string(), "Shade");
    }
}
