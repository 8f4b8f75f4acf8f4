//! Network configuration

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// IPAM pool configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpamPoolConfig {
    pub subnet: String,
}

/// IPAM configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpamConfig {
    pub config: Vec<IpamPoolConfig>,
}

/// Configuration of a network to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Network name
    pub name: String,
    /// Refuse to create a second network with the same name
    pub check_duplicate: bool,
    /// Network driver
    pub driver: String,
    /// Network labels
    pub labels: BTreeMap<String, String>,
    /// IPAM configuration, daemon defaults when absent
    pub ipam: Option<IpamConfig>,
}

impl NetworkConfig {
    /// Create a new bridge network configuration
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            check_duplicate: true,
            driver: "bridge".to_string(),
            labels: BTreeMap::new(),
            ipam: None,
        }
    }

    /// Set subnet
    pub fn subnet(mut self, subnet: &str) -> Self {
        self.ipam
            .get_or_insert_with(IpamConfig::default)
            .config
            .push(IpamPoolConfig {
                subnet: subnet.to_string(),
            });
        self
    }

    /// Add label
    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }
}

/// Network list item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_subnet() {
        let config = NetworkConfig::new("demo").label("com.sind.cluster.name", "demo");
        assert_eq!(config.driver, "bridge");
        assert!(config.check_duplicate);
        assert_eq!(config.labels["com.sind.cluster.name"], "demo");
        assert_eq!(config.ipam, None);
    }

    #[test]
    fn test_subnet_adds_ipam_pool() {
        let config = NetworkConfig::new("demo").subnet("10.7.0.0/24");
        assert_eq!(
            config.ipam,
            Some(IpamConfig {
                config: vec![IpamPoolConfig {
                    subnet: "10.7.0.0/24".to_string(),
                }],
            })
        );
    }

    #[test]
    fn test_summary_from_api_payload() {
        let json = r#"{"Name": "demo", "Id": "abc", "Driver": "bridge", "Labels": {"com.sind.cluster.name": "demo"}}"#;
        let summary: NetworkSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.id, "abc");
        assert_eq!(summary.labels["com.sind.cluster.name"], "demo");
    }
}
