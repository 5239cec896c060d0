//! Configuration snapshot, loading, and the Information Routing Base derived
//! from it.
//!
//! Shape and defaulting style lifted from the teacher crate's
//! `client::config::Config`/`ClientConfig` (`serde(default = "fn")` per
//! field, a free `load(path) -> anyhow::Result<Config>`). File watching is
//! new: the teacher's own `server::config_watcher::ConfigWatcher` only ever
//! polls on a fixed interval, even though the teacher's `Cargo.toml` already
//! depends on `notify` — it is never imported anywhere in the teacher's
//! source. [`watch`] is the first real use of that dependency, wired to a
//! push-based single-slot channel as spec.md §6 requires.

pub mod watch;

use std::collections::BTreeMap;
use std::fs;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::crypto::CipherKind;
use crate::router::Irb;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub crypto: Option<CryptoConfig>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub revision: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_keepalive")]
    pub keepalive: u64,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default = "default_mtu")]
    pub mtu: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            max_workers: default_max_workers(),
            keepalive: default_keepalive(),
            insecure: false,
            mtu: default_mtu(),
        }
    }
}

fn default_address() -> String {
    ":8085".to_string()
}

fn default_max_workers() -> usize {
    10
}

fn default_keepalive() -> u64 {
    10
}

fn default_mtu() -> u16 {
    1300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    #[serde(rename = "type")]
    pub kind: CipherKind,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub address: String,
    #[serde(default, rename = "privateAddresses")]
    pub private_addresses: Vec<String>,
    #[serde(default, rename = "privateSubnets")]
    pub private_subnets: Vec<String>,
}

/// Reads and parses a TOML config file.
pub fn load(path: &str) -> anyhow::Result<Config> {
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Resolves the local node's configured entry: `RADVPN_NODE_NAME` if set,
/// otherwise the node whose `address` matches one of the host's interface
/// addresses.
pub fn local_node<'a>(config: &'a Config) -> crate::Result<&'a NodeConfig> {
    crate::identity::resolve(&config.nodes)
}

/// Derives the Information Routing Base from a config snapshot: each node
/// other than the local one contributes its `privateSubnets` under its
/// public address.
pub fn derive_irb(config: &Config, local_name: &str) -> Irb {
    let mut irb = Irb::new();

    for node in &config.nodes {
        if node.name == local_name {
            continue;
        }

        let Ok(next_hop) = parse_host(&node.address) else {
            tracing::warn!("skipping node {}: invalid address {}", node.name, node.address);
            continue;
        };

        let mut prefixes = Vec::new();
        for subnet in &node.private_subnets {
            match subnet.parse::<IpNet>() {
                Ok(net) => prefixes.push(net),
                Err(e) => tracing::warn!("node {} has invalid subnet {subnet}: {e}", node.name),
            }
        }

        irb.entry(next_hop).or_insert_with(Vec::new).extend(prefixes);
    }

    irb
}

fn parse_host(address: &str) -> crate::Result<IpAddr> {
    host_of(address).parse::<IpAddr>().map_err(|e| format!("{address}: {e}").into())
}

/// Strips the `:port` suffix from a `host:port` address, IPv6-aware.
///
/// A bare `rsplit_once(':')` is wrong for IPv6 hosts: `"2001:db8::1"` has
/// more than one colon, so splitting on the last one yields the bogus host
/// `"2001:db8:"` instead of the full address. Handles three shapes:
/// bracketed `[ipv6]:port`, unambiguous `ipv4_or_name:port` (exactly one
/// colon), and a bare IPv6 literal with no port (more than one colon, no
/// brackets) which is returned unchanged.
pub(crate) fn host_of(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return &rest[..end];
        }
    }

    if address.matches(':').count() == 1 {
        if let Some((host, _port)) = address.rsplit_once(':') {
            return host;
        }
    }

    address
}

/// The private addresses the local node must claim on its tunnel device.
pub fn local_private_addresses(node: &NodeConfig) -> BTreeMap<usize, IpNet> {
    node.private_addresses
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.parse::<IpNet>().ok().map(|net| (i, net)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, address: &str, subnets: &[&str]) -> NodeConfig {
        NodeConfig {
            name: name.to_string(),
            address: address.to_string(),
            private_addresses: vec![],
            private_subnets: subnets.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn derives_irb_excluding_local_node() {
        let config = Config {
            server: ServerConfig::default(),
            crypto: None,
            nodes: vec![
                node("local", "192.168.55.5:8085", &["10.0.0.0/24"]),
                node("peer-a", "192.168.55.10:8085", &["10.0.1.0/24"]),
                node("peer-b", "192.168.55.20:8085", &["10.0.2.0/24", "10.0.3.0/24"]),
            ],
            revision: 1,
        };

        let irb = derive_irb(&config, "local");
        assert_eq!(irb.len(), 2);
        assert!(!irb.contains_key(&"192.168.55.5".parse().unwrap()));
        assert_eq!(
            irb.get(&"192.168.55.20".parse::<IpAddr>().unwrap()).unwrap().len(),
            2
        );
    }

    #[test]
    fn derives_irb_for_bracketed_and_bare_ipv6_node_addresses() {
        let config = Config {
            server: ServerConfig::default(),
            crypto: None,
            nodes: vec![
                node("local", "192.168.55.5:8085", &["10.0.0.0/24"]),
                node("peer-bracketed", "[2001:db8::1]:8085", &["10.0.1.0/24"]),
                node("peer-bare", "2001:db8::2", &["10.0.2.0/24"]),
            ],
            revision: 1,
        };

        let irb = derive_irb(&config, "local");
        assert_eq!(irb.len(), 2);
        assert!(irb.contains_key(&"2001:db8::1".parse::<IpAddr>().unwrap()));
        assert!(irb.contains_key(&"2001:db8::2".parse::<IpAddr>().unwrap()));
    }

    #[test]
    fn host_of_handles_ipv4_ipv6_and_bracketed_forms() {
        assert_eq!(host_of("1.2.3.4:8085"), "1.2.3.4");
        assert_eq!(host_of("[2001:db8::1]:8085"), "2001:db8::1");
        assert_eq!(host_of("2001:db8::1"), "2001:db8::1");
        assert_eq!(host_of("::1"), "::1");
    }

    #[test]
    fn toml_parses_with_defaults() {
        let toml_str = r#"
            [server]
            address = ":9000"

            [[nodes]]
            name = "a"
            address = "1.2.3.4:8085"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.address, ":9000");
        assert_eq!(config.server.max_workers, 10);
        assert_eq!(config.server.mtu, 1300);
        assert_eq!(config.nodes.len(), 1);
    }
}
