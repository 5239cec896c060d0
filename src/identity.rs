//! Local node identity resolution.
//!
//! No analogue in the teacher crate (its server/client roles are fixed at
//! invocation time); grounded on `other_examples/manifests/vly-wg-ondemand`'s
//! use of `if-addrs` for enumerating host interfaces, applied here to match
//! a configured node's public address against the machine it's running on.

use std::net::IpAddr;

use crate::config::{self, NodeConfig};

const NODE_NAME_ENV: &str = "RADVPN_NODE_NAME";

/// Resolves which entry in `nodes` describes the machine this process is
/// running on.
///
/// If `RADVPN_NODE_NAME` is set, the node with that `name` is used (and its
/// absence from `nodes` is an error). Otherwise every node's `address` host
/// part is compared against the host's interface addresses and the first
/// match wins.
pub fn resolve(nodes: &[NodeConfig]) -> crate::Result<&NodeConfig> {
    if let Ok(name) = std::env::var(NODE_NAME_ENV) {
        return nodes
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| format!("{NODE_NAME_ENV}={name} but no matching node in config").into());
    }

    let local_ips: Vec<IpAddr> = if_addrs::get_if_addrs()
        .map_err(|e| format!("failed to enumerate host interfaces: {e}"))?
        .into_iter()
        .map(|iface| iface.ip())
        .collect();

    nodes
        .iter()
        .find(|n| host_ip(&n.address).is_some_and(|ip| local_ips.contains(&ip)))
        .ok_or_else(|| "could not match any node address against a local interface".into())
}

/// Parses the host part of a node's `address`, IPv6-aware (see
/// `config::host_of`): a bare `rsplit_once(':')` would mis-split a bracketed
/// or bare IPv6 literal and silently fail to match it against any interface.
fn host_ip(address: &str) -> Option<IpAddr> {
    config::host_of(address).parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, address: &str) -> NodeConfig {
        NodeConfig {
            name: name.to_string(),
            address: address.to_string(),
            private_addresses: vec![],
            private_subnets: vec![],
        }
    }

    #[test]
    fn resolves_by_env_var_name() {
        // SAFETY: test is single-threaded with respect to this env var.
        unsafe { std::env::set_var(NODE_NAME_ENV, "b") };
        let nodes = vec![node("a", "1.1.1.1:8085"), node("b", "2.2.2.2:8085")];
        let resolved = resolve(&nodes).unwrap();
        assert_eq!(resolved.name, "b");
        unsafe { std::env::remove_var(NODE_NAME_ENV) };
    }

    #[test]
    fn env_var_set_but_unmatched_is_an_error() {
        unsafe { std::env::set_var(NODE_NAME_ENV, "nonexistent") };
        let nodes = vec![node("a", "1.1.1.1:8085")];
        assert!(resolve(&nodes).is_err());
        unsafe { std::env::remove_var(NODE_NAME_ENV) };
    }

    #[test]
    fn host_ip_parses_bracketed_and_bare_ipv6_addresses() {
        assert_eq!(host_ip("[2001:db8::1]:8085"), Some("2001:db8::1".parse().unwrap()));
        assert_eq!(host_ip("2001:db8::1"), Some("2001:db8::1".parse().unwrap()));
        assert_eq!(host_ip("192.168.55.5:8085"), Some("192.168.55.5".parse().unwrap()));
    }
}
