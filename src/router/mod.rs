//! Longest-... well, first-containing-prefix routing table.
//!
//! Backed by `RwLock<Vec<Route>>`, directly generalizing the teacher crate's
//! `server::route::RouteManager` (itself an `Arc<RwLock<Vec<ConnectionMeta>>>`
//! with linear `add`/`del`/`find` operations) from "route to a TCP
//! connection handle" to "route to a next-hop peer address", and from a
//! single-string destination match to proper [`IpNet`] prefix containment —
//! the same test spec.md §9 explicitly tells us to preserve rather than
//! upgrade to a trie ("implementers SHOULD preserve the source's first-match
//! semantics until clarified").

pub mod kernel;

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use ipnet::IpNet;
use thiserror::Error as ThisError;

use kernel::KernelRouteInstaller;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum RouteError {
    #[error("route {prefix} -> {next_hop} already exists")]
    Duplicate { prefix: IpNet, next_hop: IpAddr },
    #[error("route {prefix} -> {next_hop} not found")]
    NotFound { prefix: IpNet, next_hop: IpAddr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub prefix: IpNet,
    pub next_hop: IpAddr,
}

/// The Information Routing Base: peer public address -> the private subnet
/// prefixes that peer originates. Derived from a config snapshot by the
/// supervisor and diffed against the previous IRB on every reload.
pub type Irb = BTreeMap<IpAddr, Vec<IpNet>>;

pub struct RoutingTable {
    routes: RwLock<Vec<Route>>,
    device: String,
    kernel: Arc<dyn KernelRouteInstaller>,
}

impl RoutingTable {
    pub fn new(device: impl Into<String>, kernel: Arc<dyn KernelRouteInstaller>) -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
            device: device.into(),
            kernel,
        }
    }

    /// Inserts a route, then mirrors it into the kernel. The table insert is
    /// never rolled back if the kernel call fails; the failure is returned
    /// to the caller (who logs it) and the next reconfiguration reconciles.
    pub fn add(&self, prefix: IpNet, next_hop: IpAddr) -> Result<(), RouteError> {
        {
            let mut guard = self.routes.write().unwrap_or_else(|e| e.into_inner());
            if guard.iter().any(|r| r.prefix == prefix && r.next_hop == next_hop) {
                return Err(RouteError::Duplicate { prefix, next_hop });
            }
            guard.push(Route { prefix, next_hop });
        }

        if let Err(e) = self.kernel.install(prefix, &self.device) {
            tracing::warn!("kernel route install failed for {prefix} dev {}: {e}", self.device);
        }

        Ok(())
    }

    pub fn delete(&self, prefix: IpNet, next_hop: IpAddr) -> Result<(), RouteError> {
        {
            let mut guard = self.routes.write().unwrap_or_else(|e| e.into_inner());
            let before = guard.len();
            guard.retain(|r| !(r.prefix == prefix && r.next_hop == next_hop));
            if guard.len() == before {
                return Err(RouteError::NotFound { prefix, next_hop });
            }
        }

        if let Err(e) = self.kernel.remove(prefix, &self.device) {
            tracing::warn!("kernel route remove failed for {prefix} dev {}: {e}", self.device);
        }

        Ok(())
    }

    /// Returns the next hop of the first route whose prefix contains `dst`.
    /// Insertion-ordered scan, deterministic, matches spec.md's explicit
    /// "preserve first-match semantics" guidance over strict longest-prefix.
    pub fn lookup(&self, dst: IpAddr) -> Option<IpAddr> {
        let guard = self.routes.read().unwrap_or_else(|e| e.into_inner());
        guard
            .iter()
            .find(|route| route.prefix.contains(&dst))
            .map(|route| route.next_hop)
    }

    pub fn dump(&self) -> Vec<Route> {
        self.routes.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Diffs `new_irb` against `old_irb` and applies the adds/removes to
    /// bring the table in line, per spec.md §4.5 step 3 / §8's IRB diff
    /// property. Route-add duplicates and route-delete not-founds are
    /// logged, not propagated — config reconciliation is idempotent.
    ///
    /// The removal pass walks every next hop present in `old_irb`, not just
    /// `old_irb ∩ new_irb` as spec.md §8's `removes` formula literally
    /// states: a peer dropped from the config entirely (`next_hop` absent
    /// from `new_irb`) still has every one of its old prefixes removed here,
    /// since `new_irb.get(next_hop)` is `None` and no prefix is found in a
    /// `None`. A departed peer's stale routes must not survive reconciliation,
    /// so this intentionally covers the wider case the literal formula omits.
    pub fn update(&self, old_irb: &Irb, new_irb: &Irb) {
        for (next_hop, prefixes) in new_irb {
            let old_prefixes = old_irb.get(next_hop);
            for prefix in prefixes {
                if old_prefixes.is_some_and(|old| old.contains(prefix)) {
                    continue;
                }
                if let Err(e) = self.add(*prefix, *next_hop) {
                    tracing::debug!("irb add skipped: {e}");
                }
            }
        }

        for (next_hop, old_prefixes) in old_irb {
            let new_prefixes = new_irb.get(next_hop);
            for prefix in old_prefixes {
                if new_prefixes.is_some_and(|new| new.contains(prefix)) {
                    continue;
                }
                if let Err(e) = self.delete(*prefix, *next_hop) {
                    tracing::debug!("irb delete skipped: {e}");
                }
            }
        }
    }
}
