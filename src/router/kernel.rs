//! Kernel route mirroring.
//!
//! Separated from [`super::RoutingTable`] so the routing logic stays
//! unit-testable without root privileges (spec.md §9 — "deep coupling
//! between routing-table struct and kernel netlink calls"). Grounded
//! directly on the teacher crate's `utils::sys_route::SysRoute`, adapted
//! from "route via gateway IP" to "route via tunnel device": every route
//! here points at the local tun interface rather than a next-hop IP, since
//! packets are handed to userspace for encryption rather than routed
//! directly to the peer.

use std::process::Command;

use ipnet::IpNet;

/// A port for adding/removing kernel routes against the tunnel device.
/// Failures are surfaced but never roll back the in-memory table (spec.md
/// §4.2): the next reconfiguration pass reconciles.
pub trait KernelRouteInstaller: Send + Sync {
    fn install(&self, prefix: IpNet, device: &str) -> crate::Result<()>;
    fn remove(&self, prefix: IpNet, device: &str) -> crate::Result<()>;
}

/// Shells out to `ip route`, mirroring the teacher's `SysRoute` on Linux.
#[derive(Debug, Default)]
pub struct ShellRouteInstaller;

impl ShellRouteInstaller {
    pub fn new() -> Self {
        Self
    }
}

impl KernelRouteInstaller for ShellRouteInstaller {
    #[cfg(target_os = "linux")]
    fn install(&self, prefix: IpNet, device: &str) -> crate::Result<()> {
        let output = Command::new("ip")
            .args(["route", "add", &prefix.to_string(), "dev", device])
            .output()
            .map_err(|e| format!("failed to execute ip command: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("File exists") {
                return Ok(());
            }
            return Err(format!("failed to add route {prefix} dev {device}: {stderr}").into());
        }
        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn remove(&self, prefix: IpNet, device: &str) -> crate::Result<()> {
        let output = Command::new("ip")
            .args(["route", "del", &prefix.to_string(), "dev", device])
            .output()
            .map_err(|e| format!("failed to execute ip command: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("No such process") {
                return Ok(());
            }
            return Err(format!("failed to delete route {prefix} dev {device}: {stderr}").into());
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn install(&self, _prefix: IpNet, _device: &str) -> crate::Result<()> {
        Err("kernel route mirroring is only implemented on linux".into())
    }

    #[cfg(not(target_os = "linux"))]
    fn remove(&self, _prefix: IpNet, _device: &str) -> crate::Result<()> {
        Err("kernel route mirroring is only implemented on linux".into())
    }
}

/// No-op installer for tests and environments without the network
/// capabilities to manipulate the kernel table.
#[derive(Debug, Default)]
pub struct NullRouteInstaller;

impl KernelRouteInstaller for NullRouteInstaller {
    fn install(&self, _prefix: IpNet, _device: &str) -> crate::Result<()> {
        Ok(())
    }

    fn remove(&self, _prefix: IpNet, _device: &str) -> crate::Result<()> {
        Ok(())
    }
}
