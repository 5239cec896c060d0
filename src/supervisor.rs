//! Reacts to config-change notifications by rebuilding routes and
//! reinitializing crypto keys.
//!
//! Generalizes the teacher crate's `server::config_watcher::ConfigWatcher`
//! (fixed-interval poll -> `client_manager.rewrite_clients_config`) to a
//! push-based model driven by [`crate::config::watch::ConfigWatcher`], and
//! widens the single "rewrite clients" step into the four-step sequence
//! spec.md §4.5 lays out: reload, recompute IRB, diff routes, rotate keys.
//! A single task processes notifications serially, so reconfigurations
//! never race each other.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{self, Config};
use crate::crypto;
use crate::router::{Irb, RoutingTable};
use crate::socket::CipherState;

pub struct Supervisor {
    config_path: String,
    local_name: String,
    routing_table: Arc<RoutingTable>,
    cipher_state: Arc<CipherState>,
    last_irb: Irb,
}

impl Supervisor {
    pub fn new(
        config_path: impl Into<String>,
        local_name: impl Into<String>,
        routing_table: Arc<RoutingTable>,
        cipher_state: Arc<CipherState>,
        initial_irb: Irb,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            local_name: local_name.into(),
            routing_table,
            cipher_state,
            last_irb: initial_irb,
        }
    }

    /// Drives the reconfiguration loop until `cancel` fires or the
    /// notification channel closes.
    ///
    /// Takes `changes` by mutable reference rather than by value so the
    /// caller can keep whatever owns the sending half (e.g. a
    /// [`crate::config::watch::ConfigWatcher`] holding the live `notify`
    /// watcher) alive for exactly as long as this loop runs, instead of it
    /// being dropped the moment the receiver is handed off.
    pub async fn run(mut self, changes: &mut tokio::sync::mpsc::Receiver<()>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                notice = changes.recv() => {
                    if notice.is_none() {
                        return;
                    }
                    if let Err(e) = self.reconcile().await {
                        tracing::error!("config reconciliation failed: {e}");
                    }
                }
            }
        }
    }

    async fn reconcile(&mut self) -> crate::Result<()> {
        tracing::info!("reloading configuration from {}", self.config_path);
        let cfg = config::load(&self.config_path).map_err(|e| e.to_string())?;

        let new_irb = config::derive_irb(&cfg, &self.local_name);
        self.routing_table.update(&self.last_irb, &new_irb);
        self.last_irb = new_irb;

        self.rotate_cipher(&cfg)?;

        Ok(())
    }

    fn rotate_cipher(&self, cfg: &Config) -> crate::Result<()> {
        // `insecure` gates crypto unconditionally on reload too, same as
        // startup (`datapath::run`): a config flipped to `insecure = true`
        // must disable encryption even if `[crypto]` is still configured.
        if cfg.server.insecure {
            self.cipher_state.store(None);
            return Ok(());
        }

        let Some(crypto_cfg) = &cfg.crypto else {
            self.cipher_state.store(None);
            return Ok(());
        };

        let cipher = crypto::new_cipher(crypto_cfg.kind, &crypto_cfg.key).map_err(|e| e.to_string())?;
        self.cipher_state.store(Some(Arc::from(cipher)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CryptoConfig, ServerConfig};
    use crate::crypto::CipherKind;
    use crate::router::kernel::NullRouteInstaller;
    use arc_swap::ArcSwapOption;

    fn supervisor() -> (Supervisor, Arc<CipherState>) {
        let cipher_state: Arc<CipherState> = Arc::new(ArcSwapOption::from(None));
        let routing_table = Arc::new(RoutingTable::new("radvpn", Arc::new(NullRouteInstaller)));
        let supervisor = Supervisor::new("unused.toml", "local", routing_table, cipher_state.clone(), Irb::new());
        (supervisor, cipher_state)
    }

    #[test]
    fn insecure_flag_forces_no_cipher_even_with_a_stale_crypto_block() {
        let (supervisor, cipher_state) = supervisor();

        let cfg = Config {
            server: ServerConfig {
                insecure: true,
                ..ServerConfig::default()
            },
            crypto: Some(CryptoConfig {
                kind: CipherKind::Gcm,
                key: "000102030405060708090a0b0c0d0e0f".to_string(),
            }),
            nodes: vec![],
            revision: 1,
        };

        supervisor.rotate_cipher(&cfg).unwrap();
        assert!(cipher_state.load_full().is_none());
    }

    #[test]
    fn secure_flag_with_crypto_block_installs_a_cipher() {
        let (supervisor, cipher_state) = supervisor();

        let cfg = Config {
            server: ServerConfig::default(),
            crypto: Some(CryptoConfig {
                kind: CipherKind::Gcm,
                key: "000102030405060708090a0b0c0d0e0f".to_string(),
            }),
            nodes: vec![],
            revision: 1,
        };

        supervisor.rotate_cipher(&cfg).unwrap();
        assert!(cipher_state.load_full().is_some());
    }
}
