//! Filesystem-backed config change notifications.
//!
//! spec.md §6 specifies the Config Source's change stream as "a single-slot
//! notification channel; a value means reload... coalescing multiple rapid
//! changes into one is permitted". [`ConfigWatcher`] gets there with
//! `notify` (declared by the teacher crate's `Cargo.toml` but never actually
//! used by it) feeding a bounded `tokio::sync::mpsc` channel of capacity 1,
//! using `try_send` so a burst of filesystem events collapses into at most
//! one pending reload.

use std::path::Path;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Holds the live `notify` watcher alive for as long as the channel should
/// keep producing notifications; dropping it stops the watch.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    pub changes: mpsc::Receiver<()>,
}

impl ConfigWatcher {
    pub fn new(path: impl AsRef<Path>) -> crate::Result<Self> {
        let (tx, rx) = mpsc::channel(1);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                // try_send: if the slot is already full a reload is already
                // pending, so this event is redundant.
                let _ = tx.try_send(());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("config watch error: {e}"),
        })
        .map_err(|e| format!("failed to create config watcher: {e}"))?;

        watcher
            .watch(path.as_ref(), RecursiveMode::NonRecursive)
            .map_err(|e| format!("failed to watch {}: {e}", path.as_ref().display()))?;

        Ok(Self {
            _watcher: watcher,
            changes: rx,
        })
    }
}
