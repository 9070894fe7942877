// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Connectivity signal.
//!
//! The host feeds platform online/offline events into
//! [`NetworkMonitor::set_online`]. The scheduler reads the current value
//! synchronously between operations and watches the channel for the
//! offline → online edge.

use tokio::sync::watch;
use tracing::info;

#[derive(Debug)]
pub struct NetworkMonitor {
    tx: watch::Sender<bool>,
}

impl NetworkMonitor {
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        crate::metrics::set_online(online);
        Self { tx }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Report a connectivity change. Repeated values are not re-broadcast.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "Network status changed");
            crate::metrics::set_online(online);
        }
    }

    /// Receiver notified on every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for NetworkMonitor {
    /// Online until told otherwise.
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_online() {
        assert!(NetworkMonitor::default().is_online());
    }

    #[tokio::test]
    async fn test_transitions_notify_subscribers() {
        let network = NetworkMonitor::new(false);
        let mut rx = network.subscribe();

        network.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        assert!(network.is_online());
    }

    #[test]
    fn test_same_value_is_not_rebroadcast() {
        let network = NetworkMonitor::new(true);
        let rx = network.subscribe();
        network.set_online(true);
        assert!(!rx.has_changed().unwrap());

        network.set_online(false);
        assert!(rx.has_changed().unwrap());
    }
}
