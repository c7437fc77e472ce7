//! Viewing capability for pending emails.
//!
//! Whether the current principal may view the approval queue is decided by
//! the backend. The gate holds the last known answer and lets the poller
//! react when it changes.

use tokio::sync::watch;

/// Observable "can view pending emails" flag.
#[derive(Debug, Clone)]
pub struct CapabilityGate {
    tx: watch::Sender<bool>,
}

impl CapabilityGate {
    pub fn new(initial: bool) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Current value of the capability.
    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }

    /// Update the capability. Subscribers are only woken on a real change.
    pub fn set(&self, allowed: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == allowed {
                false
            } else {
                *current = allowed;
                true
            }
        });

        if changed {
            log::info!(
                "[capability] Pending email access {}",
                if allowed { "granted" } else { "revoked" }
            );
        }
    }

    /// Receive change notifications.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
