//! In-app toast stream.

use tokio::sync::broadcast;

use crate::error::AppError;
use crate::models::Toast;
use crate::services::alerts::ToastSink;

/// Default number of toasts buffered per subscriber.
pub const TOAST_CHANNEL_CAPACITY: usize = 64;

/// Publishes toasts to every subscriber (the CLI prints them).
///
/// Having no subscriber is not an error; the toast is simply dropped.
#[derive(Debug, Clone)]
pub struct BroadcastToasts {
    tx: broadcast::Sender<Toast>,
}

impl BroadcastToasts {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastToasts {
    fn default() -> Self {
        Self::new(TOAST_CHANNEL_CAPACITY)
    }
}

impl ToastSink for BroadcastToasts {
    fn show(&self, toast: Toast) -> Result<(), AppError> {
        if self.tx.send(toast).is_err() {
            log::debug!("[toasts] No toast subscribers, dropping toast");
        }
        Ok(())
    }
}
