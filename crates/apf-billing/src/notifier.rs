//! Fire-and-forget delivery of revenue ledger events.
//!
//! Events go through a bounded queue to a background worker. Enqueueing never
//! waits: when the queue is full or the worker is gone the event is dropped
//! with a warning, and the calling operation is unaffected.

use apf_core::ports::{LedgerEvent, RevenueLedger};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum Message {
    Event(LedgerEvent),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct LedgerNotifier {
    tx: mpsc::Sender<Message>,
}

impl LedgerNotifier {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(ledger: Arc<dyn RevenueLedger>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run_worker(ledger, rx));
        Self { tx }
    }

    pub fn notify(&self, event: LedgerEvent) {
        if let Err(err) = self.tx.try_send(Message::Event(event)) {
            let reason = match err {
                TrySendError::Full(_) => "queue full",
                TrySendError::Closed(_) => "worker stopped",
            };
            warn!(reason, "Dropping revenue ledger notification");
        }
    }

    /// Wait until everything queued before this call has been applied.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Message::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

async fn run_worker(ledger: Arc<dyn RevenueLedger>, mut rx: mpsc::Receiver<Message>) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Event(event) => {
                if let Err(e) = ledger.apply(&event).await {
                    warn!(kind = event.kind(), error = %e, "Revenue ledger rejected event");
                }
            }
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Revenue ledger notifier stopped");
}
