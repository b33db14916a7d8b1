//! Per-sign dispatch: one queue and worker task per sign id.
//!
//! Requests for the same sign run strictly in arrival order; different
//! signs run in parallel. The worker owns the whole override lifecycle,
//! so the HTTP handler never blocks on sign I/O.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

use crate::overrides::{Orchestrator, OverrideRequest};

/// Dispatch errors reported back to the HTTP handler.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The sign's queue is at capacity; the caller should retry later.
    #[error("Override queue for sign {0} is full")]
    QueueFull(String),
}

/// Routes validated override requests onto per-sign worker queues.
pub struct Dispatcher {
    orchestrator: Arc<Orchestrator>,
    queues: Mutex<HashMap<String, mpsc::Sender<OverrideRequest>>>,
    queue_depth: usize,
}

impl Dispatcher {
    pub fn new(orchestrator: Arc<Orchestrator>, queue_depth: usize) -> Self {
        Self {
            orchestrator,
            queues: Mutex::new(HashMap::new()),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Enqueue a validated request on its sign's worker, creating the
    /// worker on first use.
    pub async fn dispatch(&self, request: OverrideRequest) -> Result<(), DispatchError> {
        let sign_id = request.sign_id.clone();
        let mut queues = self.queues.lock().await;
        let tx = match queues.get(&sign_id) {
            Some(tx) if !tx.is_closed() => tx.clone(),
            _ => {
                let tx = self.spawn_worker(&sign_id);
                queues.insert(sign_id.clone(), tx.clone());
                tx
            }
        };
        drop(queues);

        tx.try_send(request)
            .map_err(|_| DispatchError::QueueFull(sign_id))
    }

    fn spawn_worker(&self, sign_id: &str) -> mpsc::Sender<OverrideRequest> {
        let (tx, mut rx) = mpsc::channel::<OverrideRequest>(self.queue_depth);
        let orchestrator = Arc::clone(&self.orchestrator);
        let sign_id = sign_id.to_string();
        info!(sign_id = %sign_id, "Spawning override worker");

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match orchestrator.run(request).await {
                    Ok(()) => info!(sign_id = %sign_id, "Override completed"),
                    Err(e) => warn!(sign_id = %sign_id, error = %e, "Override failed"),
                }
            }
        });
        tx
    }
}
