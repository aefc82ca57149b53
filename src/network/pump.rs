use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::SharedObjectRegistry;

/// Feeds raw wire bodies received from the transport into a registry
#[derive(Debug, Clone)]
pub struct MessagePump {
    registry: Arc<SharedObjectRegistry>,
}

impl MessagePump {
    pub fn new(registry: Arc<SharedObjectRegistry>) -> Self {
        Self { registry }
    }

    /// Applies inbound bodies until `shutdown` fires or the sender side is
    /// dropped. Rejected messages are logged and skipped.
    ///
    /// Each body is applied on the blocking pool, one at a time and in
    /// arrival order, since replies to broadcast requests go through the
    /// synchronous [`Transport`](crate::Transport).
    ///
    /// Returns the number of messages applied successfully.
    pub async fn run(
        &self,
        mut inbound: mpsc::Receiver<String>,
        shutdown: CancellationToken,
    ) -> u64 {
        let mut applied = 0;
        info!("message pump started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("message pump received shutdown signal");
                    break;
                }
                body = inbound.recv() => {
                    let Some(body) = body else {
                        debug!("inbound channel closed");
                        break;
                    };
                    let len = body.len();
                    let registry = self.registry.clone();
                    // answering a bcrequest calls the blocking transport
                    let outcome =
                        tokio::task::spawn_blocking(move || registry.apply_wire_message(&body)).await;
                    match outcome {
                        Ok(Ok(())) => applied += 1,
                        Ok(Err(e)) => error!(%e, len, "rejected inbound message"),
                        Err(e) => error!(%e, len, "apply task failed"),
                    }
                }
            }
        }

        info!(applied, "message pump stopped");
        applied
    }
}
