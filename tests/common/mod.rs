#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use d_shared::MessagePump;
use d_shared::Result;
use d_shared::SharedConfig;
use d_shared::SharedObjectRegistry;
use d_shared::SubjectPattern;
use d_shared::Transport;
use d_shared::TransportError;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const INBOX_CAPACITY: usize = 1024;

/// In-memory broker: routes bodies to every other peer whose address
/// matches the target, with the same `prefix*` wildcards subjects use
#[derive(Default)]
pub struct Bus {
    routes: Mutex<Vec<(String, mpsc::Sender<String>)>>,
}

/// One registry attached to the bus with its pump running
pub struct Peer {
    pub address: String,
    pub registry: Arc<SharedObjectRegistry>,
    shutdown: CancellationToken,
    pump: JoinHandle<u64>,
}

impl Peer {
    /// Stops the pump; returns the number of messages it applied
    pub async fn shutdown(self) -> u64 {
        self.shutdown.cancel();
        self.pump.await.unwrap_or(0)
    }
}

struct BusTransport {
    bus: Arc<Bus>,
    own_address: String,
}

impl Transport for BusTransport {
    fn send(
        &self,
        message: &str,
        target: &str,
    ) -> Result<()> {
        let pattern = SubjectPattern::parse(target).map_err(|e| TransportError::SendFailed {
            target: target.to_string(),
            reason: e.to_string(),
        })?;

        for (address, inbox) in self.bus.routes.lock().iter() {
            if *address == self.own_address || !pattern.matches(address) {
                continue;
            }
            inbox
                .try_send(message.to_string())
                .map_err(|e| TransportError::SendFailed {
                    target: target.to_string(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

impl Bus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a registry listening on `address` and starts its pump
    pub fn join(
        self: &Arc<Self>,
        address: &str,
    ) -> Peer {
        let transport = Arc::new(BusTransport {
            bus: self.clone(),
            own_address: address.to_string(),
        });
        let registry = Arc::new(SharedObjectRegistry::new(SharedConfig::default(), transport));

        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        self.routes.lock().push((address.to_string(), tx));

        let shutdown = CancellationToken::new();
        let pump = MessagePump::new(registry.clone());
        let token = shutdown.clone();
        let pump = tokio::spawn(async move { pump.run(rx, token).await });

        Peer {
            address: address.to_string(),
            registry,
            shutdown,
            pump,
        }
    }
}

/// Transport that accepts and forgets every body
pub struct Discard;

impl Transport for Discard {
    fn send(
        &self,
        _message: &str,
        _target: &str,
    ) -> Result<()> {
        Ok(())
    }
}

/// Polls `condition` until it holds; panics after five seconds
pub async fn eventually<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
