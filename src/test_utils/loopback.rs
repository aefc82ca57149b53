use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

use crate::Result;
use crate::Transport;
use crate::TransportError;
use crate::WireMessage;

/// Transport that keeps every sent body in memory
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail until switched back
    pub fn fail_sends(
        &self,
        fail: bool,
    ) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// `(target, body)` of every successful send, oldest first
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, body)| body.clone()).collect()
    }

    pub fn decoded(&self) -> Vec<WireMessage> {
        self.bodies()
            .iter()
            .map(|body| WireMessage::decode(body).expect("loopback only holds valid bodies"))
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Removes and returns everything sent so far
    pub fn take(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Transport for LoopbackTransport {
    fn send(
        &self,
        message: &str,
        target: &str,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed {
                target: target.to_string(),
                reason: "loopback configured to fail".to_string(),
            }
            .into());
        }
        self.sent
            .lock()
            .push((target.to_string(), message.to_string()));
        Ok(())
    }
}
