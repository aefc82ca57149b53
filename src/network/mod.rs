//! Boundary to the message transport.
//!
//! The engine never talks to a broker itself. Outbound wire bodies go
//! through a [`Transport`] implementation; inbound bodies are fed into the
//! registry by a [`MessagePump`].

mod pump;

pub use pump::*;


#[cfg(test)]
use mockall::automock;

use crate::Result;

#[cfg_attr(test, automock)]
pub trait Transport: Send + Sync + 'static {
    /// Delivers one encoded wire body to the broadcast channel `target`.
    ///
    /// Called from the thread closing a transaction, so implementations may
    /// block up to their own send timeout.
    ///
    /// # Errors
    /// Returns `TransportError::SendFailed` when the message could not be
    /// handed to the broker. The caller keeps its local state either way.
    fn send(
        &self,
        message: &str,
        target: &str,
    ) -> Result<()>;
}
