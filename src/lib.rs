//! Replicated shared hashes and queues with change notification.
//!
//! A [`SharedObjectRegistry`] owns the subjects of one process: plain
//! [`SharedHash`]es and insertion-ordered [`SharedQueue`]s of versioned
//! [`Entry`]s. Local changes are batched into wire messages and handed to a
//! [`Transport`]; messages from peers are replayed with
//! [`SharedObjectRegistry::apply_wire_message`], typically by a
//! [`MessagePump`]. A [`ChangeNotifier`] fans every change out to the
//! subscribers whose criteria match it.
//!
//! ## Example
//! ```rust,ignore
//! let registry = Arc::new(SharedObjectRegistry::new(SharedConfig::new()?.validate()?, transport));
//! let notifier = ChangeNotifier::new(registry.clone());
//! notifier.start();
//!
//! let watcher = notifier.subscriber("fsview");
//! watcher.subscribe_subject_regex(NotificationType::Modification, "^/eos/.*/fst$")?;
//! watcher.start_notify();
//!
//! registry.create_subject("/eos/node1/fst", "/eos/*/mgm", SubjectType::Hash)?;
//! if let Some(fst) = registry.hash("/eos/node1/fst") {
//!     fst.set("stat.active", "online", true, true);
//! }
//! let event = watcher.fetch_default()?;
//! ```

mod codec;
mod config;
mod constants;
mod errors;
mod metrics;
mod network;
mod notify;
mod registry;
mod shared;

pub use codec::*;
pub use config::*;
pub use constants::*;
pub use errors::*;
pub use metrics::*;
pub use network::*;
pub use notify::*;
pub use registry::*;
pub use shared::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
