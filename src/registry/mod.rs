//! Registry of shared subjects and the replication paths around it.
//!
//! - [`SharedObjectRegistry`]: owns both subject namespaces
//! - [`SharedContext`]: handle the containers use to post notifications,
//!   join a mux transaction and reach the transport
//! - [`MuxTransaction`]: batches hash updates of many subjects into one
//!   `muxupdate` message
//! - `apply`: replay of inbound wire messages

mod apply;
mod context;
mod mux;
#[allow(clippy::module_inception)]
mod registry;

pub use context::*;
pub use mux::*;
pub use registry::*;
