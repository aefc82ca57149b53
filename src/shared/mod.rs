//! Versioned key/value containers shared between daemons.
//!
//! A subject is backed by a [`Container`]. Two flavours exist, each living
//! in its own registry namespace:
//!
//! - [`SharedHash`]: plain map of key to [`Entry`]
//! - [`SharedQueue`]: the same map plus the FIFO order of live entries
//!
//! The flavour is selected by the [`InsertionOrder`] hooks the container is
//! instantiated with.

mod container;
mod entry;
mod order;
mod queue;

pub use container::*;
pub use entry::*;
pub use order::*;


use std::fmt;

use crate::CodecError;

/// Namespace a subject lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubjectType {
    Hash,
    Queue,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::Hash => "hash",
            SubjectType::Queue => "queue",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CodecError> {
        match value {
            "hash" => Ok(SubjectType::Hash),
            "queue" => Ok(SubjectType::Queue),
            other => Err(CodecError::UnknownType(other.to_string())),
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plain shared hash
pub type SharedHash = Container<Unordered>;

/// Shared hash that also keeps its live entries in first-insertion order
pub type SharedQueue = Container<FifoOrder>;
