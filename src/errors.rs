//! Shared Object Error Hierarchy
//!
//! Defines the error types of the shared-object engine, categorized by the
//! layer that raises them: local subject state, wire codec, subscriptions
//! and transport.

use config::ConfigError;

use crate::SubjectType;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Subject lookup / lifecycle failures on the local registry
    #[error(transparent)]
    Subject(#[from] SubjectError),

    /// Malformed or unsupported wire messages
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Subscription management and fetch failures
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Message delivery failures
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, thiserror::Error)]
pub enum SubjectError {
    #[error("unknown subject {subject} ({subject_type})")]
    NotFound {
        subject: String,
        subject_type: SubjectType,
    },

    /// Name the wire grammar would read as a wildcard pattern
    #[error("invalid subject name {subject:?}")]
    InvalidName { subject: String },

    #[error("subject {subject} ({subject_type}) already exists")]
    AlreadyExists {
        subject: String,
        subject_type: SubjectType,
    },

    /// Operation is only defined for one of the two namespaces
    #[error("{operation} is not supported for {subject_type} subjects")]
    UnsupportedType {
        operation: &'static str,
        subject_type: SubjectType,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("missing field {0}")]
    MissingField(&'static str),

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("unknown subject type {0:?}")]
    UnknownType(String),

    #[error("malformed field {0:?}")]
    MalformedField(String),

    #[error("malformed pair {0:?}")]
    MalformedPair(String),

    #[error("invalid change id {0:?}")]
    InvalidChangeId(String),

    #[error("invalid escape sequence in {0:?}")]
    InvalidEscape(String),

    #[error("mux index {index} out of range for {subjects} subjects")]
    MuxIndexOutOfRange { index: usize, subjects: usize },

    #[error("key {0:?} lacks the #<index># mux prefix")]
    MissingMuxPrefix(String),

    #[error("invalid subject pattern {0:?}")]
    InvalidSubjectPattern(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// Regex failed to compile; nothing was registered
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Subscriber was cancelled while waiting for events
    #[error("subscriber {0} cancelled")]
    Cancelled(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to send message to {target}: {reason}")]
    SendFailed { target: String, reason: String },

    #[error("message of {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },
}

impl Error {
    /// True for errors caused by a malformed inbound message
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Error::Codec(_))
    }
}
