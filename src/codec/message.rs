use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use super::seal;
use super::unseal;
use super::SubjectPattern;
use crate::CodecError;
use crate::SubjectType;
use crate::CHANGE_ID_SEPARATOR;
use crate::FIELD_ASSIGN;
use crate::FIELD_CMD;
use crate::FIELD_KEYS;
use crate::FIELD_PAIRS;
use crate::FIELD_REPLY;
use crate::FIELD_SEPARATOR;
use crate::FIELD_SUBJECT;
use crate::FIELD_TYPE;
use crate::MUX_PREFIX_DELIMITER;
use crate::PAIR_SEPARATOR;
use crate::SUBJECT_LIST_SEPARATOR;
use crate::VALUE_SEPARATOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireCommand {
    Update,
    MuxUpdate,
    BroadcastRequest,
    BroadcastReply,
    Delete,
    Remove,
}

impl WireCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            WireCommand::Update => "update",
            WireCommand::MuxUpdate => "muxupdate",
            WireCommand::BroadcastRequest => "bcrequest",
            WireCommand::BroadcastReply => "bcreply",
            WireCommand::Delete => "delete",
            WireCommand::Remove => "remove",
        }
    }

    pub fn parse(cmd: &str) -> Result<Self, CodecError> {
        match cmd {
            "update" => Ok(WireCommand::Update),
            "muxupdate" => Ok(WireCommand::MuxUpdate),
            "bcrequest" => Ok(WireCommand::BroadcastRequest),
            "bcreply" => Ok(WireCommand::BroadcastReply),
            "delete" => Ok(WireCommand::Delete),
            "remove" => Ok(WireCommand::Remove),
            other => Err(CodecError::UnknownCommand(other.to_string())),
        }
    }

    /// Commands carrying key/value pairs
    pub fn carries_pairs(&self) -> bool {
        matches!(
            self,
            WireCommand::Update | WireCommand::MuxUpdate | WireCommand::BroadcastReply
        )
    }

    /// Commands allowed to create the subjects they name
    pub fn creates_subjects(&self) -> bool {
        self.carries_pairs()
    }
}

impl fmt::Display for WireCommand {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One replicated key/value with its change id
///
/// `subject_index` points into [`WireMessage::subjects`]; it is always `0`
/// for messages naming a single subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirePair {
    pub subject_index: usize,
    pub key: String,
    pub value: String,
    pub change_id: u64,
}

impl WirePair {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        change_id: u64,
    ) -> Self {
        Self {
            subject_index: 0,
            key: key.into(),
            value: value.into(),
            change_id,
        }
    }

    pub fn with_subject_index(
        mut self,
        subject_index: usize,
    ) -> Self {
        self.subject_index = subject_index;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireBody {
    /// `remove`
    Empty,
    /// `update`, `muxupdate`, `bcreply`
    Pairs(Vec<WirePair>),
    /// `delete`
    Keys(Vec<String>),
    /// `bcrequest`: where the snapshot has to be sent
    Reply(String),
}

/// Decoded form of a shared-object wire message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub command: WireCommand,
    /// One name, one wildcard pattern, or several names of a multiplexed message
    pub subjects: Vec<String>,
    pub subject_type: SubjectType,
    pub body: WireBody,
}

impl WireMessage {
    pub fn update(
        subject: impl Into<String>,
        subject_type: SubjectType,
        pairs: Vec<WirePair>,
    ) -> Self {
        Self {
            command: WireCommand::Update,
            subjects: vec![subject.into()],
            subject_type,
            body: WireBody::Pairs(pairs),
        }
    }

    /// Update spanning several hash subjects; each pair's `subject_index`
    /// selects its subject
    pub fn mux_update(
        subjects: Vec<String>,
        pairs: Vec<WirePair>,
    ) -> Self {
        Self {
            command: WireCommand::MuxUpdate,
            subjects,
            subject_type: SubjectType::Hash,
            body: WireBody::Pairs(pairs),
        }
    }

    pub fn broadcast_reply(
        subject: impl Into<String>,
        subject_type: SubjectType,
        pairs: Vec<WirePair>,
    ) -> Self {
        Self {
            command: WireCommand::BroadcastReply,
            subjects: vec![subject.into()],
            subject_type,
            body: WireBody::Pairs(pairs),
        }
    }

    pub fn broadcast_request(
        subject: impl Into<String>,
        subject_type: SubjectType,
        reply_to: impl Into<String>,
    ) -> Self {
        Self {
            command: WireCommand::BroadcastRequest,
            subjects: vec![subject.into()],
            subject_type,
            body: WireBody::Reply(reply_to.into()),
        }
    }

    pub fn delete(
        subject: impl Into<String>,
        subject_type: SubjectType,
        keys: Vec<String>,
    ) -> Self {
        Self {
            command: WireCommand::Delete,
            subjects: vec![subject.into()],
            subject_type,
            body: WireBody::Keys(keys),
        }
    }

    pub fn remove(
        subject: impl Into<String>,
        subject_type: SubjectType,
    ) -> Self {
        Self {
            command: WireCommand::Remove,
            subjects: vec![subject.into()],
            subject_type,
            body: WireBody::Empty,
        }
    }

    /// Keys get the `#<index>#` prefix exactly when more than one subject is named
    pub fn is_multiplexed(&self) -> bool {
        self.subjects.len() > 1
    }

    /// Resolved subject field; only single-subject messages may carry a wildcard
    pub fn subject_patterns(&self) -> Result<Vec<SubjectPattern>, CodecError> {
        let patterns = self
            .subjects
            .iter()
            .map(|s| SubjectPattern::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        if patterns.len() > 1 {
            if let Some(wildcard) = patterns.iter().find(|p| p.is_wildcard()) {
                return Err(CodecError::InvalidSubjectPattern(format!("{wildcard:?}")));
            }
        }
        Ok(patterns)
    }

    /// Serializes the message body
    ///
    /// `mqsh.cmd=<cmd>&mqsh.subject=<s1%s2..>&mqsh.type=<type>[&<payload field>]`
    pub fn encode(&self) -> String {
        let subjects = self
            .subjects
            .iter()
            .map(|s| seal(s))
            .collect::<Vec<_>>()
            .join(&SUBJECT_LIST_SEPARATOR.to_string());

        let mut out = String::new();
        push_field(&mut out, FIELD_CMD, self.command.as_str());
        push_field(&mut out, FIELD_SUBJECT, &subjects);
        push_field(&mut out, FIELD_TYPE, self.subject_type.as_str());

        match &self.body {
            WireBody::Empty => {}
            WireBody::Pairs(pairs) => {
                let encoded = encode_pairs(pairs, self.is_multiplexed());
                push_field(&mut out, FIELD_PAIRS, &encoded);
            }
            WireBody::Keys(keys) => {
                push_field(&mut out, FIELD_KEYS, &encode_keys(keys));
            }
            WireBody::Reply(reply) => {
                push_field(&mut out, FIELD_REPLY, &seal(reply));
            }
        }
        out
    }

    /// Parses a message body; nothing is applied here so a failure leaves
    /// every container untouched
    pub fn decode(body: &str) -> Result<Self, CodecError> {
        let fields = split_fields(body)?;

        let command = WireCommand::parse(fields.get(FIELD_CMD).ok_or(CodecError::MissingField(FIELD_CMD))?)?;
        let subject_field = fields.get(FIELD_SUBJECT).ok_or(CodecError::MissingField(FIELD_SUBJECT))?;
        let subject_type = SubjectType::parse(fields.get(FIELD_TYPE).ok_or(CodecError::MissingField(FIELD_TYPE))?)?;

        let subjects = subject_field
            .split(SUBJECT_LIST_SEPARATOR)
            .map(unseal)
            .collect::<Result<Vec<_>, _>>()?;
        if subjects.iter().any(|s| s.is_empty()) {
            return Err(CodecError::MalformedField(FIELD_SUBJECT.to_string()));
        }
        let multiplexed = subjects.len() > 1;

        let body = match command {
            WireCommand::Update | WireCommand::MuxUpdate | WireCommand::BroadcastReply => {
                let raw = fields.get(FIELD_PAIRS).ok_or(CodecError::MissingField(FIELD_PAIRS))?;
                WireBody::Pairs(decode_pairs(raw, multiplexed, subjects.len())?)
            }
            WireCommand::Delete => {
                let raw = fields.get(FIELD_KEYS).ok_or(CodecError::MissingField(FIELD_KEYS))?;
                WireBody::Keys(decode_keys(raw)?)
            }
            WireCommand::BroadcastRequest => {
                let raw = fields.get(FIELD_REPLY).ok_or(CodecError::MissingField(FIELD_REPLY))?;
                let reply = unseal(raw)?;
                if reply.is_empty() {
                    return Err(CodecError::MalformedField(FIELD_REPLY.to_string()));
                }
                WireBody::Reply(reply)
            }
            WireCommand::Remove => WireBody::Empty,
        };

        let message = WireMessage {
            command,
            subjects,
            subject_type,
            body,
        };
        message.subject_patterns()?;

        trace!(cmd = %message.command, subjects = ?message.subjects, "decoded wire message");
        Ok(message)
    }
}

fn push_field(
    out: &mut String,
    name: &str,
    value: &str,
) {
    if !out.is_empty() {
        out.push(FIELD_SEPARATOR);
    }
    out.push_str(name);
    out.push(FIELD_ASSIGN);
    out.push_str(value);
}

fn split_fields(body: &str) -> Result<HashMap<&str, &str>, CodecError> {
    let mut fields = HashMap::new();
    for token in body.split(FIELD_SEPARATOR).filter(|t| !t.is_empty()) {
        let (name, value) = token
            .split_once(FIELD_ASSIGN)
            .ok_or_else(|| CodecError::MalformedField(token.to_string()))?;
        fields.insert(name, value);
    }
    Ok(fields)
}

/// `|key1~value1%changeid1|key2~value2%changeid2...`
fn encode_pairs(
    pairs: &[WirePair],
    multiplexed: bool,
) -> String {
    let mut out = String::new();
    for pair in pairs {
        out.push(PAIR_SEPARATOR);
        if multiplexed {
            out.push(MUX_PREFIX_DELIMITER);
            out.push_str(&pair.subject_index.to_string());
            out.push(MUX_PREFIX_DELIMITER);
        }
        out.push_str(&seal(&pair.key));
        out.push(VALUE_SEPARATOR);
        out.push_str(&seal(&pair.value));
        out.push(CHANGE_ID_SEPARATOR);
        out.push_str(&pair.change_id.to_string());
    }
    out
}

fn decode_pairs(
    raw: &str,
    multiplexed: bool,
    subject_count: usize,
) -> Result<Vec<WirePair>, CodecError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let body = raw
        .strip_prefix(PAIR_SEPARATOR)
        .ok_or_else(|| CodecError::MalformedField(FIELD_PAIRS.to_string()))?;

    let mut pairs = Vec::new();
    for segment in body.split(PAIR_SEPARATOR) {
        let (raw_key, rest) = segment
            .split_once(VALUE_SEPARATOR)
            .ok_or_else(|| CodecError::MalformedPair(segment.to_string()))?;
        let (raw_value, change_id) = rest
            .split_once(CHANGE_ID_SEPARATOR)
            .ok_or_else(|| CodecError::MalformedPair(segment.to_string()))?;
        let change_id = change_id
            .parse::<u64>()
            .map_err(|_| CodecError::InvalidChangeId(change_id.to_string()))?;

        let (subject_index, sealed_key) = if multiplexed {
            split_mux_prefix(raw_key, subject_count)?
        } else {
            (0, raw_key)
        };

        let key = unseal(sealed_key)?;
        if key.is_empty() {
            return Err(CodecError::MalformedPair(segment.to_string()));
        }

        pairs.push(WirePair {
            subject_index,
            key,
            value: unseal(raw_value)?,
            change_id,
        });
    }
    Ok(pairs)
}

/// Splits `#<index>#<sealed key>`
fn split_mux_prefix(
    raw_key: &str,
    subject_count: usize,
) -> Result<(usize, &str), CodecError> {
    let missing = || CodecError::MissingMuxPrefix(raw_key.to_string());

    let after = raw_key.strip_prefix(MUX_PREFIX_DELIMITER).ok_or_else(missing)?;
    let end = after.find(MUX_PREFIX_DELIMITER).ok_or_else(missing)?;
    let digits = &after[..end];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(missing());
    }
    let index = digits.parse::<usize>().map_err(|_| missing())?;
    if index >= subject_count {
        return Err(CodecError::MuxIndexOutOfRange {
            index,
            subjects: subject_count,
        });
    }
    Ok((index, &after[end + 1..]))
}

/// `|key1|key2|...`
fn encode_keys(keys: &[String]) -> String {
    let mut out = String::new();
    for key in keys {
        out.push(PAIR_SEPARATOR);
        out.push_str(&seal(key));
    }
    out
}

fn decode_keys(raw: &str) -> Result<Vec<String>, CodecError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let body = raw
        .strip_prefix(PAIR_SEPARATOR)
        .ok_or_else(|| CodecError::MalformedField(FIELD_KEYS.to_string()))?;

    body.split(PAIR_SEPARATOR)
        .map(|sealed| {
            let key = unseal(sealed)?;
            if key.is_empty() {
                return Err(CodecError::MalformedField(FIELD_KEYS.to_string()));
            }
            Ok(key)
        })
        .collect()
}
