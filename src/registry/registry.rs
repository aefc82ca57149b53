use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::debug;
use tracing::info;

use super::SharedContext;
use crate::Container;
use crate::Entry;
use crate::InsertionOrder;
use crate::Notification;
use crate::Result;
use crate::SharedConfig;
use crate::SharedHash;
use crate::SharedQueue;
use crate::SubjectError;
use crate::SubjectPattern;
use crate::SubjectType;
use crate::Transport;
use crate::WireMessage;

type Namespace<O> = RwLock<HashMap<String, Arc<Container<O>>>>;

/// Owner of every shared hash and queue of one process
///
/// Lookups take the namespace read lock only long enough to clone the
/// container handle; creation and deletion take the write lock. Mutations
/// then run under the container's own lock.
pub struct SharedObjectRegistry {
    config: SharedConfig,
    ctx: Arc<SharedContext>,

    hashes: Namespace<crate::Unordered>,
    queues: Namespace<crate::FifoOrder>,

    /// Held for the whole lifetime of a [`MuxTransaction`](super::MuxTransaction)
    pub(super) mux_lock: Mutex<()>,
}

impl std::fmt::Debug for SharedObjectRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SharedObjectRegistry")
            .field("hashes", &self.hashes.read().len())
            .field("queues", &self.queues.read().len())
            .field("ctx", &self.ctx)
            .finish()
    }
}

/// A container of either namespace
#[derive(Debug, Clone)]
pub(crate) enum SubjectRef {
    Hash(Arc<SharedHash>),
    Queue(Arc<SharedQueue>),
}

impl SubjectRef {
    pub(crate) fn subject(&self) -> &str {
        match self {
            SubjectRef::Hash(c) => c.subject(),
            SubjectRef::Queue(c) => c.subject(),
        }
    }

    pub(crate) fn get_entry(
        &self,
        key: &str,
    ) -> Option<Entry> {
        match self {
            SubjectRef::Hash(c) => c.get_entry(key),
            SubjectRef::Queue(c) => c.get_entry(key),
        }
    }

    pub(crate) fn wire_snapshot(&self) -> Vec<crate::WirePair> {
        match self {
            SubjectRef::Hash(c) => c.wire_snapshot(),
            SubjectRef::Queue(c) => c.wire_snapshot(),
        }
    }

    pub(crate) fn apply_remote_pairs<'a>(
        &self,
        pairs: impl Iterator<Item = &'a crate::WirePair>,
    ) -> Vec<Notification> {
        match self {
            SubjectRef::Hash(c) => c.apply_remote_pairs(pairs),
            SubjectRef::Queue(c) => c.apply_remote_pairs(pairs),
        }
    }

    pub(crate) fn apply_remote_deletes(
        &self,
        keys: &[String],
    ) -> Vec<Notification> {
        match self {
            SubjectRef::Hash(c) => c.apply_remote_deletes(keys),
            SubjectRef::Queue(c) => c.apply_remote_deletes(keys),
        }
    }
}

impl SharedObjectRegistry {
    pub fn new(
        config: SharedConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let ctx = Arc::new(SharedContext::new(&config, transport));
        Self {
            config,
            ctx,
            hashes: RwLock::new(HashMap::new()),
            queues: RwLock::new(HashMap::new()),
            mux_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub(crate) fn context(&self) -> &Arc<SharedContext> {
        &self.ctx
    }

    /// Creates an empty subject broadcasting to `broadcast_target`.
    ///
    /// An empty target falls back to the configured default. If the subject
    /// already exists its broadcast target is still replaced, and
    /// `SubjectError::AlreadyExists` is returned. Names a peer would read as
    /// a wildcard (any `*`) are refused with `SubjectError::InvalidName`.
    pub fn create_subject(
        &self,
        subject: &str,
        broadcast_target: &str,
        subject_type: SubjectType,
    ) -> Result<()> {
        let target = self.resolve_target(broadcast_target);
        match subject_type {
            SubjectType::Hash => {
                self.create_in(&self.hashes, subject, target)?;
            }
            SubjectType::Queue => {
                self.create_in(&self.queues, subject, target)?;
            }
        }
        Ok(())
    }

    fn create_in<O: InsertionOrder>(
        &self,
        namespace: &Namespace<O>,
        subject: &str,
        target: &str,
    ) -> Result<Arc<Container<O>>> {
        validate_name(subject)?;
        let container = {
            let mut map = namespace.write();
            if let Some(existing) = map.get(subject) {
                existing.set_broadcast_target(target);
                return Err(SubjectError::AlreadyExists {
                    subject: subject.to_string(),
                    subject_type: O::SUBJECT_TYPE,
                }
                .into());
            }
            let container = Arc::new(Container::new(subject, target, self.ctx.clone()));
            map.insert(subject.to_string(), container.clone());
            container
        };

        debug!(%subject, subject_type = %O::SUBJECT_TYPE, %target, "created subject");
        self.ctx.post(Notification::creation(subject, O::SUBJECT_TYPE));
        Ok(container)
    }

    /// Existing container, or a fresh one broadcasting to the default target
    pub(crate) fn get_or_create(
        &self,
        subject: &str,
        subject_type: SubjectType,
    ) -> Result<SubjectRef> {
        if let Some(found) = self.get(subject, subject_type) {
            return Ok(found);
        }
        let target = self.config.broadcast.default_target.as_str();
        let created = match subject_type {
            SubjectType::Hash => self.create_in(&self.hashes, subject, target).map(SubjectRef::Hash),
            SubjectType::Queue => self.create_in(&self.queues, subject, target).map(SubjectRef::Queue),
        };

        match created {
            Ok(found) => Ok(found),
            // lost a race against another creator
            Err(crate::Error::Subject(SubjectError::AlreadyExists { .. })) => self
                .get(subject, subject_type)
                .ok_or_else(|| not_found(subject, subject_type)),
            Err(e) => Err(e),
        }
    }

    /// Removes the subject; with `broadcast` a `remove` message is sent to
    /// its broadcast target.
    pub fn delete_subject(
        &self,
        subject: &str,
        subject_type: SubjectType,
        broadcast: bool,
    ) -> Result<()> {
        let target = match subject_type {
            SubjectType::Hash => self.hashes.write().remove(subject).map(|c| c.broadcast_target()),
            SubjectType::Queue => self.queues.write().remove(subject).map(|c| c.broadcast_target()),
        }
        .ok_or_else(|| not_found(subject, subject_type))?;

        debug!(%subject, %subject_type, broadcast, "deleted subject");
        if broadcast && self.ctx.is_broadcasting() {
            self.ctx
                .send_message(WireMessage::remove(subject, subject_type), &target);
        }
        self.ctx.post(Notification::deletion(subject, subject_type));
        Ok(())
    }

    pub fn hash(
        &self,
        subject: &str,
    ) -> Option<Arc<SharedHash>> {
        lookup(&self.hashes, subject)
    }

    pub fn queue(
        &self,
        subject: &str,
    ) -> Option<Arc<SharedQueue>> {
        lookup(&self.queues, subject)
    }

    pub(crate) fn get(
        &self,
        subject: &str,
        subject_type: SubjectType,
    ) -> Option<SubjectRef> {
        match subject_type {
            SubjectType::Hash => self.hash(subject).map(SubjectRef::Hash),
            SubjectType::Queue => self.queue(subject).map(SubjectRef::Queue),
        }
    }

    pub fn contains(
        &self,
        subject: &str,
        subject_type: SubjectType,
    ) -> bool {
        match subject_type {
            SubjectType::Hash => self.hashes.read().contains_key(subject),
            SubjectType::Queue => self.queues.read().contains_key(subject),
        }
    }

    /// Subject names of one namespace, sorted
    pub fn subjects(
        &self,
        subject_type: SubjectType,
    ) -> Vec<String> {
        let mut subjects: Vec<String> = match subject_type {
            SubjectType::Hash => self.hashes.read().keys().cloned().collect(),
            SubjectType::Queue => self.queues.read().keys().cloned().collect(),
        };
        subjects.sort();
        subjects
    }

    /// Existing subjects of `subject_type` selected by `pattern`, sorted
    pub(crate) fn matching(
        &self,
        pattern: &SubjectPattern,
        subject_type: SubjectType,
    ) -> Vec<SubjectRef> {
        self.subjects(subject_type)
            .into_iter()
            .filter(|subject| pattern.matches(subject))
            .filter_map(|subject| self.get(&subject, subject_type))
            .collect()
    }

    /// Entry the dispatcher compares strict modifications against
    pub(crate) fn current_entry(
        &self,
        subject: &str,
        subject_type: SubjectType,
        key: &str,
    ) -> Option<Entry> {
        self.get(subject, subject_type)?.get_entry(key)
    }

    /// Asks the peers listening on `target` to send the full state of the
    /// subjects matching `subject_pattern` to `reply_to`
    pub fn request_broadcast(
        &self,
        subject_pattern: &str,
        subject_type: SubjectType,
        reply_to: &str,
        target: &str,
    ) -> Result<bool> {
        SubjectPattern::parse(subject_pattern)?;
        let message = WireMessage::broadcast_request(subject_pattern, subject_type, reply_to);
        Ok(self.ctx.send_message(message, target))
    }

    /// Turns wire broadcasting of local changes on or off
    pub fn set_broadcast(
        &self,
        enabled: bool,
    ) {
        info!(enabled, "broadcast switched");
        self.ctx.set_broadcast(enabled);
    }

    pub fn is_broadcast_enabled(&self) -> bool {
        self.ctx.is_broadcasting()
    }

    /// Turns posting of change notifications on or off
    pub fn enable_notifications(
        &self,
        enabled: bool,
    ) {
        info!(enabled, "notifications switched");
        self.ctx.set_notify(enabled);
    }

    pub fn notifications_enabled(&self) -> bool {
        self.ctx.is_notifying()
    }

    /// Consumer end of the notification queue
    pub fn event_receiver(&self) -> Receiver<Notification> {
        self.ctx.event_receiver()
    }

    /// Human readable listing of every subject and its entries
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for subject_type in [SubjectType::Hash, SubjectType::Queue] {
            for subject in self.subjects(subject_type) {
                let listing = match subject_type {
                    SubjectType::Hash => self.hash(&subject).map(|c| (c.broadcast_target(), c.dump())),
                    SubjectType::Queue => self.queue(&subject).map(|c| (c.broadcast_target(), c.dump())),
                };
                if let Some((target, entries)) = listing {
                    let _ = writeln!(out, "subject={subject} type={subject_type} target={target}");
                    out.push_str(&entries);
                }
            }
        }
        out
    }

    fn resolve_target<'a>(
        &'a self,
        broadcast_target: &'a str,
    ) -> &'a str {
        if broadcast_target.is_empty() {
            &self.config.broadcast.default_target
        } else {
            broadcast_target
        }
    }
}

fn lookup<O: InsertionOrder>(
    namespace: &Namespace<O>,
    subject: &str,
) -> Option<Arc<Container<O>>> {
    namespace.read().get(subject).cloned()
}

/// Subject names travel verbatim in the wire subject field, where `*` is a
/// wildcard; only names that parse back as exact are accepted
fn validate_name(subject: &str) -> Result<()> {
    match SubjectPattern::parse(subject) {
        Ok(SubjectPattern::Exact(_)) => Ok(()),
        _ => Err(SubjectError::InvalidName {
            subject: subject.to_string(),
        }
        .into()),
    }
}

pub(crate) fn not_found(
    subject: &str,
    subject_type: SubjectType,
) -> crate::Error {
    SubjectError::NotFound {
        subject: subject.to_string(),
        subject_type,
    }
    .into()
}
