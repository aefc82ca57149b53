use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;
use regex::Regex;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::NotifierShared;
use super::Notification;
use super::NotificationType;
use crate::Result;
use crate::SubscriptionError;

/// One thing a subscriber can watch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Criterion {
    /// Exact key, any subject
    Key(String),
    /// Key matching a regex, any subject
    KeyRegex(String),
    /// Exact subject, any key
    Subject(String),
    /// Subject matching a regex, any key
    SubjectRegex(String),
    /// Any of `subjects` combined with any of `keys`
    SubjectAndKey {
        subjects: BTreeSet<String>,
        keys: BTreeSet<String>,
    },
}

impl Criterion {
    fn pattern(&self) -> Option<&str> {
        match self {
            Criterion::KeyRegex(p) | Criterion::SubjectRegex(p) => Some(p),
            _ => None,
        }
    }
}

/// A subscriber's own copy of its criteria
///
/// Survives deactivation and is copied back into the shared index when the
/// subscriber starts listening again.
#[derive(Debug, Default)]
pub(crate) struct WatchSet {
    active: bool,
    criteria: HashMap<NotificationType, HashSet<Criterion>>,
    patterns: HashMap<String, Arc<Regex>>,
}

impl WatchSet {
    fn insert(
        &mut self,
        kind: NotificationType,
        criterion: Criterion,
        regex: Option<Arc<Regex>>,
    ) -> bool {
        if let (Some(pattern), Some(regex)) = (criterion.pattern(), regex) {
            self.patterns.entry(pattern.to_string()).or_insert(regex);
        }
        self.criteria.entry(kind).or_default().insert(criterion)
    }

    fn remove(
        &mut self,
        kind: NotificationType,
        criterion: &Criterion,
    ) -> bool {
        let Some(set) = self.criteria.get_mut(&kind) else {
            return false;
        };
        let removed = set.remove(criterion);
        if set.is_empty() {
            self.criteria.remove(&kind);
        }
        if let Some(pattern) = criterion.pattern() {
            if !self.references(pattern) {
                self.patterns.remove(pattern);
            }
        }
        removed
    }

    fn references(
        &self,
        pattern: &str,
    ) -> bool {
        self.criteria
            .values()
            .flatten()
            .any(|c| c.pattern() == Some(pattern))
    }

    fn regex_for(
        &self,
        criterion: &Criterion,
    ) -> Option<Arc<Regex>> {
        self.patterns.get(criterion.pattern()?).cloned()
    }

    fn entries(&self) -> impl Iterator<Item = (NotificationType, &Criterion)> {
        self.criteria
            .iter()
            .flat_map(|(kind, set)| set.iter().map(move |c| (*kind, c)))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

/// Catalog entry of one named consumer
#[derive(Debug)]
pub(crate) struct Subscriber {
    name: String,
    watches: Mutex<WatchSet>,
    queue: Mutex<VecDeque<Notification>>,
    wake: Condvar,
    cancelled: AtomicBool,
}

impl Subscriber {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            watches: Mutex::new(WatchSet::default()),
            queue: Mutex::new(VecDeque::new()),
            wake: Condvar::new(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Queues without waking; the dispatcher wakes once per event
    pub(crate) fn enqueue(
        &self,
        notification: Notification,
    ) {
        self.queue.lock().push_back(notification);
    }

    pub(crate) fn wake(&self) {
        let _queue = self.queue.lock();
        self.wake.notify_all();
    }

    pub(crate) fn cancel(&self) {
        let _queue = self.queue.lock();
        self.cancelled.store(true, Ordering::Release);
        self.wake.notify_all();
    }

    pub(crate) fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Consumer side of a named subscriber
///
/// Cloning the handle shares the subscriber. Criteria added while the
/// subscriber is not listening only touch its own watch set; the shared
/// index is updated by [`start_notify`](Self::start_notify).
///
/// A listening subscriber keeps its catalog name even with no criteria left;
/// an idle one with an empty watch set is dropped from the catalog.
#[derive(Clone)]
pub struct SubscriberHandle {
    subscriber: Arc<Subscriber>,
    shared: Arc<NotifierShared>,
}

impl std::fmt::Debug for SubscriberHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("name", &self.subscriber.name)
            .field("active", &self.is_active())
            .field("pending", &self.pending())
            .finish()
    }
}

impl SubscriberHandle {
    pub(crate) fn new(
        subscriber: Arc<Subscriber>,
        shared: Arc<NotifierShared>,
    ) -> Self {
        Self { subscriber, shared }
    }

    pub fn name(&self) -> &str {
        &self.subscriber.name
    }

    pub fn is_active(&self) -> bool {
        self.subscriber.watches.lock().active
    }

    pub fn subscribe_key(
        &self,
        kind: NotificationType,
        key: &str,
    ) -> bool {
        self.watch(kind, Criterion::Key(key.to_string()), None)
    }

    /// `true` if at least one of `keys` was new
    pub fn subscribe_keys<'a>(
        &self,
        kind: NotificationType,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        keys.into_iter()
            .fold(false, |added, key| self.subscribe_key(kind, key) || added)
    }

    pub fn subscribe_subject(
        &self,
        kind: NotificationType,
        subject: &str,
    ) -> bool {
        self.watch(kind, Criterion::Subject(subject.to_string()), None)
    }

    pub fn subscribe_subjects<'a>(
        &self,
        kind: NotificationType,
        subjects: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        subjects
            .into_iter()
            .fold(false, |added, subject| self.subscribe_subject(kind, subject) || added)
    }

    /// # Errors
    /// `SubscriptionError::InvalidPattern`; nothing is registered then.
    pub fn subscribe_key_regex(
        &self,
        kind: NotificationType,
        pattern: &str,
    ) -> Result<bool> {
        let regex = self.shared.patterns.compile(pattern)?;
        Ok(self.watch(kind, Criterion::KeyRegex(pattern.to_string()), Some(regex)))
    }

    /// # Errors
    /// `SubscriptionError::InvalidPattern`; nothing is registered then.
    pub fn subscribe_subject_regex(
        &self,
        kind: NotificationType,
        pattern: &str,
    ) -> Result<bool> {
        let regex = self.shared.patterns.compile(pattern)?;
        Ok(self.watch(kind, Criterion::SubjectRegex(pattern.to_string()), Some(regex)))
    }

    /// Watches every key of `keys` on every subject of `subjects`
    pub fn subscribe_subject_and_key<'a>(
        &self,
        kind: NotificationType,
        subjects: impl IntoIterator<Item = &'a str>,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        self.watch(kind, compound(subjects, keys), None)
    }

    pub fn unsubscribe_key(
        &self,
        kind: NotificationType,
        key: &str,
    ) -> bool {
        self.unwatch(kind, &Criterion::Key(key.to_string()))
    }

    pub fn unsubscribe_keys<'a>(
        &self,
        kind: NotificationType,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        keys.into_iter()
            .fold(false, |removed, key| self.unsubscribe_key(kind, key) || removed)
    }

    pub fn unsubscribe_subject(
        &self,
        kind: NotificationType,
        subject: &str,
    ) -> bool {
        self.unwatch(kind, &Criterion::Subject(subject.to_string()))
    }

    pub fn unsubscribe_subjects<'a>(
        &self,
        kind: NotificationType,
        subjects: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        subjects
            .into_iter()
            .fold(false, |removed, subject| self.unsubscribe_subject(kind, subject) || removed)
    }

    pub fn unsubscribe_key_regex(
        &self,
        kind: NotificationType,
        pattern: &str,
    ) -> bool {
        self.unwatch(kind, &Criterion::KeyRegex(pattern.to_string()))
    }

    pub fn unsubscribe_subject_regex(
        &self,
        kind: NotificationType,
        pattern: &str,
    ) -> bool {
        self.unwatch(kind, &Criterion::SubjectRegex(pattern.to_string()))
    }

    pub fn unsubscribe_subject_and_key<'a>(
        &self,
        kind: NotificationType,
        subjects: impl IntoIterator<Item = &'a str>,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        self.unwatch(kind, &compound(subjects, keys))
    }

    /// Drops every criterion, stops listening and removes the subscriber
    /// from the catalog
    pub fn unsubscribe_all(&self) {
        {
            let mut watches = self.subscriber.watches.lock();
            if watches.active {
                let mut index = self.shared.index.lock();
                for (kind, criterion) in watches.entries() {
                    index.remove(kind, criterion, &self.subscriber.name);
                }
            }
            *watches = WatchSet::default();
        }
        self.shared.patterns.purge();
        self.forget();
    }

    /// Starts delivering events; `false` if already listening, or if the
    /// name now belongs to another subscriber created after this one was
    /// removed from the catalog
    pub fn start_notify(&self) -> bool {
        let mut watches = self.subscriber.watches.lock();
        if watches.active {
            return false;
        }
        if !self.register() {
            warn!(subscriber = %self.subscriber.name, "name taken by another subscriber, not starting");
            return false;
        }
        watches.active = true;

        let mut index = self.shared.index.lock();
        for (kind, criterion) in watches.entries() {
            index.insert(kind, criterion, watches.regex_for(criterion), &self.subscriber.name);
        }
        debug!(subscriber = %self.subscriber.name, "started notify");
        true
    }

    /// Stops delivering events; the watch set is kept. `false` if not
    /// listening
    pub fn stop_notify(&self) -> bool {
        let empty = {
            let mut watches = self.subscriber.watches.lock();
            if !watches.active {
                return false;
            }
            watches.active = false;

            let mut index = self.shared.index.lock();
            for (kind, criterion) in watches.entries() {
                index.remove(kind, criterion, &self.subscriber.name);
            }
            watches.is_empty()
        };
        debug!(subscriber = %self.subscriber.name, "stopped notify");
        if empty {
            self.forget();
        }
        true
    }

    /// Next queued event, waiting up to `timeout` for one.
    ///
    /// Events queued before a cancellation are still handed out.
    ///
    /// # Errors
    /// `SubscriptionError::Cancelled` once the subscriber is cancelled and
    /// its queue is drained.
    pub fn fetch(
        &self,
        timeout: Duration,
    ) -> Result<Option<Notification>> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.subscriber.queue.lock();
        loop {
            if let Some(notification) = queue.pop_front() {
                return Ok(Some(notification));
            }
            if self.subscriber.is_cancelled() {
                return Err(SubscriptionError::Cancelled(self.subscriber.name.clone()).into());
            }
            if self.subscriber.wake.wait_until(&mut queue, deadline).timed_out() {
                return Ok(queue.pop_front());
            }
        }
    }

    /// [`fetch`](Self::fetch) with the configured timeout
    pub fn fetch_default(&self) -> Result<Option<Notification>> {
        self.fetch(self.shared.fetch_timeout)
    }

    /// Events queued and not fetched yet
    pub fn pending(&self) -> usize {
        self.subscriber.queue.lock().len()
    }

    /// Wakes every blocked `fetch`; later fetches fail once the queue is
    /// drained
    pub fn cancel(&self) {
        self.subscriber.cancel();
    }

    fn watch(
        &self,
        kind: NotificationType,
        criterion: Criterion,
        regex: Option<Arc<Regex>>,
    ) -> bool {
        let mut watches = self.subscriber.watches.lock();
        if !watches.insert(kind, criterion.clone(), regex) {
            return false;
        }
        // only inactive subscribers are ever dropped from the catalog
        self.register();

        if watches.active {
            let regex = watches.regex_for(&criterion);
            self.shared
                .index
                .lock()
                .insert(kind, &criterion, regex, &self.subscriber.name);
        }
        trace!(subscriber = %self.subscriber.name, %kind, ?criterion, "subscribed");
        true
    }

    fn unwatch(
        &self,
        kind: NotificationType,
        criterion: &Criterion,
    ) -> bool {
        let empty = {
            let mut watches = self.subscriber.watches.lock();
            if !watches.remove(kind, criterion) {
                return false;
            }
            if watches.active {
                self.shared
                    .index
                    .lock()
                    .remove(kind, criterion, &self.subscriber.name);
            }
            watches.is_empty() && !watches.active
        };

        trace!(subscriber = %self.subscriber.name, %kind, ?criterion, "unsubscribed");
        if criterion.pattern().is_some() {
            self.shared.patterns.purge();
        }
        if empty {
            self.forget();
        }
        true
    }

    /// Puts this subscriber in the catalog if its name is free; `false` if
    /// another subscriber holds the name
    fn register(&self) -> bool {
        let registered = self
            .shared
            .catalog
            .entry(self.subscriber.name.clone())
            .or_insert_with(|| self.subscriber.clone());
        Arc::ptr_eq(registered.value(), &self.subscriber)
    }

    /// Drops this subscriber from the catalog if it is still the one
    /// registered under its name
    fn forget(&self) {
        let removed = self
            .shared
            .catalog
            .remove_if(&self.subscriber.name, |_, s| Arc::ptr_eq(s, &self.subscriber));
        if removed.is_some() {
            debug!(subscriber = %self.subscriber.name, "removed empty subscriber");
        }
    }
}

fn compound<'a>(
    subjects: impl IntoIterator<Item = &'a str>,
    keys: impl IntoIterator<Item = &'a str>,
) -> Criterion {
    Criterion::SubjectAndKey {
        subjects: subjects.into_iter().map(str::to_string).collect(),
        keys: keys.into_iter().map(str::to_string).collect(),
    }
}
