use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::bounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::Notification;
use super::NotificationType;
use super::PatternCache;
use super::Subscriber;
use super::SubscriberHandle;
use super::SubscriptionIndex;
use crate::SharedObjectRegistry;
use crate::SubjectType;
use crate::NOTIFICATIONS_DISPATCHED;

/// State shared by the dispatcher thread and every subscriber handle
#[derive(Debug)]
pub(crate) struct NotifierShared {
    pub(crate) index: Mutex<SubscriptionIndex>,
    pub(crate) catalog: DashMap<String, Arc<Subscriber>>,
    pub(crate) patterns: PatternCache,
    pub(crate) fetch_timeout: Duration,

    registry: Arc<SharedObjectRegistry>,
    track_strict_values: bool,
    /// Entry serial and value last seen per (type, subject, key), for strict
    /// modifications
    last_values: Mutex<HashMap<(SubjectType, String, String), (u64, String)>>,
}

/// Fans registry notifications out to subscribers
///
/// A dedicated thread drains the registry's event queue. For every event
/// the matching subscribers are collected under the index lock; the events
/// are then queued to each of them and each one is woken once.
///
/// ```text
/// Container::set() -> SharedContext::post() -> event queue
///                                                  |
/// dispatcher thread: recv() -> SubscriptionIndex::collect() -> Subscriber queues
///                                                  |
/// consumer threads:  SubscriberHandle::fetch(timeout)
/// ```
#[derive(Debug)]
pub struct ChangeNotifier {
    shared: Arc<NotifierShared>,
    events: Receiver<Notification>,

    /// Dispatcher thread handle (None when not running)
    thread_handle: Mutex<Option<JoinHandle<()>>>,
    /// Shutdown signal sender (None when not running)
    shutdown_tx: Mutex<Option<Sender<()>>>,
}

impl ChangeNotifier {
    pub fn new(registry: Arc<SharedObjectRegistry>) -> Self {
        let notify = &registry.config().notify;
        let shared = Arc::new(NotifierShared {
            index: Mutex::new(SubscriptionIndex::new()),
            catalog: DashMap::new(),
            patterns: PatternCache::new(),
            fetch_timeout: notify.fetch_timeout(),
            track_strict_values: notify.track_strict_values,
            last_values: Mutex::new(HashMap::new()),
            registry: registry.clone(),
        });

        Self {
            events: registry.event_receiver(),
            shared,
            thread_handle: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Handle of the subscriber named `name`, created on first use
    pub fn subscriber(
        &self,
        name: &str,
    ) -> SubscriberHandle {
        let subscriber = self
            .shared
            .catalog
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Subscriber::new(name)))
            .clone();
        SubscriberHandle::new(subscriber, self.shared.clone())
    }

    /// Names currently in the catalog, sorted
    pub fn subscribers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .shared
            .catalog
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Spawns the dispatcher thread; no-op if it is running
    pub fn start(&self) {
        let mut handle_guard = self.thread_handle.lock();
        if handle_guard.is_some() {
            return;
        }

        for subscriber in self.shared.catalog.iter() {
            subscriber.reset_cancel();
        }

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let shared = self.shared.clone();
        let events = self.events.clone();

        let handle = std::thread::spawn(move || {
            debug!("change dispatcher thread started");

            loop {
                crossbeam_channel::select! {
                    recv(events) -> result => {
                        match result {
                            Ok(event) => {
                                dispatch(&shared, event);
                            }
                            Err(_) => {
                                warn!("event channel closed unexpectedly");
                                break;
                            }
                        }
                    }
                    recv(shutdown_rx) -> _ => {
                        debug!("change dispatcher received shutdown signal");
                        break;
                    }
                }
            }

            let drained = events.try_iter().map(|event| dispatch(&shared, event)).count();
            debug!(drained, "change dispatcher thread stopped");
        });

        *handle_guard = Some(handle);
        *self.shutdown_tx.lock() = Some(shutdown_tx);
    }

    /// Drains queued events, joins the thread and cancels every subscriber
    /// so that blocked fetches return. No-op if not running.
    pub fn stop(&self) {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }

        let Some(handle) = self.thread_handle.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            warn!("change dispatcher thread panicked");
        }

        for subscriber in self.shared.catalog.iter() {
            subscriber.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.lock().is_some()
    }

    #[cfg(test)]
    pub(crate) fn strict_values_tracked(&self) -> usize {
        self.shared.last_values.lock().len()
    }

    /// Dispatches whatever is queued on the calling thread; returns the
    /// number of events handled
    pub fn dispatch_pending(&self) -> usize {
        self.events
            .try_iter()
            .map(|event| dispatch(&self.shared, event))
            .count()
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Delivers `event` to every matching subscriber at most once; returns the
/// number of subscribers it reached
fn dispatch(
    shared: &NotifierShared,
    event: Notification,
) -> usize {
    let changed = strict_changed(shared, &event);

    let mut plain = HashSet::new();
    let mut strict = HashSet::new();
    {
        let index = shared.index.lock();
        index.collect(event.kind, &event.subject, &event.key, &mut plain);
        if changed {
            index.collect(
                NotificationType::StrictModification,
                &event.subject,
                &event.key,
                &mut strict,
            );
        }
    }
    strict.retain(|name| !plain.contains(name));

    let mut woken = Vec::with_capacity(plain.len() + strict.len());
    for name in &plain {
        if let Some(subscriber) = shared.catalog.get(name).map(|s| Arc::clone(s.value())) {
            subscriber.enqueue(event.clone());
            woken.push(subscriber);
        }
    }
    if !strict.is_empty() {
        let strict_event = event.with_kind(NotificationType::StrictModification);
        for name in &strict {
            if let Some(subscriber) = shared.catalog.get(name).map(|s| Arc::clone(s.value())) {
                subscriber.enqueue(strict_event.clone());
                woken.push(subscriber);
            }
        }
    }

    NOTIFICATIONS_DISPATCHED
        .with_label_values(&[event.kind.as_str()])
        .inc_by(plain.len() as u64);
    NOTIFICATIONS_DISPATCHED
        .with_label_values(&[NotificationType::StrictModification.as_str()])
        .inc_by(strict.len() as u64);

    for subscriber in &woken {
        subscriber.wake();
    }
    trace!(tag = %event.tag(), kind = %event.kind, subscribers = woken.len(), "dispatched");
    woken.len()
}

/// Whether a modification changed the value since the last one seen, and
/// bookkeeping of the last seen values for deletions.
///
/// Nothing is tracked while no strict criterion is registered. A key that
/// was deleted silently and stored again is a new cell and counts as
/// changed.
fn strict_changed(
    shared: &NotifierShared,
    event: &Notification,
) -> bool {
    if !shared.track_strict_values {
        return false;
    }

    let strict_wanted = shared.index.lock().len(NotificationType::StrictModification) > 0;
    let mut last_values = shared.last_values.lock();
    if !strict_wanted {
        last_values.clear();
        return false;
    }

    match event.kind {
        NotificationType::Modification => {
            let Some(current) = shared
                .registry
                .current_entry(&event.subject, event.subject_type, &event.key)
            else {
                return false;
            };
            let slot = (event.subject_type, event.subject.clone(), event.key.clone());
            let seen = (current.serial(), current.value().to_string());
            if last_values.get(&slot) == Some(&seen) {
                return false;
            }
            last_values.insert(slot, seen);
            true
        }
        NotificationType::KeyDeletion => {
            last_values.remove(&(event.subject_type, event.subject.clone(), event.key.clone()));
            false
        }
        NotificationType::Deletion => {
            last_values.retain(|(subject_type, subject, _), _| {
                *subject_type != event.subject_type || *subject != event.subject
            });
            false
        }
        _ => false,
    }
}
