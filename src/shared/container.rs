use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::MutexGuard;
use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;

use super::Entry;
use super::InsertionOrder;
use super::SubjectType;
use crate::Notification;
use crate::SharedContext;
use crate::WirePair;

/// State guarded by the per-container lock
pub(crate) struct ContainerState<O> {
    pub(crate) entries: HashMap<String, Entry>,
    /// Keys updated since the last flush; disjoint from `deletion_keys`
    transaction_keys: BTreeSet<String>,
    /// Keys deleted since the last flush; disjoint from `transaction_keys`
    deletion_keys: BTreeSet<String>,
    in_transaction: bool,
    pub(crate) order: O,
}

impl<O: InsertionOrder> ContainerState<O> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            transaction_keys: BTreeSet::new(),
            deletion_keys: BTreeSet::new(),
            in_transaction: false,
            order: O::default(),
        }
    }
}

/// Versioned key/value store of one subject
///
/// Every mutation runs under the container's own lock, so unrelated
/// subjects never contend. Notifications and wire messages are produced
/// after the lock is released.
pub struct Container<O: InsertionOrder> {
    subject: String,
    broadcast_target: RwLock<String>,
    state: Mutex<ContainerState<O>>,
    ctx: Arc<SharedContext>,
}

impl<O: InsertionOrder> std::fmt::Debug for Container<O> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("subject", &self.subject)
            .field("type", &O::SUBJECT_TYPE)
            .field("broadcast_target", &*self.broadcast_target.read())
            .finish_non_exhaustive()
    }
}

impl<O: InsertionOrder> Container<O> {
    pub(crate) fn new(
        subject: &str,
        broadcast_target: &str,
        ctx: Arc<SharedContext>,
    ) -> Self {
        Self {
            subject: subject.to_string(),
            broadcast_target: RwLock::new(broadcast_target.to_string()),
            state: Mutex::new(ContainerState::new()),
            ctx,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn subject_type(&self) -> SubjectType {
        O::SUBJECT_TYPE
    }

    pub fn broadcast_target(&self) -> String {
        self.broadcast_target.read().clone()
    }

    pub(crate) fn set_broadcast_target(
        &self,
        target: &str,
    ) {
        *self.broadcast_target.write() = target.to_string();
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ContainerState<O>> {
        self.state.lock()
    }

    pub(crate) fn context(&self) -> &SharedContext {
        &self.ctx
    }

    /// Inserts or overwrites `key`.
    ///
    /// With `broadcast`, the key is queued for the wire: into the open mux
    /// transaction if there is one, otherwise into this container's
    /// transaction. Without an open transaction the key is flushed right
    /// away as a single-key transaction.
    ///
    /// Returns `false` only if that immediate flush failed to send; the
    /// local value is stored either way.
    pub fn set(
        &self,
        key: &str,
        value: impl Into<String>,
        broadcast: bool,
        notify: bool,
    ) -> bool {
        let flush_now = {
            let mut state = self.state.lock();
            self.store_locked(&mut state, key, value.into(), None);
            self.mark_update_locked(&mut state, key, broadcast)
        };

        if notify {
            self.ctx.post(Notification::modification(&self.subject, O::SUBJECT_TYPE, key));
        }

        if flush_now {
            return self.close_transaction();
        }
        true
    }

    /// Value of `key`, `None` when absent
    pub fn get(
        &self,
        key: &str,
    ) -> Option<String> {
        self.state.lock().entries.get(key).map(|e| e.value().to_string())
    }

    pub fn get_entry(
        &self,
        key: &str,
    ) -> Option<Entry> {
        self.state.lock().entries.get(key).cloned()
    }

    pub fn get_change_id(
        &self,
        key: &str,
    ) -> Option<u64> {
        self.state.lock().entries.get(key).map(|e| e.change_id())
    }

    pub fn get_i64(
        &self,
        key: &str,
    ) -> Option<i64> {
        self.get(key)?.trim().parse().ok()
    }

    pub fn get_u64(
        &self,
        key: &str,
    ) -> Option<u64> {
        self.get(key)?.trim().parse().ok()
    }

    pub fn get_f64(
        &self,
        key: &str,
    ) -> Option<f64> {
        self.get(key)?.trim().parse().ok()
    }

    /// Seconds since `key` was last updated
    pub fn age_in_seconds(
        &self,
        key: &str,
    ) -> Option<u64> {
        self.state.lock().entries.get(key).map(|e| e.age().as_secs())
    }

    pub fn contains(
        &self,
        key: &str,
    ) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Copy of all entries, sorted by key
    pub fn snapshot(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self.state.lock().entries.values().cloned().collect();
        entries.sort_by(|a, b| a.key().cmp(b.key()));
        entries
    }

    /// Removes `key`; `false` if it did not exist
    pub fn delete(
        &self,
        key: &str,
        broadcast: bool,
        notify: bool,
    ) -> bool {
        let flush_now = {
            let mut state = self.state.lock();
            if !self.remove_locked(&mut state, key) {
                return false;
            }
            self.mark_deletion_locked(&mut state, key, broadcast)
        };

        if notify {
            self.ctx.post(Notification::key_deletion(&self.subject, O::SUBJECT_TYPE, key));
        }

        if flush_now {
            self.close_transaction();
        }
        true
    }

    /// Drops every entry; with `broadcast` the deletions go out as one
    /// transaction
    pub fn clear(
        &self,
        broadcast: bool,
    ) -> bool {
        let (keys, flush_now) = {
            let mut state = self.state.lock();
            let keys: Vec<String> = state.entries.drain().map(|(k, _)| k).collect();
            state.order.on_clear();

            let mut flush_now = false;
            for key in &keys {
                flush_now |= self.mark_deletion_locked(&mut state, key, broadcast);
            }
            (keys, flush_now)
        };

        debug!(subject = %self.subject, keys = keys.len(), "cleared container");
        self.ctx.post_all(
            keys.iter()
                .map(|key| Notification::key_deletion(&self.subject, O::SUBJECT_TYPE, key)),
        );

        if flush_now {
            return self.close_transaction();
        }
        true
    }

    /// Starts batching broadcast keys until [`close_transaction`](Self::close_transaction)
    pub fn open_transaction(&self) -> bool {
        self.state.lock().in_transaction = true;
        true
    }

    /// Sends everything queued since the transaction was opened.
    ///
    /// Updates go out as one `update` message, or one message per key if the
    /// batch would exceed the size cap; deletions follow as a `delete`
    /// message. An empty transaction sends nothing. Returns `false` if any
    /// send failed; the local store is not rolled back.
    pub fn close_transaction(&self) -> bool {
        let (pairs, deletions) = {
            let mut state = self.state.lock();
            state.in_transaction = false;

            let transaction_keys = std::mem::take(&mut state.transaction_keys);
            let deletion_keys = std::mem::take(&mut state.deletion_keys);
            if !self.ctx.is_broadcasting() {
                return true;
            }

            let pairs = pairs_locked(&*state, transaction_keys.iter());
            (pairs, deletion_keys.into_iter().collect::<Vec<_>>())
        };

        if pairs.is_empty() && deletions.is_empty() {
            return true;
        }

        let target = self.broadcast_target();
        debug!(
            subject = %self.subject,
            updates = pairs.len(),
            deletions = deletions.len(),
            %target,
            "closing transaction"
        );

        let mut sent = true;
        if !pairs.is_empty() {
            sent &= self
                .ctx
                .send_update(&self.subject, O::SUBJECT_TYPE, pairs, &target);
        }
        if !deletions.is_empty() {
            sent &= self
                .ctx
                .send_deletion(&self.subject, O::SUBJECT_TYPE, deletions, &target);
        }
        sent
    }

    /// Wire pairs for `keys` that still exist
    pub(crate) fn pairs_for<'a>(
        &self,
        keys: impl Iterator<Item = &'a String>,
    ) -> Vec<WirePair> {
        pairs_locked(&*self.state.lock(), keys)
    }

    /// Full state for a broadcast reply
    pub(crate) fn wire_snapshot(&self) -> Vec<WirePair> {
        let state = self.state.lock();
        let mut pairs: Vec<WirePair> = state
            .entries
            .values()
            .map(|e| WirePair::new(e.key(), e.value(), e.change_id()))
            .collect();
        pairs.sort_by(|a, b| a.key.cmp(&b.key));
        pairs
    }

    /// Replays replicated pairs without re-broadcasting them; returns the
    /// notifications to post once for the whole message
    pub(crate) fn apply_remote_pairs<'a>(
        &self,
        pairs: impl Iterator<Item = &'a WirePair>,
    ) -> Vec<Notification> {
        let mut state = self.state.lock();
        pairs
            .map(|pair| {
                self.store_locked(&mut state, &pair.key, pair.value.clone(), Some(pair.change_id));
                Notification::modification(&self.subject, O::SUBJECT_TYPE, &pair.key)
            })
            .collect()
    }

    /// Replays replicated deletions; unknown keys are skipped
    pub(crate) fn apply_remote_deletes(
        &self,
        keys: &[String],
    ) -> Vec<Notification> {
        let mut state = self.state.lock();
        keys.iter()
            .filter(|key| self.remove_locked(&mut state, key))
            .map(|key| Notification::key_deletion(&self.subject, O::SUBJECT_TYPE, key))
            .collect()
    }

    /// Human readable listing, one `key := value` line per entry
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for entry in self.snapshot() {
            let _ = writeln!(
                out,
                "key={:<32} value={:<32} changeid={} age={}s",
                entry.key(),
                entry.value(),
                entry.change_id(),
                entry.age().as_secs()
            );
        }
        out
    }

    pub(crate) fn store_locked(
        &self,
        state: &mut ContainerState<O>,
        key: &str,
        value: String,
        remote_change_id: Option<u64>,
    ) {
        if !state.entries.contains_key(key) {
            state.order.on_insert(key);
        }
        let entry = state.entries.entry(key.to_string()).or_insert_with(|| Entry::new(key));
        entry.update(value, remote_change_id);
        trace!(subject = %self.subject, key, change_id = entry.change_id(), "stored entry");
    }

    pub(crate) fn remove_locked(
        &self,
        state: &mut ContainerState<O>,
        key: &str,
    ) -> bool {
        if state.entries.remove(key).is_none() {
            return false;
        }
        state.order.on_delete(key);
        trace!(subject = %self.subject, key, "removed entry");
        true
    }

    /// Queues an updated key for the wire; `true` if the caller has to
    /// flush immediately
    pub(crate) fn mark_update_locked(
        &self,
        state: &mut ContainerState<O>,
        key: &str,
        broadcast: bool,
    ) -> bool {
        if !broadcast || !self.ctx.is_broadcasting() {
            return false;
        }
        if O::SUBJECT_TYPE == SubjectType::Hash && self.ctx.record_mux(&self.subject, key) {
            state.deletion_keys.remove(key);
            return false;
        }

        state.deletion_keys.remove(key);
        state.transaction_keys.insert(key.to_string());
        !state.in_transaction
    }

    /// Queues a deleted key for the wire; `true` if the caller has to
    /// flush immediately
    pub(crate) fn mark_deletion_locked(
        &self,
        state: &mut ContainerState<O>,
        key: &str,
        broadcast: bool,
    ) -> bool {
        if !broadcast || !self.ctx.is_broadcasting() {
            return false;
        }

        state.transaction_keys.remove(key);
        state.deletion_keys.insert(key.to_string());
        !state.in_transaction
    }

    #[cfg(test)]
    pub(crate) fn pending_keys(&self) -> (Vec<String>, Vec<String>) {
        let state = self.state.lock();
        (
            state.transaction_keys.iter().cloned().collect(),
            state.deletion_keys.iter().cloned().collect(),
        )
    }
}

fn pairs_locked<'a, O>(
    state: &ContainerState<O>,
    keys: impl Iterator<Item = &'a String>,
) -> Vec<WirePair> {
    keys.filter_map(|key| state.entries.get(key))
        .map(|e| WirePair::new(e.key(), e.value(), e.change_id()))
        .collect()
}
