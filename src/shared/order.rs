use std::collections::HashMap;
use std::collections::VecDeque;

use super::SubjectType;

/// Hooks run by a [`Container`](super::Container) under its own lock
///
/// `on_insert` fires only for keys that were not present before, so
/// overwriting an existing key never changes its position.
pub trait InsertionOrder: Default + Send + 'static {
    /// Registry namespace of containers using this order
    const SUBJECT_TYPE: SubjectType;

    fn on_insert(
        &mut self,
        key: &str,
    );

    fn on_delete(
        &mut self,
        key: &str,
    );

    fn on_clear(&mut self);
}

/// No ordering; used by plain hashes
#[derive(Debug, Default)]
pub struct Unordered;

impl InsertionOrder for Unordered {
    const SUBJECT_TYPE: SubjectType = SubjectType::Hash;

    fn on_insert(
        &mut self,
        _key: &str,
    ) {
    }

    fn on_delete(
        &mut self,
        _key: &str,
    ) {
    }

    fn on_clear(&mut self) {}
}

/// First-insertion order of live keys
///
/// Deletions only drop the key from `live`; the stale slot in `slots` is
/// skipped lazily, which keeps both push and pop O(1) amortized. A key that
/// is deleted and inserted again gets a fresh sequence number and goes to
/// the back.
#[derive(Debug, Default)]
pub struct FifoOrder {
    slots: VecDeque<(String, u64)>,
    live: HashMap<String, u64>,
    next_seq: u64,
    next_auto_key: u64,
}

impl FifoOrder {
    /// Oldest live key
    pub fn front(&mut self) -> Option<&str> {
        while let Some((key, seq)) = self.slots.front() {
            if self.live.get(key) == Some(seq) {
                break;
            }
            self.slots.pop_front();
        }
        self.slots.front().map(|(key, _)| key.as_str())
    }

    /// Live keys, oldest first
    pub fn keys(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|(key, seq)| self.live.get(key) == Some(seq))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Next candidate for an auto-assigned queue key
    pub(crate) fn next_auto_key(&mut self) -> String {
        self.next_auto_key += 1;
        self.next_auto_key.to_string()
    }

    fn compact(&mut self) {
        if self.slots.len() > 2 * self.live.len() + 16 {
            let live = &self.live;
            self.slots.retain(|(key, seq)| live.get(key) == Some(seq));
        }
    }
}

impl InsertionOrder for FifoOrder {
    const SUBJECT_TYPE: SubjectType = SubjectType::Queue;

    fn on_insert(
        &mut self,
        key: &str,
    ) {
        self.next_seq += 1;
        self.live.insert(key.to_string(), self.next_seq);
        self.slots.push_back((key.to_string(), self.next_seq));
    }

    fn on_delete(
        &mut self,
        key: &str,
    ) {
        self.live.remove(key);
        self.compact();
    }

    fn on_clear(&mut self) {
        self.slots.clear();
        self.live.clear();
    }
}
