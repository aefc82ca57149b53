use super::Container;
use super::Entry;
use super::FifoOrder;
use crate::Notification;
use crate::SubjectType;

impl Container<FifoOrder> {
    /// Appends `value` and broadcasts it.
    ///
    /// Without an explicit key the next free numeric key is used. Pushing
    /// an existing key overwrites it in place. Returns the key.
    pub fn push_back(
        &self,
        key: Option<&str>,
        value: impl Into<String>,
    ) -> String {
        let (key, flush_now) = {
            let mut state = self.lock_state();
            let key = match key {
                Some(key) => key.to_string(),
                None => loop {
                    let candidate = state.order.next_auto_key();
                    if !state.entries.contains_key(&candidate) {
                        break candidate;
                    }
                },
            };
            self.store_locked(&mut state, &key, value.into(), None);
            let flush_now = self.mark_update_locked(&mut state, &key, true);
            (key, flush_now)
        };

        self.context().post(Notification::modification(self.subject(), SubjectType::Queue, &key));
        if flush_now {
            self.close_transaction();
        }
        key
    }

    /// Removes and returns the oldest live entry, broadcasting the deletion
    pub fn pop_front(&self) -> Option<Entry> {
        let (entry, flush_now) = {
            let mut state = self.lock_state();
            let key = state.order.front()?.to_string();
            let entry = state.entries.get(&key).cloned()?;
            self.remove_locked(&mut state, &key);
            let flush_now = self.mark_deletion_locked(&mut state, &key, true);
            (entry, flush_now)
        };

        self.context().post(Notification::key_deletion(self.subject(), SubjectType::Queue, entry.key()));
        if flush_now {
            self.close_transaction();
        }
        Some(entry)
    }

    /// Oldest live entry without removing it
    pub fn front(&self) -> Option<Entry> {
        let mut state = self.lock_state();
        let key = state.order.front()?.to_string();
        state.entries.get(&key).cloned()
    }

    /// Live keys, oldest first
    pub fn keys_in_order(&self) -> Vec<String> {
        self.lock_state().order.keys()
    }
}
