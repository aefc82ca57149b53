use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::SystemTime;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// A single versioned value cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Process-wide unique per created cell; a key deleted and stored again
    /// gets a new one
    serial: u64,
    key: String,
    value: String,
    change_id: u64,
    last_update: SystemTime,
}

impl Entry {
    pub(crate) fn new(key: &str) -> Self {
        Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            key: key.to_string(),
            value: String::new(),
            change_id: 0,
            last_update: SystemTime::now(),
        }
    }

    /// Stores `value` and bumps the change id.
    ///
    /// `remote_change_id` is the id announced by the sender of a replicated
    /// update; the new id is the larger of it and the local successor, so the
    /// id never goes backwards.
    pub(crate) fn update(
        &mut self,
        value: String,
        remote_change_id: Option<u64>,
    ) {
        let next = self.change_id.saturating_add(1);
        self.change_id = match remote_change_id {
            Some(remote) => next.max(remote),
            None => next,
        };
        self.value = value;
        self.last_update = SystemTime::now();
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn change_id(&self) -> u64 {
        self.change_id
    }

    pub fn last_update(&self) -> SystemTime {
        self.last_update
    }

    /// Time since the last update, zero if the clock went backwards
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.last_update)
            .unwrap_or(Duration::ZERO)
    }
}
