use parking_lot::MutexGuard;
use tracing::debug;

use super::SharedObjectRegistry;
use crate::Result;
use crate::SubjectError;
use crate::SubjectType;
use crate::WireMessage;
use crate::WirePair;

/// Open multiplexed transaction over the hash namespace
///
/// While it is alive every broadcast hash update, from any thread, is
/// collected here instead of in the container's own transaction. Closing
/// it (explicitly or on drop) sends one `muxupdate` naming every touched
/// subject. Only one mux transaction exists at a time; opening a second one
/// blocks until the first is closed. Plain `set`/`delete` calls are never
/// blocked by it.
#[must_use = "dropping the transaction flushes it immediately"]
pub struct MuxTransaction<'a> {
    registry: &'a SharedObjectRegistry,
    closed: bool,
    _serial: MutexGuard<'a, ()>,
}

impl std::fmt::Debug for MuxTransaction<'_> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MuxTransaction")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl SharedObjectRegistry {
    /// Starts a mux transaction sending to `broadcast_target`, or to the
    /// configured default when it is empty.
    ///
    /// # Errors
    /// `SubjectError::UnsupportedType` for the queue namespace.
    pub fn open_mux_transaction(
        &self,
        subject_type: SubjectType,
        broadcast_target: &str,
    ) -> Result<MuxTransaction<'_>> {
        if subject_type != SubjectType::Hash {
            return Err(SubjectError::UnsupportedType {
                operation: "mux transaction",
                subject_type,
            }
            .into());
        }

        let serial = self.mux_lock.lock();
        let target = if broadcast_target.is_empty() {
            self.config().broadcast.default_target.as_str()
        } else {
            broadcast_target
        };
        self.context().open_mux(target);
        debug!(%target, "opened mux transaction");

        Ok(MuxTransaction {
            registry: self,
            closed: false,
            _serial: serial,
        })
    }
}

impl MuxTransaction<'_> {
    /// Sends the collected updates; `false` if any send failed
    pub fn close(mut self) -> bool {
        self.closed = true;
        self.flush()
    }

    fn flush(&self) -> bool {
        let ctx = self.registry.context();
        let Some(state) = ctx.take_mux() else {
            return true;
        };

        let mut subjects = Vec::new();
        let mut pairs = Vec::new();
        for (subject, keys) in &state.per_subject {
            // subject may have been deleted meanwhile
            let Some(hash) = self.registry.hash(subject) else {
                continue;
            };
            let subject_pairs = hash.pairs_for(keys.iter());
            if subject_pairs.is_empty() {
                continue;
            }
            let index = subjects.len();
            subjects.push(subject.clone());
            pairs.extend(
                subject_pairs
                    .into_iter()
                    .map(|pair: WirePair| pair.with_subject_index(index)),
            );
        }

        if pairs.is_empty() || !ctx.is_broadcasting() {
            return true;
        }

        debug!(
            subjects = subjects.len(),
            pairs = pairs.len(),
            target = %state.target,
            "closing mux transaction"
        );
        ctx.send_message(WireMessage::mux_update(subjects, pairs), &state.target)
    }
}

impl Drop for MuxTransaction<'_> {
    fn drop(&mut self) {
        if !self.closed {
            self.flush();
        }
    }
}
