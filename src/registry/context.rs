use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_channel::bounded;
use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use crossbeam_channel::TrySendError;
use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::Notification;
use crate::SharedConfig;
use crate::SubjectType;
use crate::Transport;
use crate::TransportError;
use crate::WireBody;
use crate::WireCommand;
use crate::WireMessage;
use crate::WirePair;
use crate::EVENTS_DROPPED;
use crate::MESSAGES_SENT;
use crate::MESSAGE_SIZE_BYTES;
use crate::SEND_FAILURES;

/// Keys collected by the open mux transaction
#[derive(Debug)]
pub(crate) struct MuxState {
    pub(crate) target: String,
    pub(crate) per_subject: BTreeMap<String, BTreeSet<String>>,
}

/// Handle shared by the registry and all of its containers
///
/// Containers reach the event queue, the mux transaction and the transport
/// only through this handle; they never point back at the registry.
pub struct SharedContext {
    transport: Arc<dyn Transport>,
    broadcast: AtomicBool,
    notify: AtomicBool,
    max_message_size: usize,

    event_tx: Sender<Notification>,
    event_rx: Receiver<Notification>,

    mux: Mutex<Option<MuxState>>,
}

impl std::fmt::Debug for SharedContext {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SharedContext")
            .field("broadcast", &self.broadcast)
            .field("notify", &self.notify)
            .field("max_message_size", &self.max_message_size)
            .field("pending_events", &self.event_rx.len())
            .finish_non_exhaustive()
    }
}

impl SharedContext {
    pub(crate) fn new(
        config: &SharedConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (event_tx, event_rx) = if config.notify.event_queue_size > 0 {
            bounded(config.notify.event_queue_size)
        } else {
            unbounded()
        };

        Self {
            transport,
            broadcast: AtomicBool::new(config.broadcast.enabled),
            notify: AtomicBool::new(config.notify.enabled),
            max_message_size: config.broadcast.max_message_size,
            event_tx,
            event_rx,
            mux: Mutex::new(None),
        }
    }

    pub fn is_broadcasting(&self) -> bool {
        self.broadcast.load(Ordering::Acquire)
    }

    pub(crate) fn set_broadcast(
        &self,
        enabled: bool,
    ) {
        self.broadcast.store(enabled, Ordering::Release);
    }

    pub fn is_notifying(&self) -> bool {
        self.notify.load(Ordering::Acquire)
    }

    pub(crate) fn set_notify(
        &self,
        enabled: bool,
    ) {
        self.notify.store(enabled, Ordering::Release);
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub(crate) fn event_receiver(&self) -> Receiver<Notification> {
        self.event_rx.clone()
    }

    /// Queues `notification` for the dispatcher.
    ///
    /// Never blocks: on a full bounded queue the event is dropped.
    pub(crate) fn post(
        &self,
        notification: Notification,
    ) {
        if !self.is_notifying() {
            return;
        }
        match self.event_tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                EVENTS_DROPPED.inc();
                warn!(tag = %n.tag(), kind = %n.kind, "event queue full, dropping notification");
            }
            Err(TrySendError::Disconnected(n)) => {
                warn!(tag = %n.tag(), "event queue closed, dropping notification");
            }
        }
    }

    pub(crate) fn post_all(
        &self,
        notifications: impl IntoIterator<Item = Notification>,
    ) {
        for notification in notifications {
            self.post(notification);
        }
    }

    /// Starts collecting hash updates for a mux transaction
    pub(crate) fn open_mux(
        &self,
        target: &str,
    ) {
        *self.mux.lock() = Some(MuxState {
            target: target.to_string(),
            per_subject: BTreeMap::new(),
        });
    }

    pub(crate) fn take_mux(&self) -> Option<MuxState> {
        self.mux.lock().take()
    }

    /// Records `key` in the open mux transaction; `false` if none is open
    pub(crate) fn record_mux(
        &self,
        subject: &str,
        key: &str,
    ) -> bool {
        match self.mux.lock().as_mut() {
            Some(state) => {
                state
                    .per_subject
                    .entry(subject.to_string())
                    .or_default()
                    .insert(key.to_string());
                true
            }
            None => false,
        }
    }

    pub(crate) fn send_update(
        &self,
        subject: &str,
        subject_type: SubjectType,
        pairs: Vec<WirePair>,
        target: &str,
    ) -> bool {
        self.send_message(WireMessage::update(subject, subject_type, pairs), target)
    }

    pub(crate) fn send_deletion(
        &self,
        subject: &str,
        subject_type: SubjectType,
        keys: Vec<String>,
        target: &str,
    ) -> bool {
        self.send_message(WireMessage::delete(subject, subject_type, keys), target)
    }

    /// Encodes and sends `message`, splitting it when it exceeds the size cap.
    ///
    /// A multiplexed update is split into one update per subject, any other
    /// batch into one message per key. Every part is attempted; returns
    /// `false` if any of them failed.
    pub(crate) fn send_message(
        &self,
        message: WireMessage,
        target: &str,
    ) -> bool {
        let body = message.encode();
        if body.len() <= self.max_message_size {
            return self.deliver(message.command, &body, target);
        }

        let size = body.len();
        let Some(parts) = split(message) else {
            let e = TransportError::MessageTooLarge {
                size,
                limit: self.max_message_size,
            };
            warn!(%e, %target, "single-key message over the cap, not sent");
            return false;
        };

        debug!(size, parts = parts.len(), %target, "splitting oversized message");
        parts
            .into_iter()
            .fold(true, |sent, part| self.send_message(part, target) && sent)
    }

    fn deliver(
        &self,
        command: WireCommand,
        body: &str,
        target: &str,
    ) -> bool {
        let cmd = command.as_str();
        MESSAGE_SIZE_BYTES
            .with_label_values(&[cmd])
            .observe(body.len() as f64);

        match self.transport.send(body, target) {
            Ok(()) => {
                MESSAGES_SENT.with_label_values(&[cmd]).inc();
                trace!(%cmd, %target, size = body.len(), "sent message");
                true
            }
            Err(e) => {
                SEND_FAILURES.with_label_values(&[cmd]).inc();
                warn!(%e, %cmd, %target, "failed to send message");
                false
            }
        }
    }
}

/// Smaller messages carrying the same content, `None` if `message` holds a
/// single item
fn split(message: WireMessage) -> Option<Vec<WireMessage>> {
    let WireMessage {
        command,
        subjects,
        subject_type,
        body,
    } = message;

    match body {
        WireBody::Pairs(pairs) if subjects.len() > 1 => {
            let mut per_subject: BTreeMap<usize, Vec<WirePair>> = BTreeMap::new();
            for pair in pairs {
                per_subject
                    .entry(pair.subject_index)
                    .or_default()
                    .push(pair.with_subject_index(0));
            }
            Some(
                per_subject
                    .into_iter()
                    .filter_map(|(index, pairs)| {
                        let subject = subjects.get(index)?;
                        Some(WireMessage::update(subject.clone(), subject_type, pairs))
                    })
                    .collect(),
            )
        }
        WireBody::Pairs(pairs) if pairs.len() > 1 => Some(
            pairs
                .into_iter()
                .map(|pair| WireMessage {
                    command,
                    subjects: subjects.clone(),
                    subject_type,
                    body: WireBody::Pairs(vec![pair]),
                })
                .collect(),
        ),
        WireBody::Keys(keys) if keys.len() > 1 => Some(
            keys.into_iter()
                .map(|key| WireMessage {
                    command,
                    subjects: subjects.clone(),
                    subject_type,
                    body: WireBody::Keys(vec![key]),
                })
                .collect(),
        ),
        _ => None,
    }
}
