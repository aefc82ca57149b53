use tracing::debug;
use tracing::error;
use tracing::warn;

use super::registry::not_found;
use super::SharedObjectRegistry;
use super::SubjectRef;
use crate::Result;
use crate::SubjectPattern;
use crate::WireBody;
use crate::WireCommand;
use crate::WireMessage;
use crate::DECODE_FAILURES;
use crate::MESSAGES_APPLIED;

impl SharedObjectRegistry {
    /// Replays one inbound wire body.
    ///
    /// The whole body is decoded and every subject it names resolved before
    /// anything is touched, so a rejected message leaves the registry
    /// unchanged. Pair-carrying commands create unknown subjects on the fly;
    /// `delete`, `remove` and `bcrequest` require them to exist. Wildcard
    /// subjects only ever select existing subjects.
    ///
    /// Replicated changes are never re-broadcast. Their notifications are
    /// posted in one batch after the message has been applied.
    pub fn apply_wire_message(
        &self,
        body: &str,
    ) -> Result<()> {
        let message = match WireMessage::decode(body) {
            Ok(message) => message,
            Err(e) => {
                DECODE_FAILURES.inc();
                error!(%e, "rejected malformed wire message");
                return Err(e.into());
            }
        };

        let targets = self.resolve_subjects(&message)?;
        let cmd = message.command;
        debug!(%cmd, subject_type = %message.subject_type, subjects = targets.len(), "applying wire message");

        match (&message.command, &message.body) {
            (_, WireBody::Pairs(pairs)) => {
                let multiplexed = message.is_multiplexed();
                let mut notifications = Vec::new();
                for (index, target) in targets.iter().enumerate() {
                    notifications.extend(target.apply_remote_pairs(
                        pairs
                            .iter()
                            .filter(|pair| !multiplexed || pair.subject_index == index),
                    ));
                }
                self.context().post_all(notifications);
            }
            (WireCommand::Delete, WireBody::Keys(keys)) => {
                let notifications: Vec<_> = targets
                    .iter()
                    .flat_map(|target| target.apply_remote_deletes(keys))
                    .collect();
                self.context().post_all(notifications);
            }
            (WireCommand::Remove, _) => {
                for target in &targets {
                    if let Err(e) = self.delete_subject(target.subject(), message.subject_type, false) {
                        // removed concurrently
                        debug!(%e, "subject already gone");
                    }
                }
            }
            (WireCommand::BroadcastRequest, WireBody::Reply(reply_to)) => {
                self.answer_broadcast_request(&targets, &message, reply_to);
            }
            (command, _) => {
                // decode pairs every command with its body kind
                warn!(%command, "wire body does not fit command, ignored");
            }
        }

        MESSAGES_APPLIED.with_label_values(&[cmd.as_str()]).inc();
        Ok(())
    }

    /// Containers addressed by `message`, in subject-list order
    fn resolve_subjects(
        &self,
        message: &WireMessage,
    ) -> Result<Vec<SubjectRef>> {
        let patterns = message.subject_patterns()?;
        let subject_type = message.subject_type;

        if let [pattern] = patterns.as_slice() {
            if pattern.is_wildcard() {
                return Ok(self.matching(pattern, subject_type));
            }
        }

        let names: Vec<&str> = patterns
            .iter()
            .filter_map(|pattern| match pattern {
                SubjectPattern::Exact(name) => Some(name.as_str()),
                _ => None,
            })
            .collect();

        if message.command.creates_subjects() {
            return names
                .into_iter()
                .map(|name| self.get_or_create(name, subject_type))
                .collect();
        }

        names
            .into_iter()
            .map(|name| {
                self.get(name, subject_type)
                    .ok_or_else(|| not_found(name, subject_type))
            })
            .collect()
    }

    fn answer_broadcast_request(
        &self,
        targets: &[SubjectRef],
        request: &WireMessage,
        reply_to: &str,
    ) {
        if !self.context().is_broadcasting() {
            debug!(%reply_to, "broadcast disabled, ignoring broadcast request");
            return;
        }

        for target in targets {
            let reply = WireMessage::broadcast_reply(
                target.subject(),
                request.subject_type,
                target.wire_snapshot(),
            );
            if !self.context().send_message(reply, reply_to) {
                warn!(subject = %target.subject(), %reply_to, "failed to answer broadcast request");
            }
        }
    }
}
