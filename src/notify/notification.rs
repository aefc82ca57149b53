use std::fmt;

use crate::SubjectType;
use crate::NOTIFICATION_KEY_SEPARATOR;

/// Kind of change a [`Notification`] reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NotificationType {
    /// Subject was created
    Creation,
    /// Subject was removed
    Deletion,
    /// Key was written, whether or not the value changed
    Modification,
    /// Key was deleted
    KeyDeletion,
    /// Key was written with a value different from the last one seen
    StrictModification,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Creation => "creation",
            NotificationType::Deletion => "deletion",
            NotificationType::Modification => "modification",
            NotificationType::KeyDeletion => "key_deletion",
            NotificationType::StrictModification => "strict_modification",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change event queued for subscribers
///
/// `key` is empty for subject level events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub key: String,
    pub kind: NotificationType,
    pub subject_type: SubjectType,
}

impl Notification {
    pub fn new(
        subject: &str,
        key: &str,
        kind: NotificationType,
        subject_type: SubjectType,
    ) -> Self {
        Self {
            subject: subject.to_string(),
            key: key.to_string(),
            kind,
            subject_type,
        }
    }

    pub fn creation(
        subject: &str,
        subject_type: SubjectType,
    ) -> Self {
        Self::new(subject, "", NotificationType::Creation, subject_type)
    }

    pub fn deletion(
        subject: &str,
        subject_type: SubjectType,
    ) -> Self {
        Self::new(subject, "", NotificationType::Deletion, subject_type)
    }

    pub fn modification(
        subject: &str,
        subject_type: SubjectType,
        key: &str,
    ) -> Self {
        Self::new(subject, key, NotificationType::Modification, subject_type)
    }

    pub fn key_deletion(
        subject: &str,
        subject_type: SubjectType,
        key: &str,
    ) -> Self {
        Self::new(subject, key, NotificationType::KeyDeletion, subject_type)
    }

    /// Copy of this event re-tagged with `kind`
    pub(crate) fn with_kind(
        &self,
        kind: NotificationType,
    ) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    /// Subject removal or key deletion
    pub fn is_deletion(&self) -> bool {
        matches!(
            self.kind,
            NotificationType::Deletion | NotificationType::KeyDeletion
        )
    }

    /// `subject;key` tag, or the bare subject for subject level events
    pub fn tag(&self) -> String {
        if self.key.is_empty() {
            self.subject.clone()
        } else {
            format!("{}{}{}", self.subject, NOTIFICATION_KEY_SEPARATOR, self.key)
        }
    }
}
