//! In-process change notification.
//!
//! Registry mutations post [`Notification`]s to the registry's event queue.
//! The [`ChangeNotifier`] thread matches each one against the active
//! criteria of every subscriber and queues a copy to each match, at most
//! once per event. Consumers hold a [`SubscriberHandle`] and block in
//! [`fetch`](SubscriberHandle::fetch).
//!
//! Criteria are kept per [`NotificationType`]:
//! - exact key or key regex, on any subject
//! - exact subject or subject regex, any key
//! - a set of subjects combined with a set of keys
//!
//! `StrictModification` criteria only fire when a modification changed the
//! value compared to the last one the dispatcher saw for that key.

mod dispatcher;
mod index;
mod notification;
mod pattern;
mod subscriber;

pub use dispatcher::*;
pub use index::*;
pub use notification::*;
pub use pattern::*;
pub use subscriber::*;

#[cfg(test)]
mod dispatcher_test;
