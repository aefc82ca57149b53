use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::ChangeNotifier;
use super::Notification;
use super::NotificationType;
use super::SubscriberHandle;
use crate::test_utils::registry_with_hashes;
use crate::test_utils::test_registry;
use crate::test_utils::test_registry_with;
use crate::SharedConfig;
use crate::SharedObjectRegistry;
use crate::SubjectType;

fn drain(handle: &SubscriberHandle) -> Vec<Notification> {
    std::iter::from_fn(|| handle.fetch(Duration::ZERO).ok().flatten()).collect()
}

fn listening(
    notifier: &ChangeNotifier,
    name: &str,
) -> SubscriberHandle {
    let handle = notifier.subscriber(name);
    handle.start_notify();
    handle
}

fn set(
    registry: &SharedObjectRegistry,
    subject: &str,
    key: &str,
    value: &str,
) {
    registry.hash(subject).unwrap().set(key, value, false, true);
}

#[test]
fn test_events_reach_matching_subscribers_only() {
    let (registry, _) = registry_with_hashes(&["node/1", "X", "Y"]);
    let notifier = ChangeNotifier::new(registry.clone());
    let kind = NotificationType::Modification;

    let s1 = listening(&notifier, "s1");
    s1.subscribe_key(kind, "k");
    let s2 = listening(&notifier, "s2");
    s2.subscribe_subject_regex(kind, "^node/.*").unwrap();
    let s3 = listening(&notifier, "s3");
    s3.subscribe_subject_and_key(kind, ["X", "Y"], ["k1", "k2"]);

    set(&registry, "node/1", "k", "v");
    set(&registry, "X", "k1", "v");
    assert_eq!(notifier.dispatch_pending(), 2);

    let on_node = Notification::modification("node/1", SubjectType::Hash, "k");
    assert_eq!(drain(&s1), vec![on_node.clone()]);
    assert_eq!(drain(&s2), vec![on_node]);
    assert_eq!(drain(&s3), vec![Notification::modification("X", SubjectType::Hash, "k1")]);
}

#[test]
fn test_subscriber_gets_each_event_once() {
    let (registry, _) = registry_with_hashes(&["s"]);
    let notifier = ChangeNotifier::new(registry.clone());
    let kind = NotificationType::Modification;

    let handle = listening(&notifier, "mgm");
    handle.subscribe_key(kind, "k");
    handle.subscribe_key_regex(kind, "^k$").unwrap();
    handle.subscribe_subject(kind, "s");
    handle.subscribe_subject_and_key(kind, ["s"], ["k"]);
    handle.subscribe_key(NotificationType::StrictModification, "k");

    set(&registry, "s", "k", "v");
    notifier.dispatch_pending();

    assert_eq!(drain(&handle), vec![Notification::modification("s", SubjectType::Hash, "k")]);
}

#[test]
fn test_strict_modification_fires_on_value_change_only() {
    let (registry, _) = registry_with_hashes(&["s"]);
    let notifier = ChangeNotifier::new(registry.clone());

    let plain = listening(&notifier, "plain");
    plain.subscribe_key(NotificationType::Modification, "k");
    let strict = listening(&notifier, "strict");
    strict.subscribe_key(NotificationType::StrictModification, "k");

    for value in ["v", "v", "w"] {
        set(&registry, "s", "k", value);
        notifier.dispatch_pending();
    }

    assert_eq!(drain(&plain).len(), 3);
    let strict_events = drain(&strict);
    assert_eq!(strict_events.len(), 2);
    assert!(strict_events
        .iter()
        .all(|e| e.kind == NotificationType::StrictModification && e.key == "k"));
}

#[test]
fn test_key_deletion_resets_strict_tracking() {
    let (registry, _) = registry_with_hashes(&["s"]);
    let notifier = ChangeNotifier::new(registry.clone());
    let strict = listening(&notifier, "strict");
    strict.subscribe_subject(NotificationType::StrictModification, "s");

    set(&registry, "s", "k", "v");
    notifier.dispatch_pending();
    registry.hash("s").unwrap().delete("k", false, true);
    notifier.dispatch_pending();
    set(&registry, "s", "k", "v");
    notifier.dispatch_pending();

    assert_eq!(drain(&strict).len(), 2);
}

#[test]
fn test_strict_tracking_can_be_disabled() {
    let mut config = SharedConfig::default();
    config.notify.track_strict_values = false;
    let (registry, _) = test_registry_with(config);
    registry.create_subject("s", "", SubjectType::Hash).unwrap();
    let notifier = ChangeNotifier::new(registry.clone());
    let strict = listening(&notifier, "strict");
    strict.subscribe_key(NotificationType::StrictModification, "k");

    set(&registry, "s", "k", "v");
    notifier.dispatch_pending();

    assert!(drain(&strict).is_empty());
}

#[test]
fn test_subject_lifecycle_events() {
    let (registry, _) = test_registry();
    let notifier = ChangeNotifier::new(registry.clone());
    let handle = listening(&notifier, "mgm");
    handle.subscribe_subject_regex(NotificationType::Creation, "^/eos/").unwrap();
    handle.subscribe_subject(NotificationType::Deletion, "/eos/q");

    registry.create_subject("/eos/q", "", SubjectType::Queue).unwrap();
    registry.create_subject("other", "", SubjectType::Hash).unwrap();
    registry.delete_subject("/eos/q", SubjectType::Queue, false).unwrap();
    notifier.dispatch_pending();

    assert_eq!(
        drain(&handle),
        vec![
            Notification::creation("/eos/q", SubjectType::Queue),
            Notification::deletion("/eos/q", SubjectType::Queue),
        ]
    );
}

#[test]
fn test_dispatcher_thread_delivers_until_stopped() {
    let (registry, _) = registry_with_hashes(&["s"]);
    let notifier = ChangeNotifier::new(registry.clone());
    let handle = listening(&notifier, "mgm");
    handle.subscribe_key(NotificationType::Modification, "k");

    notifier.start();
    notifier.start();
    assert!(notifier.is_running());

    let consumer = {
        let handle = handle.clone();
        thread::spawn(move || handle.fetch(Duration::from_secs(10)))
    };
    set(&registry, "s", "k", "v");
    let fetched = consumer.join().unwrap().unwrap();
    assert_eq!(fetched, Some(Notification::modification("s", SubjectType::Hash, "k")));

    notifier.stop();
    assert!(!notifier.is_running());
    assert!(handle.fetch(Duration::from_secs(10)).is_err());
}

#[test]
fn test_restart_clears_cancellation() {
    let (registry, _) = registry_with_hashes(&["s"]);
    let notifier = ChangeNotifier::new(registry.clone());
    let handle = listening(&notifier, "mgm");
    handle.subscribe_key(NotificationType::Modification, "k");

    notifier.start();
    notifier.stop();
    assert!(handle.fetch(Duration::ZERO).is_err());

    notifier.start();
    assert_eq!(handle.fetch(Duration::ZERO).unwrap(), None);
    notifier.stop();
}

#[test]
fn test_notifications_disabled_posts_nothing() {
    let (registry, _) = registry_with_hashes(&["s"]);
    let notifier = ChangeNotifier::new(registry.clone());
    let handle = listening(&notifier, "mgm");
    handle.subscribe_key(NotificationType::Modification, "k");

    registry.enable_notifications(false);
    set(&registry, "s", "k", "v");
    assert_eq!(notifier.dispatch_pending(), 0);
    assert!(drain(&handle).is_empty());
}

#[test]
fn test_strict_values_tracked_only_with_strict_criteria() {
    let (registry, notifier) = registry_with_notifier();
    let plain = listening(&notifier, "plain");
    plain.subscribe_key(NotificationType::Modification, "k");

    set(&registry, "s", "k", "v");
    notifier.dispatch_pending();
    assert_eq!(notifier.strict_values_tracked(), 0);

    let strict = listening(&notifier, "strict");
    strict.subscribe_key(NotificationType::StrictModification, "k");
    set(&registry, "s", "k", "v");
    notifier.dispatch_pending();
    assert_eq!(notifier.strict_values_tracked(), 1);
    assert_eq!(drain(&strict).len(), 1);

    strict.unsubscribe_all();
    set(&registry, "s", "k", "w");
    notifier.dispatch_pending();
    assert_eq!(notifier.strict_values_tracked(), 0);
}

#[test]
fn test_silently_recreated_key_counts_as_changed() {
    let (registry, notifier) = registry_with_notifier();
    let strict = listening(&notifier, "strict");
    strict.subscribe_key(NotificationType::StrictModification, "k");

    set(&registry, "s", "k", "v");
    notifier.dispatch_pending();
    registry.hash("s").unwrap().delete("k", false, false);
    set(&registry, "s", "k", "v");
    notifier.dispatch_pending();

    assert_eq!(drain(&strict).len(), 2);
}

fn registry_with_notifier() -> (Arc<SharedObjectRegistry>, ChangeNotifier) {
    let (registry, _) = registry_with_hashes(&["s"]);
    let notifier = ChangeNotifier::new(registry.clone());
    (registry, notifier)
}
