use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;

use super::Criterion;
use super::NotificationType;

#[derive(Debug)]
struct PatternEntry {
    regex: Arc<Regex>,
    subscribers: HashSet<String>,
}

#[derive(Debug)]
struct CompoundEntry {
    subjects: BTreeSet<String>,
    keys: BTreeSet<String>,
    subscribers: HashSet<String>,
}

/// Criteria of one notification type
#[derive(Debug, Default)]
struct TypeIndex {
    keys: HashMap<String, HashSet<String>>,
    key_patterns: HashMap<String, PatternEntry>,
    subjects: HashMap<String, HashSet<String>>,
    subject_patterns: HashMap<String, PatternEntry>,
    compound: Vec<CompoundEntry>,
}

impl TypeIndex {
    fn is_empty(&self) -> bool {
        self.keys.is_empty()
            && self.key_patterns.is_empty()
            && self.subjects.is_empty()
            && self.subject_patterns.is_empty()
            && self.compound.is_empty()
    }
}

/// Active subscriptions of all subscribers, by notification type
///
/// Holds subscriber names only. Entries whose subscriber set runs empty are
/// removed right away.
#[derive(Debug, Default)]
pub struct SubscriptionIndex {
    per_type: HashMap<NotificationType, TypeIndex>,
}

impl SubscriptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `subscriber` for `criterion`; regex criteria need their
    /// compiled `regex`
    pub fn insert(
        &mut self,
        kind: NotificationType,
        criterion: &Criterion,
        regex: Option<Arc<Regex>>,
        subscriber: &str,
    ) {
        let index = self.per_type.entry(kind).or_default();
        let name = subscriber.to_string();

        match criterion {
            Criterion::Key(key) => {
                index.keys.entry(key.clone()).or_default().insert(name);
            }
            Criterion::Subject(subject) => {
                index.subjects.entry(subject.clone()).or_default().insert(name);
            }
            Criterion::KeyRegex(pattern) => {
                if let Some(regex) = regex {
                    insert_pattern(&mut index.key_patterns, pattern, regex, name);
                }
            }
            Criterion::SubjectRegex(pattern) => {
                if let Some(regex) = regex {
                    insert_pattern(&mut index.subject_patterns, pattern, regex, name);
                }
            }
            Criterion::SubjectAndKey { subjects, keys } => {
                match index
                    .compound
                    .iter_mut()
                    .find(|e| &e.subjects == subjects && &e.keys == keys)
                {
                    Some(entry) => {
                        entry.subscribers.insert(name);
                    }
                    None => index.compound.push(CompoundEntry {
                        subjects: subjects.clone(),
                        keys: keys.clone(),
                        subscribers: HashSet::from([name]),
                    }),
                }
            }
        }
    }

    pub fn remove(
        &mut self,
        kind: NotificationType,
        criterion: &Criterion,
        subscriber: &str,
    ) {
        let Some(index) = self.per_type.get_mut(&kind) else {
            return;
        };

        match criterion {
            Criterion::Key(key) => remove_from(&mut index.keys, key, subscriber),
            Criterion::Subject(subject) => remove_from(&mut index.subjects, subject, subscriber),
            Criterion::KeyRegex(pattern) => {
                if let Some(entry) = index.key_patterns.get_mut(pattern) {
                    entry.subscribers.remove(subscriber);
                    if entry.subscribers.is_empty() {
                        index.key_patterns.remove(pattern);
                    }
                }
            }
            Criterion::SubjectRegex(pattern) => {
                if let Some(entry) = index.subject_patterns.get_mut(pattern) {
                    entry.subscribers.remove(subscriber);
                    if entry.subscribers.is_empty() {
                        index.subject_patterns.remove(pattern);
                    }
                }
            }
            Criterion::SubjectAndKey { subjects, keys } => {
                for entry in index
                    .compound
                    .iter_mut()
                    .filter(|e| &e.subjects == subjects && &e.keys == keys)
                {
                    entry.subscribers.remove(subscriber);
                }
                index.compound.retain(|e| !e.subscribers.is_empty());
            }
        }

        if index.is_empty() {
            self.per_type.remove(&kind);
        }
    }

    /// Adds every subscriber matching an event of `kind` on `subject`/`key`
    /// to `matched`. Key criteria never match subject level events.
    pub fn collect(
        &self,
        kind: NotificationType,
        subject: &str,
        key: &str,
        matched: &mut HashSet<String>,
    ) {
        let Some(index) = self.per_type.get(&kind) else {
            return;
        };

        if let Some(subscribers) = index.subjects.get(subject) {
            matched.extend(subscribers.iter().cloned());
        }
        for entry in index.subject_patterns.values() {
            if entry.regex.is_match(subject) {
                matched.extend(entry.subscribers.iter().cloned());
            }
        }

        if key.is_empty() {
            return;
        }

        if let Some(subscribers) = index.keys.get(key) {
            matched.extend(subscribers.iter().cloned());
        }
        for entry in index.key_patterns.values() {
            if entry.regex.is_match(key) {
                matched.extend(entry.subscribers.iter().cloned());
            }
        }
        for entry in &index.compound {
            if entry.subjects.contains(subject) && entry.keys.contains(key) {
                matched.extend(entry.subscribers.iter().cloned());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.per_type.is_empty()
    }

    /// Distinct criteria registered for `kind`
    pub fn len(
        &self,
        kind: NotificationType,
    ) -> usize {
        self.per_type.get(&kind).map_or(0, |index| {
            index.keys.len()
                + index.key_patterns.len()
                + index.subjects.len()
                + index.subject_patterns.len()
                + index.compound.len()
        })
    }
}

fn insert_pattern(
    patterns: &mut HashMap<String, PatternEntry>,
    pattern: &str,
    regex: Arc<Regex>,
    subscriber: String,
) {
    patterns
        .entry(pattern.to_string())
        .or_insert_with(|| PatternEntry {
            regex,
            subscribers: HashSet::new(),
        })
        .subscribers
        .insert(subscriber);
}

fn remove_from(
    map: &mut HashMap<String, HashSet<String>>,
    entry: &str,
    subscriber: &str,
) {
    if let Some(subscribers) = map.get_mut(entry) {
        subscribers.remove(subscriber);
        if subscribers.is_empty() {
            map.remove(entry);
        }
    }
}
