use std::sync::Arc;
use std::sync::Weak;

use dashmap::DashMap;
use regex::Regex;

use crate::SubscriptionError;

/// Compiled subscription patterns shared by pattern string
///
/// Entries are weak: a pattern stays compiled while at least one watch or
/// index entry holds it and is recompiled on the next use after that.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: DashMap<String, Weak<Regex>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled form of `pattern`, reusing a live one if any
    ///
    /// # Errors
    /// `SubscriptionError::InvalidPattern` if the pattern does not compile.
    pub fn compile(
        &self,
        pattern: &str,
    ) -> Result<Arc<Regex>, SubscriptionError> {
        if let Some(regex) = self.compiled.get(pattern).and_then(|weak| weak.upgrade()) {
            return Ok(regex);
        }

        let regex = Regex::new(pattern).map_err(|source| SubscriptionError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let regex = Arc::new(regex);
        self.compiled
            .insert(pattern.to_string(), Arc::downgrade(&regex));
        Ok(regex)
    }

    /// Forgets patterns nobody holds anymore
    pub fn purge(&self) {
        self.compiled.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Patterns currently compiled and in use
    pub fn live(&self) -> usize {
        self.compiled
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }
}
