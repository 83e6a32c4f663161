//! Named backoff policy registry.
//!
//! Policies are stored as templates: every lookup returns a fresh clone, so
//! each retry session owns its own [`BackOffPolicy`] state and two sessions
//! never share attempt counters.

use crate::backoff::BackOffPolicy;

/// In-memory registry for named [`BackOffPolicy`] templates.
///
/// Lookups are linear over an internal vector; a service typically defines a
/// handful of policies.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    entries: Vec<(String, BackOffPolicy)>,
}

impl PolicyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a policy under the given name.
    ///
    /// Returns the previously registered policy if one existed.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        policy: BackOffPolicy,
    ) -> Option<BackOffPolicy> {
        let name = name.into();
        if let Some((_, existing)) = self
            .entries
            .iter_mut()
            .find(|(existing_name, _)| *existing_name == name)
        {
            Some(std::mem::replace(existing, policy))
        } else {
            self.entries.push((name, policy));
            None
        }
    }

    /// Fresh instance of the named policy, ready for one session.
    pub fn get(&self, name: &str) -> Option<BackOffPolicy> {
        self.entries
            .iter()
            .find(|(existing_name, _)| existing_name == name)
            .map(|(_, policy)| policy.clone())
    }

    /// Remove a policy by name.
    pub fn remove(&mut self, name: &str) -> Option<BackOffPolicy> {
        let index = self
            .entries
            .iter()
            .position(|(existing_name, _)| existing_name == name)?;
        Some(self.entries.swap_remove(index).1)
    }

    /// Registered policy names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of registered policies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear the registry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<S: Into<String>> FromIterator<(S, BackOffPolicy)> for PolicyRegistry {
    fn from_iter<T: IntoIterator<Item = (S, BackOffPolicy)>>(iter: T) -> Self {
        let mut registry = PolicyRegistry::new();
        for (name, policy) in iter {
            registry.register(name, policy);
        }
        registry
    }
}
