//! Registration table: the immutable key to action mapping built from one
//! config version.

use std::{collections::HashMap, sync::Arc};

use config::Config;
use keycode::KeyIdentity;
use tracing::warn;

use crate::action::{Action, ActionFactory};

/// A key bound to an action.
#[derive(Clone, Debug)]
pub struct Registration {
    /// Triggering key and transition.
    pub key: KeyIdentity,
    /// Human-readable description from the config.
    pub description: String,
    /// What to run.
    pub action: Arc<dyn Action>,
}

/// One version of the key to action mapping.
///
/// Built wholesale from a [`Config`] and never mutated afterwards; a reload
/// builds a new table.
#[derive(Debug, Default)]
pub struct RegistrationTable {
    /// Registrations by key.
    entries: HashMap<KeyIdentity, Registration>,
    /// Keys that appeared more than once in the source config.
    collisions: Vec<KeyIdentity>,
}

impl RegistrationTable {
    /// A table with no registrations.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from `config`, resolving actions through `factory`.
    ///
    /// Later entries win over earlier ones with the same key; each overwrite
    /// is logged and recorded in [`RegistrationTable::collisions`].
    pub fn build(config: &Config, factory: &dyn ActionFactory) -> Self {
        let mut entries = HashMap::with_capacity(config.len());
        let mut collisions = Vec::new();
        for entry in &config.entries {
            let registration = Registration {
                key: entry.key,
                description: entry.description.clone(),
                action: factory.create(&entry.action),
            };
            if let Some(prev) = entries.insert(entry.key, registration) {
                warn!(
                    key = %entry.key,
                    replaced = %prev.description,
                    by = %entry.description,
                    "duplicate_registration"
                );
                collisions.push(entry.key);
            }
        }
        Self {
            entries,
            collisions,
        }
    }

    /// Registration for `key`, if any.
    pub fn lookup(&self, key: &KeyIdentity) -> Option<&Registration> {
        self.entries.get(key)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered keys in ascending order.
    pub fn keys(&self) -> Vec<KeyIdentity> {
        let mut keys: Vec<_> = self.entries.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Keys overwritten during [`RegistrationTable::build`], in config order.
    pub fn collisions(&self) -> &[KeyIdentity] {
        &self.collisions
    }
}
