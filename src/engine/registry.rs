//! Handler registry - the closed set of command names an engine accepts

use std::collections::BTreeMap;

use crate::error::RegistryError;

/// Name of the handler every registry must provide
pub const CLEAR_COMMAND: &str = "clear";

/// Immutable mapping from command name to handler kind
#[derive(Debug, Clone)]
pub struct Registry<K> {
    entries: BTreeMap<&'static str, K>,
}

impl<K: Copy> Registry<K> {
    pub fn builder() -> RegistryBuilder<K> {
        RegistryBuilder {
            entries: BTreeMap::new(),
            error: None,
        }
    }

    /// Look up the handler registered under `name`
    pub fn lookup(&self, name: &str) -> Option<K> {
        self.entries.get(name).copied()
    }

    /// Registered names in sorted order (aliases included)
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}

/// Collects registrations; validation happens in [`RegistryBuilder::build`]
pub struct RegistryBuilder<K> {
    entries: BTreeMap<&'static str, K>,
    error: Option<RegistryError>,
}

impl<K: Copy> RegistryBuilder<K> {
    /// Register `kind` under `name`
    pub fn register(mut self, name: &'static str, kind: K) -> Self {
        if self.error.is_some() {
            return self;
        }
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            self.error = Some(RegistryError::InvalidName(name));
        } else if self.entries.insert(name, kind).is_some() {
            self.error = Some(RegistryError::Duplicate(name));
        }
        self
    }

    /// Validate and freeze the table
    pub fn build(self) -> Result<Registry<K>, RegistryError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if !self.entries.contains_key(CLEAR_COMMAND) {
            return Err(RegistryError::MissingClear(CLEAR_COMMAND));
        }
        Ok(Registry {
            entries: self.entries,
        })
    }
}
