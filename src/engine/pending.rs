//! Pending operations - the commands currently in effect, per target key

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

use super::command::Command;

/// Addressable unit an effect applies to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetKey {
    /// LED index
    Pixel(usize),
    /// Dashboard widget name
    Widget(String),
}

impl TargetKey {
    pub fn pixel(&self) -> Option<usize> {
        match self {
            Self::Pixel(index) => Some(*index),
            Self::Widget(_) => None,
        }
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pixel(index) => write!(f, "pixel:{}", index),
            Self::Widget(name) => write!(f, "widget:{}", name),
        }
    }
}

/// A command in effect for one target key
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub key: TargetKey,
    pub command: Arc<Command>,
    /// When to revert; `None` never expires
    pub deadline: Option<Instant>,
}

impl PendingOperation {
    pub fn new(key: TargetKey, command: Arc<Command>, deadline: Option<Instant>) -> Self {
        Self {
            key,
            command,
            deadline,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

/// All pending operations of one engine, at most one per key
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: BTreeMap<TargetKey, PendingOperation>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `op`, replacing (not merging) whatever was pending for its key
    pub fn replace(&mut self, op: PendingOperation) -> Option<PendingOperation> {
        self.entries.insert(op.key.clone(), op)
    }

    pub fn remove(&mut self, key: &TargetKey) -> Option<PendingOperation> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &TargetKey) -> Option<&PendingOperation> {
        self.entries.get(key)
    }

    /// Remove and return every operation whose deadline is at or before `now`
    pub fn take_expired(&mut self, now: Instant) -> Vec<PendingOperation> {
        let expired: Vec<TargetKey> = self
            .entries
            .values()
            .filter(|op| op.is_expired(now))
            .map(|op| op.key.clone())
            .collect();

        expired
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .collect()
    }

    /// Earliest deadline among live operations
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().filter_map(|op| op.deadline).min()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingOperation> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
