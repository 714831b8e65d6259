//! Bidirectional dependency graph over string keys.
//!
//! A reusable edge set recording "dependee is referenced by dependent"
//! pairs. Both directions are indexed, so dependents and dependees of any
//! key come back in O(1) amortized time regardless of graph size. Keys
//! exist only through their edges; there is no separate node registry.
//! Cycle detection is deliberately not implemented here, it belongs to the
//! layer that owns the mutation protocol.

use std::collections::{HashMap, HashSet};

/// Directed edge set with forward and reverse adjacency indexes.
///
/// An edge `(dependee, dependent)` reads "dependent depends on dependee".
/// Adding an existing pair and removing a missing pair are both no-ops;
/// self-pairs are permitted and count toward [`size`](Self::size).
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// dependee -> keys that depend on it
    dependents: HashMap<String, HashSet<String>>,
    /// dependent -> keys it depends on
    dependees: HashMap<String, HashSet<String>>,
    /// Number of ordered pairs, not distinct keys.
    size: usize,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ordered `(dependee, dependent)` pairs in the graph.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Records that `dependent` depends on `dependee`.
    pub fn add_dependency(&mut self, dependee: &str, dependent: &str) {
        let inserted = self
            .dependents
            .entry(dependee.to_string())
            .or_default()
            .insert(dependent.to_string());
        if inserted {
            self.dependees
                .entry(dependent.to_string())
                .or_default()
                .insert(dependee.to_string());
            self.size += 1;
        }
    }

    /// Removes the `(dependee, dependent)` pair if present.
    pub fn remove_dependency(&mut self, dependee: &str, dependent: &str) {
        let removed = self
            .dependents
            .get_mut(dependee)
            .is_some_and(|set| set.remove(dependent));
        if removed {
            if let Some(set) = self.dependees.get_mut(dependent) {
                set.remove(dependee);
                if set.is_empty() {
                    self.dependees.remove(dependent);
                }
            }
            if self.dependents.get(dependee).is_some_and(HashSet::is_empty) {
                self.dependents.remove(dependee);
            }
            self.size -= 1;
        }
    }

    /// Keys that depend on `key`. Empty for unknown keys.
    pub fn dependents(&self, key: &str) -> HashSet<String> {
        self.dependents.get(key).cloned().unwrap_or_default()
    }

    /// Keys that `key` depends on. Empty for unknown keys.
    pub fn dependees(&self, key: &str) -> HashSet<String> {
        self.dependees.get(key).cloned().unwrap_or_default()
    }

    /// True when at least one key depends on `key`.
    pub fn has_dependents(&self, key: &str) -> bool {
        self.dependents.get(key).is_some_and(|set| !set.is_empty())
    }

    /// True when `key` depends on at least one key.
    pub fn has_dependees(&self, key: &str) -> bool {
        self.dependees.get(key).is_some_and(|set| !set.is_empty())
    }

    /// Replaces every `(key, *)` pair with `(key, t)` for each `t` in
    /// `new_dependents`.
    pub fn replace_dependents(&mut self, key: &str, new_dependents: &HashSet<String>) {
        for old in self.dependents(key) {
            self.remove_dependency(key, &old);
        }
        for dependent in new_dependents {
            self.add_dependency(key, dependent);
        }
    }

    /// Replaces every `(*, key)` pair with `(s, key)` for each `s` in
    /// `new_dependees`.
    pub fn replace_dependees(&mut self, key: &str, new_dependees: &HashSet<String>) {
        for old in self.dependees(key) {
            self.remove_dependency(&old, key);
        }
        for dependee in new_dependees {
            self.add_dependency(dependee, key);
        }
    }
}
