//! Pending package updates, keyed by package name.
//!
//! Producers are HTTP registrations; the single consumer is the merge
//! worker, which takes the whole map at once.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::package::PackageUpdate;

/// Latest pending update per package, guarded by one lock.
#[derive(Debug, Default)]
pub struct UpdateRegistry {
    pending: Mutex<HashMap<String, PackageUpdate>>,
}

impl UpdateRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `update`, replacing any pending entry for the same package.
    /// Returns the superseded entry.
    pub fn register(&self, update: PackageUpdate) -> Option<PackageUpdate> {
        self.pending.lock().insert(update.name.clone(), update)
    }

    /// Removes and returns every pending update, ordered by package name.
    pub fn drain_all(&self) -> Vec<PackageUpdate> {
        let drained = std::mem::take(&mut *self.pending.lock());

        let mut updates: Vec<_> = drained.into_values().collect();
        updates.sort_by(|a, b| a.name.cmp(&b.name));
        updates
    }

    /// Puts a drained batch back after a failed merge. Entries registered
    /// since the drain are newer and are kept. Returns how many were
    /// reinstated.
    pub fn restore(&self, updates: Vec<PackageUpdate>) -> usize {
        let mut pending = self.pending.lock();
        let mut restored = 0;
        for update in updates {
            if !pending.contains_key(&update.name) {
                pending.insert(update.name.clone(), update);
                restored += 1;
            }
        }
        restored
    }

    /// Number of packages waiting to be merged.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether nothing is waiting to be merged.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(name: &str, constraint: &str) -> PackageUpdate {
        PackageUpdate::new(
            name,
            Some(constraint.to_string()),
            format!("https://git.example.com/{name}.git"),
            "vcs",
        )
    }

    #[test]
    fn last_registration_wins() {
        let registry = UpdateRegistry::new();

        assert!(registry.register(update("acme/a", "1.0.0")).is_none());
        let replaced = registry.register(update("acme/a", "2.0.0"));

        assert_eq!(replaced.map(|u| u.constraint).as_deref(), Some("1.0.0"));
        assert_eq!(registry.len(), 1);

        let drained = registry.drain_all();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].constraint, "2.0.0");
    }

    #[test]
    fn drain_empties_the_registry() {
        let registry = UpdateRegistry::new();
        registry.register(update("acme/b", "1"));
        registry.register(update("acme/a", "1"));

        let names: Vec<_> =
            registry.drain_all().into_iter().map(|u| u.name).collect();

        assert_eq!(names, ["acme/a", "acme/b"]);
        assert!(registry.is_empty());
        assert!(registry.drain_all().is_empty());
    }

    #[test]
    fn restore_keeps_newer_registrations() {
        let registry = UpdateRegistry::new();
        registry.register(update("acme/a", "1.0.0"));
        registry.register(update("acme/b", "1.0.0"));
        let drained = registry.drain_all();

        registry.register(update("acme/a", "3.0.0"));
        let restored = registry.restore(drained);

        assert_eq!(restored, 1);
        let drained = registry.drain_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].constraint, "3.0.0");
        assert_eq!(drained[1].constraint, "1.0.0");
    }
}
