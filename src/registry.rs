// Connection registry
// Maps identifiers to database handles and remembers which one is the
// default. Built once at startup and passed to whoever needs a connection.

use crate::database::Database;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// Identifier given to the first connection added without one
pub const DEFAULT_CONNECTION: &str = "default";

const GENERATED_ID_LEN: usize = 8;

/// A registered handle
///
/// The lock serializes queries on the underlying connection.
pub type SharedDatabase = Arc<Mutex<Database>>;

#[derive(Default)]
struct Connections {
    databases: HashMap<String, SharedDatabase>,
    /// Always a key of `databases` once set
    default: Option<String>,
}

#[derive(Default)]
pub struct Registry {
    inner: Mutex<Connections>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `database` and make it the default connection
    ///
    /// Without an `id` the first connection is registered as
    /// [`DEFAULT_CONNECTION`] and later ones under a fresh random id. An
    /// existing id is replaced. Returns the id used.
    pub fn add(&self, database: Database, id: Option<&str>) -> String {
        let mut inner = self.inner.lock();

        let id = match id {
            Some(id) => id.to_string(),
            None if inner.default.is_none() => DEFAULT_CONNECTION.to_string(),
            None => loop {
                let candidate = generate_id();
                if !inner.databases.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let replaced = inner
            .databases
            .insert(id.clone(), Arc::new(Mutex::new(database)))
            .is_some();
        inner.default = Some(id.clone());

        tracing::info!(id = %id, replaced, "registered connection");
        id
    }

    /// Look up a connection, or the default one when `id` is `None`
    pub fn get(&self, id: Option<&str>) -> Option<SharedDatabase> {
        let inner = self.inner.lock();
        let id = match id {
            Some(id) => id,
            None => inner.default.as_deref()?,
        };
        inner.databases.get(id).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.inner.lock().databases.contains_key(id)
    }

    pub fn default_id(&self) -> Option<String> {
        self.inner.lock().default.clone()
    }

    /// Make an already registered connection the default
    ///
    /// Returns false, leaving the default untouched, for an unknown id.
    pub fn set_default(&self, id: &str) -> bool {
        let mut inner = self.inner.lock();
        if !inner.databases.contains_key(id) {
            return false;
        }
        inner.default = Some(id.to_string());
        true
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock().databases.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.lock().databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ConnectOptions, MemoryDriver};

    fn database(driver: &MemoryDriver) -> Database {
        Database::connect(driver, "memory:", &ConnectOptions::new()).unwrap()
    }

    #[test]
    fn test_first_anonymous_connection_gets_default_id() {
        let driver = MemoryDriver::new();
        let registry = Registry::new();

        assert_eq!(registry.add(database(&driver), None), DEFAULT_CONNECTION);
        assert_eq!(registry.default_id().as_deref(), Some(DEFAULT_CONNECTION));
    }

    #[test]
    fn test_later_anonymous_connections_get_fresh_ids() {
        let driver = MemoryDriver::new();
        let registry = Registry::new();

        registry.add(database(&driver), None);
        let second = registry.add(database(&driver), None);
        let third = registry.add(database(&driver), None);

        assert_ne!(second, DEFAULT_CONNECTION);
        assert_ne!(second, third);
        assert_eq!(second.len(), GENERATED_ID_LEN);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.default_id(), Some(third));
    }

    #[test]
    fn test_add_replaces_existing_id() {
        let driver = MemoryDriver::new();
        let registry = Registry::new();

        registry.add(database(&driver), Some("a"));
        let first = registry.get(Some("a")).unwrap();
        registry.add(database(&driver), Some("a"));

        assert_eq!(registry.len(), 1);
        assert!(!Arc::ptr_eq(&first, &registry.get(Some("a")).unwrap()));
    }

    #[test]
    fn test_empty_registry_has_no_default() {
        let registry = Registry::new();

        assert!(registry.is_empty());
        assert!(registry.get(None).is_none());
        assert!(!registry.has(DEFAULT_CONNECTION));
    }

    #[test]
    fn test_set_default_requires_known_id() {
        let driver = MemoryDriver::new();
        let registry = Registry::new();
        registry.add(database(&driver), Some("a"));
        registry.add(database(&driver), Some("b"));

        assert!(!registry.set_default("c"));
        assert!(registry.set_default("a"));
        assert!(Arc::ptr_eq(
            &registry.get(None).unwrap(),
            &registry.get(Some("a")).unwrap()
        ));
    }
}
