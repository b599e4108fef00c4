//! Store contracts consumed by managers, and in-memory implementations.
//!
//! The core never interprets store contents; it only hands the handles to
//! managers. Implementations provide their own concurrency control.

use crate::errors::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Configuration property store, keyed by namespace and property name.
pub trait PropertyStore: Send + Sync {
    fn get_property(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError>;
}

/// Dynamic status store shared between runs.
pub trait StatusStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// All entries whose key starts with `prefix`.
    fn get_prefix(&self, prefix: &str) -> Result<BTreeMap<String, String>, StoreError>;
}

/// Result archive for run artifacts.
pub trait ResultArchive: Send + Sync {
    fn store_artifact(&self, path: &str, content: &[u8]) -> Result<(), StoreError>;
    fn artifact(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Credentials looked up by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Credentials {
    Username { username: String },
    UsernamePassword { username: String, password: String },
    Token { token: String },
}

pub trait CredentialsStore: Send + Sync {
    fn get_credentials(&self, id: &str) -> Result<Option<Credentials>, StoreError>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::LockPoisoned)
}

#[derive(Debug, Default)]
pub struct MemoryPropertyStore {
    properties: Mutex<HashMap<(String, String), String>>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.properties)?.insert(
            (namespace.to_string(), key.to_string()),
            value.to_string(),
        );
        Ok(())
    }
}

impl PropertyStore for MemoryPropertyStore {
    fn get_property(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.properties)?
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusStore for MemoryStatusStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.entries)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }

    fn get_prefix(&self, prefix: &str) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(lock(&self.entries)?
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryArchive {
    artifacts: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Result<Vec<String>, StoreError> {
        Ok(lock(&self.artifacts)?.keys().cloned().collect())
    }
}

impl ResultArchive for MemoryArchive {
    fn store_artifact(&self, path: &str, content: &[u8]) -> Result<(), StoreError> {
        lock(&self.artifacts)?.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    fn artifact(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(lock(&self.artifacts)?.get(path).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialsStore {
    credentials: Mutex<HashMap<String, Credentials>>,
}

impl MemoryCredentialsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, id: &str, credentials: Credentials) -> Result<(), StoreError> {
        lock(&self.credentials)?.insert(id.to_string(), credentials);
        Ok(())
    }
}

impl CredentialsStore for MemoryCredentialsStore {
    fn get_credentials(&self, id: &str) -> Result<Option<Credentials>, StoreError> {
        Ok(lock(&self.credentials)?.get(id).cloned())
    }
}

/// The four store handles a run exposes to its managers.
#[derive(Clone)]
pub struct RunStores {
    pub properties: Arc<dyn PropertyStore>,
    pub status: Arc<dyn StatusStore>,
    pub archive: Arc<dyn ResultArchive>,
    pub credentials: Arc<dyn CredentialsStore>,
}

impl RunStores {
    /// Fresh, empty in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            properties: Arc::new(MemoryPropertyStore::new()),
            status: Arc::new(MemoryStatusStore::new()),
            archive: Arc::new(MemoryArchive::new()),
            credentials: Arc::new(MemoryCredentialsStore::new()),
        }
    }

    pub fn with_properties(mut self, store: Arc<dyn PropertyStore>) -> Self {
        self.properties = store;
        self
    }

    pub fn with_status(mut self, store: Arc<dyn StatusStore>) -> Self {
        self.status = store;
        self
    }

    pub fn with_archive(mut self, store: Arc<dyn ResultArchive>) -> Self {
        self.archive = store;
        self
    }

    pub fn with_credentials(mut self, store: Arc<dyn CredentialsStore>) -> Self {
        self.credentials = store;
        self
    }
}

impl std::fmt::Debug for RunStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunStores").finish_non_exhaustive()
    }
}
