//! # In-Memory Storage
//!
//! Record and secret stores held in process memory. They mimic the API
//! server closely enough for reconciler tests: a record marked for deletion
//! disappears once its finalizer list is empty, and every secret write is
//! appended to an event log so ordering can be asserted.

use crate::crd::{AccessStatus, ManagedRecord};
use crate::store::{RecordStore, SecretStore, StoreError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type RecordKey = (String, String);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn key_of<K: ResourceExt>(resource: &K) -> RecordKey {
    (
        resource.namespace().unwrap_or_else(|| "default".to_string()),
        resource.name_any(),
    )
}

#[derive(Debug)]
struct RecordState<K> {
    records: BTreeMap<RecordKey, K>,
    status_writes: usize,
}

/// In-memory record store
#[derive(Debug, Clone)]
pub struct MemoryRecordStore<K> {
    state: Arc<Mutex<RecordState<K>>>,
}

impl<K> Default for MemoryRecordStore<K> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(RecordState {
                records: BTreeMap::new(),
                status_writes: 0,
            })),
        }
    }
}

impl<K: ManagedRecord> MemoryRecordStore<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record; generation defaults to 1
    pub fn insert(&self, mut record: K) {
        if record.meta().generation.is_none() {
            record.meta_mut().generation = Some(1);
        }
        lock(&self.state).records.insert(key_of(&record), record);
    }

    pub fn record(&self, namespace: &str, name: &str) -> Option<K> {
        lock(&self.state)
            .records
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Edit a stored record's spec or metadata and bump its generation
    pub fn modify(&self, namespace: &str, name: &str, edit: impl FnOnce(&mut K)) -> bool {
        let mut state = lock(&self.state);
        let Some(record) = state
            .records
            .get_mut(&(namespace.to_string(), name.to_string()))
        else {
            return false;
        };
        edit(record);
        let generation = record.meta().generation.unwrap_or(0) + 1;
        record.meta_mut().generation = Some(generation);
        true
    }

    /// Request deletion; finalizer-free records are removed at once
    pub fn mark_deleted(&self, namespace: &str, name: &str) -> bool {
        let mut state = lock(&self.state);
        let key = (namespace.to_string(), name.to_string());
        let Some(record) = state.records.get_mut(&key) else {
            return false;
        };
        record.meta_mut().deletion_timestamp =
            serde_json::from_value(serde_json::json!(chrono::Utc::now().to_rfc3339())).ok();
        if record.finalizers().is_empty() {
            state.records.remove(&key);
        }
        true
    }

    /// Number of status writes performed through the store
    pub fn status_writes(&self) -> usize {
        lock(&self.state).status_writes
    }
}

#[async_trait]
impl<K: ManagedRecord> RecordStore<K> for MemoryRecordStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        Ok(self.record(namespace, name))
    }

    async fn list(&self) -> Result<Vec<K>, StoreError> {
        Ok(lock(&self.state).records.values().cloned().collect())
    }

    async fn replace_status(&self, record: &K, status: &AccessStatus) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        let stored = state
            .records
            .get_mut(&key_of(record))
            .ok_or_else(|| StoreError::NotFound(record.key()))?;
        *stored.access_status_mut() = Some(status.clone());
        state.status_writes += 1;
        Ok(())
    }

    async fn set_finalizers(&self, record: &K, finalizers: Vec<String>) -> Result<K, StoreError> {
        let mut state = lock(&self.state);
        let key = key_of(record);
        let stored = state
            .records
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(record.key()))?;
        stored.meta_mut().finalizers = (!finalizers.is_empty()).then_some(finalizers);
        let updated = stored.clone();
        if updated.is_under_deletion() && updated.finalizers().is_empty() {
            state.records.remove(&key);
        }
        Ok(updated)
    }
}

/// Secret write observed by [`MemorySecretStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretEvent {
    Applied(String),
    Deleted(String),
}

#[derive(Debug, Default)]
struct SecretState {
    secrets: BTreeMap<RecordKey, Secret>,
    events: Vec<SecretEvent>,
    apply_failures: VecDeque<String>,
}

/// In-memory secret store
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    state: Arc<Mutex<SecretState>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        lock(&self.state)
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Names of the stored secrets in `namespace`
    pub fn names(&self, namespace: &str) -> Vec<String> {
        lock(&self.state)
            .secrets
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Secret writes in the order they happened
    pub fn events(&self) -> Vec<SecretEvent> {
        lock(&self.state).events.clone()
    }

    /// Make the next `apply` fail without writing anything
    pub fn fail_next_apply(&self, reason: &str) {
        lock(&self.state).apply_failures.push_back(reason.to_string());
    }

    /// Drop a secret without recording an event
    pub fn remove(&self, namespace: &str, name: &str) -> bool {
        lock(&self.state)
            .secrets
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn list_owned(&self, namespace: &str, owner: &str) -> Result<Vec<Secret>, StoreError> {
        Ok(lock(&self.state)
            .secrets
            .iter()
            .filter(|((ns, _), secret)| {
                ns == namespace
                    && secret
                        .labels()
                        .get(crate::constants::SERVICE_TOKEN_OWNER_LABEL)
                        .is_some_and(|value| value == owner)
            })
            .map(|(_, secret)| secret.clone())
            .collect())
    }

    async fn apply(&self, secret: &Secret) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.apply_failures.pop_front() {
            return Err(StoreError::Unavailable(reason));
        }
        let key = key_of(secret);
        state.events.push(SecretEvent::Applied(key.1.clone()));
        state.secrets.insert(key, secret.clone());
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        if state
            .secrets
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some()
        {
            state.events.push(SecretEvent::Deleted(name.to_string()));
        }
        Ok(())
    }
}
