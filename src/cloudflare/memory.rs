//! # In-Memory Access Account
//!
//! [`AccessApi`] over process memory, with a per-operation call log and
//! failure injection. Used by the reconciler tests and for dry runs.

use crate::cloudflare::{AccessApi, AccessEndpoint, ApiError, ServiceTokens};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Remote operation kinds recorded by [`MemoryAccessApi`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    List,
    Create,
    Update,
    Delete,
}

type CollectionKey = (&'static str, String);

#[derive(Debug, Default)]
struct State {
    /// Stored objects per (collection, account), in creation order
    objects: HashMap<CollectionKey, Vec<Value>>,
    calls: HashMap<(&'static str, Operation), usize>,
    failures: HashMap<(&'static str, Operation), VecDeque<ApiError>>,
}

/// In-memory Cloudflare account
#[derive(Debug, Clone, Default)]
pub struct MemoryAccessApi {
    state: Arc<Mutex<State>>,
}

impl MemoryAccessApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object as if it had been created outside the controller
    ///
    /// Not recorded in the call log.
    ///
    /// # Errors
    /// Returns an error if the body does not serialize to an object
    pub fn seed<E: AccessEndpoint>(
        &self,
        account_id: &str,
        body: &E::Body,
    ) -> Result<E::Snapshot, ApiError> {
        let mut state = self.lock();
        let (stored, returned) = new_object::<E>(body)?;
        state
            .objects
            .entry((E::COLLECTION, account_id.to_string()))
            .or_default()
            .push(stored);
        decode::<E>(returned)
    }

    /// Delete an object out-of-band; returns whether it existed
    pub fn remove<E: AccessEndpoint>(&self, account_id: &str, id: &str) -> bool {
        let mut state = self.lock();
        let Some(objects) = state
            .objects
            .get_mut(&(E::COLLECTION, account_id.to_string()))
        else {
            return false;
        };
        let before = objects.len();
        objects.retain(|object| object_id(object) != Some(id));
        objects.len() != before
    }

    /// Number of calls of `operation` made against the collection
    pub fn calls<E: AccessEndpoint>(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .get(&(E::COLLECTION, operation))
            .copied()
            .unwrap_or(0)
    }

    /// Create, update and delete calls across every collection
    pub fn total_writes(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|((_, operation), _)| {
                matches!(
                    operation,
                    Operation::Create | Operation::Update | Operation::Delete
                )
            })
            .map(|(_, count)| count)
            .sum()
    }

    /// Fail the next call of `operation` on the collection with `error`
    pub fn fail_next<E: AccessEndpoint>(&self, operation: Operation, error: ApiError) {
        self.lock()
            .failures
            .entry((E::COLLECTION, operation))
            .or_default()
            .push_back(error);
    }

    /// Current objects of the collection
    pub fn objects<E: AccessEndpoint>(&self, account_id: &str) -> Vec<E::Snapshot> {
        self.lock()
            .objects
            .get(&(E::COLLECTION, account_id.to_string()))
            .map(|objects| {
                objects
                    .iter()
                    .filter_map(|object| decode::<E>(object.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn object<E: AccessEndpoint>(&self, account_id: &str, id: &str) -> Option<E::Snapshot> {
        self.lock()
            .objects
            .get(&(E::COLLECTION, account_id.to_string()))
            .and_then(|objects| objects.iter().find(|o| object_id(o) == Some(id)).cloned())
            .and_then(|object| decode::<E>(object).ok())
    }

    /// Record the call and pop an injected failure, if any
    fn begin<E: AccessEndpoint>(
        state: &mut State,
        operation: Operation,
    ) -> Result<(), ApiError> {
        *state.calls.entry((E::COLLECTION, operation)).or_insert(0) += 1;
        match state
            .failures
            .get_mut(&(E::COLLECTION, operation))
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn object_id(object: &Value) -> Option<&str> {
    object.get("id").and_then(Value::as_str)
}

fn now() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

fn body_map<E: AccessEndpoint>(body: &E::Body) -> Result<Map<String, Value>, ApiError> {
    match serde_json::to_value(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::Validation(vec![format!(
            "{} body must be an object",
            E::KIND
        )])),
        Err(e) => Err(ApiError::Validation(vec![e.to_string()])),
    }
}

/// Build a new remote object; returns (stored, create response)
///
/// Service token secrets are only part of the create response.
fn new_object<E: AccessEndpoint>(body: &E::Body) -> Result<(Value, Value), ApiError> {
    let mut map = body_map::<E>(body)?;
    map.insert(
        "id".to_string(),
        Value::String(uuid::Uuid::new_v4().to_string()),
    );
    map.insert("created_at".to_string(), now());
    map.insert("updated_at".to_string(), now());

    if E::COLLECTION == ServiceTokens::COLLECTION {
        map.insert(
            "client_id".to_string(),
            Value::String(format!("{}.access", uuid::Uuid::new_v4().simple())),
        );
        let stored = Value::Object(map.clone());
        map.insert(
            "client_secret".to_string(),
            Value::String(format!(
                "{}{}",
                uuid::Uuid::new_v4().simple(),
                uuid::Uuid::new_v4().simple()
            )),
        );
        return Ok((stored, Value::Object(map)));
    }

    let object = Value::Object(map);
    Ok((object.clone(), object))
}

fn decode<E: AccessEndpoint>(value: Value) -> Result<E::Snapshot, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::Transient(format!("failed to decode stored {}: {e}", E::KIND)))
}

#[async_trait]
impl<E: AccessEndpoint> AccessApi<E> for MemoryAccessApi {
    async fn get(&self, account_id: &str, id: &str) -> Result<E::Snapshot, ApiError> {
        let mut state = self.lock();
        Self::begin::<E>(&mut state, Operation::Get)?;
        let object = state
            .objects
            .get(&(E::COLLECTION, account_id.to_string()))
            .and_then(|objects| objects.iter().find(|o| object_id(o) == Some(id)))
            .cloned()
            .ok_or(ApiError::NotFound)?;
        decode::<E>(object)
    }

    async fn list(&self, account_id: &str) -> Result<Vec<E::Snapshot>, ApiError> {
        let mut state = self.lock();
        Self::begin::<E>(&mut state, Operation::List)?;
        state
            .objects
            .get(&(E::COLLECTION, account_id.to_string()))
            .map(|objects| {
                objects
                    .iter()
                    .cloned()
                    .map(decode::<E>)
                    .collect::<Result<Vec<_>, _>>()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn create(&self, account_id: &str, body: &E::Body) -> Result<E::Snapshot, ApiError> {
        let mut state = self.lock();
        Self::begin::<E>(&mut state, Operation::Create)?;
        let (stored, returned) = new_object::<E>(body)?;
        state
            .objects
            .entry((E::COLLECTION, account_id.to_string()))
            .or_default()
            .push(stored);
        decode::<E>(returned)
    }

    async fn update(
        &self,
        account_id: &str,
        id: &str,
        body: &E::Body,
    ) -> Result<E::Snapshot, ApiError> {
        let mut state = self.lock();
        Self::begin::<E>(&mut state, Operation::Update)?;
        let mut map = body_map::<E>(body)?;
        let existing = state
            .objects
            .get_mut(&(E::COLLECTION, account_id.to_string()))
            .and_then(|objects| objects.iter_mut().find(|o| object_id(o) == Some(id)))
            .ok_or(ApiError::NotFound)?;

        // Server-assigned fields survive a full update.
        for field in ["id", "created_at", "client_id"] {
            if let Some(value) = existing.get(field) {
                map.insert(field.to_string(), value.clone());
            }
        }
        map.insert("updated_at".to_string(), now());
        *existing = Value::Object(map);
        decode::<E>(existing.clone())
    }

    async fn delete(&self, account_id: &str, id: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        Self::begin::<E>(&mut state, Operation::Delete)?;
        let objects = state
            .objects
            .get_mut(&(E::COLLECTION, account_id.to_string()))
            .ok_or(ApiError::NotFound)?;
        let before = objects.len();
        objects.retain(|object| object_id(object) != Some(id));
        if objects.len() == before {
            return Err(ApiError::NotFound);
        }
        Ok(())
    }
}
