//! # Record Storage
//!
//! Read and write access to the declarative records and the secrets the
//! controller publishes.
//!
//! The reconciler only ever reads specs; it writes status subresources,
//! finalizer lists and service token secrets. Both seams are traits so the
//! engine runs against the Kubernetes API server in production and against
//! process memory in tests.

mod kubernetes;
mod memory;

pub use kubernetes::{status_patch, KubeRecordStore, KubeSecretStore};
pub use memory::{MemoryRecordStore, MemorySecretStore, SecretEvent};

use crate::crd::{AccessStatus, ManagedRecord};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("failed to encode patch: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Records of one kind
#[async_trait]
pub trait RecordStore<K: ManagedRecord>: Send + Sync {
    /// Fetch a record; `None` when it no longer exists
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>;

    /// Every record of the kind, across namespaces
    async fn list(&self) -> Result<Vec<K>, StoreError>;

    /// Replace the status subresource
    async fn replace_status(&self, record: &K, status: &AccessStatus) -> Result<(), StoreError>;

    /// Replace the finalizer list; returns the updated record
    async fn set_finalizers(&self, record: &K, finalizers: Vec<String>) -> Result<K, StoreError>;
}

/// Secrets published for service tokens
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Secrets in `namespace` labelled as owned by the named ServiceToken
    async fn list_owned(&self, namespace: &str, owner: &str) -> Result<Vec<Secret>, StoreError>;

    /// Create the secret or replace its content
    async fn apply(&self, secret: &Secret) -> Result<(), StoreError>;

    /// Delete a secret; deleting a missing secret succeeds
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}
