//! # Kubernetes Storage
//!
//! `kube::Api` backed record and secret stores.

use crate::constants::{FIELD_MANAGER, SERVICE_TOKEN_OWNER_LABEL};
use crate::crd::{AccessStatus, ManagedRecord};
use crate::store::{RecordStore, SecretStore, StoreError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::{json, Value};
use tracing::debug;

/// Record store over the Kubernetes API server
#[derive(Clone)]
pub struct KubeRecordStore {
    client: Client,
}

impl std::fmt::Debug for KubeRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeRecordStore").finish_non_exhaustive()
    }
}

impl KubeRecordStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api_for<K: ManagedRecord>(&self, record: &K) -> Api<K> {
        Api::namespaced(
            self.client.clone(),
            record.namespace().as_deref().unwrap_or("default"),
        )
    }
}

/// Build a merge patch that replaces the status subresource
///
/// A JSON merge patch keeps every field it does not mention, so fields present
/// in `current` but absent from `desired` are sent as explicit nulls.
///
/// # Errors
/// Returns an error if either status fails to serialize
pub fn status_patch(
    current: Option<&AccessStatus>,
    desired: &AccessStatus,
) -> Result<Value, serde_json::Error> {
    let mut desired_value = serde_json::to_value(desired)?;
    if let Some(current) = current {
        let current_value = serde_json::to_value(current)?;
        null_removed_fields(&current_value, &mut desired_value);
    }
    Ok(json!({ "status": desired_value }))
}

fn null_removed_fields(current: &Value, desired: &mut Value) {
    let (Value::Object(current), Value::Object(desired)) = (current, desired) else {
        return;
    };
    for (key, current_value) in current {
        match desired.get_mut(key) {
            Some(desired_value) => null_removed_fields(current_value, desired_value),
            None => {
                desired.insert(key.clone(), Value::Null);
            }
        }
    }
}

#[async_trait]
impl<K: ManagedRecord> RecordStore<K> for KubeRecordStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list(&self) -> Result<Vec<K>, StoreError> {
        let api: Api<K> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn replace_status(&self, record: &K, status: &AccessStatus) -> Result<(), StoreError> {
        let patch = status_patch(record.access_status(), status)?;
        self.api_for(record)
            .patch_status(
                &record.name_any(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(patch),
            )
            .await?;
        Ok(())
    }

    async fn set_finalizers(&self, record: &K, finalizers: Vec<String>) -> Result<K, StoreError> {
        // resourceVersion makes the list replacement conditional on what we read.
        let patch = json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": record.resource_version(),
            }
        });
        Ok(self
            .api_for(record)
            .patch(
                &record.name_any(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(patch),
            )
            .await?)
    }
}

/// Secret store over the Kubernetes API server
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn list_owned(&self, namespace: &str, owner: &str) -> Result<Vec<Secret>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&format!("{SERVICE_TOKEN_OWNER_LABEL}={owner}"));
        Ok(api.list(&params).await?.items)
    }

    async fn apply(&self, secret: &Secret) -> Result<(), StoreError> {
        let namespace = secret.namespace().unwrap_or_else(|| "default".to_string());
        let name = secret.name_any();
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        api.patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(secret),
        )
        .await?;
        debug!(secret.namespace = %namespace, secret.name = %name, "Applied secret");
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
