//! # Cloudflare Access Client
//!
//! Typed CRUD access to the Cloudflare Zero Trust Access API.
//!
//! Each remote kind is an endpoint marker (`Groups`, `Applications`,
//! `Policies`, `ServiceTokens`) implementing [`AccessEndpoint`]. Clients
//! implement [`AccessApi`] once per endpoint; [`AccessClient`] bundles all four
//! so the reconciler can hold a single `Arc<dyn AccessClient>`.
//!
//! ## Implementations
//!
//! - [`CloudflareClient`] - REST client over `reqwest` with bearer-token auth
//! - [`MemoryAccessApi`] - in-memory account used by tests and dry runs

mod error;
mod memory;
mod rest;
pub mod types;

pub use error::ApiError;
pub use memory::{MemoryAccessApi, Operation};
pub use rest::CloudflareClient;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use types::{
    ApplicationBody, ApplicationSnapshot, GroupBody, GroupSnapshot, PolicyBody, PolicySnapshot,
    ServiceTokenBody, ServiceTokenSnapshot,
};

/// One collection of the Access API
pub trait AccessEndpoint: Send + Sync + 'static {
    /// Path segment under `/accounts/{account_id}/access/`
    const COLLECTION: &'static str;
    /// Human-readable kind for logs
    const KIND: &'static str;

    type Body: Serialize + Debug + Send + Sync;
    type Snapshot: DeserializeOwned + Clone + Debug + Send + Sync;

    fn snapshot_id(snapshot: &Self::Snapshot) -> &str;

    fn snapshot_name(snapshot: &Self::Snapshot) -> &str;

    /// Remote (created_at, updated_at) timestamps
    fn snapshot_timestamps(snapshot: &Self::Snapshot) -> (Option<&str>, Option<&str>);
}

/// Access groups
#[derive(Debug, Clone, Copy)]
pub struct Groups;

/// Access applications
#[derive(Debug, Clone, Copy)]
pub struct Applications;

/// Reusable policies
#[derive(Debug, Clone, Copy)]
pub struct Policies;

/// Service tokens
#[derive(Debug, Clone, Copy)]
pub struct ServiceTokens;

impl AccessEndpoint for Groups {
    const COLLECTION: &'static str = "groups";
    const KIND: &'static str = "access group";
    type Body = GroupBody;
    type Snapshot = GroupSnapshot;

    fn snapshot_id(snapshot: &GroupSnapshot) -> &str {
        &snapshot.id
    }

    fn snapshot_name(snapshot: &GroupSnapshot) -> &str {
        &snapshot.name
    }

    fn snapshot_timestamps(snapshot: &GroupSnapshot) -> (Option<&str>, Option<&str>) {
        (
            snapshot.created_at.as_deref(),
            snapshot.updated_at.as_deref(),
        )
    }
}

impl AccessEndpoint for Applications {
    const COLLECTION: &'static str = "apps";
    const KIND: &'static str = "access application";
    type Body = ApplicationBody;
    type Snapshot = ApplicationSnapshot;

    fn snapshot_id(snapshot: &ApplicationSnapshot) -> &str {
        &snapshot.id
    }

    fn snapshot_name(snapshot: &ApplicationSnapshot) -> &str {
        &snapshot.name
    }

    fn snapshot_timestamps(snapshot: &ApplicationSnapshot) -> (Option<&str>, Option<&str>) {
        (
            snapshot.created_at.as_deref(),
            snapshot.updated_at.as_deref(),
        )
    }
}

impl AccessEndpoint for Policies {
    const COLLECTION: &'static str = "policies";
    const KIND: &'static str = "reusable policy";
    type Body = PolicyBody;
    type Snapshot = PolicySnapshot;

    fn snapshot_id(snapshot: &PolicySnapshot) -> &str {
        &snapshot.id
    }

    fn snapshot_name(snapshot: &PolicySnapshot) -> &str {
        &snapshot.name
    }

    fn snapshot_timestamps(snapshot: &PolicySnapshot) -> (Option<&str>, Option<&str>) {
        (
            snapshot.created_at.as_deref(),
            snapshot.updated_at.as_deref(),
        )
    }
}

impl AccessEndpoint for ServiceTokens {
    const COLLECTION: &'static str = "service_tokens";
    const KIND: &'static str = "service token";
    type Body = ServiceTokenBody;
    type Snapshot = ServiceTokenSnapshot;

    fn snapshot_id(snapshot: &ServiceTokenSnapshot) -> &str {
        &snapshot.id
    }

    fn snapshot_name(snapshot: &ServiceTokenSnapshot) -> &str {
        &snapshot.name
    }

    fn snapshot_timestamps(snapshot: &ServiceTokenSnapshot) -> (Option<&str>, Option<&str>) {
        (
            snapshot.created_at.as_deref(),
            snapshot.updated_at.as_deref(),
        )
    }
}

/// CRUD operations on one Access collection
#[async_trait]
pub trait AccessApi<E: AccessEndpoint>: Send + Sync {
    /// Fetch one object by ID
    async fn get(&self, account_id: &str, id: &str) -> Result<E::Snapshot, ApiError>;

    /// List every object of the collection (all pages)
    async fn list(&self, account_id: &str) -> Result<Vec<E::Snapshot>, ApiError>;

    async fn create(&self, account_id: &str, body: &E::Body) -> Result<E::Snapshot, ApiError>;

    async fn update(
        &self,
        account_id: &str,
        id: &str,
        body: &E::Body,
    ) -> Result<E::Snapshot, ApiError>;

    async fn delete(&self, account_id: &str, id: &str) -> Result<(), ApiError>;

    /// First object whose name equals `name` (both trimmed)
    ///
    /// Best-effort import of objects created outside the controller.
    async fn find_by_name(
        &self,
        account_id: &str,
        name: &str,
    ) -> Result<Option<E::Snapshot>, ApiError> {
        let wanted = name.trim();
        Ok(self
            .list(account_id)
            .await?
            .into_iter()
            .find(|snapshot| E::snapshot_name(snapshot).trim() == wanted))
    }
}

/// A client for every Access collection the controller manages
pub trait AccessClient:
    AccessApi<Groups> + AccessApi<Applications> + AccessApi<Policies> + AccessApi<ServiceTokens>
{
}

impl<T> AccessClient for T where
    T: AccessApi<Groups>
        + AccessApi<Applications>
        + AccessApi<Policies>
        + AccessApi<ServiceTokens>
{
}

/// Locate the single application of an account-singleton type
///
/// Cloudflare allows one `app_launcher`, `warp` or `biso` application per
/// account. These are never created by the controller, only found and updated.
pub async fn find_first_of_singleton_type(
    api: &dyn AccessClient,
    account_id: &str,
    app_type: &str,
) -> Result<Option<ApplicationSnapshot>, ApiError> {
    let wanted = app_type.trim();
    Ok(AccessApi::<Applications>::list(api, account_id)
        .await?
        .into_iter()
        .find(|app| app.app_type.trim() == wanted))
}
