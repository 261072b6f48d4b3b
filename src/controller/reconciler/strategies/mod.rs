//! # Reconcile Strategies
//!
//! Per-kind behaviour plugged into the generic engine.
//!
//! The engine owns the state machine (finalizer, reference wait, lookup,
//! create or update, status). A strategy supplies what differs between kinds:
//! how references resolve into a desired remote body, how remote objects are
//! found and compared, and what happens around a sync or a delete.
//!
//! ## Strategies
//!
//! - [`GroupStrategy`] - `AccessGroup` to Access groups
//! - [`PolicyStrategy`] - `ReusablePolicy` to reusable policies
//! - [`ApplicationStrategy`] - `AccessApplication` to Access applications
//! - [`ServiceTokenStrategy`] - `ServiceToken` to service tokens and their secrets

mod application;
mod group;
mod policy;
mod service_token;

pub use application::{ApplicationStrategy, DesiredApplication};
pub use group::{DesiredGroup, GroupStrategy};
pub use policy::{DesiredPolicy, PolicyStrategy};
pub use service_token::{DesiredServiceToken, ServiceTokenStrategy};

use crate::cloudflare::{AccessEndpoint, ApiError};
use crate::controller::reconciler::types::{
    ReconcileError, Reconciler, Resolution, SyncOutcome,
};
use crate::crd::{AccessStatus, ManagedRecord};
use crate::store::RecordStore;
use async_trait::async_trait;

/// Remote snapshot type of a strategy
pub type Snapshot<S> = <<S as ReconcileStrategy>::Endpoint as AccessEndpoint>::Snapshot;

/// Capabilities the engine needs from each kind
#[async_trait]
pub trait ReconcileStrategy: Send + Sync + 'static {
    type Record: ManagedRecord;
    type Endpoint: AccessEndpoint;
    /// Desired remote state with every reference resolved
    type Desired: Send + Sync;

    fn store(ctx: &Reconciler) -> &dyn RecordStore<Self::Record>;

    /// Reject specs that can never sync
    ///
    /// # Errors
    /// Returns `Validation` describing the problem
    fn validate(record: &Self::Record) -> Result<(), ReconcileError>;

    async fn resolve_references(
        ctx: &Reconciler,
        record: &Self::Record,
    ) -> Result<Resolution<Self::Desired>, ReconcileError>;

    /// Remote ID to look up; `None` means the object has to be found or created
    fn remote_id(record: &Self::Record, _desired: &Self::Desired) -> Option<String> {
        record.remote_id().map(str::to_string)
    }

    async fn get_remote(
        ctx: &Reconciler,
        account_id: &str,
        id: &str,
    ) -> Result<Snapshot<Self>, ApiError>;

    /// Locate an existing remote object to adopt
    async fn find_remote(
        ctx: &Reconciler,
        account_id: &str,
        record: &Self::Record,
        desired: &Self::Desired,
    ) -> Result<Option<Snapshot<Self>>, ReconcileError>;

    async fn create_remote(
        ctx: &Reconciler,
        account_id: &str,
        desired: &Self::Desired,
    ) -> Result<Snapshot<Self>, ApiError>;

    async fn update_remote(
        ctx: &Reconciler,
        account_id: &str,
        id: &str,
        desired: &Self::Desired,
    ) -> Result<Snapshot<Self>, ApiError>;

    async fn delete_remote(ctx: &Reconciler, account_id: &str, id: &str) -> Result<(), ApiError>;

    fn is_equivalent(remote: &Snapshot<Self>, desired: &Self::Desired) -> bool;

    /// Add kind-specific fields to the success status
    fn record_status(_status: &mut AccessStatus, _desired: &Self::Desired) {}

    /// Runs after the remote object is in sync, before the success status
    async fn after_sync(
        _ctx: &Reconciler,
        _account_id: &str,
        _record: &Self::Record,
        _desired: &Self::Desired,
        _remote: &Snapshot<Self>,
        _outcome: SyncOutcome,
    ) -> Result<(), ReconcileError> {
        Ok(())
    }

    /// Runs after the remote object is gone, before the finalizer is removed
    async fn after_delete(_ctx: &Reconciler, _record: &Self::Record) -> Result<(), ReconcileError> {
        Ok(())
    }

    /// Leave the remote object in place when the record is deleted
    fn retains_remote(record: &Self::Record) -> bool {
        record.prevents_destroy()
    }
}

/// Spec names are trimmed and must not be blank
pub(crate) fn require_name(kind: &str, name: &str) -> Result<String, ReconcileError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ReconcileError::Validation(format!(
            "{kind} spec.name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}
