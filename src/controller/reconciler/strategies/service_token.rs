//! # ServiceToken Strategy
//!
//! A service token's client secret is only returned when the token is
//! created, so the published Kubernetes secret is part of the token's state.
//!
//! - A token counts as existing only while a published secret holds its
//!   credentials. Without one, a fresh token is created. The engine deletes
//!   the token it replaced once the new credentials are published.
//! - Credentials are published before older secrets are removed, so renaming
//!   the secret never leaves consumers without valid credentials.

use crate::cloudflare::types::{ServiceTokenBody, ServiceTokenSnapshot};
use crate::cloudflare::{AccessApi, ApiError, ServiceTokens};
use crate::constants::MAX_LABEL_VALUE_LEN;
use crate::controller::reconciler::equivalence::service_token_matches;
use crate::controller::reconciler::secrets::{
    build_secret, current_secret, secret_matches, Credentials, PublishedSecret,
};
use crate::controller::reconciler::strategies::{require_name, ReconcileStrategy};
use crate::controller::reconciler::types::{ReconcileError, Reconciler, Resolution, SyncOutcome};
use crate::crd::{AccessStatus, ManagedRecord, ServiceToken};
use crate::store::RecordStore;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct ServiceTokenStrategy;

#[derive(Debug, Clone)]
pub struct DesiredServiceToken {
    pub body: ServiceTokenBody,
    /// Name the credentials are published under
    pub secret_name: String,
    /// Credentials of the token recorded in status, when still published
    pub current: Option<PublishedSecret>,
    /// Every secret carrying this record's owner label
    pub owned: Vec<Secret>,
}

/// Published credentials belong to the recorded token
///
/// Secrets without a token ID annotation predate the annotation and are
/// trusted.
fn belongs_to(published: &PublishedSecret, remote_id: Option<&str>) -> bool {
    match (published.credentials.token_id.as_deref(), remote_id) {
        (Some(token_id), Some(remote_id)) => token_id == remote_id,
        (None, Some(_)) => true,
        (_, None) => false,
    }
}

async fn publish(
    ctx: &Reconciler,
    record: &ServiceToken,
    desired: &DesiredServiceToken,
    credentials: &Credentials,
) -> Result<(), ReconcileError> {
    let secret = build_secret(record, credentials);
    let namespace = record.namespace().unwrap_or_default();

    let existing = desired
        .owned
        .iter()
        .find(|owned| owned.name_any() == desired.secret_name);
    if existing.is_some_and(|existing| secret_matches(existing, &secret)) {
        debug!(secret = %desired.secret_name, "Secret already up to date");
    } else {
        ctx.stores.secrets.apply(&secret).await?;
        info!(secret = %desired.secret_name, "Published service token credentials");
    }

    // Only after the new secret exists
    for old in desired
        .owned
        .iter()
        .filter(|owned| owned.name_any() != desired.secret_name)
    {
        let old_name = old.name_any();
        ctx.stores.secrets.delete(&namespace, &old_name).await?;
        info!(secret = %old_name, "Removed superseded service token secret");
    }
    Ok(())
}

#[async_trait]
impl ReconcileStrategy for ServiceTokenStrategy {
    type Record = ServiceToken;
    type Endpoint = ServiceTokens;
    type Desired = DesiredServiceToken;

    fn store(ctx: &Reconciler) -> &dyn RecordStore<ServiceToken> {
        ctx.stores.service_tokens.as_ref()
    }

    fn validate(record: &ServiceToken) -> Result<(), ReconcileError> {
        let template = &record.spec.secret;
        require_name("ServiceToken", &record.spec.name)?;
        // The record name labels every published secret
        let record_name = record.name_any();
        if record_name.len() > MAX_LABEL_VALUE_LEN {
            return Err(ReconcileError::Validation(format!(
                "ServiceToken name {record_name:?} is longer than {MAX_LABEL_VALUE_LEN} characters"
            )));
        }
        if template.name.trim().is_empty() {
            return Err(ReconcileError::Validation(
                "ServiceToken spec.secret.name must not be empty".to_string(),
            ));
        }
        if template.client_id_key.trim().is_empty() || template.client_secret_key.trim().is_empty()
        {
            return Err(ReconcileError::Validation(
                "ServiceToken secret keys must not be empty".to_string(),
            ));
        }
        if template.client_id_key == template.client_secret_key {
            return Err(ReconcileError::Validation(format!(
                "clientIdKey and clientSecretKey must differ (both {:?})",
                template.client_id_key
            )));
        }
        Ok(())
    }

    async fn resolve_references(
        ctx: &Reconciler,
        record: &ServiceToken,
    ) -> Result<Resolution<DesiredServiceToken>, ReconcileError> {
        let namespace = record.namespace().unwrap_or_default();
        let spec = &record.spec;
        let owned = ctx
            .stores
            .secrets
            .list_owned(&namespace, &record.name_any())
            .await?;

        let remote_id = record.remote_id();
        let current = current_secret(&owned, &spec.secret)
            .filter(|published| belongs_to(published, remote_id));
        if let (None, Some(id)) = (&current, remote_id) {
            warn!(
                remote_id = %id,
                "No published credentials for recorded token, a new token will be created"
            );
        }

        Ok(Resolution::Ready(DesiredServiceToken {
            body: ServiceTokenBody {
                name: require_name("ServiceToken", &spec.name)?,
                duration: spec
                    .duration
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
            },
            secret_name: spec.secret.name.trim().to_string(),
            current,
            owned,
        }))
    }

    fn remote_id(record: &ServiceToken, desired: &DesiredServiceToken) -> Option<String> {
        desired
            .current
            .as_ref()
            .and(record.remote_id())
            .map(str::to_string)
    }

    async fn get_remote(
        ctx: &Reconciler,
        account_id: &str,
        id: &str,
    ) -> Result<ServiceTokenSnapshot, ApiError> {
        AccessApi::<ServiceTokens>::get(ctx.api.as_ref(), account_id, id).await
    }

    /// Tokens are never adopted: an existing token's secret is unrecoverable
    async fn find_remote(
        _ctx: &Reconciler,
        _account_id: &str,
        _record: &ServiceToken,
        _desired: &DesiredServiceToken,
    ) -> Result<Option<ServiceTokenSnapshot>, ReconcileError> {
        Ok(None)
    }

    async fn create_remote(
        ctx: &Reconciler,
        account_id: &str,
        desired: &DesiredServiceToken,
    ) -> Result<ServiceTokenSnapshot, ApiError> {
        AccessApi::<ServiceTokens>::create(ctx.api.as_ref(), account_id, &desired.body).await
    }

    async fn update_remote(
        ctx: &Reconciler,
        account_id: &str,
        id: &str,
        desired: &DesiredServiceToken,
    ) -> Result<ServiceTokenSnapshot, ApiError> {
        AccessApi::<ServiceTokens>::update(ctx.api.as_ref(), account_id, id, &desired.body).await
    }

    async fn delete_remote(ctx: &Reconciler, account_id: &str, id: &str) -> Result<(), ApiError> {
        AccessApi::<ServiceTokens>::delete(ctx.api.as_ref(), account_id, id).await
    }

    fn is_equivalent(remote: &ServiceTokenSnapshot, desired: &DesiredServiceToken) -> bool {
        service_token_matches(remote, &desired.body)
    }

    fn record_status(status: &mut AccessStatus, desired: &DesiredServiceToken) {
        status.secret_name = Some(desired.secret_name.clone());
    }

    async fn after_sync(
        ctx: &Reconciler,
        _account_id: &str,
        record: &ServiceToken,
        desired: &DesiredServiceToken,
        remote: &ServiceTokenSnapshot,
        outcome: SyncOutcome,
    ) -> Result<(), ReconcileError> {
        let credentials = match (outcome, &desired.current) {
            (SyncOutcome::Created, _) => Credentials {
                client_id: remote.client_id.clone(),
                client_secret: remote.client_secret.clone().ok_or_else(|| {
                    ReconcileError::remote(
                        "create",
                        "service token",
                        ApiError::Transient("response carried no client secret".to_string()),
                    )
                })?,
                token_id: Some(remote.id.clone()),
            },
            (_, Some(current)) => Credentials {
                client_id: if remote.client_id.is_empty() {
                    current.credentials.client_id.clone()
                } else {
                    remote.client_id.clone()
                },
                client_secret: current.credentials.client_secret.clone(),
                token_id: Some(remote.id.clone()),
            },
            (_, None) => {
                return Err(ReconcileError::Validation(format!(
                    "no published credentials for service token {}",
                    remote.id
                )))
            }
        };

        publish(ctx, record, desired, &credentials).await
    }

    async fn after_delete(ctx: &Reconciler, record: &ServiceToken) -> Result<(), ReconcileError> {
        let namespace = record.namespace().unwrap_or_default();
        for secret in ctx
            .stores
            .secrets
            .list_owned(&namespace, &record.name_any())
            .await?
        {
            ctx.stores.secrets.delete(&namespace, &secret.name_any()).await?;
        }
        Ok(())
    }
}
