//! # AccessApplication Strategy
//!
//! Applications attach reusable policies in reference order. Singleton
//! application types (`app_launcher`, `warp`, `biso`) exist at most once per
//! account: they are located and updated, never created, and never deleted
//! remotely when the record goes away.

use crate::cloudflare::types::{ApplicationBody, ApplicationSnapshot};
use crate::cloudflare::{find_first_of_singleton_type, AccessApi, ApiError, Applications};
use crate::config::resolve_account_id;
use crate::controller::reconciler::equivalence::application_matches;
use crate::controller::reconciler::policies::policy_links;
use crate::controller::reconciler::references::resolve_references;
use crate::controller::reconciler::strategies::{require_name, ReconcileStrategy};
use crate::controller::reconciler::types::{ReconcileError, Reconciler, Resolution};
use crate::crd::{AccessApplication, AccessStatus, ManagedRecord};
use crate::store::RecordStore;
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct ApplicationStrategy;

#[derive(Debug, Clone)]
pub struct DesiredApplication {
    pub body: ApplicationBody,
    /// Resolved policy IDs in precedence order
    pub policy_ids: Vec<String>,
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Fail when another record already manages this singleton type in the same account
async fn check_singleton(ctx: &Reconciler, record: &AccessApplication) -> Result<(), ReconcileError> {
    let app_type = record.spec.app_type.trim();
    let account = resolve_account_id(record.meta(), &ctx.config);
    let key = record.key();

    let conflict = ctx
        .stores
        .applications
        .list()
        .await?
        .into_iter()
        .filter(|other| other.key() != key && !other.is_under_deletion())
        .filter(|other| other.spec.app_type.trim() == app_type)
        .find(|other| resolve_account_id(other.meta(), &ctx.config) == account);

    match conflict {
        Some(other) => Err(ReconcileError::SingletonConflict {
            app_type: app_type.to_string(),
            other: other.key(),
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl ReconcileStrategy for ApplicationStrategy {
    type Record = AccessApplication;
    type Endpoint = Applications;
    type Desired = DesiredApplication;

    fn store(ctx: &Reconciler) -> &dyn RecordStore<AccessApplication> {
        ctx.stores.applications.as_ref()
    }

    fn validate(record: &AccessApplication) -> Result<(), ReconcileError> {
        let spec = &record.spec;
        require_name("AccessApplication", &spec.name)?;
        if spec.app_type.trim().is_empty() {
            return Err(ReconcileError::Validation(
                "AccessApplication spec.type must not be empty".to_string(),
            ));
        }
        if spec.app_type.trim() == "self_hosted" && trimmed(spec.domain.as_ref()).is_none() {
            return Err(ReconcileError::Validation(
                "self_hosted applications require spec.domain".to_string(),
            ));
        }
        Ok(())
    }

    async fn resolve_references(
        ctx: &Reconciler,
        record: &AccessApplication,
    ) -> Result<Resolution<DesiredApplication>, ReconcileError> {
        let namespace = record.namespace().unwrap_or_default();
        let spec = &record.spec;

        let policy_ids = match resolve_references(
            ctx.stores.policies.as_ref(),
            &spec.policies,
            &namespace,
        )
        .await?
        {
            Resolution::Ready(ids) => ids,
            Resolution::Waiting(waiting) => return Ok(Resolution::Waiting(waiting)),
        };

        if spec.is_singleton_type() {
            check_singleton(ctx, record).await?;
        }

        Ok(Resolution::Ready(DesiredApplication {
            body: ApplicationBody {
                name: require_name("AccessApplication", &spec.name)?,
                app_type: spec.app_type.trim().to_string(),
                domain: trimmed(spec.domain.as_ref()),
                session_duration: trimmed(spec.session_duration.as_ref()),
                app_launcher_visible: spec.app_launcher_visible,
                auto_redirect_to_identity: spec.auto_redirect_to_identity,
                enable_binding_cookie: spec.enable_binding_cookie,
                http_only_cookie_attribute: spec.http_only_cookie_attribute,
                skip_interstitial: spec.skip_interstitial,
                logo_url: trimmed(spec.logo_url.as_ref()),
                allowed_idps: spec
                    .allowed_idps
                    .iter()
                    .map(|idp| idp.trim().to_string())
                    .collect(),
                policies: policy_links(&policy_ids),
            },
            policy_ids,
        }))
    }

    async fn get_remote(
        ctx: &Reconciler,
        account_id: &str,
        id: &str,
    ) -> Result<ApplicationSnapshot, ApiError> {
        AccessApi::<Applications>::get(ctx.api.as_ref(), account_id, id).await
    }

    async fn find_remote(
        ctx: &Reconciler,
        account_id: &str,
        record: &AccessApplication,
        desired: &DesiredApplication,
    ) -> Result<Option<ApplicationSnapshot>, ReconcileError> {
        if !record.spec.is_singleton_type() {
            return AccessApi::<Applications>::find_by_name(
                ctx.api.as_ref(),
                account_id,
                &desired.body.name,
            )
            .await
            .map_err(|e| ReconcileError::remote("find", "access application", e));
        }

        let found =
            find_first_of_singleton_type(ctx.api.as_ref(), account_id, &desired.body.app_type)
                .await
                .map_err(|e| ReconcileError::remote("find", "access application", e))?;
        match found {
            Some(app) => {
                debug!(app_type = %desired.body.app_type, remote_id = %app.id, "Located singleton application");
                Ok(Some(app))
            }
            None => Err(ReconcileError::Validation(format!(
                "no {} application exists in account {account_id}; it must be enabled in Cloudflare first",
                desired.body.app_type
            ))),
        }
    }

    async fn create_remote(
        ctx: &Reconciler,
        account_id: &str,
        desired: &DesiredApplication,
    ) -> Result<ApplicationSnapshot, ApiError> {
        AccessApi::<Applications>::create(ctx.api.as_ref(), account_id, &desired.body).await
    }

    async fn update_remote(
        ctx: &Reconciler,
        account_id: &str,
        id: &str,
        desired: &DesiredApplication,
    ) -> Result<ApplicationSnapshot, ApiError> {
        AccessApi::<Applications>::update(ctx.api.as_ref(), account_id, id, &desired.body).await
    }

    async fn delete_remote(ctx: &Reconciler, account_id: &str, id: &str) -> Result<(), ApiError> {
        AccessApi::<Applications>::delete(ctx.api.as_ref(), account_id, id).await
    }

    fn is_equivalent(remote: &ApplicationSnapshot, desired: &DesiredApplication) -> bool {
        application_matches(remote, &desired.body)
    }

    fn record_status(status: &mut AccessStatus, desired: &DesiredApplication) {
        status.ordered_policy_ids = Some(desired.policy_ids.clone());
    }

    fn retains_remote(record: &AccessApplication) -> bool {
        record.prevents_destroy() || record.spec.is_singleton_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::AccessApplicationSpec;

    fn app(app_type: &str, domain: Option<&str>) -> AccessApplication {
        let mut app = AccessApplication::new(
            "grafana",
            AccessApplicationSpec {
                name: "Grafana".to_string(),
                domain: domain.map(str::to_string),
                app_type: app_type.to_string(),
                session_duration: None,
                app_launcher_visible: None,
                auto_redirect_to_identity: None,
                enable_binding_cookie: None,
                http_only_cookie_attribute: None,
                skip_interstitial: None,
                logo_url: None,
                allowed_idps: vec![],
                policies: vec![],
            },
        );
        app.metadata.namespace = Some("observability".to_string());
        app
    }

    #[test]
    fn test_self_hosted_requires_domain() {
        assert!(matches!(
            ApplicationStrategy::validate(&app("self_hosted", None)),
            Err(ReconcileError::Validation(_))
        ));
        assert!(ApplicationStrategy::validate(&app("self_hosted", Some("grafana.example.com"))).is_ok());
        assert!(ApplicationStrategy::validate(&app("warp", None)).is_ok());
    }

    #[test]
    fn test_singletons_are_never_deleted_remotely() {
        assert!(ApplicationStrategy::retains_remote(&app("app_launcher", None)));
        assert!(!ApplicationStrategy::retains_remote(&app(
            "self_hosted",
            Some("grafana.example.com")
        )));
    }
}
