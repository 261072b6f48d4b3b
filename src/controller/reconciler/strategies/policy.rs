//! ReusablePolicy strategy.

use crate::cloudflare::types::{PolicyBody, PolicySnapshot};
use crate::cloudflare::{AccessApi, ApiError, Policies};
use crate::controller::reconciler::equivalence::policy_matches;
use crate::controller::reconciler::rules::resolve_rule_buckets;
use crate::controller::reconciler::strategies::{require_name, ReconcileStrategy};
use crate::controller::reconciler::types::{ReconcileError, Reconciler, Resolution};
use crate::crd::{AccessStatus, ResolvedIds, ReusablePolicy};
use crate::store::RecordStore;
use async_trait::async_trait;
use kube::ResourceExt;

#[derive(Debug, Clone, Copy)]
pub struct PolicyStrategy;

#[derive(Debug, Clone)]
pub struct DesiredPolicy {
    pub body: PolicyBody,
    pub ids: ResolvedIds,
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

#[async_trait]
impl ReconcileStrategy for PolicyStrategy {
    type Record = ReusablePolicy;
    type Endpoint = Policies;
    type Desired = DesiredPolicy;

    fn store(ctx: &Reconciler) -> &dyn RecordStore<ReusablePolicy> {
        ctx.stores.policies.as_ref()
    }

    fn validate(record: &ReusablePolicy) -> Result<(), ReconcileError> {
        require_name("ReusablePolicy", &record.spec.name).map(|_| ())
    }

    async fn resolve_references(
        ctx: &Reconciler,
        record: &ReusablePolicy,
    ) -> Result<Resolution<DesiredPolicy>, ReconcileError> {
        let namespace = record.namespace().unwrap_or_default();
        let spec = &record.spec;
        let resolved = match resolve_rule_buckets(
            ctx,
            &namespace,
            &spec.include,
            &spec.require,
            &spec.exclude,
        )
        .await?
        {
            Resolution::Ready(resolved) => resolved,
            Resolution::Waiting(waiting) => return Ok(Resolution::Waiting(waiting)),
        };

        Ok(Resolution::Ready(DesiredPolicy {
            body: PolicyBody {
                name: require_name("ReusablePolicy", &spec.name)?,
                decision: spec.decision.as_str().to_string(),
                include: resolved.include,
                require: resolved.require,
                exclude: resolved.exclude,
                session_duration: trimmed(spec.session_duration.as_ref()),
                purpose_justification_required: spec.purpose_justification_required,
                purpose_justification_prompt: trimmed(spec.purpose_justification_prompt.as_ref()),
                approval_required: spec.approval_required,
                isolation_required: spec.isolation_required,
            },
            ids: resolved.ids,
        }))
    }

    async fn get_remote(
        ctx: &Reconciler,
        account_id: &str,
        id: &str,
    ) -> Result<PolicySnapshot, ApiError> {
        AccessApi::<Policies>::get(ctx.api.as_ref(), account_id, id).await
    }

    async fn find_remote(
        ctx: &Reconciler,
        account_id: &str,
        _record: &ReusablePolicy,
        desired: &DesiredPolicy,
    ) -> Result<Option<PolicySnapshot>, ReconcileError> {
        AccessApi::<Policies>::find_by_name(ctx.api.as_ref(), account_id, &desired.body.name)
            .await
            .map_err(|e| ReconcileError::remote("find", "reusable policy", e))
    }

    async fn create_remote(
        ctx: &Reconciler,
        account_id: &str,
        desired: &DesiredPolicy,
    ) -> Result<PolicySnapshot, ApiError> {
        AccessApi::<Policies>::create(ctx.api.as_ref(), account_id, &desired.body).await
    }

    async fn update_remote(
        ctx: &Reconciler,
        account_id: &str,
        id: &str,
        desired: &DesiredPolicy,
    ) -> Result<PolicySnapshot, ApiError> {
        AccessApi::<Policies>::update(ctx.api.as_ref(), account_id, id, &desired.body).await
    }

    async fn delete_remote(ctx: &Reconciler, account_id: &str, id: &str) -> Result<(), ApiError> {
        AccessApi::<Policies>::delete(ctx.api.as_ref(), account_id, id).await
    }

    fn is_equivalent(remote: &PolicySnapshot, desired: &DesiredPolicy) -> bool {
        policy_matches(remote, &desired.body)
    }

    fn record_status(status: &mut AccessStatus, desired: &DesiredPolicy) {
        status.resolved_ids = Some(desired.ids.clone());
    }
}
