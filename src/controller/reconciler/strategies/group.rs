//! AccessGroup strategy.

use crate::cloudflare::types::{GroupBody, GroupSnapshot};
use crate::cloudflare::{AccessApi, ApiError, Groups};
use crate::controller::reconciler::equivalence::group_matches;
use crate::controller::reconciler::rules::resolve_rule_buckets;
use crate::controller::reconciler::strategies::{require_name, ReconcileStrategy};
use crate::controller::reconciler::types::{ReconcileError, Reconciler, Resolution};
use crate::crd::{AccessGroup, AccessStatus, ResolvedIds};
use crate::store::RecordStore;
use async_trait::async_trait;
use kube::ResourceExt;

#[derive(Debug, Clone, Copy)]
pub struct GroupStrategy;

#[derive(Debug, Clone)]
pub struct DesiredGroup {
    pub body: GroupBody,
    pub ids: ResolvedIds,
}

#[async_trait]
impl ReconcileStrategy for GroupStrategy {
    type Record = AccessGroup;
    type Endpoint = Groups;
    type Desired = DesiredGroup;

    fn store(ctx: &Reconciler) -> &dyn RecordStore<AccessGroup> {
        ctx.stores.groups.as_ref()
    }

    fn validate(record: &AccessGroup) -> Result<(), ReconcileError> {
        require_name("AccessGroup", &record.spec.name).map(|_| ())
    }

    async fn resolve_references(
        ctx: &Reconciler,
        record: &AccessGroup,
    ) -> Result<Resolution<DesiredGroup>, ReconcileError> {
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

        Ok(Resolution::Ready(DesiredGroup {
            body: GroupBody {
                name: require_name("AccessGroup", &spec.name)?,
                include: resolved.include,
                require: resolved.require,
                exclude: resolved.exclude,
            },
            ids: resolved.ids,
        }))
    }

    async fn get_remote(
        ctx: &Reconciler,
        account_id: &str,
        id: &str,
    ) -> Result<GroupSnapshot, ApiError> {
        AccessApi::<Groups>::get(ctx.api.as_ref(), account_id, id).await
    }

    async fn find_remote(
        ctx: &Reconciler,
        account_id: &str,
        _record: &AccessGroup,
        desired: &DesiredGroup,
    ) -> Result<Option<GroupSnapshot>, ReconcileError> {
        AccessApi::<Groups>::find_by_name(ctx.api.as_ref(), account_id, &desired.body.name)
            .await
            .map_err(|e| ReconcileError::remote("find", "access group", e))
    }

    async fn create_remote(
        ctx: &Reconciler,
        account_id: &str,
        desired: &DesiredGroup,
    ) -> Result<GroupSnapshot, ApiError> {
        AccessApi::<Groups>::create(ctx.api.as_ref(), account_id, &desired.body).await
    }

    async fn update_remote(
        ctx: &Reconciler,
        account_id: &str,
        id: &str,
        desired: &DesiredGroup,
    ) -> Result<GroupSnapshot, ApiError> {
        AccessApi::<Groups>::update(ctx.api.as_ref(), account_id, id, &desired.body).await
    }

    async fn delete_remote(ctx: &Reconciler, account_id: &str, id: &str) -> Result<(), ApiError> {
        AccessApi::<Groups>::delete(ctx.api.as_ref(), account_id, id).await
    }

    fn is_equivalent(remote: &GroupSnapshot, desired: &DesiredGroup) -> bool {
        group_matches(remote, &desired.body)
    }

    fn record_status(status: &mut AccessStatus, desired: &DesiredGroup) {
        status.resolved_ids = Some(desired.ids.clone());
    }
}
