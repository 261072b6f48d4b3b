//! # Reconciliation Engine
//!
//! One state machine shared by every kind:
//!
//! ```text
//! Loaded -> ReferencesResolving -> RemoteLookup -> Create | Update | NoOp -> StatusWrite
//!              |                       |
//!              +-> Requeue(wait)       +-> Requeue(remote lost)
//! ```
//!
//! Deletion is detected first and short-circuits the sync. Errors are written
//! to the `Available`/`Degraded` conditions and returned to the error policy,
//! which decides whether to retry. A remote ID is persisted the moment it is
//! learned, so a later failure in the same pass never leads to a second
//! create. An ID it replaces is kept in status until its remote object has
//! been deleted.

use crate::cloudflare::AccessEndpoint;
use crate::config::resolve_account_id;
use crate::controller::reconciler::finalizer::{
    add_finalizer, finalizer_step, remove_finalizer, FinalizerStep,
};
use crate::controller::reconciler::status::{
    clear_remote_id, mark_available, record_remote_id, report_failure, report_waiting,
    write_status,
};
use crate::controller::reconciler::strategies::{ReconcileStrategy, Snapshot};
use crate::controller::reconciler::types::{
    ReconcileError, Reconciler, Resolution, SyncOutcome,
};
use crate::crd::ManagedRecord;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Key of a record's backoff state
pub fn backoff_key<K: ManagedRecord>(record: &K) -> String {
    format!("{}/{}", K::KIND, record.key())
}

/// Reconcile one record of the strategy's kind
///
/// # Errors
/// Returns the failure after recording it in the record's conditions
pub async fn reconcile<S: ReconcileStrategy>(
    record: Arc<S::Record>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcileError> {
    let namespace = record.namespace().unwrap_or_default();
    let name = record.name_any();
    let span = info_span!(
        "reconcile",
        resource.kind = <S::Record as ManagedRecord>::KIND,
        resource.namespace = %namespace,
        resource.name = %name,
    );
    run::<S>(&ctx, &namespace, &name).instrument(span).await
}

async fn run<S: ReconcileStrategy>(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<Action, ReconcileError> {
    let store = S::store(ctx);

    // Work from the stored record, never the watch event
    let Some(mut record) = store.get(namespace, name).await? else {
        debug!("Record no longer exists, nothing to do");
        return Ok(Action::await_change());
    };

    let result = match finalizer_step(record.has_finalizer(), record.is_under_deletion()) {
        FinalizerStep::Done => return Ok(Action::await_change()),
        FinalizerStep::Cleanup => cleanup::<S>(ctx, &record).await,
        FinalizerStep::AddFinalizer => match add_finalizer(store, &record).await {
            Ok(updated) => {
                debug!("Added finalizer");
                record = updated;
                sync::<S>(ctx, &mut record).await
            }
            Err(e) => Err(e.into()),
        },
        FinalizerStep::Continue => sync::<S>(ctx, &mut record).await,
    };

    match result {
        Ok(action) => Ok(action),
        Err(ReconcileError::Cancelled) => {
            info!("Reconciliation cancelled by shutdown");
            Err(ReconcileError::Cancelled)
        }
        Err(err) => {
            if let Err(status_err) = report_failure(store, &mut record, &err).await {
                warn!(error = %status_err, "Failed to record failure in status");
            }
            Err(err)
        }
    }
}

/// Remove the remote counterpart, then release the record
async fn cleanup<S: ReconcileStrategy>(
    ctx: &Reconciler,
    record: &S::Record,
) -> Result<Action, ReconcileError> {
    let kind = <S::Endpoint as AccessEndpoint>::KIND;

    if S::retains_remote(record) {
        info!(
            remote_id = record.remote_id().unwrap_or_default(),
            "Retaining remote {kind} on deletion"
        );
    } else {
        let has_superseded = record
            .access_status()
            .is_some_and(|status| !status.superseded_remote_ids.is_empty());
        if record.remote_id().is_some() || has_superseded {
            let account_id = resolve_account_id(record.meta(), &ctx.config)
                .ok_or(ReconcileError::MissingAccount)?;
            if let Some(remote_id) = record.remote_id() {
                ctx.ensure_running()?;
                match S::delete_remote(ctx, &account_id, remote_id).await {
                    Ok(()) => info!(remote_id, "🗑️  Deleted remote {kind}"),
                    Err(e) if e.is_not_found() => {
                        info!(remote_id, "Remote {kind} already gone");
                    }
                    Err(e) => return Err(ReconcileError::remote("delete", kind, e)),
                }
            }
            delete_superseded::<S>(ctx, &account_id, record).await?;
        }
        S::after_delete(ctx, record).await?;
    }

    remove_finalizer(S::store(ctx), record).await?;
    ctx.reset_backoff(&backoff_key(record));
    info!("Released finalizer");
    Ok(Action::await_change())
}

async fn sync<S: ReconcileStrategy>(
    ctx: &Reconciler,
    record: &mut S::Record,
) -> Result<Action, ReconcileError> {
    let store = S::store(ctx);
    let kind = <S::Endpoint as AccessEndpoint>::KIND;

    let account_id =
        resolve_account_id(record.meta(), &ctx.config).ok_or(ReconcileError::MissingAccount)?;
    S::validate(record)?;

    let desired = match S::resolve_references(ctx, record).await? {
        Resolution::Ready(desired) => desired,
        Resolution::Waiting(waiting) => {
            info!(
                dependency = %waiting.reference,
                "⏳ Waiting for dependency: {}",
                waiting.reason
            );
            report_waiting(store, record, &waiting).await?;
            return Ok(Action::requeue(ctx.config.dependency_requeue()));
        }
    };

    ctx.ensure_running()?;

    let (remote, outcome): (Snapshot<S>, SyncOutcome) = match S::remote_id(record, &desired) {
        Some(remote_id) => {
            let current = match S::get_remote(ctx, &account_id, &remote_id).await {
                Ok(current) => current,
                Err(e) if e.is_not_found() => {
                    return remote_lost::<S>(ctx, record, &remote_id).await;
                }
                Err(e) => return Err(ReconcileError::remote("get", kind, e)),
            };
            if S::is_equivalent(&current, &desired) {
                (current, SyncOutcome::Unchanged)
            } else {
                ctx.ensure_running()?;
                match S::update_remote(ctx, &account_id, &remote_id, &desired).await {
                    Ok(updated) => {
                        info!(remote_id = %remote_id, "Updated remote {kind}");
                        (updated, SyncOutcome::Updated)
                    }
                    Err(e) if e.is_not_found() => {
                        return remote_lost::<S>(ctx, record, &remote_id).await;
                    }
                    Err(e) => return Err(ReconcileError::remote("update", kind, e)),
                }
            }
        }
        None => match S::find_remote(ctx, &account_id, record, &desired).await? {
            Some(found) => {
                let remote_id = <S::Endpoint as AccessEndpoint>::snapshot_id(&found).to_string();
                info!(remote_id = %remote_id, "Adopting existing remote {kind}");
                record_remote_id(
                    store,
                    record,
                    &remote_id,
                    <S::Endpoint as AccessEndpoint>::snapshot_timestamps(&found),
                )
                .await?;
                if S::is_equivalent(&found, &desired) {
                    (found, SyncOutcome::Adopted)
                } else {
                    ctx.ensure_running()?;
                    let updated = S::update_remote(ctx, &account_id, &remote_id, &desired)
                        .await
                        .map_err(|e| ReconcileError::remote("update", kind, e))?;
                    (updated, SyncOutcome::Adopted)
                }
            }
            None => {
                ctx.ensure_running()?;
                let created = S::create_remote(ctx, &account_id, &desired)
                    .await
                    .map_err(|e| ReconcileError::remote("create", kind, e))?;
                let remote_id = <S::Endpoint as AccessEndpoint>::snapshot_id(&created);
                info!(remote_id = %remote_id, "✨ Created remote {kind}");
                record_remote_id(
                    store,
                    record,
                    remote_id,
                    <S::Endpoint as AccessEndpoint>::snapshot_timestamps(&created),
                )
                .await?;
                (created, SyncOutcome::Created)
            }
        },
    };

    ctx.ensure_running()?;
    S::after_sync(ctx, &account_id, record, &desired, &remote, outcome).await?;
    delete_superseded::<S>(ctx, &account_id, record).await?;

    let remote_id = <S::Endpoint as AccessEndpoint>::snapshot_id(&remote);
    let (created_at, updated_at) = <S::Endpoint as AccessEndpoint>::snapshot_timestamps(&remote);
    let mut status = record.access_status().cloned().unwrap_or_default();
    status.remote_id = Some(remote_id.to_string());
    status.created_at = created_at.map(str::to_string);
    status.updated_at = updated_at.map(str::to_string);
    status.superseded_remote_ids.clear();
    status.observed_generation = record.meta().generation;
    S::record_status(&mut status, &desired);
    mark_available(&mut status, &format!("Remote {kind} {remote_id} is in sync"));

    if write_status(store, record, status).await? {
        debug!(?outcome, "Status updated");
    }
    ctx.reset_backoff(&backoff_key(record));

    if outcome == SyncOutcome::Unchanged {
        debug!(remote_id, "✅ Remote {kind} already in sync");
    } else {
        info!(remote_id, ?outcome, "✅ Reconciled remote {kind}");
    }
    Ok(Action::requeue(ctx.config.resync_interval()))
}

/// Delete remote objects the record's current remote ID replaced
///
/// The IDs stay in status until a pass gets through this step, so a failed
/// delete is retried instead of leaving the object behind.
async fn delete_superseded<S: ReconcileStrategy>(
    ctx: &Reconciler,
    account_id: &str,
    record: &S::Record,
) -> Result<(), ReconcileError> {
    let kind = <S::Endpoint as AccessEndpoint>::KIND;
    let Some(status) = record.access_status() else {
        return Ok(());
    };
    let current = record.remote_id();

    for remote_id in status
        .superseded_remote_ids
        .iter()
        .filter(|id| Some(id.as_str()) != current)
    {
        ctx.ensure_running()?;
        match S::delete_remote(ctx, account_id, remote_id).await {
            Ok(()) => info!(remote_id = %remote_id, "🗑️  Deleted superseded remote {kind}"),
            Err(e) if e.is_not_found() => {
                debug!(remote_id = %remote_id, "Superseded remote {kind} already gone");
            }
            Err(e) => return Err(ReconcileError::remote("delete", kind, e)),
        }
    }
    Ok(())
}

/// The recorded remote object is gone; forget it so the next pass recreates it
async fn remote_lost<S: ReconcileStrategy>(
    ctx: &Reconciler,
    record: &mut S::Record,
    remote_id: &str,
) -> Result<Action, ReconcileError> {
    warn!(
        remote_id,
        "Remote {} no longer exists, clearing remote ID",
        <S::Endpoint as AccessEndpoint>::KIND
    );
    clear_remote_id(S::store(ctx), record).await?;
    Ok(Action::requeue(ctx.config.remote_lost_requeue()))
}
