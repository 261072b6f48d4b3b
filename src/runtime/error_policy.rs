//! # Error Policy
//!
//! Requeue decisions for failed reconciliations.
//!
//! Configuration and validation failures cannot be fixed by retrying, so the
//! record waits for its next change. Transient failures retry with a Fibonacci
//! backoff tracked per record.

use crate::controller::reconciler::{backoff_key, ErrorClass, ReconcileError, Reconciler};
use crate::crd::ManagedRecord;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Decide when a failed record is reconciled again
#[allow(
    clippy::needless_pass_by_value,
    reason = "Signature is dictated by kube_runtime::Controller::run"
)]
pub fn error_policy<K: ManagedRecord>(
    obj: Arc<K>,
    error: &ReconcileError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = backoff_key(obj.as_ref());
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = K::KIND,
        resource.key = %obj.key(),
        error = %error
    );
    let _error_guard = error_span.enter();

    match error.class() {
        ErrorClass::Validation | ErrorClass::Configuration => {
            warn!(
                "❌ {} {} cannot be reconciled until it changes: {}",
                K::KIND,
                obj.key(),
                error
            );
            ctx.reset_backoff(&key);
            Action::await_change()
        }
        ErrorClass::Transient => {
            error!("Reconciliation error for {} {}: {}", K::KIND, obj.key(), error);
            let (delay, error_count) = ctx.next_backoff(&key);
            info!(
                "🔄 Retrying with Fibonacci backoff: {}s (error count: {})",
                delay.as_secs(),
                error_count
            );
            Action::requeue(delay)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudflare::{ApiError, MemoryAccessApi};
    use crate::config::ControllerConfig;
    use crate::controller::reconciler::MemoryStores;
    use crate::crd::{AccessGroup, AccessGroupSpec};
    use std::time::Duration;

    fn setup() -> (Arc<AccessGroup>, Arc<Reconciler>) {
        let mut group = AccessGroup::new(
            "admins",
            AccessGroupSpec {
                name: "Admins".to_string(),
                include: vec![],
                require: vec![],
                exclude: vec![],
            },
        );
        group.metadata.namespace = Some("platform".to_string());
        let ctx = Reconciler::new(
            ControllerConfig::default(),
            Arc::new(MemoryAccessApi::new()),
            MemoryStores::default().stores(),
        );
        (Arc::new(group), Arc::new(ctx))
    }

    #[test]
    fn test_transient_errors_back_off() {
        let (group, ctx) = setup();
        let error = ReconcileError::remote(
            "create",
            "access group",
            ApiError::Transient("HTTP 503".to_string()),
        );
        let delays: Vec<Action> = (0..3)
            .map(|_| error_policy(Arc::clone(&group), &error, Arc::clone(&ctx)))
            .collect();
        assert_eq!(
            delays,
            vec![
                Action::requeue(Duration::from_secs(5)),
                Action::requeue(Duration::from_secs(5)),
                Action::requeue(Duration::from_secs(10)),
            ]
        );
    }

    #[test]
    fn test_configuration_errors_wait_for_change() {
        let (group, ctx) = setup();
        let error = ReconcileError::ReferenceNotFound {
            kind: "AccessGroup",
            reference: "platform/ghost".to_string(),
        };
        assert_eq!(error_policy(group, &error, ctx), Action::await_change());
    }

    #[test]
    fn test_remote_rejection_waits_for_change() {
        let (group, ctx) = setup();
        let error = ReconcileError::remote(
            "create",
            "access group",
            ApiError::Validation(vec!["include must not be empty".to_string()]),
        );
        assert_eq!(error_policy(group, &error, ctx), Action::await_change());
    }
}
