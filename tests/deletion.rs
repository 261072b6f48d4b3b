//! Finalizer-gated deletion

mod common;

use cloudflare_access_controller::cloudflare::{ApiError, Groups, Operation, ServiceTokens};
use cloudflare_access_controller::constants::PREVENT_DESTROY_ANNOTATION;
use cloudflare_access_controller::controller::reconciler::{GroupStrategy, ServiceTokenStrategy};
use common::{group, remote_id_of, service_token, Harness, ACCOUNT, NAMESPACE};
use kube::ResourceExt;
use kube_runtime::controller::Action;

async fn synced_group(h: &Harness) -> String {
    let admins = group("admins", "Admins");
    h.stores.groups.insert(admins.clone());
    h.reconcile::<GroupStrategy>(&admins).await.unwrap();
    remote_id_of(h.stores.groups.record(NAMESPACE, "admins")).unwrap()
}

#[tokio::test]
async fn test_remote_deleted_once_before_finalizer_release() {
    let h = Harness::new();
    let remote_id = synced_group(&h).await;

    h.stores.groups.mark_deleted(NAMESPACE, "admins");
    let deleting = h.stores.groups.record(NAMESPACE, "admins").unwrap();
    assert!(!deleting.finalizers().is_empty());

    let action = h.reconcile::<GroupStrategy>(&deleting).await.unwrap();
    assert_eq!(action, Action::await_change());
    assert_eq!(h.api.calls::<Groups>(Operation::Delete), 1);
    assert!(h.api.object::<Groups>(ACCOUNT, &remote_id).is_none());
    assert!(h.stores.groups.record(NAMESPACE, "admins").is_none());

    // A stale event after removal is a no-op
    h.reconcile::<GroupStrategy>(&deleting).await.unwrap();
    assert_eq!(h.api.calls::<Groups>(Operation::Delete), 1);
}

#[tokio::test]
async fn test_already_missing_remote_still_releases_finalizer() {
    let h = Harness::new();
    let remote_id = synced_group(&h).await;
    assert!(h.api.remove::<Groups>(ACCOUNT, &remote_id));

    h.stores.groups.mark_deleted(NAMESPACE, "admins");
    let deleting = h.stores.groups.record(NAMESPACE, "admins").unwrap();
    h.reconcile::<GroupStrategy>(&deleting).await.unwrap();

    assert_eq!(h.api.calls::<Groups>(Operation::Delete), 1);
    assert!(h.stores.groups.record(NAMESPACE, "admins").is_none());
}

#[tokio::test]
async fn test_failed_remote_delete_keeps_finalizer() {
    let h = Harness::new();
    let remote_id = synced_group(&h).await;
    h.api
        .fail_next::<Groups>(Operation::Delete, ApiError::Transient("HTTP 502".into()));

    h.stores.groups.mark_deleted(NAMESPACE, "admins");
    let deleting = h.stores.groups.record(NAMESPACE, "admins").unwrap();
    assert!(h.reconcile::<GroupStrategy>(&deleting).await.is_err());
    assert!(h.stores.groups.record(NAMESPACE, "admins").is_some());
    assert!(h.api.object::<Groups>(ACCOUNT, &remote_id).is_some());

    h.reconcile::<GroupStrategy>(&deleting).await.unwrap();
    assert!(h.stores.groups.record(NAMESPACE, "admins").is_none());
    assert!(h.api.object::<Groups>(ACCOUNT, &remote_id).is_none());
}

#[tokio::test]
async fn test_prevent_destroy_keeps_remote() {
    let h = Harness::new();
    let remote_id = synced_group(&h).await;
    h.stores.groups.modify(NAMESPACE, "admins", |g| {
        g.annotations_mut()
            .insert(PREVENT_DESTROY_ANNOTATION.to_string(), "true".to_string());
    });

    h.stores.groups.mark_deleted(NAMESPACE, "admins");
    let deleting = h.stores.groups.record(NAMESPACE, "admins").unwrap();
    h.reconcile::<GroupStrategy>(&deleting).await.unwrap();

    assert_eq!(h.api.calls::<Groups>(Operation::Delete), 0);
    assert!(h.api.object::<Groups>(ACCOUNT, &remote_id).is_some());
    assert!(h.stores.groups.record(NAMESPACE, "admins").is_none());
}

#[tokio::test]
async fn test_record_deleted_before_first_sync_makes_no_remote_calls() {
    let h = Harness::new();
    let admins = group("admins", "Admins");
    h.stores.groups.insert(admins.clone());
    h.stores.groups.mark_deleted(NAMESPACE, "admins");

    // Without a finalizer the store drops the record immediately
    let action = h.reconcile::<GroupStrategy>(&admins).await.unwrap();
    assert_eq!(action, Action::await_change());
    assert_eq!(h.api.total_writes(), 0);
}

#[tokio::test]
async fn test_service_token_deletion_removes_secret() {
    let h = Harness::new();
    let token = service_token("ci", "ci-access");
    h.stores.service_tokens.insert(token.clone());
    h.reconcile::<ServiceTokenStrategy>(&token).await.unwrap();
    assert!(h.stores.secrets.secret(NAMESPACE, "ci-access").is_some());

    h.stores.service_tokens.mark_deleted(NAMESPACE, "ci");
    let deleting = h.stores.service_tokens.record(NAMESPACE, "ci").unwrap();
    h.reconcile::<ServiceTokenStrategy>(&deleting).await.unwrap();

    assert_eq!(h.api.calls::<ServiceTokens>(Operation::Delete), 1);
    assert!(h.api.objects::<ServiceTokens>(ACCOUNT).is_empty());
    assert!(h.stores.secrets.names(NAMESPACE).is_empty());
    assert!(h.stores.service_tokens.record(NAMESPACE, "ci").is_none());
}

#[tokio::test]
async fn test_deletion_also_removes_replaced_tokens() {
    let h = Harness::new();
    let token = service_token("ci", "ci-access");
    h.stores.service_tokens.insert(token.clone());
    h.reconcile::<ServiceTokenStrategy>(&token).await.unwrap();

    assert!(h.stores.secrets.remove(NAMESPACE, "ci-access"));
    h.api.fail_next::<ServiceTokens>(
        Operation::Delete,
        ApiError::Transient("HTTP 503".into()),
    );
    assert!(h.reconcile::<ServiceTokenStrategy>(&token).await.is_err());
    assert_eq!(h.api.objects::<ServiceTokens>(ACCOUNT).len(), 2);

    h.stores.service_tokens.mark_deleted(NAMESPACE, "ci");
    let deleting = h.stores.service_tokens.record(NAMESPACE, "ci").unwrap();
    h.reconcile::<ServiceTokenStrategy>(&deleting).await.unwrap();

    assert!(h.api.objects::<ServiceTokens>(ACCOUNT).is_empty());
    assert!(h.stores.service_tokens.record(NAMESPACE, "ci").is_none());
}
