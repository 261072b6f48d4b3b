//! Reconciliation scenarios against an in-memory Cloudflare account
//!
//! Each test drives records through the same engine the controller runs and
//! asserts on both the remote calls made and the status written back.

mod common;

use cloudflare_access_controller::cloudflare::types::{
    ApplicationBody, EmailDomainRule, GroupBody, Rule,
};
use cloudflare_access_controller::cloudflare::{
    ApiError, Applications, Groups, Operation, Policies,
};
use cloudflare_access_controller::controller::reconciler::{
    ApplicationStrategy, ErrorClass, GroupStrategy, PolicyStrategy, ReconcileError,
};
use cloudflare_access_controller::crd::ManagedRecord;
use cloudflare_access_controller::runtime::error_policy::error_policy;
use common::{
    application, available_status, email_domain_rules, group, policy, remote_id_of,
    rules_with_groups, Harness, ACCOUNT, NAMESPACE,
};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_group_is_created_then_left_alone() {
    let h = Harness::new();
    let admins = group("admins", "Admins");
    h.stores.groups.insert(admins.clone());

    let action = h.reconcile::<GroupStrategy>(&admins).await.unwrap();
    assert_eq!(action, Action::requeue(Duration::from_secs(600)));
    assert_eq!(h.api.calls::<Groups>(Operation::Create), 1);

    let stored = h.stores.groups.record(NAMESPACE, "admins").unwrap();
    assert!(stored.has_finalizer());
    assert_eq!(available_status(&stored).as_deref(), Some("True"));
    let remote_id = stored.remote_id().unwrap().to_string();
    assert!(h.api.object::<Groups>(ACCOUNT, &remote_id).is_some());

    // A second pass with nothing changed writes nothing anywhere
    let writes = h.api.total_writes();
    let status_writes = h.stores.groups.status_writes();
    h.reconcile::<GroupStrategy>(&admins).await.unwrap();
    assert_eq!(h.api.total_writes(), writes);
    assert_eq!(h.stores.groups.status_writes(), status_writes);
}

#[tokio::test]
async fn test_spec_change_updates_remote_in_place() {
    let h = Harness::new();
    let admins = group("admins", "Admins");
    h.stores.groups.insert(admins.clone());
    h.reconcile::<GroupStrategy>(&admins).await.unwrap();
    let remote_id = remote_id_of(h.stores.groups.record(NAMESPACE, "admins")).unwrap();

    h.stores.groups.modify(NAMESPACE, "admins", |g| {
        g.spec.name = "Platform Admins".to_string();
    });
    h.reconcile::<GroupStrategy>(&admins).await.unwrap();

    assert_eq!(h.api.calls::<Groups>(Operation::Create), 1);
    assert_eq!(h.api.calls::<Groups>(Operation::Update), 1);
    let remote = h.api.object::<Groups>(ACCOUNT, &remote_id).unwrap();
    assert_eq!(remote.name, "Platform Admins");

    let stored = h.stores.groups.record(NAMESPACE, "admins").unwrap();
    assert_eq!(
        stored.access_status().and_then(|s| s.observed_generation),
        Some(2)
    );
}

#[tokio::test]
async fn test_existing_group_is_adopted_by_name() {
    let h = Harness::new();
    let seeded = h
        .api
        .seed::<Groups>(
            ACCOUNT,
            &GroupBody {
                name: "Admins".to_string(),
                include: vec![Rule::EmailDomain(EmailDomainRule {
                    domain: "example.com".to_string(),
                })],
                require: vec![],
                exclude: vec![],
            },
        )
        .unwrap();

    let admins = group("admins", "  Admins ");
    h.stores.groups.insert(admins.clone());
    h.reconcile::<GroupStrategy>(&admins).await.unwrap();

    assert_eq!(h.api.calls::<Groups>(Operation::Create), 0);
    assert_eq!(h.api.calls::<Groups>(Operation::Update), 0);
    assert_eq!(
        remote_id_of(h.stores.groups.record(NAMESPACE, "admins")),
        Some(seeded.id)
    );
}

#[tokio::test]
async fn test_policy_waits_for_unready_group() {
    let h = Harness::new();
    let admins = group("admins", "Admins");
    h.stores.groups.insert(admins.clone());
    let ops = policy("ops", "Ops", vec![rules_with_groups(&["admins"])]);
    h.stores.policies.insert(ops.clone());

    let action = h.reconcile::<PolicyStrategy>(&ops).await.unwrap();
    assert_eq!(action, Action::requeue(Duration::from_secs(15)));
    assert_eq!(h.api.total_writes(), 0);

    let stored = h.stores.policies.record(NAMESPACE, "ops").unwrap();
    assert!(stored.remote_id().is_none());
    let condition = stored
        .access_status()
        .and_then(|s| s.condition("Available"))
        .cloned()
        .unwrap();
    assert_eq!(condition.status, "False");
    assert_eq!(condition.reason.as_deref(), Some("DependencyNotReady"));

    // Once the group is synced the policy goes through and records its ID
    h.reconcile::<GroupStrategy>(&admins).await.unwrap();
    h.reconcile::<PolicyStrategy>(&ops).await.unwrap();
    let group_id = remote_id_of(h.stores.groups.record(NAMESPACE, "admins")).unwrap();
    let stored = h.stores.policies.record(NAMESPACE, "ops").unwrap();
    let resolved = stored
        .access_status()
        .and_then(|s| s.resolved_ids.clone())
        .unwrap();
    assert_eq!(resolved.include.group_ids, vec![group_id]);
    assert_eq!(h.api.calls::<Policies>(Operation::Create), 1);
}

#[tokio::test]
async fn test_missing_reference_is_a_configuration_error() {
    let h = Harness::new();
    let ops = policy("ops", "Ops", vec![rules_with_groups(&["ghosts"])]);
    h.stores.policies.insert(ops.clone());

    let err = h.reconcile::<PolicyStrategy>(&ops).await.unwrap_err();
    assert!(matches!(err, ReconcileError::ReferenceNotFound { .. }));
    assert_eq!(err.class(), ErrorClass::Configuration);
    assert_eq!(
        error_policy(Arc::new(ops), &err, Arc::clone(&h.ctx)),
        Action::await_change()
    );

    let stored = h.stores.policies.record(NAMESPACE, "ops").unwrap();
    let degraded = stored
        .access_status()
        .and_then(|s| s.condition("Degraded"))
        .cloned()
        .unwrap();
    assert_eq!(degraded.status, "True");
    assert_eq!(degraded.reason.as_deref(), Some("ReferenceNotFound"));
}

#[tokio::test]
async fn test_remote_deleted_out_of_band_is_recreated() {
    let h = Harness::new();
    let admins = group("admins", "Admins");
    h.stores.groups.insert(admins.clone());
    h.reconcile::<GroupStrategy>(&admins).await.unwrap();
    let first_id = remote_id_of(h.stores.groups.record(NAMESPACE, "admins")).unwrap();

    assert!(h.api.remove::<Groups>(ACCOUNT, &first_id));

    let action = h.reconcile::<GroupStrategy>(&admins).await.unwrap();
    assert_eq!(action, Action::requeue(Duration::from_secs(1)));
    let stored = h.stores.groups.record(NAMESPACE, "admins").unwrap();
    assert!(stored.remote_id().is_none());
    assert_eq!(available_status(&stored).as_deref(), Some("False"));

    h.reconcile::<GroupStrategy>(&admins).await.unwrap();
    let second_id = remote_id_of(h.stores.groups.record(NAMESPACE, "admins")).unwrap();
    assert_ne!(first_id, second_id);
    assert_eq!(h.api.calls::<Groups>(Operation::Create), 2);
}

#[tokio::test]
async fn test_transient_failure_is_retried_with_backoff() {
    let h = Harness::new();
    let admins = group("admins", "Admins");
    h.stores.groups.insert(admins.clone());
    h.api
        .fail_next::<Groups>(Operation::Create, ApiError::Transient("HTTP 503".into()));

    let err = h.reconcile::<GroupStrategy>(&admins).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Transient);
    assert_eq!(
        error_policy(Arc::new(admins.clone()), &err, Arc::clone(&h.ctx)),
        Action::requeue(Duration::from_secs(5))
    );
    let stored = h.stores.groups.record(NAMESPACE, "admins").unwrap();
    assert!(stored.remote_id().is_none());
    assert_eq!(available_status(&stored).as_deref(), Some("False"));

    h.reconcile::<GroupStrategy>(&admins).await.unwrap();
    let stored = h.stores.groups.record(NAMESPACE, "admins").unwrap();
    assert_eq!(available_status(&stored).as_deref(), Some("True"));
    assert_eq!(h.api.objects::<Groups>(ACCOUNT).len(), 1);
}

/// Reconcile the three policies and return their remote IDs in name order
async fn synced_policies(h: &Harness) -> Vec<String> {
    let mut ids = Vec::new();
    for name in ["a", "b", "c"] {
        let display_name = format!("Policy {name}");
        let record = policy(name, &display_name, vec![email_domain_rules("example.com")]);
        h.stores.policies.insert(record.clone());
        h.reconcile::<PolicyStrategy>(&record).await.unwrap();
        ids.push(remote_id_of(h.stores.policies.record(NAMESPACE, name)).unwrap());
    }
    ids
}

#[tokio::test]
async fn test_application_keeps_policy_order() {
    let h = Harness::new();
    let ids = synced_policies(&h).await;

    let app = application("grafana", "self_hosted", &["a", "b", "c"]);
    h.stores.applications.insert(app.clone());
    h.reconcile::<ApplicationStrategy>(&app).await.unwrap();

    let app_id = remote_id_of(h.stores.applications.record(NAMESPACE, "grafana")).unwrap();
    let remote = h.api.object::<Applications>(ACCOUNT, &app_id).unwrap();
    let precedences: Vec<(String, Option<u32>)> = remote
        .policies
        .iter()
        .map(|p| (p.id.clone(), p.precedence))
        .collect();
    assert_eq!(
        precedences,
        vec![
            (ids[0].clone(), Some(1)),
            (ids[1].clone(), Some(2)),
            (ids[2].clone(), Some(3)),
        ]
    );

    // Reordering references alone is a change
    h.stores.applications.modify(NAMESPACE, "grafana", |a| {
        a.spec.policies = vec!["c".to_string(), "a".to_string(), "b".to_string()];
    });
    h.reconcile::<ApplicationStrategy>(&app).await.unwrap();
    assert_eq!(h.api.calls::<Applications>(Operation::Update), 1);

    let remote = h.api.object::<Applications>(ACCOUNT, &app_id).unwrap();
    assert_eq!(
        remote.ordered_policy_ids(),
        vec![ids[2].clone(), ids[0].clone(), ids[1].clone()]
    );
    let stored = h.stores.applications.record(NAMESPACE, "grafana").unwrap();
    assert_eq!(
        stored.access_status().and_then(|s| s.ordered_policy_ids.clone()),
        Some(vec![ids[2].clone(), ids[0].clone(), ids[1].clone()])
    );

    // And converges again afterwards
    h.reconcile::<ApplicationStrategy>(&app).await.unwrap();
    assert_eq!(h.api.calls::<Applications>(Operation::Update), 1);
}

fn warp_body() -> ApplicationBody {
    ApplicationBody {
        name: "Warp Login App".to_string(),
        app_type: "warp".to_string(),
        domain: None,
        session_duration: None,
        app_launcher_visible: None,
        auto_redirect_to_identity: None,
        enable_binding_cookie: None,
        http_only_cookie_attribute: None,
        skip_interstitial: None,
        logo_url: None,
        allowed_idps: vec![],
        policies: vec![],
    }
}

#[tokio::test]
async fn test_singleton_application_is_located_not_created() {
    let h = Harness::new();
    let seeded = h.api.seed::<Applications>(ACCOUNT, &warp_body()).unwrap();

    let warp = application("warp", "warp", &[]);
    h.stores.applications.insert(warp.clone());
    h.reconcile::<ApplicationStrategy>(&warp).await.unwrap();

    assert_eq!(h.api.calls::<Applications>(Operation::Create), 0);
    assert_eq!(
        remote_id_of(h.stores.applications.record(NAMESPACE, "warp")),
        Some(seeded.id.clone())
    );

    // Deleting the record never deletes the account's singleton
    h.stores.applications.mark_deleted(NAMESPACE, "warp");
    h.reconcile::<ApplicationStrategy>(&warp).await.unwrap();
    assert_eq!(h.api.calls::<Applications>(Operation::Delete), 0);
    assert!(h.api.object::<Applications>(ACCOUNT, &seeded.id).is_some());
    assert!(h.stores.applications.record(NAMESPACE, "warp").is_none());
}

#[tokio::test]
async fn test_missing_singleton_is_not_created() {
    let h = Harness::new();
    let warp = application("warp", "warp", &[]);
    h.stores.applications.insert(warp.clone());

    let err = h.reconcile::<ApplicationStrategy>(&warp).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);
    assert_eq!(h.api.calls::<Applications>(Operation::Create), 0);
}

#[tokio::test]
async fn test_two_records_for_one_singleton_conflict() {
    let h = Harness::new();
    h.api.seed::<Applications>(ACCOUNT, &warp_body()).unwrap();

    let first = application("warp", "warp", &[]);
    let mut second = application("warp-copy", "warp", &[]);
    second.metadata.namespace = Some("other-team".to_string());
    h.stores.applications.insert(first.clone());
    h.stores.applications.insert(second.clone());

    for record in [&first, &second] {
        let err = h.reconcile::<ApplicationStrategy>(record).await.unwrap_err();
        assert!(matches!(err, ReconcileError::SingletonConflict { .. }));
    }
    assert_eq!(h.api.total_writes(), 0);

    let stored = h.stores.applications.record(NAMESPACE, "warp").unwrap();
    let degraded = stored
        .access_status()
        .and_then(|s| s.condition("Degraded"))
        .cloned()
        .unwrap();
    assert_eq!(degraded.reason.as_deref(), Some("SingletonConflict"));
}

#[tokio::test]
async fn test_shutdown_stops_before_remote_calls() {
    let h = Harness::new();
    let admins = group("admins", "Admins");
    h.stores.groups.insert(admins.clone());
    h.ctx
        .shutdown_flag()
        .store(true, std::sync::atomic::Ordering::Relaxed);

    let err = h.reconcile::<GroupStrategy>(&admins).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Cancelled));
    assert_eq!(h.api.total_writes(), 0);
    let stored = h.stores.groups.record(NAMESPACE, "admins").unwrap();
    assert!(stored.access_status().is_none());
}
