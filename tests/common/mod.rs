//! Common test utilities for reconciler and Pact tests
//!
//! Provides rustls setup plus a harness wiring the reconciler to an
//! in-memory Cloudflare account and in-memory record stores.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use cloudflare_access_controller::cloudflare::MemoryAccessApi;
use cloudflare_access_controller::config::ControllerConfig;
use cloudflare_access_controller::controller::reconciler::{
    reconcile, MemoryStores, ReconcileError, ReconcileStrategy, Reconciler,
};
use cloudflare_access_controller::crd::{
    AccessApplication, AccessApplicationSpec, AccessGroup, AccessGroupSpec, AccessRules,
    ManagedRecord, PolicyDecision, ReusablePolicy, ReusablePolicySpec, SecretTemplate,
    ServiceToken, ServiceTokenSpec,
};
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use std::sync::{Arc, Once};

pub const ACCOUNT: &str = "acct";
pub const NAMESPACE: &str = "platform";

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        cloudflare_access_controller::runtime::initialization::init_rustls();
    });
}

/// Reconciler over an in-memory account, with handles to inspect both sides
pub struct Harness {
    pub api: MemoryAccessApi,
    pub stores: MemoryStores,
    pub ctx: Arc<Reconciler>,
}

impl Harness {
    pub fn new() -> Self {
        let config = ControllerConfig {
            account_id: ACCOUNT.to_string(),
            api_token: "test-token".to_string(),
            ..ControllerConfig::default()
        };
        let api = MemoryAccessApi::new();
        let stores = MemoryStores::default();
        let ctx = Arc::new(Reconciler::new(
            config,
            Arc::new(api.clone()),
            stores.stores(),
        ));
        Self { api, stores, ctx }
    }

    /// Run one reconciliation of `record`
    ///
    /// Like the controller, the event carries whatever copy of the record
    /// was last seen; the engine rereads it from the store.
    pub async fn reconcile<S: ReconcileStrategy>(
        &self,
        record: &S::Record,
    ) -> Result<Action, ReconcileError> {
        reconcile::<S>(Arc::new(record.clone()), Arc::clone(&self.ctx)).await
    }
}

pub fn rules_with_groups(groups: &[&str]) -> AccessRules {
    AccessRules {
        access_groups: groups.iter().map(|g| (*g).to_string()).collect(),
        ..AccessRules::default()
    }
}

pub fn email_domain_rules(domain: &str) -> AccessRules {
    AccessRules {
        email_domains: vec![domain.to_string()],
        ..AccessRules::default()
    }
}

pub fn group(name: &str, display_name: &str) -> AccessGroup {
    let mut group = AccessGroup::new(
        name,
        AccessGroupSpec {
            name: display_name.to_string(),
            include: vec![email_domain_rules("example.com")],
            require: vec![],
            exclude: vec![],
        },
    );
    group.metadata.namespace = Some(NAMESPACE.to_string());
    group
}

pub fn policy(name: &str, display_name: &str, include: Vec<AccessRules>) -> ReusablePolicy {
    let mut policy = ReusablePolicy::new(
        name,
        ReusablePolicySpec {
            name: display_name.to_string(),
            decision: PolicyDecision::Allow,
            include,
            require: vec![],
            exclude: vec![],
            session_duration: None,
            purpose_justification_required: None,
            purpose_justification_prompt: None,
            approval_required: None,
            isolation_required: None,
        },
    );
    policy.metadata.namespace = Some(NAMESPACE.to_string());
    policy
}

pub fn application(name: &str, app_type: &str, policies: &[&str]) -> AccessApplication {
    let domain = (app_type == "self_hosted").then(|| format!("{name}.example.com"));
    let mut app = AccessApplication::new(
        name,
        AccessApplicationSpec {
            name: name.to_string(),
            domain,
            app_type: app_type.to_string(),
            session_duration: None,
            app_launcher_visible: None,
            auto_redirect_to_identity: None,
            enable_binding_cookie: None,
            http_only_cookie_attribute: None,
            skip_interstitial: None,
            logo_url: None,
            allowed_idps: vec![],
            policies: policies.iter().map(|p| (*p).to_string()).collect(),
        },
    );
    app.metadata.namespace = Some(NAMESPACE.to_string());
    app
}

pub fn service_token(name: &str, secret_name: &str) -> ServiceToken {
    let mut token = ServiceToken::new(
        name,
        ServiceTokenSpec {
            name: name.to_string(),
            duration: None,
            secret: SecretTemplate {
                name: secret_name.to_string(),
                client_id_key: "CLIENT_ID".to_string(),
                client_secret_key: "CLIENT_SECRET".to_string(),
                labels: BTreeMap::new(),
                annotations: BTreeMap::new(),
            },
        },
    );
    token.metadata.namespace = Some(NAMESPACE.to_string());
    token
}

/// Remote ID recorded in the record's status
pub fn remote_id_of<K: ManagedRecord>(record: Option<K>) -> Option<String> {
    record.and_then(|r| r.remote_id().map(str::to_string))
}

/// `Available` condition status of a stored record
pub fn available_status<K: ManagedRecord>(record: &K) -> Option<String> {
    record
        .access_status()
        .and_then(|status| status.condition("Available"))
        .map(|condition| condition.status.clone())
}
