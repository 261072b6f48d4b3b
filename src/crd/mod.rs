//! # Custom Resource Definitions
//!
//! CRD types for the Cloudflare Access Controller.
//!
//! ## Module Structure
//!
//! - `group.rs` - AccessGroup
//! - `application.rs` - AccessApplication
//! - `policy.rs` - ReusablePolicy
//! - `service_token.rs` - ServiceToken and its secret template
//! - `rules.rs` - Rule buckets shared by groups and policies
//! - `status.rs` - Status types for tracking reconciliation state
//! - `record.rs` - `ManagedRecord`, the common view the reconciler works with

mod application;
mod group;
mod policy;
mod record;
mod rules;
mod service_token;
mod status;

// Re-export all public types
pub use application::{default_app_type, AccessApplication, AccessApplicationSpec};
pub use group::{AccessGroup, AccessGroupSpec};
pub use policy::{PolicyDecision, ReusablePolicy, ReusablePolicySpec};
pub use record::ManagedRecord;
pub use rules::{AccessRules, AzureGroup, GithubOrganization, GoogleGroup, OktaGroup, SamlGroup};
pub use service_token::{
    default_client_id_key, default_client_secret_key, SecretTemplate, ServiceToken,
    ServiceTokenSpec,
};
pub use status::{AccessStatus, BucketIds, Condition, ResolvedIds};
