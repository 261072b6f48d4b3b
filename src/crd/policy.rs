//! # ReusablePolicy
//!
//! Account-level Access policy attached to applications by reference.

use crate::crd::AccessRules;
use serde::{Deserialize, Serialize};

/// ReusablePolicy Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: cloudflare-access.octopilot.io/v1alpha1
/// kind: ReusablePolicy
/// metadata:
///   name: engineers-only
///   namespace: platform
/// spec:
///   name: Engineers only
///   decision: allow
///   include:
///     - accessGroups: ["engineers"]
///   require:
///     - countries: ["NL", "DE"]
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ReusablePolicy",
    group = "cloudflare-access.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::AccessStatus",
    shortname = "cfpol",
    printcolumn = r#"{"name":"Decision", "type":"string", "jsonPath":".spec.decision"}, {"name":"Remote ID", "type":"string", "jsonPath":".status.remoteId"}, {"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ReusablePolicySpec {
    /// Policy name in Cloudflare; also used to adopt a pre-existing policy
    pub name: String,
    /// Action taken when the policy matches
    pub decision: PolicyDecision,
    #[serde(default)]
    pub include: Vec<AccessRules>,
    #[serde(default)]
    pub require: Vec<AccessRules>,
    #[serde(default)]
    pub exclude: Vec<AccessRules>,
    /// Session duration override (e.g., "24h"); unmanaged when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose_justification_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose_justification_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolation_required: Option<bool>,
}

/// Policy decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDecision {
    Allow,
    Deny,
    NonIdentity,
    Bypass,
}

impl PolicyDecision {
    /// Wire value used by the Cloudflare API
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyDecision::Allow => "allow",
            PolicyDecision::Deny => "deny",
            PolicyDecision::NonIdentity => "non_identity",
            PolicyDecision::Bypass => "bypass",
        }
    }
}
