//! # AccessGroup
//!
//! Reusable set of rules, referenced by name from policies and other groups.

use crate::crd::AccessRules;
use serde::{Deserialize, Serialize};

/// AccessGroup Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: cloudflare-access.octopilot.io/v1alpha1
/// kind: AccessGroup
/// metadata:
///   name: engineers
///   namespace: platform
/// spec:
///   name: Engineers
///   include:
///     - emailDomains: ["example.com"]
///   exclude:
///     - accessGroups: ["contractors"]
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "AccessGroup",
    group = "cloudflare-access.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::AccessStatus",
    shortname = "cfag",
    printcolumn = r#"{"name":"Remote ID", "type":"string", "jsonPath":".status.remoteId"}, {"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AccessGroupSpec {
    /// Group name in Cloudflare; also used to adopt a pre-existing group
    pub name: String,
    /// A request matches when it matches any include rule
    #[serde(default)]
    pub include: Vec<AccessRules>,
    /// A request must match every require rule
    #[serde(default)]
    pub require: Vec<AccessRules>,
    /// A request matching any exclude rule is rejected
    #[serde(default)]
    pub exclude: Vec<AccessRules>,
}
