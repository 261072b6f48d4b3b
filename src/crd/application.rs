//! # AccessApplication
//!
//! Application protected by Cloudflare Access, gated by an ordered list of
//! reusable policies.

use crate::constants::SINGLETON_APP_TYPES;
use serde::{Deserialize, Serialize};

/// AccessApplication Custom Resource Definition
///
/// `policies` is ordered: the first reference gets precedence 1.
///
/// # Example
///
/// ```yaml
/// apiVersion: cloudflare-access.octopilot.io/v1alpha1
/// kind: AccessApplication
/// metadata:
///   name: grafana
///   namespace: observability
/// spec:
///   name: Grafana
///   domain: grafana.example.com
///   sessionDuration: 12h
///   policies:
///     - platform/engineers-only
///     - platform/break-glass
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "AccessApplication",
    group = "cloudflare-access.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::AccessStatus",
    shortname = "cfapp",
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".spec.type"}, {"name":"Domain", "type":"string", "jsonPath":".spec.domain"}, {"name":"Remote ID", "type":"string", "jsonPath":".status.remoteId"}, {"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AccessApplicationSpec {
    /// Application name in Cloudflare; also used to adopt a pre-existing application
    pub name: String,
    /// Protected hostname (and optional path); not used by singleton types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Cloudflare application type (self_hosted, saas, ssh, vnc, bookmark, app_launcher, warp, biso)
    #[serde(rename = "type", default = "default_app_type")]
    pub app_type: String,
    /// Session duration (e.g., "24h"); unmanaged when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_launcher_visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_redirect_to_identity: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_binding_cookie: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only_cookie_attribute: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_interstitial: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// Identity provider IDs users may choose from; empty means all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_idps: Vec<String>,
    /// Ordered references to ReusablePolicy records
    #[serde(default)]
    pub policies: Vec<String>,
}

/// Default value for application type
pub fn default_app_type() -> String {
    "self_hosted".to_string()
}

impl AccessApplicationSpec {
    /// Whether Cloudflare allows only one application of this type per account
    pub fn is_singleton_type(&self) -> bool {
        SINGLETON_APP_TYPES.contains(&self.app_type.trim())
    }
}
