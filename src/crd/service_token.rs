//! # ServiceToken
//!
//! Cloudflare Access service token whose credentials are published as a
//! Kubernetes secret.

use crate::constants::{DEFAULT_CLIENT_ID_KEY, DEFAULT_CLIENT_SECRET_KEY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ServiceToken Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: cloudflare-access.octopilot.io/v1alpha1
/// kind: ServiceToken
/// metadata:
///   name: ci-runner
///   namespace: ci
/// spec:
///   name: ci-runner
///   duration: 8760h
///   secret:
///     name: ci-runner-access
///     clientIdKey: CF_ACCESS_CLIENT_ID
///     clientSecretKey: CF_ACCESS_CLIENT_SECRET
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ServiceToken",
    group = "cloudflare-access.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::AccessStatus",
    shortname = "cfst",
    printcolumn = r#"{"name":"Secret", "type":"string", "jsonPath":".status.secretName"}, {"name":"Remote ID", "type":"string", "jsonPath":".status.remoteId"}, {"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTokenSpec {
    /// Token name in Cloudflare
    pub name: String,
    /// Token lifetime (e.g., "8760h"); unmanaged when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Where and how the credentials are published
    pub secret: SecretTemplate,
}

/// Publication settings for the credentials secret
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretTemplate {
    /// Secret name in the record's namespace; renaming rotates the secret
    pub name: String,
    /// Data key holding the client ID
    #[serde(default = "default_client_id_key")]
    pub client_id_key: String,
    /// Data key holding the client secret
    #[serde(default = "default_client_secret_key")]
    pub client_secret_key: String,
    /// Extra labels; reserved keys are ignored
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Extra annotations; reserved keys are ignored
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Default value for the client ID key
pub fn default_client_id_key() -> String {
    DEFAULT_CLIENT_ID_KEY.to_string()
}

/// Default value for the client secret key
pub fn default_client_secret_key() -> String {
    DEFAULT_CLIENT_SECRET_KEY.to_string()
}
