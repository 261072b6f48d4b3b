//! # Access Record Status
//!
//! Status types shared by every Access custom resource.

use serde::{Deserialize, Serialize};

/// Status of an Access custom resource
///
/// Written only by the controller. Only `remoteId`, the remote timestamps and
/// the conditions apply to every kind; the remaining fields are kind-specific.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessStatus {
    /// Identifier of the remote Cloudflare object; absent until created or adopted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Remote creation timestamp as reported by Cloudflare
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Remote last-update timestamp as reported by Cloudflare
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Remote objects replaced by `remoteId` and still awaiting deletion
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub superseded_remote_ids: Vec<String>,
    /// Generation of the spec last reconciled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Resolved group and service token IDs per rule bucket (AccessGroup, ReusablePolicy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_ids: Option<ResolvedIds>,
    /// Reusable policy IDs in precedence order (AccessApplication)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordered_policy_ids: Option<Vec<String>>,
    /// Name of the published credentials secret (ServiceToken)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

/// Resolved reference IDs for each rule bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIds {
    #[serde(default)]
    pub include: BucketIds,
    #[serde(default)]
    pub require: BucketIds,
    #[serde(default)]
    pub exclude: BucketIds,
}

/// Ordered remote IDs resolved from one bucket's references
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketIds {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_token_ids: Vec<String>,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl AccessStatus {
    /// Find a condition by type
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }

    /// Remote ID, treating an empty string as unset
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref().filter(|id| !id.is_empty())
    }
}
