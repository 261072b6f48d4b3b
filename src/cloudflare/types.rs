//! # Access API Types
//!
//! Request bodies and response snapshots of the Cloudflare Access API.
//!
//! Field names follow the API's snake_case wire format. Snapshots only carry
//! the fields the controller compares or records; unknown fields are ignored.
//!
//! API Reference: https://developers.cloudflare.com/api/resources/zero_trust/subresources/access/

use serde::{Deserialize, Serialize};

// ============================================================================
// Rules
// ============================================================================

/// One match predicate in the API's externally tagged shape,
/// e.g. `{"email": {"email": "a@example.com"}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Email(EmailRule),
    EmailDomain(EmailDomainRule),
    Everyone(EmptyRule),
    Ip(IpRule),
    Geo(GeoRule),
    Certificate(EmptyRule),
    CommonName(CommonNameRule),
    LoginMethod(IdRule),
    Group(IdRule),
    ServiceToken(ServiceTokenRule),
    AnyValidServiceToken(EmptyRule),
    Gsuite(GsuiteRule),
    Okta(OktaRule),
    Saml(SamlRule),
    #[serde(rename = "azureAD")]
    AzureAd(AzureRule),
    #[serde(rename = "github-organization")]
    GithubOrganization(GithubOrganizationRule),
}

/// A rule as read back from the API
///
/// Rule types this controller does not manage are kept verbatim so that a
/// positional comparison sees them as different from anything desired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
    Known(Rule),
    Unrecognized(serde_json::Value),
}

impl RuleEntry {
    pub fn as_known(&self) -> Option<&Rule> {
        match self {
            RuleEntry::Known(rule) => Some(rule),
            RuleEntry::Unrecognized(_) => None,
        }
    }
}

/// Rule payload without parameters; serializes as `{}`
#[allow(
    clippy::empty_structs_with_brackets,
    reason = "must serialize as an empty JSON object, not null"
)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyRule {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRule {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDomainRule {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRule {
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoRule {
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonNameRule {
    pub common_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRule {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTokenRule {
    pub token_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GsuiteRule {
    pub email: String,
    pub identity_provider_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OktaRule {
    pub name: String,
    pub identity_provider_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamlRule {
    pub attribute_name: String,
    pub attribute_value: String,
    pub identity_provider_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureRule {
    pub id: String,
    pub identity_provider_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubOrganizationRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    pub identity_provider_id: String,
}

// ============================================================================
// Access groups
// ============================================================================

/// Body of `POST/PUT /accounts/{account_id}/access/groups`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupBody {
    pub name: String,
    pub include: Vec<Rule>,
    pub require: Vec<Rule>,
    pub exclude: Vec<Rule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupSnapshot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub include: Vec<RuleEntry>,
    #[serde(default)]
    pub require: Vec<RuleEntry>,
    #[serde(default)]
    pub exclude: Vec<RuleEntry>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

// ============================================================================
// Reusable policies
// ============================================================================

/// Body of `POST/PUT /accounts/{account_id}/access/policies`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyBody {
    pub name: String,
    pub decision: String,
    pub include: Vec<Rule>,
    pub require: Vec<Rule>,
    pub exclude: Vec<Rule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose_justification_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose_justification_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isolation_required: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicySnapshot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub decision: String,
    #[serde(default)]
    pub include: Vec<RuleEntry>,
    #[serde(default)]
    pub require: Vec<RuleEntry>,
    #[serde(default)]
    pub exclude: Vec<RuleEntry>,
    #[serde(default)]
    pub session_duration: Option<String>,
    #[serde(default)]
    pub purpose_justification_required: Option<bool>,
    #[serde(default)]
    pub purpose_justification_prompt: Option<String>,
    #[serde(default)]
    pub approval_required: Option<bool>,
    #[serde(default)]
    pub isolation_required: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

// ============================================================================
// Access applications
// ============================================================================

/// Link from an application to a reusable policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyLink {
    pub id: String,
    pub precedence: u32,
}

/// Body of `POST/PUT /accounts/{account_id}/access/apps`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationBody {
    pub name: String,
    #[serde(rename = "type")]
    pub app_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_launcher_visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_redirect_to_identity: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_binding_cookie: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only_cookie_attribute: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_interstitial: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_idps: Vec<String>,
    pub policies: Vec<PolicyLink>,
}

/// Policy attached to an application, as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationPolicy {
    pub id: String,
    #[serde(default)]
    pub precedence: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSnapshot {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub app_type: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub session_duration: Option<String>,
    #[serde(default)]
    pub app_launcher_visible: Option<bool>,
    #[serde(default)]
    pub auto_redirect_to_identity: Option<bool>,
    #[serde(default)]
    pub enable_binding_cookie: Option<bool>,
    #[serde(default)]
    pub http_only_cookie_attribute: Option<bool>,
    #[serde(default)]
    pub skip_interstitial: Option<bool>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub allowed_idps: Vec<String>,
    #[serde(default)]
    pub policies: Vec<ApplicationPolicy>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl ApplicationSnapshot {
    /// Attached policy IDs ordered by precedence
    ///
    /// Policies without a precedence keep their list position after the ranked ones.
    pub fn ordered_policy_ids(&self) -> Vec<String> {
        let mut ranked: Vec<(u32, usize, &str)> = self
            .policies
            .iter()
            .enumerate()
            .map(|(index, policy)| {
                (
                    policy.precedence.unwrap_or(u32::MAX),
                    index,
                    policy.id.as_str(),
                )
            })
            .collect();
        ranked.sort_unstable();
        ranked.into_iter().map(|(_, _, id)| id.to_string()).collect()
    }
}

// ============================================================================
// Service tokens
// ============================================================================

/// Body of `POST/PUT /accounts/{account_id}/access/service_tokens`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceTokenBody {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct ServiceTokenSnapshot {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub client_id: String,
    /// Only present in the response to the create call
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl std::fmt::Debug for ServiceTokenSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTokenSnapshot")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("duration", &self.duration)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
