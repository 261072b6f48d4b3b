//! # Access Rules
//!
//! Declarative rule buckets shared by AccessGroup and ReusablePolicy.
//!
//! A bucket lists match predicates by category. Group and service token
//! entries are references (`name` or `namespace/name`) to other records and
//! are resolved to remote IDs on every reconciliation.

use serde::{Deserialize, Serialize};

/// One rule bucket (include, require or exclude)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessRules {
    /// Match everyone
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub everyone: bool,
    /// Exact email addresses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    /// Email domains (e.g., "example.com")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_domains: Vec<String>,
    /// IP ranges in CIDR notation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_ranges: Vec<String>,
    /// ISO 3166-1 alpha-2 country codes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,
    /// Require any valid mTLS client certificate
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub valid_certificate: bool,
    /// mTLS client certificate common names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub common_names: Vec<String>,
    /// Identity provider IDs users must log in with
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub login_methods: Vec<String>,
    /// References to AccessGroup records
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_groups: Vec<String>,
    /// References to ServiceToken records
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_tokens: Vec<String>,
    /// Match any valid service token of the account
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub any_access_service_token: bool,
    /// Google Workspace groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub google_groups: Vec<GoogleGroup>,
    /// Okta groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub okta_groups: Vec<OktaGroup>,
    /// SAML attribute matches
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub saml_groups: Vec<SamlGroup>,
    /// Azure AD groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub azure_groups: Vec<AzureGroup>,
    /// GitHub organizations (optionally narrowed to a team)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub github_organizations: Vec<GithubOrganization>,
}

impl AccessRules {
    /// True when the bucket matches nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Google Workspace group match
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoogleGroup {
    /// Group email address
    pub email: String,
    /// Google Workspace identity provider ID
    pub identity_provider_id: String,
}

/// Okta group match
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OktaGroup {
    /// Okta group name
    pub name: String,
    /// Okta identity provider ID
    pub identity_provider_id: String,
}

/// SAML attribute match
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SamlGroup {
    /// SAML attribute name
    pub attribute_name: String,
    /// Expected attribute value
    pub attribute_value: String,
    /// SAML identity provider ID
    pub identity_provider_id: String,
}

/// Azure AD group match
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureGroup {
    /// Azure AD group object ID
    pub id: String,
    /// Azure AD identity provider ID
    pub identity_provider_id: String,
}

/// GitHub organization match
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GithubOrganization {
    /// Organization name
    pub name: String,
    /// Team slug within the organization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    /// GitHub identity provider ID
    pub identity_provider_id: String,
}
