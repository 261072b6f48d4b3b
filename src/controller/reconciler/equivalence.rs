//! # Equivalence
//!
//! Decides whether a remote snapshot already matches the desired body, in
//! which case no remote write happens.
//!
//! - Scalars are compared after trimming. An unset optional desired field is
//!   not managed and never compared.
//! - Rule lists and policy ID lists are compared positionally.
//! - If either side of a list is empty the lists are treated as equal. This
//!   keeps records from flapping while references are still resolving, at the
//!   cost of not noticing a list emptied on one side only.
//! - A remote rule of a type this controller does not model never matches.

use crate::cloudflare::types::{
    ApplicationBody, ApplicationSnapshot, GroupBody, GroupSnapshot, PolicyBody, PolicySnapshot,
    Rule, RuleEntry, ServiceTokenBody, ServiceTokenSnapshot,
};

fn same(remote: &str, desired: &str) -> bool {
    remote.trim() == desired.trim()
}

/// Optional desired scalar; `None` is unmanaged
fn same_optional(remote: Option<&str>, desired: Option<&str>) -> bool {
    match desired {
        None => true,
        Some(desired) => same(remote.unwrap_or_default(), desired),
    }
}

/// Optional desired flag; `None` is unmanaged, a missing remote flag is `false`
fn same_flag(remote: Option<bool>, desired: Option<bool>) -> bool {
    match desired {
        None => true,
        Some(desired) => remote.unwrap_or(false) == desired,
    }
}

fn same_team(remote: Option<&str>, desired: Option<&str>) -> bool {
    fn normalize(team: Option<&str>) -> Option<&str> {
        team.map(str::trim).filter(|t| !t.is_empty())
    }
    normalize(remote) == normalize(desired)
}

/// Structural comparison of one remote rule against one desired rule
pub fn rule_matches(remote: &RuleEntry, desired: &Rule) -> bool {
    let Some(remote) = remote.as_known() else {
        return false;
    };
    match (remote, desired) {
        (Rule::Email(r), Rule::Email(d)) => same(&r.email, &d.email),
        (Rule::EmailDomain(r), Rule::EmailDomain(d)) => same(&r.domain, &d.domain),
        (Rule::Ip(r), Rule::Ip(d)) => same(&r.ip, &d.ip),
        (Rule::Geo(r), Rule::Geo(d)) => same(&r.country_code, &d.country_code),
        (Rule::CommonName(r), Rule::CommonName(d)) => same(&r.common_name, &d.common_name),
        (Rule::LoginMethod(r), Rule::LoginMethod(d)) | (Rule::Group(r), Rule::Group(d)) => {
            same(&r.id, &d.id)
        }
        (Rule::ServiceToken(r), Rule::ServiceToken(d)) => same(&r.token_id, &d.token_id),
        (Rule::Gsuite(r), Rule::Gsuite(d)) => {
            same(&r.email, &d.email) && same(&r.identity_provider_id, &d.identity_provider_id)
        }
        (Rule::Okta(r), Rule::Okta(d)) => {
            same(&r.name, &d.name) && same(&r.identity_provider_id, &d.identity_provider_id)
        }
        (Rule::Saml(r), Rule::Saml(d)) => {
            same(&r.attribute_name, &d.attribute_name)
                && same(&r.attribute_value, &d.attribute_value)
                && same(&r.identity_provider_id, &d.identity_provider_id)
        }
        (Rule::AzureAd(r), Rule::AzureAd(d)) => {
            same(&r.id, &d.id) && same(&r.identity_provider_id, &d.identity_provider_id)
        }
        (Rule::GithubOrganization(r), Rule::GithubOrganization(d)) => {
            same(&r.name, &d.name)
                && same_team(r.team.as_deref(), d.team.as_deref())
                && same(&r.identity_provider_id, &d.identity_provider_id)
        }
        (Rule::Everyone(_), Rule::Everyone(_))
        | (Rule::Certificate(_), Rule::Certificate(_))
        | (Rule::AnyValidServiceToken(_), Rule::AnyValidServiceToken(_)) => true,
        _ => false,
    }
}

/// Positional rule list comparison with the vacuous-empty rule
pub fn rules_match(remote: &[RuleEntry], desired: &[Rule]) -> bool {
    if remote.is_empty() || desired.is_empty() {
        return true;
    }
    remote.len() == desired.len()
        && remote
            .iter()
            .zip(desired)
            .all(|(remote, desired)| rule_matches(remote, desired))
}

/// Positional ID list comparison with the vacuous-empty rule
pub fn ids_match(remote: &[String], desired: &[String]) -> bool {
    if remote.is_empty() || desired.is_empty() {
        return true;
    }
    remote.len() == desired.len()
        && remote
            .iter()
            .zip(desired)
            .all(|(remote, desired)| same(remote, desired))
}

/// Order-insensitive list comparison with the vacuous-empty rule
fn sets_match(remote: &[String], desired: &[String]) -> bool {
    if remote.is_empty() || desired.is_empty() {
        return true;
    }
    let mut remote: Vec<&str> = remote.iter().map(|s| s.trim()).collect();
    let mut desired: Vec<&str> = desired.iter().map(|s| s.trim()).collect();
    remote.sort_unstable();
    desired.sort_unstable();
    remote == desired
}

pub fn group_matches(remote: &GroupSnapshot, desired: &GroupBody) -> bool {
    same(&remote.name, &desired.name)
        && rules_match(&remote.include, &desired.include)
        && rules_match(&remote.require, &desired.require)
        && rules_match(&remote.exclude, &desired.exclude)
}

pub fn policy_matches(remote: &PolicySnapshot, desired: &PolicyBody) -> bool {
    same(&remote.name, &desired.name)
        && same(&remote.decision, &desired.decision)
        && rules_match(&remote.include, &desired.include)
        && rules_match(&remote.require, &desired.require)
        && rules_match(&remote.exclude, &desired.exclude)
        && same_optional(
            remote.session_duration.as_deref(),
            desired.session_duration.as_deref(),
        )
        && same_flag(
            remote.purpose_justification_required,
            desired.purpose_justification_required,
        )
        && same_optional(
            remote.purpose_justification_prompt.as_deref(),
            desired.purpose_justification_prompt.as_deref(),
        )
        && same_flag(remote.approval_required, desired.approval_required)
        && same_flag(remote.isolation_required, desired.isolation_required)
}

pub fn application_matches(remote: &ApplicationSnapshot, desired: &ApplicationBody) -> bool {
    let desired_policy_ids: Vec<String> =
        desired.policies.iter().map(|link| link.id.clone()).collect();

    same(&remote.name, &desired.name)
        && same(&remote.app_type, &desired.app_type)
        && same_optional(remote.domain.as_deref(), desired.domain.as_deref())
        && same_optional(
            remote.session_duration.as_deref(),
            desired.session_duration.as_deref(),
        )
        && same_flag(remote.app_launcher_visible, desired.app_launcher_visible)
        && same_flag(
            remote.auto_redirect_to_identity,
            desired.auto_redirect_to_identity,
        )
        && same_flag(remote.enable_binding_cookie, desired.enable_binding_cookie)
        && same_flag(
            remote.http_only_cookie_attribute,
            desired.http_only_cookie_attribute,
        )
        && same_flag(remote.skip_interstitial, desired.skip_interstitial)
        && same_optional(remote.logo_url.as_deref(), desired.logo_url.as_deref())
        && sets_match(&remote.allowed_idps, &desired.allowed_idps)
        && ids_match(&remote.ordered_policy_ids(), &desired_policy_ids)
}

pub fn service_token_matches(remote: &ServiceTokenSnapshot, desired: &ServiceTokenBody) -> bool {
    same(&remote.name, &desired.name)
        && same_optional(remote.duration.as_deref(), desired.duration.as_deref())
}
