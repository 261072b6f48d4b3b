//! # Rule Expansion
//!
//! Turns declarative [`AccessRules`] buckets into the ordered remote [`Rule`]
//! lists, substituting resolved group and service token IDs for references.
//!
//! Expansion is deterministic: categories in a fixed order, items in spec
//! order. Remote matching ignores order, but comparison does not, so the same
//! spec must always expand to the same list.

use crate::cloudflare::types::{
    AzureRule, CommonNameRule, EmailDomainRule, EmailRule, EmptyRule, GeoRule,
    GithubOrganizationRule, GsuiteRule, IdRule, IpRule, OktaRule, Rule, SamlRule,
    ServiceTokenRule,
};
use crate::controller::reconciler::references::resolve_references;
use crate::controller::reconciler::types::{ReconcileError, Reconciler, Resolution};
use crate::crd::{AccessRules, BucketIds, ResolvedIds};

/// Expanded include/require/exclude lists plus the IDs they reference
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRules {
    pub include: Vec<Rule>,
    pub require: Vec<Rule>,
    pub exclude: Vec<Rule>,
    pub ids: ResolvedIds,
}

/// Expand one `AccessRules` entry with its references already resolved
pub fn expand_rules(rules: &AccessRules, group_ids: &[String], token_ids: &[String]) -> Vec<Rule> {
    let mut out = Vec::new();

    out.extend(rules.emails.iter().map(|email| {
        Rule::Email(EmailRule {
            email: email.trim().to_string(),
        })
    }));
    out.extend(rules.email_domains.iter().map(|domain| {
        Rule::EmailDomain(EmailDomainRule {
            domain: domain.trim().to_string(),
        })
    }));
    out.extend(rules.ip_ranges.iter().map(|ip| {
        Rule::Ip(IpRule {
            ip: ip.trim().to_string(),
        })
    }));
    out.extend(rules.countries.iter().map(|country| {
        Rule::Geo(GeoRule {
            country_code: country.trim().to_string(),
        })
    }));
    out.extend(rules.common_names.iter().map(|common_name| {
        Rule::CommonName(CommonNameRule {
            common_name: common_name.trim().to_string(),
        })
    }));
    out.extend(rules.login_methods.iter().map(|id| {
        Rule::LoginMethod(IdRule {
            id: id.trim().to_string(),
        })
    }));
    out.extend(
        group_ids
            .iter()
            .map(|id| Rule::Group(IdRule { id: id.clone() })),
    );
    out.extend(token_ids.iter().map(|id| {
        Rule::ServiceToken(ServiceTokenRule {
            token_id: id.clone(),
        })
    }));
    out.extend(rules.google_groups.iter().map(|group| {
        Rule::Gsuite(GsuiteRule {
            email: group.email.trim().to_string(),
            identity_provider_id: group.identity_provider_id.trim().to_string(),
        })
    }));
    out.extend(rules.okta_groups.iter().map(|group| {
        Rule::Okta(OktaRule {
            name: group.name.trim().to_string(),
            identity_provider_id: group.identity_provider_id.trim().to_string(),
        })
    }));
    out.extend(rules.saml_groups.iter().map(|group| {
        Rule::Saml(SamlRule {
            attribute_name: group.attribute_name.trim().to_string(),
            attribute_value: group.attribute_value.trim().to_string(),
            identity_provider_id: group.identity_provider_id.trim().to_string(),
        })
    }));
    out.extend(rules.azure_groups.iter().map(|group| {
        Rule::AzureAd(AzureRule {
            id: group.id.trim().to_string(),
            identity_provider_id: group.identity_provider_id.trim().to_string(),
        })
    }));
    out.extend(rules.github_organizations.iter().map(|org| {
        Rule::GithubOrganization(GithubOrganizationRule {
            name: org.name.trim().to_string(),
            team: org
                .team
                .as_deref()
                .map(str::trim)
                .filter(|team| !team.is_empty())
                .map(str::to_string),
            identity_provider_id: org.identity_provider_id.trim().to_string(),
        })
    }));

    if rules.everyone {
        out.push(Rule::Everyone(EmptyRule {}));
    }
    if rules.valid_certificate {
        out.push(Rule::Certificate(EmptyRule {}));
    }
    if rules.any_access_service_token {
        out.push(Rule::AnyValidServiceToken(EmptyRule {}));
    }

    out
}

/// Resolve the references of one bucket and expand it
async fn resolve_bucket(
    ctx: &Reconciler,
    bucket: &[AccessRules],
    namespace: &str,
) -> Result<Resolution<(Vec<Rule>, BucketIds)>, ReconcileError> {
    let mut rules = Vec::new();
    let mut ids = BucketIds::default();

    for entry in bucket {
        let group_ids = match resolve_references(
            ctx.stores.groups.as_ref(),
            &entry.access_groups,
            namespace,
        )
        .await?
        {
            Resolution::Ready(ids) => ids,
            Resolution::Waiting(waiting) => return Ok(Resolution::Waiting(waiting)),
        };
        let token_ids = match resolve_references(
            ctx.stores.service_tokens.as_ref(),
            &entry.service_tokens,
            namespace,
        )
        .await?
        {
            Resolution::Ready(ids) => ids,
            Resolution::Waiting(waiting) => return Ok(Resolution::Waiting(waiting)),
        };

        rules.extend(expand_rules(entry, &group_ids, &token_ids));
        ids.group_ids.extend(group_ids);
        ids.service_token_ids.extend(token_ids);
    }

    Ok(Resolution::Ready((rules, ids)))
}

/// Resolve and expand the three buckets of a group or policy
///
/// # Errors
/// Returns a configuration error for broken references
pub async fn resolve_rule_buckets(
    ctx: &Reconciler,
    namespace: &str,
    include: &[AccessRules],
    require: &[AccessRules],
    exclude: &[AccessRules],
) -> Result<Resolution<ResolvedRules>, ReconcileError> {
    let mut resolved = ResolvedRules::default();

    for (bucket, rules_out, ids_out) in [
        (include, &mut resolved.include, &mut resolved.ids.include),
        (require, &mut resolved.require, &mut resolved.ids.require),
        (exclude, &mut resolved.exclude, &mut resolved.ids.exclude),
    ] {
        match resolve_bucket(ctx, bucket, namespace).await? {
            Resolution::Ready((rules, ids)) => {
                *rules_out = rules;
                *ids_out = ids;
            }
            Resolution::Waiting(waiting) => return Ok(Resolution::Waiting(waiting)),
        }
    }

    Ok(Resolution::Ready(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{GithubOrganization, OktaGroup};

    #[test]
    fn test_expansion_order_is_fixed() {
        let rules = AccessRules {
            everyone: true,
            emails: vec![" a@example.com ".to_string()],
            countries: vec!["NL".to_string()],
            email_domains: vec!["example.com".to_string()],
            ..AccessRules::default()
        };
        let expanded = expand_rules(&rules, &["g1".to_string()], &["t1".to_string()]);
        assert_eq!(
            expanded,
            vec![
                Rule::Email(EmailRule {
                    email: "a@example.com".to_string()
                }),
                Rule::EmailDomain(EmailDomainRule {
                    domain: "example.com".to_string()
                }),
                Rule::Geo(GeoRule {
                    country_code: "NL".to_string()
                }),
                Rule::Group(IdRule {
                    id: "g1".to_string()
                }),
                Rule::ServiceToken(ServiceTokenRule {
                    token_id: "t1".to_string()
                }),
                Rule::Everyone(EmptyRule {}),
            ]
        );
    }

    #[test]
    fn test_identity_provider_rules() {
        let rules = AccessRules {
            okta_groups: vec![OktaGroup {
                name: "eng".to_string(),
                identity_provider_id: "okta".to_string(),
            }],
            github_organizations: vec![GithubOrganization {
                name: "octopilot".to_string(),
                team: Some(" ".to_string()),
                identity_provider_id: "gh".to_string(),
            }],
            ..AccessRules::default()
        };
        let expanded = expand_rules(&rules, &[], &[]);
        assert_eq!(expanded.len(), 2);
        assert_eq!(
            expanded[1],
            Rule::GithubOrganization(GithubOrganizationRule {
                name: "octopilot".to_string(),
                team: None,
                identity_provider_id: "gh".to_string(),
            })
        );
    }

    #[test]
    fn test_empty_bucket_expands_to_nothing() {
        assert!(expand_rules(&AccessRules::default(), &[], &[]).is_empty());
    }
}
