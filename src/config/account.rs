//! # Account Scope
//!
//! Resolves the Cloudflare account a record is reconciled against.

use crate::config::ControllerConfig;
use crate::constants::ACCOUNT_ID_ANNOTATION;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Account a record belongs to: the override annotation when set and non-blank,
/// otherwise the controller-wide account. `None` when neither is configured.
pub fn resolve_account_id(meta: &ObjectMeta, config: &ControllerConfig) -> Option<String> {
    let annotated = meta
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(ACCOUNT_ID_ANNOTATION))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty());

    match annotated {
        Some(account) => Some(account.to_string()),
        None => {
            let base = config.account_id.trim();
            (!base.is_empty()).then(|| base.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn meta_with(annotation: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: Some("app".to_string()),
            annotations: annotation.map(|value| {
                BTreeMap::from([(ACCOUNT_ID_ANNOTATION.to_string(), value.to_string())])
            }),
            ..ObjectMeta::default()
        }
    }

    fn config(account: &str) -> ControllerConfig {
        ControllerConfig {
            account_id: account.to_string(),
            ..ControllerConfig::default()
        }
    }

    #[test]
    fn test_annotation_overrides_base_account() {
        let account = resolve_account_id(&meta_with(Some(" other ")), &config("base"));
        assert_eq!(account.as_deref(), Some("other"));
    }

    #[test]
    fn test_blank_annotation_falls_back() {
        let account = resolve_account_id(&meta_with(Some("  ")), &config("base"));
        assert_eq!(account.as_deref(), Some("base"));
    }

    #[test]
    fn test_no_account_anywhere() {
        assert_eq!(resolve_account_id(&meta_with(None), &config("")), None);
    }
}
