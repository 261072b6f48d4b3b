//! # Service Token Secrets
//!
//! Builds and reads the Kubernetes secrets carrying service token
//! credentials.
//!
//! A published secret always holds the full credential tuple: client ID and
//! client secret under the template's data keys, and the remote token ID in a
//! reserved annotation. The data key names are recorded in reserved
//! annotations as well, so a secret stays readable after the template keys
//! change.

use crate::constants::{
    CLIENT_ID_KEY_ANNOTATION, CLIENT_SECRET_KEY_ANNOTATION, FIELD_MANAGER, MANAGED_BY_LABEL,
    SERVICE_TOKEN_OWNER_LABEL, TOKEN_ID_ANNOTATION,
};
use crate::crd::{SecretTemplate, ServiceToken};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;

const RESERVED_ANNOTATIONS: [&str; 3] = [
    CLIENT_ID_KEY_ANNOTATION,
    CLIENT_SECRET_KEY_ANNOTATION,
    TOKEN_ID_ANNOTATION,
];

const RESERVED_LABELS: [&str; 2] = [SERVICE_TOKEN_OWNER_LABEL, MANAGED_BY_LABEL];

/// Service token credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    /// Remote token ID; absent for secrets written by hand
    pub token_id: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("token_id", &self.token_id)
            .finish()
    }
}

/// Credentials read from one published secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedSecret {
    pub name: String,
    pub credentials: Credentials,
}

fn data_value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .and_then(|value| String::from_utf8(value.0.clone()).ok())
        .filter(|value| !value.is_empty())
}

/// Read the credentials of a published secret
///
/// Key names come from the reserved annotations, falling back to the
/// template's keys. `None` when either value is missing.
pub fn read_credentials(secret: &Secret, template: &SecretTemplate) -> Option<Credentials> {
    let annotations = secret.annotations();
    let id_key = annotations
        .get(CLIENT_ID_KEY_ANNOTATION)
        .map_or(template.client_id_key.as_str(), String::as_str);
    let secret_key = annotations
        .get(CLIENT_SECRET_KEY_ANNOTATION)
        .map_or(template.client_secret_key.as_str(), String::as_str);

    Some(Credentials {
        client_id: data_value(secret, id_key)?,
        client_secret: data_value(secret, secret_key)?,
        token_id: annotations
            .get(TOKEN_ID_ANNOTATION)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
    })
}

/// The secret whose credentials are current
///
/// The secret named by the template wins; otherwise the first readable one,
/// which is the state left behind by an interrupted rename.
pub fn current_secret(secrets: &[Secret], template: &SecretTemplate) -> Option<PublishedSecret> {
    let readable = |secret: &Secret| {
        read_credentials(secret, template).map(|credentials| PublishedSecret {
            name: secret.name_any(),
            credentials,
        })
    };

    secrets
        .iter()
        .filter(|secret| secret.name_any() == template.name)
        .find_map(readable)
        .or_else(|| secrets.iter().find_map(readable))
}

/// Secret publishing `credentials` for `record`
pub fn build_secret(record: &ServiceToken, credentials: &Credentials) -> Secret {
    let template = &record.spec.secret;

    let mut labels: BTreeMap<String, String> = template
        .labels
        .iter()
        .filter(|(key, _)| !RESERVED_LABELS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    labels.insert(SERVICE_TOKEN_OWNER_LABEL.to_string(), record.name_any());
    labels.insert(MANAGED_BY_LABEL.to_string(), FIELD_MANAGER.to_string());

    let mut annotations: BTreeMap<String, String> = template
        .annotations
        .iter()
        .filter(|(key, _)| !RESERVED_ANNOTATIONS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    annotations.insert(
        CLIENT_ID_KEY_ANNOTATION.to_string(),
        template.client_id_key.clone(),
    );
    annotations.insert(
        CLIENT_SECRET_KEY_ANNOTATION.to_string(),
        template.client_secret_key.clone(),
    );
    if let Some(token_id) = &credentials.token_id {
        annotations.insert(TOKEN_ID_ANNOTATION.to_string(), token_id.clone());
    }

    let data = BTreeMap::from([
        (
            template.client_id_key.clone(),
            ByteString(credentials.client_id.clone().into_bytes()),
        ),
        (
            template.client_secret_key.clone(),
            ByteString(credentials.client_secret.clone().into_bytes()),
        ),
    ]);

    Secret {
        metadata: ObjectMeta {
            name: Some(template.name.clone()),
            namespace: record.namespace(),
            labels: Some(labels),
            annotations: Some(annotations),
            ..ObjectMeta::default()
        },
        data: Some(data),
        type_: Some("Opaque".to_string()),
        ..Secret::default()
    }
}

/// Whether `existing` already carries everything `desired` publishes
pub fn secret_matches(existing: &Secret, desired: &Secret) -> bool {
    let contains = |have: &BTreeMap<String, String>, want: &BTreeMap<String, String>| {
        want.iter().all(|(key, value)| have.get(key) == Some(value))
    };
    existing.data == desired.data
        && contains(existing.labels(), desired.labels())
        && contains(existing.annotations(), desired.annotations())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ServiceTokenSpec;

    fn token(secret_name: &str) -> ServiceToken {
        let mut token = ServiceToken::new(
            "ci",
            ServiceTokenSpec {
                name: "ci".to_string(),
                duration: None,
                secret: SecretTemplate {
                    name: secret_name.to_string(),
                    client_id_key: "ID".to_string(),
                    client_secret_key: "SECRET".to_string(),
                    labels: BTreeMap::from([
                        ("team".to_string(), "ci".to_string()),
                        (SERVICE_TOKEN_OWNER_LABEL.to_string(), "hijack".to_string()),
                    ]),
                    annotations: BTreeMap::from([(
                        TOKEN_ID_ANNOTATION.to_string(),
                        "forged".to_string(),
                    )]),
                },
            },
        );
        token.metadata.namespace = Some("ci".to_string());
        token
    }

    fn credentials() -> Credentials {
        Credentials {
            client_id: "abc.access".to_string(),
            client_secret: "s3cr3t".to_string(),
            token_id: Some("tok-1".to_string()),
        }
    }

    #[test]
    fn test_reserved_keys_cannot_be_overridden() {
        let secret = build_secret(&token("ci-access"), &credentials());
        assert_eq!(secret.labels()[SERVICE_TOKEN_OWNER_LABEL], "ci");
        assert_eq!(secret.labels()["team"], "ci");
        assert_eq!(secret.annotations()[TOKEN_ID_ANNOTATION], "tok-1");
        assert_eq!(secret.annotations()[CLIENT_ID_KEY_ANNOTATION], "ID");
    }

    #[test]
    fn test_published_secret_reads_back() {
        let record = token("ci-access");
        let secret = build_secret(&record, &credentials());
        assert_eq!(
            read_credentials(&secret, &record.spec.secret),
            Some(credentials())
        );
    }

    #[test]
    fn test_annotated_keys_survive_template_key_change() {
        let record = token("ci-access");
        let secret = build_secret(&record, &credentials());
        let mut template = record.spec.secret.clone();
        template.client_id_key = "NEW_ID".to_string();
        assert_eq!(
            read_credentials(&secret, &template).map(|c| c.client_id),
            Some("abc.access".to_string())
        );
    }

    #[test]
    fn test_named_secret_preferred() {
        let old = build_secret(&token("secret-a"), &credentials());
        let mut newer = credentials();
        newer.client_secret = "rotated".to_string();
        let new = build_secret(&token("secret-b"), &newer);

        let current = current_secret(&[old.clone(), new], &token("secret-b").spec.secret).unwrap();
        assert_eq!(current.name, "secret-b");
        assert_eq!(current.credentials.client_secret, "rotated");

        let fallback = current_secret(&[old], &token("secret-b").spec.secret).unwrap();
        assert_eq!(fallback.name, "secret-a");
    }

    #[test]
    fn test_secret_matches_ignores_foreign_metadata() {
        let desired = build_secret(&token("ci-access"), &credentials());
        let mut existing = desired.clone();
        existing
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert("added-by".to_string(), "someone".to_string());
        assert!(secret_matches(&existing, &desired));

        let mut rotated = credentials();
        rotated.client_secret = "other".to_string();
        assert!(!secret_matches(
            &build_secret(&token("ci-access"), &rotated),
            &desired
        ));
    }

    #[test]
    fn test_debug_hides_client_secret() {
        assert!(!format!("{:?}", credentials()).contains("s3cr3t"));
    }
}
