//! # Reference Resolution
//!
//! Records refer to each other by `name` or `namespace/name`. References are
//! weak: they are resolved to the target's remote ID on every reconciliation
//! and never imply ownership.
//!
//! A reference whose target exists but is not yet Available is not an error;
//! resolution reports [`Resolution::Waiting`] and the caller requeues.

use crate::controller::reconciler::types::{ReconcileError, Resolution, Waiting};
use crate::crd::ManagedRecord;
use crate::store::RecordStore;
use tracing::debug;

/// A parsed `namespace/name` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub namespace: String,
    pub name: String,
}

impl std::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Parse a reference relative to `default_namespace`
///
/// # Errors
/// Returns `InvalidReference` for empty segments or more than one `/`
pub fn parse_reference(
    reference: &str,
    default_namespace: &str,
) -> Result<RecordRef, ReconcileError> {
    let invalid = |reason: &str| ReconcileError::InvalidReference {
        reference: reference.to_string(),
        reason: reason.to_string(),
    };

    let segments: Vec<&str> = reference.trim().split('/').map(str::trim).collect();
    let (namespace, name) = match segments.as_slice() {
        [name] => (default_namespace, *name),
        [namespace, name] => (*namespace, *name),
        _ => return Err(invalid("expected \"name\" or \"namespace/name\"")),
    };
    if namespace.is_empty() || name.is_empty() {
        return Err(invalid("empty namespace or name"));
    }

    Ok(RecordRef {
        namespace: namespace.to_string(),
        name: name.to_string(),
    })
}

/// Resolve references to remote IDs, preserving input order
///
/// Every reference is parsed before any is fetched, so syntax errors surface
/// regardless of readiness. A missing target fails the whole resolution even
/// when another target is merely not ready.
///
/// # Errors
/// Returns `InvalidReference`, `ReferenceNotFound` or a store error
pub async fn resolve_references<K: ManagedRecord>(
    store: &dyn RecordStore<K>,
    references: &[String],
    default_namespace: &str,
) -> Result<Resolution<Vec<String>>, ReconcileError> {
    let parsed = references
        .iter()
        .map(|reference| parse_reference(reference, default_namespace))
        .collect::<Result<Vec<_>, _>>()?;

    let mut ids = Vec::with_capacity(parsed.len());
    let mut waiting = None;

    for target in parsed {
        let Some(record) = store.get(&target.namespace, &target.name).await? else {
            return Err(ReconcileError::ReferenceNotFound {
                kind: K::KIND,
                reference: target.to_string(),
            });
        };

        match record.remote_id() {
            Some(id) if record.is_available() => ids.push(id.to_string()),
            _ => {
                debug!(kind = K::KIND, reference = %target, "Referenced record not ready");
                if waiting.is_none() {
                    waiting = Some(Waiting {
                        reference: format!("{} {target}", K::KIND),
                        reason: "not Available yet".to_string(),
                    });
                }
            }
        }
    }

    Ok(match waiting {
        Some(waiting) => Resolution::Waiting(waiting),
        None => Resolution::Ready(ids),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CONDITION_AVAILABLE;
    use crate::crd::{AccessGroup, AccessGroupSpec, AccessStatus, Condition};
    use crate::store::MemoryRecordStore;

    fn group(namespace: &str, name: &str, remote_id: Option<&str>, available: bool) -> AccessGroup {
        let mut group = AccessGroup::new(
            name,
            AccessGroupSpec {
                name: name.to_string(),
                include: vec![],
                require: vec![],
                exclude: vec![],
            },
        );
        group.metadata.namespace = Some(namespace.to_string());
        group.status = Some(AccessStatus {
            remote_id: remote_id.map(str::to_string),
            conditions: vec![Condition {
                r#type: CONDITION_AVAILABLE.to_string(),
                status: if available { "True" } else { "False" }.to_string(),
                last_transition_time: None,
                reason: None,
                message: None,
            }],
            ..AccessStatus::default()
        });
        group
    }

    #[test]
    fn test_parse_reference_forms() {
        assert_eq!(
            parse_reference("admins", "platform").unwrap(),
            RecordRef {
                namespace: "platform".to_string(),
                name: "admins".to_string()
            }
        );
        assert_eq!(
            parse_reference("security/admins", "platform")
                .unwrap()
                .to_string(),
            "security/admins"
        );
    }

    #[test]
    fn test_parse_reference_rejects_malformed() {
        for reference in ["", "/admins", "security/", "a/b/c", " / "] {
            assert!(
                matches!(
                    parse_reference(reference, "platform"),
                    Err(ReconcileError::InvalidReference { .. })
                ),
                "{reference:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_resolution_preserves_order() {
        let store = MemoryRecordStore::new();
        store.insert(group("platform", "c", Some("id-c"), true));
        store.insert(group("platform", "a", Some("id-a"), true));
        store.insert(group("security", "b", Some("id-b"), true));

        let refs = vec!["a".to_string(), "security/b".to_string(), "c".to_string()];
        let resolution = resolve_references::<AccessGroup>(&store, &refs, "platform").await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Ready(vec!["id-a".into(), "id-b".into(), "id-c".into()])
        );
    }

    #[tokio::test]
    async fn test_unready_reference_waits() {
        let store = MemoryRecordStore::new();
        store.insert(group("platform", "a", Some("id-a"), true));
        store.insert(group("platform", "b", None, false));

        let refs = vec!["a".to_string(), "b".to_string()];
        let resolution = resolve_references::<AccessGroup>(&store, &refs, "platform").await.unwrap();
        assert!(
            matches!(resolution, Resolution::Waiting(ref w) if w.reference == "AccessGroup platform/b")
        );
    }

    #[tokio::test]
    async fn test_available_without_remote_id_waits() {
        let store = MemoryRecordStore::new();
        store.insert(group("platform", "a", None, true));
        let resolution = resolve_references::<AccessGroup>(&store, &["a".to_string()], "platform")
            .await
            .unwrap();
        assert!(matches!(resolution, Resolution::Waiting(_)));
    }

    #[tokio::test]
    async fn test_missing_reference_beats_waiting() {
        let store = MemoryRecordStore::new();
        store.insert(group("platform", "b", None, false));

        let refs = vec!["b".to_string(), "ghost".to_string()];
        let err = resolve_references::<AccessGroup>(&store, &refs, "platform")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::ReferenceNotFound { ref reference, .. } if reference == "platform/ghost"
        ));
    }
}
