//! # Status Reporting
//!
//! Writes machine-readable state back onto records.
//!
//! Every record carries two conditions after its first reconciliation:
//! `Available` (the remote counterpart is in sync) and `Degraded` (the last
//! attempt failed). Writes are skipped when the computed status equals the
//! stored one, so steady-state reconciles do not generate watch events.

use crate::constants::{CONDITION_AVAILABLE, CONDITION_DEGRADED};
use crate::controller::reconciler::types::{ReconcileError, Waiting};
use crate::crd::{AccessStatus, Condition, ManagedRecord};
use crate::store::{RecordStore, StoreError};
use tracing::debug;

/// Set a condition, keeping its transition time when the status is unchanged
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: bool,
    reason: &str,
    message: &str,
) {
    let status = if status { "True" } else { "False" };
    let existing = conditions.iter().position(|c| c.r#type == condition_type);

    let last_transition_time = existing
        .map(|index| &conditions[index])
        .filter(|c| c.status == status)
        .and_then(|c| c.last_transition_time.clone())
        .or_else(|| Some(chrono::Utc::now().to_rfc3339()));

    let condition = Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        last_transition_time,
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
    };

    match existing {
        Some(index) => conditions[index] = condition,
        None => conditions.push(condition),
    }
}

/// Persist `status` unless it equals the record's current status
///
/// The local record is updated on success so later writes in the same
/// reconciliation start from what was stored.
///
/// # Errors
/// Returns a store error if the write fails
pub async fn write_status<K: ManagedRecord>(
    store: &dyn RecordStore<K>,
    record: &mut K,
    status: AccessStatus,
) -> Result<bool, StoreError> {
    if record.access_status() == Some(&status) {
        debug!(record = %record.key(), "Skipping status update - status unchanged");
        return Ok(false);
    }
    store.replace_status(record, &status).await?;
    *record.access_status_mut() = Some(status);
    Ok(true)
}

fn current_status<K: ManagedRecord>(record: &K) -> AccessStatus {
    record.access_status().cloned().unwrap_or_default()
}

/// Mark the record in sync with its remote counterpart
pub fn mark_available(status: &mut AccessStatus, message: &str) {
    set_condition(
        &mut status.conditions,
        CONDITION_AVAILABLE,
        true,
        "Synced",
        message,
    );
    set_condition(
        &mut status.conditions,
        CONDITION_DEGRADED,
        false,
        "Synced",
        "Last reconciliation succeeded",
    );
}

/// Record a remote ID the moment it becomes known
///
/// A different ID already recorded is kept in `superseded_remote_ids` until
/// its remote object is deleted.
///
/// # Errors
/// Returns a store error if the write fails
pub async fn record_remote_id<K: ManagedRecord>(
    store: &dyn RecordStore<K>,
    record: &mut K,
    remote_id: &str,
    timestamps: (Option<&str>, Option<&str>),
) -> Result<bool, StoreError> {
    let mut status = current_status(record);
    if let Some(previous) = status.remote_id().filter(|previous| *previous != remote_id) {
        let previous = previous.to_string();
        if !status.superseded_remote_ids.contains(&previous) {
            status.superseded_remote_ids.push(previous);
        }
    }
    status.remote_id = Some(remote_id.to_string());
    status.created_at = timestamps.0.map(str::to_string);
    status.updated_at = timestamps.1.map(str::to_string);
    write_status(store, record, status).await
}

/// Forget a remote ID whose object no longer exists
///
/// # Errors
/// Returns a store error if the write fails
pub async fn clear_remote_id<K: ManagedRecord>(
    store: &dyn RecordStore<K>,
    record: &mut K,
) -> Result<bool, StoreError> {
    let mut status = current_status(record);
    status.remote_id = None;
    status.created_at = None;
    status.updated_at = None;
    set_condition(
        &mut status.conditions,
        CONDITION_AVAILABLE,
        false,
        "RemoteNotFound",
        "Remote object no longer exists and will be recreated",
    );
    write_status(store, record, status).await
}

/// Report a dependency that is not ready yet
///
/// # Errors
/// Returns a store error if the write fails
pub async fn report_waiting<K: ManagedRecord>(
    store: &dyn RecordStore<K>,
    record: &mut K,
    waiting: &Waiting,
) -> Result<bool, StoreError> {
    let mut status = current_status(record);
    status.observed_generation = record.meta().generation;
    set_condition(
        &mut status.conditions,
        CONDITION_AVAILABLE,
        false,
        "DependencyNotReady",
        &format!("Waiting for {}: {}", waiting.reference, waiting.reason),
    );
    set_condition(
        &mut status.conditions,
        CONDITION_DEGRADED,
        false,
        "DependencyNotReady",
        "Waiting for referenced records",
    );
    write_status(store, record, status).await
}

/// Report a failed reconciliation
///
/// # Errors
/// Returns a store error if the write fails
pub async fn report_failure<K: ManagedRecord>(
    store: &dyn RecordStore<K>,
    record: &mut K,
    error: &ReconcileError,
) -> Result<bool, StoreError> {
    let mut status = current_status(record);
    status.observed_generation = record.meta().generation;
    let message = error.to_string();
    set_condition(
        &mut status.conditions,
        CONDITION_AVAILABLE,
        false,
        error.reason(),
        &message,
    );
    set_condition(
        &mut status.conditions,
        CONDITION_DEGRADED,
        true,
        error.reason(),
        &message,
    );
    write_status(store, record, status).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{AccessGroup, AccessGroupSpec};
    use crate::store::MemoryRecordStore;

    fn group() -> AccessGroup {
        let mut group = AccessGroup::new(
            "admins",
            AccessGroupSpec {
                name: "Admins".to_string(),
                include: vec![],
                require: vec![],
                exclude: vec![],
            },
        );
        group.metadata.namespace = Some("platform".to_string());
        group
    }

    #[test]
    fn test_transition_time_kept_while_status_unchanged() {
        let mut conditions = vec![Condition {
            r#type: CONDITION_AVAILABLE.to_string(),
            status: "True".to_string(),
            last_transition_time: Some("2026-01-01T00:00:00Z".to_string()),
            reason: Some("Synced".to_string()),
            message: Some("old".to_string()),
        }];
        set_condition(&mut conditions, CONDITION_AVAILABLE, true, "Synced", "new");
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2026-01-01T00:00:00Z")
        );
        assert_eq!(conditions[0].message.as_deref(), Some("new"));

        set_condition(&mut conditions, CONDITION_AVAILABLE, false, "Failed", "boom");
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2026-01-01T00:00:00Z")
        );
        assert_eq!(conditions.len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_status_is_not_written() {
        let store = MemoryRecordStore::new();
        store.insert(group());
        let mut record = store.record("platform", "admins").unwrap();

        let mut status = AccessStatus::default();
        mark_available(&mut status, "in sync");
        assert!(write_status::<AccessGroup>(&store, &mut record, status.clone())
            .await
            .unwrap());
        assert!(!write_status::<AccessGroup>(&store, &mut record, status)
            .await
            .unwrap());
        assert_eq!(store.status_writes(), 1);
    }

    #[tokio::test]
    async fn test_replaced_remote_id_is_kept_for_deletion() {
        let store = MemoryRecordStore::new();
        store.insert(group());
        let mut record = store.record("platform", "admins").unwrap();

        record_remote_id::<AccessGroup>(&store, &mut record, "g1", (None, None))
            .await
            .unwrap();
        record_remote_id::<AccessGroup>(&store, &mut record, "g1", (None, None))
            .await
            .unwrap();
        assert!(record.status.as_ref().unwrap().superseded_remote_ids.is_empty());

        record_remote_id::<AccessGroup>(&store, &mut record, "g2", (None, None))
            .await
            .unwrap();
        record_remote_id::<AccessGroup>(&store, &mut record, "g3", (None, None))
            .await
            .unwrap();
        let status = store.record("platform", "admins").unwrap().status.unwrap();
        assert_eq!(status.remote_id.as_deref(), Some("g3"));
        assert_eq!(status.superseded_remote_ids, vec!["g1", "g2"]);
    }

    #[tokio::test]
    async fn test_failure_sets_both_conditions() {
        let store = MemoryRecordStore::new();
        store.insert(group());
        let mut record = store.record("platform", "admins").unwrap();

        report_failure::<AccessGroup>(
            &store,
            &mut record,
            &ReconcileError::Validation("name must not be empty".to_string()),
        )
        .await
        .unwrap();

        let status = store.record("platform", "admins").unwrap().status.unwrap();
        let available = status.condition(CONDITION_AVAILABLE).unwrap();
        let degraded = status.condition(CONDITION_DEGRADED).unwrap();
        assert_eq!(available.status, "False");
        assert_eq!(degraded.status, "True");
        assert_eq!(degraded.reason.as_deref(), Some("ValidationFailed"));
        assert_eq!(
            degraded.message.as_deref(),
            Some("invalid spec: name must not be empty")
        );
    }
}
