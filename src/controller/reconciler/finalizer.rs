//! # Finalizer Protocol
//!
//! A record is only removed by the API server once the controller has
//! cleaned up its remote counterpart and dropped the finalizer.
//!
//! | under deletion | has finalizer | step             |
//! |----------------|---------------|------------------|
//! | no             | no            | add, then sync   |
//! | no             | yes           | sync             |
//! | yes            | yes           | clean up, remove |
//! | yes            | no            | nothing          |

use crate::constants::FINALIZER;
use crate::crd::ManagedRecord;
use crate::store::{RecordStore, StoreError};
use kube::ResourceExt;

/// What the engine does with a record before syncing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizerStep {
    AddFinalizer,
    Continue,
    Cleanup,
    Done,
}

pub fn finalizer_step(has_finalizer: bool, under_deletion: bool) -> FinalizerStep {
    match (under_deletion, has_finalizer) {
        (false, false) => FinalizerStep::AddFinalizer,
        (false, true) => FinalizerStep::Continue,
        (true, true) => FinalizerStep::Cleanup,
        (true, false) => FinalizerStep::Done,
    }
}

/// Add the controller finalizer; returns the updated record
///
/// # Errors
/// Returns a store error if the patch fails
pub async fn add_finalizer<K: ManagedRecord>(
    store: &dyn RecordStore<K>,
    record: &K,
) -> Result<K, StoreError> {
    let mut finalizers = record.finalizers().to_vec();
    if !finalizers.iter().any(|f| f == FINALIZER) {
        finalizers.push(FINALIZER.to_string());
    }
    store.set_finalizers(record, finalizers).await
}

/// Drop the controller finalizer, keeping any others
///
/// # Errors
/// Returns a store error if the patch fails
pub async fn remove_finalizer<K: ManagedRecord>(
    store: &dyn RecordStore<K>,
    record: &K,
) -> Result<K, StoreError> {
    let finalizers: Vec<String> = record
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != FINALIZER)
        .cloned()
        .collect();
    store.set_finalizers(record, finalizers).await
}
