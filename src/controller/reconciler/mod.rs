//! # Reconciler
//!
//! Drives Access records toward their declared remote state.
//!
//! The reconciler:
//! - Resolves references between records to remote IDs
//! - Creates, adopts or updates the remote counterpart of each record
//! - Publishes service token credentials as Kubernetes secrets
//! - Deletes remote objects behind a finalizer when records are removed
//! - Reports progress through `Available`/`Degraded` conditions
//!
//! ## Reconciliation Flow
//!
//! 1. Add the finalizer, or clean up if the record is being deleted
//! 2. Resolve references; wait if a dependency is not Available yet
//! 3. Look up the remote object by ID, or adopt one by name
//! 4. Create or update it unless it is already equivalent
//! 5. Run kind-specific follow-up (secret publication)
//! 6. Update status

pub mod engine;
pub mod equivalence;
pub mod finalizer;
pub mod policies;
pub mod references;
pub mod rules;
pub mod secrets;
pub mod status;
pub mod strategies;
pub mod types;

// Re-export public API
pub use engine::{backoff_key, reconcile};
pub use strategies::{
    ApplicationStrategy, GroupStrategy, PolicyStrategy, ReconcileStrategy, ServiceTokenStrategy,
};
pub use types::{
    BackoffState, ErrorClass, MemoryStores, ReconcileError, Reconciler, Resolution, Stores,
    SyncOutcome, Waiting,
};
