//! # Reconciler Types
//!
//! Shared context, errors and outcomes of a reconciliation.

use crate::cloudflare::{AccessClient, ApiError};
use crate::config::ControllerConfig;
use crate::constants::ACCOUNT_ID_ANNOTATION;
use crate::controller::backoff::FibonacciBackoff;
use crate::crd::{AccessApplication, AccessGroup, ReusablePolicy, ServiceToken};
use crate::store::{
    KubeRecordStore, KubeSecretStore, MemoryRecordStore, MemorySecretStore, RecordStore,
    SecretStore, StoreError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// How the error policy treats a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network, rate limit or store failure; retried with backoff
    Transient,
    /// Rejected desired shape; retried after the record changes
    Validation,
    /// Broken references or conflicting records; retried after the record changes
    Configuration,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{operation} {kind} failed: {source}")]
    Remote {
        operation: &'static str,
        kind: &'static str,
        #[source]
        source: ApiError,
    },
    #[error("referenced {kind} {reference} not found")]
    ReferenceNotFound {
        kind: &'static str,
        reference: String,
    },
    #[error("invalid reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },
    #[error("{app_type} application is already managed by AccessApplication {other}")]
    SingletonConflict { app_type: String, other: String },
    #[error("invalid spec: {0}")]
    Validation(String),
    #[error(
        "no Cloudflare account configured: set CLOUDFLARE_ACCOUNT_ID or the {} annotation",
        ACCOUNT_ID_ANNOTATION
    )]
    MissingAccount,
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
    #[error("reconciliation cancelled by shutdown")]
    Cancelled,
}

impl ReconcileError {
    pub fn remote(operation: &'static str, kind: &'static str, source: ApiError) -> Self {
        ReconcileError::Remote {
            operation,
            kind,
            source,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ReconcileError::Remote {
                source: ApiError::Validation(_),
                ..
            }
            | ReconcileError::Validation(_) => ErrorClass::Validation,
            ReconcileError::ReferenceNotFound { .. }
            | ReconcileError::InvalidReference { .. }
            | ReconcileError::SingletonConflict { .. }
            | ReconcileError::MissingAccount => ErrorClass::Configuration,
            ReconcileError::Remote { .. } | ReconcileError::Store(_) | ReconcileError::Cancelled => {
                ErrorClass::Transient
            }
        }
    }

    /// Condition reason reported for the failure
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcileError::Remote {
                source: ApiError::Validation(_),
                ..
            } => "RemoteRejected",
            ReconcileError::Remote { .. } => "RemoteUnavailable",
            ReconcileError::ReferenceNotFound { .. } => "ReferenceNotFound",
            ReconcileError::InvalidReference { .. } => "InvalidReference",
            ReconcileError::SingletonConflict { .. } => "SingletonConflict",
            ReconcileError::Validation(_) => "ValidationFailed",
            ReconcileError::MissingAccount => "MissingAccount",
            ReconcileError::Store(_) => "StoreError",
            ReconcileError::Cancelled => "Cancelled",
        }
    }
}

/// Result of resolving a record's references
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Ready(T),
    /// A referenced record exists but is not Available yet
    Waiting(Waiting),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waiting {
    /// `Kind namespace/name` of the dependency
    pub reference: String,
    pub reason: String,
}

/// What the sync step did to the remote object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Adopted,
    Updated,
    Unchanged,
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }
}

/// Record stores for every kind
#[derive(Clone)]
pub struct Stores {
    pub groups: Arc<dyn RecordStore<AccessGroup>>,
    pub applications: Arc<dyn RecordStore<AccessApplication>>,
    pub policies: Arc<dyn RecordStore<ReusablePolicy>>,
    pub service_tokens: Arc<dyn RecordStore<ServiceToken>>,
    pub secrets: Arc<dyn SecretStore>,
}

impl Stores {
    /// Stores backed by the Kubernetes API server
    pub fn kube(client: &kube::Client) -> Self {
        let records = Arc::new(KubeRecordStore::new(client.clone()));
        Self {
            groups: Arc::clone(&records) as Arc<dyn RecordStore<AccessGroup>>,
            applications: Arc::clone(&records) as Arc<dyn RecordStore<AccessApplication>>,
            policies: Arc::clone(&records) as Arc<dyn RecordStore<ReusablePolicy>>,
            service_tokens: records as Arc<dyn RecordStore<ServiceToken>>,
            secrets: Arc::new(KubeSecretStore::new(client.clone())),
        }
    }
}

/// Handles to in-memory stores, kept by tests to seed and inspect state
#[derive(Debug, Clone, Default)]
pub struct MemoryStores {
    pub groups: MemoryRecordStore<AccessGroup>,
    pub applications: MemoryRecordStore<AccessApplication>,
    pub policies: MemoryRecordStore<ReusablePolicy>,
    pub service_tokens: MemoryRecordStore<ServiceToken>,
    pub secrets: MemorySecretStore,
}

impl MemoryStores {
    pub fn stores(&self) -> Stores {
        Stores {
            groups: Arc::new(self.groups.clone()),
            applications: Arc::new(self.applications.clone()),
            policies: Arc::new(self.policies.clone()),
            service_tokens: Arc::new(self.service_tokens.clone()),
            secrets: Arc::new(self.secrets.clone()),
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Reconciliation context shared by every controller
pub struct Reconciler {
    pub config: ControllerConfig,
    pub api: Arc<dyn AccessClient>,
    pub stores: Stores,
    shutdown: Arc<AtomicBool>,
    // Backoff state per resource (identified by kind/namespace/name)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("shutting_down", &self.is_shutting_down())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(config: ControllerConfig, api: Arc<dyn AccessClient>, stores: Stores) -> Self {
        Self {
            config,
            api,
            stores,
            shutdown: Arc::new(AtomicBool::new(false)),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Flag shared with the signal handler
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Stop between remote calls once shutdown was requested
    ///
    /// # Errors
    /// Returns `Cancelled` when the controller is shutting down
    pub fn ensure_running(&self) -> Result<(), ReconcileError> {
        if self.is_shutting_down() {
            Err(ReconcileError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Advance the record's backoff; returns (delay, consecutive errors)
    pub fn next_backoff(&self, key: &str) -> (Duration, u32) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(key.to_string()).or_insert_with(|| {
            BackoffState::new(self.config.backoff_min_secs, self.config.backoff_max_secs)
        });
        state.error_count += 1;
        (state.backoff.next_backoff(), state.error_count)
    }

    /// Forget the record's backoff after a successful reconciliation
    pub fn reset_backoff(&self, key: &str) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
