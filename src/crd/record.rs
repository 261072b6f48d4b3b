//! # Managed Records
//!
//! Common view over the four Access custom resources.

use crate::constants::{CONDITION_AVAILABLE, FINALIZER, PREVENT_DESTROY_ANNOTATION};
use crate::crd::{AccessApplication, AccessGroup, AccessStatus, ReusablePolicy, ServiceToken};
use kube::core::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A namespaced desired-state record reconciled by the controller
pub trait ManagedRecord:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Kind name used in logs and error messages
    const KIND: &'static str;

    fn access_status(&self) -> Option<&AccessStatus>;

    fn access_status_mut(&mut self) -> &mut Option<AccessStatus>;

    /// Recorded remote ID, if any
    fn remote_id(&self) -> Option<&str> {
        self.access_status().and_then(AccessStatus::remote_id)
    }

    /// Whether the `Available` condition is `True`
    fn is_available(&self) -> bool {
        self.access_status()
            .and_then(|status| status.condition(CONDITION_AVAILABLE))
            .is_some_and(|condition| condition.status == "True")
    }

    /// `namespace/name`
    fn key(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }

    fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == FINALIZER)
    }

    fn is_under_deletion(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    fn prevents_destroy(&self) -> bool {
        self.annotations()
            .get(PREVENT_DESTROY_ANNOTATION)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }
}

impl ManagedRecord for AccessGroup {
    const KIND: &'static str = "AccessGroup";

    fn access_status(&self) -> Option<&AccessStatus> {
        self.status.as_ref()
    }

    fn access_status_mut(&mut self) -> &mut Option<AccessStatus> {
        &mut self.status
    }
}

impl ManagedRecord for AccessApplication {
    const KIND: &'static str = "AccessApplication";

    fn access_status(&self) -> Option<&AccessStatus> {
        self.status.as_ref()
    }

    fn access_status_mut(&mut self) -> &mut Option<AccessStatus> {
        &mut self.status
    }
}

impl ManagedRecord for ReusablePolicy {
    const KIND: &'static str = "ReusablePolicy";

    fn access_status(&self) -> Option<&AccessStatus> {
        self.status.as_ref()
    }

    fn access_status_mut(&mut self) -> &mut Option<AccessStatus> {
        &mut self.status
    }
}

impl ManagedRecord for ServiceToken {
    const KIND: &'static str = "ServiceToken";

    fn access_status(&self) -> Option<&AccessStatus> {
        self.status.as_ref()
    }

    fn access_status_mut(&mut self) -> &mut Option<AccessStatus> {
        &mut self.status
    }
}
