//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group of every custom resource managed by the controller
pub const API_GROUP: &str = "cloudflare-access.octopilot.io";

/// Field manager name used for status and metadata patches
pub const FIELD_MANAGER: &str = "cloudflare-access-controller";

/// Finalizer gating record removal on remote cleanup
pub const FINALIZER: &str = "cloudflare-access.octopilot.io/finalizer";

/// Annotation overriding the Cloudflare account for a single record
pub const ACCOUNT_ID_ANNOTATION: &str = "cloudflare-access.octopilot.io/account-id";

/// Annotation suppressing remote deletion when the record is deleted
/// Only the literal value "true" enables it
pub const PREVENT_DESTROY_ANNOTATION: &str = "cloudflare-access.octopilot.io/prevent-destroy";

/// Label put on every secret published for a ServiceToken (value: owning record name)
pub const SERVICE_TOKEN_OWNER_LABEL: &str = "cloudflare-access.octopilot.io/service-token";

/// Longest value Kubernetes accepts for a label
pub const MAX_LABEL_VALUE_LEN: usize = 63;

/// Label identifying the controller as the manager of a published secret
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Reserved secret annotation naming the data key that holds the client ID
pub const CLIENT_ID_KEY_ANNOTATION: &str = "cloudflare-access.octopilot.io/client-id-key";

/// Reserved secret annotation naming the data key that holds the client secret
pub const CLIENT_SECRET_KEY_ANNOTATION: &str = "cloudflare-access.octopilot.io/client-secret-key";

/// Reserved secret annotation recording the remote service token ID
pub const TOKEN_ID_ANNOTATION: &str = "cloudflare-access.octopilot.io/token-id";

/// Default secret data key for the service token client ID
pub const DEFAULT_CLIENT_ID_KEY: &str = "CLIENT_ID";

/// Default secret data key for the service token client secret
pub const DEFAULT_CLIENT_SECRET_KEY: &str = "CLIENT_SECRET";

/// Condition type reporting whether the remote counterpart is in sync
pub const CONDITION_AVAILABLE: &str = "Available";

/// Condition type reporting the last reconciliation failure
pub const CONDITION_DEGRADED: &str = "Degraded";

/// Default Cloudflare API base URL
pub const DEFAULT_CLOUDFLARE_API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Page size used when listing Access objects
pub const DEFAULT_LIST_PAGE_SIZE: u32 = 50;

/// Default periodic resync interval for records in steady state (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 600;

/// Default fixed requeue delay while waiting for a referenced record (seconds)
pub const DEFAULT_DEPENDENCY_REQUEUE_SECS: u64 = 15;

/// Default requeue delay after a remote object vanished out-of-band (seconds)
pub const DEFAULT_REMOTE_LOST_REQUEUE_SECS: u64 = 1;

/// Default minimum error backoff (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default maximum error backoff (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default HTTP timeout for Cloudflare API calls (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default delay before restarting a watch stream that ended or failed (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default number of concurrent reconciliations per resource kind
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 4;

/// Application types Cloudflare allows only once per account
/// Records of these types are located and updated, never created
pub const SINGLETON_APP_TYPES: &[&str] = &["app_launcher", "warp", "biso"];
