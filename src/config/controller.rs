//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::*;
use std::fmt;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap/Secret using `envFrom` in the deployment.
#[derive(Clone)]
pub struct ControllerConfig {
    /// Cloudflare account used when a record carries no account override annotation
    pub account_id: String,
    /// Cloudflare API token (bearer auth)
    pub api_token: String,
    /// Cloudflare API base URL
    pub api_base_url: String,
    /// HTTP timeout for Cloudflare API calls (seconds)
    pub http_timeout_secs: u64,
    /// Periodic resync interval for records in steady state (seconds)
    pub resync_interval_secs: u64,
    /// Fixed requeue delay while a referenced record is not yet available (seconds)
    pub dependency_requeue_secs: u64,
    /// Requeue delay after a remote object vanished out-of-band (seconds)
    pub remote_lost_requeue_secs: u64,
    /// Minimum error backoff (seconds)
    pub backoff_min_secs: u64,
    /// Maximum error backoff (seconds)
    pub backoff_max_secs: u64,
    /// Watch stream restart delay (seconds)
    pub watch_restart_delay_secs: u64,
    /// Maximum concurrent reconciliations per resource kind
    pub max_concurrent_reconciliations: u16,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

// The API token never goes to logs.
impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("account_id", &self.account_id)
            .field("api_token", &"***")
            .field("api_base_url", &self.api_base_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("resync_interval_secs", &self.resync_interval_secs)
            .field("dependency_requeue_secs", &self.dependency_requeue_secs)
            .field("remote_lost_requeue_secs", &self.remote_lost_requeue_secs)
            .field("backoff_min_secs", &self.backoff_min_secs)
            .field("backoff_max_secs", &self.backoff_max_secs)
            .field("watch_restart_delay_secs", &self.watch_restart_delay_secs)
            .field(
                "max_concurrent_reconciliations",
                &self.max_concurrent_reconciliations,
            )
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            api_token: String::new(),
            api_base_url: DEFAULT_CLOUDFLARE_API_BASE_URL.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            dependency_requeue_secs: DEFAULT_DEPENDENCY_REQUEUE_SECS,
            remote_lost_requeue_secs: DEFAULT_REMOTE_LOST_REQUEUE_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            account_id: env_var_or_default_str("CLOUDFLARE_ACCOUNT_ID", ""),
            api_token: env_var_or_default_str("CLOUDFLARE_API_TOKEN", ""),
            api_base_url: env_var_or_default_str(
                "CLOUDFLARE_API_BASE_URL",
                DEFAULT_CLOUDFLARE_API_BASE_URL,
            ),
            http_timeout_secs: env_var_or_default("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            resync_interval_secs: env_var_or_default(
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            ),
            dependency_requeue_secs: env_var_or_default(
                "DEPENDENCY_REQUEUE_SECS",
                DEFAULT_DEPENDENCY_REQUEUE_SECS,
            ),
            remote_lost_requeue_secs: env_var_or_default(
                "REMOTE_LOST_REQUEUE_SECS",
                DEFAULT_REMOTE_LOST_REQUEUE_SECS,
            ),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
        }
    }

    /// Check the settings the controller cannot start without
    ///
    /// # Errors
    ///
    /// Returns a message naming each missing or out-of-range setting.
    pub fn validate(&self) -> Result<(), String> {
        let mut problems = Vec::new();
        if self.api_token.trim().is_empty() {
            problems.push("CLOUDFLARE_API_TOKEN is required".to_string());
        }
        if self.account_id.trim().is_empty() {
            problems.push("CLOUDFLARE_ACCOUNT_ID is required".to_string());
        }
        if self.backoff_min_secs == 0 || self.backoff_min_secs > self.backoff_max_secs {
            problems.push(format!(
                "BACKOFF_MIN_SECS ({}) must be > 0 and <= BACKOFF_MAX_SECS ({})",
                self.backoff_min_secs, self.backoff_max_secs
            ));
        }
        if self.max_concurrent_reconciliations == 0 {
            problems.push("MAX_CONCURRENT_RECONCILIATIONS must be > 0".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }

    /// Get resync interval duration
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Get dependency soft-wait requeue duration
    pub fn dependency_requeue(&self) -> Duration {
        Duration::from_secs(self.dependency_requeue_secs)
    }

    /// Get remote-lost requeue duration
    pub fn remote_lost_requeue(&self) -> Duration {
        Duration::from_secs(self.remote_lost_requeue_secs)
    }

    /// Get HTTP timeout duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
