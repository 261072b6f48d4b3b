//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, configuration, and the
//! Kubernetes and Cloudflare clients.

use crate::cloudflare::CloudflareClient;
use crate::config::ControllerConfig;
use crate::controller::reconciler::{Reconciler, Stores};
use anyhow::{anyhow, Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Components needed to run the controllers
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Reconciler context shared by every controller
    pub reconciler: Arc<Reconciler>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

/// Install ring as the rustls crypto provider
///
/// Must run before any TLS connection is made. Installing twice is harmless.
pub fn init_rustls() {
    // Err only means a provider is already installed
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Default filter directive for a `LOG_LEVEL` value
pub fn default_directive(log_level: &str) -> String {
    let level = match log_level.trim().to_ascii_lowercase().as_str() {
        level @ ("error" | "warn" | "info" | "debug" | "trace") => level.to_string(),
        _ => "info".to_string(),
    };
    format!("cloudflare_access_controller={level},kube=warn,warn")
}

/// Set up the tracing subscriber
///
/// `RUST_LOG` overrides `LOG_LEVEL`. `LOG_FORMAT=text` selects human-readable
/// output, anything else JSON.
///
/// # Errors
/// Fails if the filter is invalid or a subscriber is already installed
pub fn init_tracing(config: &ControllerConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_unset) => EnvFilter::try_new(default_directive(&config.log_level))
            .context("Invalid LOG_LEVEL")?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.log_format.trim().eq_ignore_ascii_case("text") {
        builder.try_init()
    } else {
        builder.json().try_init()
    };
    installed.map_err(|e| anyhow!("Failed to initialize tracing: {e}"))
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Configuration loading and validation
/// - Tracing subscriber setup
/// - Kubernetes and Cloudflare client creation
/// - Reconciler setup
///
/// # Errors
/// Fails on invalid configuration or when a client cannot be created
pub async fn initialize() -> Result<InitializationResult> {
    init_rustls();

    let config = ControllerConfig::from_env();
    init_tracing(&config)?;
    config
        .validate()
        .map_err(|problems| anyhow!("Invalid controller configuration: {problems}"))?;

    info!("Starting Cloudflare Access Controller v{}", env!("CARGO_PKG_VERSION"));
    info!(?config, "Loaded controller configuration");

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let cloudflare =
        CloudflareClient::from_config(&config).context("Failed to create Cloudflare client")?;

    let stores = Stores::kube(&client);
    let reconciler = Arc::new(Reconciler::new(config, Arc::new(cloudflare), stores));

    info!("Controller initialized, starting watch loops...");
    Ok(InitializationResult { client, reconciler })
}
