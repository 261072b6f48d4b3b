//! # Cloudflare Access Controller
//!
//! A Kubernetes controller that manages Cloudflare Zero Trust Access
//! configuration declaratively.
//!
//! ## Overview
//!
//! The controller reconciles four custom resources against one Cloudflare account:
//!
//! 1. **AccessGroup** - reusable sets of include/require/exclude rules
//! 2. **ReusablePolicy** - account-level policies built from rules and groups
//! 3. **AccessApplication** - protected applications with ordered policies
//! 4. **ServiceToken** - machine credentials published as Kubernetes secrets
//!
//! References between records are resolved to remote IDs on every pass, so
//! records can be applied in any order.
//!
//! ## Usage
//!
//! Configure the controller with `CLOUDFLARE_ACCOUNT_ID` and
//! `CLOUDFLARE_API_TOKEN`; see `ControllerConfig` for every setting.

use anyhow::Result;
use cloudflare_access_controller::runtime::initialization::{initialize, InitializationResult};
use cloudflare_access_controller::runtime::watch_loop::{run_controllers, spawn_shutdown_handler};

#[tokio::main]
async fn main() -> Result<()> {
    let InitializationResult { client, reconciler } = initialize().await?;

    spawn_shutdown_handler(reconciler.shutdown_flag());
    run_controllers(client, reconciler).await;

    Ok(())
}
