//! # Watch Loop
//!
//! Runs one `kube-runtime` controller per record kind and restarts a
//! controller whose watch stream ends, until shutdown is requested.

use crate::controller::reconciler::{
    reconcile, ApplicationStrategy, GroupStrategy, PolicyStrategy, ReconcileStrategy, Reconciler,
    ServiceTokenStrategy,
};
use crate::crd::ManagedRecord;
use crate::runtime::error_policy::error_policy;
use futures::StreamExt;
use kube::api::Api;
use kube::Client;
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Watch every kind concurrently until shutdown
pub async fn run_controllers(client: Client, reconciler: Arc<Reconciler>) {
    info!("Starting controller watch loops...");
    futures::join!(
        run_watch_loop::<GroupStrategy>(client.clone(), Arc::clone(&reconciler)),
        run_watch_loop::<PolicyStrategy>(client.clone(), Arc::clone(&reconciler)),
        run_watch_loop::<ApplicationStrategy>(client.clone(), Arc::clone(&reconciler)),
        run_watch_loop::<ServiceTokenStrategy>(client, Arc::clone(&reconciler)),
    );
    info!("Controller stopped gracefully");
}

/// Run the controller for one kind, restarting it when the watch stream ends
pub async fn run_watch_loop<S: ReconcileStrategy>(client: Client, reconciler: Arc<Reconciler>) {
    let kind = <S::Record as ManagedRecord>::KIND;

    loop {
        if reconciler.is_shutting_down() {
            break;
        }

        let records: Api<S::Record> = Api::all(client.clone());
        let config = controller::Config::default()
            .concurrency(reconciler.config.max_concurrent_reconciliations);

        info!(kind, "Starting controller watch loop...");
        Controller::new(records, watcher::Config::default().any_semantic())
            .with_config(config)
            .shutdown_on_signal()
            .run(
                reconcile::<S>,
                error_policy::<S::Record>,
                Arc::clone(&reconciler),
            )
            .for_each(|result| async move {
                match result {
                    Ok((object, action)) => debug!(%object, ?action, "watch.event.success"),
                    // Already logged by the error policy
                    Err(controller::Error::ReconcilerFailed(_, object)) => {
                        debug!(%object, "watch.event.reconcile_failed");
                    }
                    Err(e) => warn!(kind, error = %e, "Controller stream error"),
                }
            })
            .await;

        if reconciler.is_shutting_down() {
            break;
        }

        let delay = reconciler.config.watch_restart_delay();
        warn!(
            kind,
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!(kind, "Shutdown requested, exiting watch loop");
}

/// Flip the shutdown flag on SIGINT or SIGTERM
///
/// Reconciliations in flight stop at their next remote call; the controllers
/// drain through their own signal handling.
pub fn spawn_shutdown_handler(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown.store(true, Ordering::Relaxed);
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
