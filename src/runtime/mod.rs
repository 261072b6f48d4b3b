//! # Runtime
//!
//! Process-level plumbing around the reconciler.
//!
//! - `initialization`: rustls, tracing, configuration and client setup
//! - `watch_loop`: one `kube-runtime` controller per record kind
//! - `error_policy`: requeue decisions for failed reconciliations

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
