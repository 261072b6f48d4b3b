//! # Configuration
//!
//! Controller-level configuration threaded into every reconciler.
//!
//! - `controller`: settings loaded from environment variables
//! - `account`: per-record Cloudflare account resolution

mod account;
mod controller;

pub use account::resolve_account_id;
pub use controller::ControllerConfig;
