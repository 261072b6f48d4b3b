//! Cloudflare Access Controller Library
//!
//! This library provides the core functionality for the Cloudflare Access
//! Controller: the custom resources, the Cloudflare Access client, record
//! stores and the reconciliation engine.
//! Tests are included in the module files and under `tests/`.

// Re-export modules so they can be tested
pub mod cloudflare;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod runtime;
pub mod store;
