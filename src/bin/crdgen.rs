//! # CRD Generator
//!
//! Generates the CustomResourceDefinition YAML for every Access resource.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/cloudflare-access.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use cloudflare_access_controller::crd::{
    AccessApplication, AccessGroup, ReusablePolicy, ServiceToken,
};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::core::CustomResourceExt;

/// Render CRDs as one multi-document YAML stream
fn render(crds: &[CustomResourceDefinition]) -> Result<String> {
    let mut out = String::from(
        "# This file is auto-generated by crdgen\n# DO NOT EDIT THIS FILE MANUALLY\n",
    );
    for crd in crds {
        let name = crd.metadata.name.as_deref().unwrap_or("unknown");
        let yaml =
            serde_yaml::to_string(crd).with_context(|| format!("Failed to serialize CRD {name}"))?;
        out.push_str("---\n");
        out.push_str(&yaml);
    }
    Ok(out)
}

fn main() -> Result<()> {
    let crds = [
        AccessGroup::crd(),
        ReusablePolicy::crd(),
        AccessApplication::crd(),
        ServiceToken::crd(),
    ];
    print!("{}", render(&crds)?);
    Ok(())
}
