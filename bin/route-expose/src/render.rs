//! Output rendering and manifest loading for the CLI

use anyhow::{bail, Result};
use clap::ValueEnum;
use expose_api::Route;
use expose_core::ServiceCatalog;
use k8s_openapi::api::core::v1::Service;
use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

pub fn render_route(route: &Route, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Yaml => serde_yaml::to_string(route)?,
        OutputFormat::Json => serde_json::to_string_pretty(route)?,
    })
}

/// Parse every Service document in a multi-document YAML stream
///
/// Documents of other kinds are skipped.
pub fn load_services(manifests: &str) -> Result<Vec<Service>> {
    let mut services = Vec::new();
    for document in serde_yaml::Deserializer::from_str(manifests) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        match value.get("kind").and_then(|k| k.as_str()) {
            Some("Service") => services.push(serde_yaml::from_value(value)?),
            Some(_) => continue,
            None => bail!("manifest document without a kind"),
        }
    }
    Ok(services)
}

/// Load the Services in `manifests` into a catalog
///
/// Each Service is registered under its own `metadata.namespace`, or under
/// `default_namespace` when the manifest leaves it unset.
pub async fn load_catalog(manifests: &str, default_namespace: &str) -> Result<ServiceCatalog> {
    let catalog = ServiceCatalog::new();
    for service in load_services(manifests)? {
        let namespace = service
            .metadata
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| default_namespace.to_string());
        catalog.register_service(&namespace, service).await;
    }
    Ok(catalog)
}
