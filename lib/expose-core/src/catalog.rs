//! In-memory catalog of Service definitions

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::lookup::ServiceLookup;
use crate::Result;

/// ServiceCatalog holds Service definitions keyed by namespace/name
///
/// Used for offline resolution, where the Services come from manifests
/// rather than a live cluster.
#[derive(Clone)]
pub struct ServiceCatalog {
    services: Arc<RwLock<HashMap<String, Service>>>,
}

impl ServiceCatalog {
    pub fn new() -> Self {
        Self {
            services: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register or replace a service under the given namespace
    pub async fn register_service(&self, namespace: &str, service: Service) {
        let name = service.metadata.name.clone().unwrap_or_default();
        let service_id = service_key(namespace, &name);

        let mut services = self.services.write().await;
        services.insert(service_id.clone(), service);

        debug!("Registered service: {}", service_id);
    }

    /// Get count of registered services
    pub async fn service_count(&self) -> usize {
        let services = self.services.read().await;
        services.len()
    }
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceLookup for ServiceCatalog {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        let services = self.services.read().await;
        Ok(services.get(&service_key(namespace, name)).cloned())
    }
}

fn service_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}
