//! Service lookup against the cluster

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use tracing::debug;

use crate::Result;

/// Read-only access to Service definitions
///
/// `Ok(None)` means the Service does not exist. Implementations must be safe
/// to share between concurrent resolutions.
#[async_trait]
pub trait ServiceLookup: Send + Sync {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;
}

/// ServiceLookup backed by the Kubernetes API
pub struct KubeServiceLookup {
    client: Client,
}

impl KubeServiceLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ServiceLookup for KubeServiceLookup {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let service = services.get_opt(name).await?;
        debug!(
            "Looked up service {}/{}: {}",
            namespace,
            name,
            if service.is_some() { "found" } else { "not found" }
        );
        Ok(service)
    }
}
