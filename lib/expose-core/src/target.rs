//! Exposure targets produced by the resolver

use expose_api::{Route, RoutePort, RouteSpec, RouteTargetReference};
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

/// Resolved description of which Service, and optionally which port, a route
/// forwards traffic to
#[derive(Clone, Debug, PartialEq)]
pub struct ExposureTarget {
    destination_name: String,
    display_name: String,
    labels: BTreeMap<String, String>,
    port_selector: Option<RoutePort>,
}

impl ExposureTarget {
    /// An empty `display_name` falls back to `destination_name`.
    pub(crate) fn new(
        destination_name: &str,
        display_name: &str,
        labels: BTreeMap<String, String>,
        port_selector: Option<RoutePort>,
    ) -> Self {
        let display_name = if display_name.is_empty() {
            destination_name
        } else {
            display_name
        };
        Self {
            destination_name: destination_name.to_string(),
            display_name: display_name.to_string(),
            labels,
            port_selector,
        }
    }

    pub fn destination_name(&self) -> &str {
        &self.destination_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn port_selector(&self) -> Option<&RoutePort> {
        self.port_selector.as_ref()
    }

    /// Build the Route that forwards to this target
    ///
    /// Host, path and TLS are left to the caller.
    pub fn to_route(&self, namespace: Option<&str>) -> Route {
        let mut route = Route::new(
            &self.display_name,
            RouteSpec {
                host: None,
                path: None,
                to: RouteTargetReference::service(&self.destination_name),
                port: self.port_selector.clone(),
            },
        );
        route.metadata = ObjectMeta {
            name: Some(self.display_name.clone()),
            namespace: namespace.map(str::to_string),
            labels: (!self.labels.is_empty()).then(|| self.labels.clone()),
            ..Default::default()
        };
        route
    }
}
