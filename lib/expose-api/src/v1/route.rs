use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Route exposes a Service to traffic from outside the cluster
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "route.openshift.io",
    version = "v1",
    kind = "Route",
    plural = "routes",
    namespaced,
    printcolumn = r#"{"name":"Service","type":"string","jsonPath":".spec.to.name"}"#,
    printcolumn = r#"{"name":"Port","type":"string","jsonPath":".spec.port.targetPort"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Optional host name; the router assigns one when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Optional path prefix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Service the route points at
    pub to: RouteTargetReference,

    /// Target port on the Service; the router picks one when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,
}

/// Reference to the backend of a route
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteTargetReference {
    /// Kind of the referent (always "Service")
    #[serde(default = "default_target_kind")]
    pub kind: String,

    /// Name of the Service
    pub name: String,

    /// Relative weight when several backends are configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

impl RouteTargetReference {
    /// Reference a Service by name
    pub fn service(name: impl Into<String>) -> Self {
        Self {
            kind: default_target_kind(),
            name: name.into(),
            weight: None,
        }
    }
}

/// Port selector for a route
///
/// The target port is either a port number or the name of a Service port.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    pub target_port: IntOrString,
}

impl RoutePort {
    pub fn number(port: i32) -> Self {
        Self {
            target_port: IntOrString::Int(port),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            target_port: IntOrString::String(name.into()),
        }
    }

    /// Whether the selector names a port rather than numbering it
    pub fn is_named(&self) -> bool {
        matches!(self.target_port, IntOrString::String(_))
    }
}

fn default_target_kind() -> String {
    "Service".to_string()
}
