/// API version v1 for route resources

pub mod route;

pub use route::{Route, RoutePort, RouteSpec, RouteTargetReference};

/// API group for route resources
pub const API_GROUP: &str = "route.openshift.io";
/// API version for route resources
pub const API_VERSION: &str = "v1";
