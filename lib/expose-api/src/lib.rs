//! Route API types for exposing Kubernetes Services
//!
//! This library defines the custom resources produced when a Service is exposed:
//! - Route: routes external traffic to a Service, optionally pinned to a target port

pub mod v1;

pub use v1::{Route, RoutePort, RouteSpec, RouteTargetReference};
