//! Exposure-target resolution
//!
//! Maps a Service (existing or not yet created) to the [`ExposureTarget`] a
//! route should forward to. Resolution reads the Service once and either
//! returns a complete target or fails; no partial target is ever produced.
//!
//! # Port selection
//!
//! The port selector is left empty so the router can choose, unless:
//! - the caller passes an explicit port hint, which always wins;
//! - the first TCP port of the Service is named, in which case that name is used;
//! - `force_port` is set, in which case the first TCP port's name is used, or
//!   the target port of the Service's first declared port when it has no name.

use expose_api::RoutePort;
use k8s_openapi::api::core::v1::{Service, ServicePort};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::lookup::ServiceLookup;
use crate::target::ExposureTarget;
use crate::{ExposeError, Result};

/// Parameters for exposing a Service
#[derive(Clone, Debug, Default)]
pub struct ExposeRequest {
    pub namespace: String,
    /// Service the route forwards to
    pub service_name: String,
    /// Route name; defaults to the service name when empty
    pub route_name: String,
    /// Port number or port name; empty means "not specified"
    pub port: String,
    /// Always set a port selector, even for a single unnamed port
    pub force_port: bool,
}

impl ExposeRequest {
    /// A route needs a Service to point at, whether or not it exists yet
    pub fn validate(&self) -> Result<()> {
        if self.service_name.is_empty() {
            return Err(ExposeError::InvalidConfiguration(
                "service name is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolves ExposeRequests against a ServiceLookup
pub struct ExposureResolver<L> {
    lookup: L,
}

/// How a request resolved against the looked-up Service
#[derive(Debug)]
enum Resolution<'a> {
    /// No Service and no port hint: nothing to infer a port from
    AbsentWithoutHint,
    /// No Service, but the caller named the port
    AbsentWithHint(RoutePort),
    /// Service exists but exposes no TCP port
    NoTcpPort,
    /// Service exists; `first_tcp` is its first TCP port
    Tcp {
        service: &'a Service,
        first_tcp: &'a ServicePort,
    },
}

impl<L: ServiceLookup> ExposureResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// Resolve the exposure target for a request
    pub async fn resolve(&self, request: &ExposeRequest) -> Result<ExposureTarget> {
        request.validate()?;
        let service = match self
            .lookup
            .get_service(&request.namespace, &request.service_name)
            .await
        {
            Ok(service) => service,
            Err(e) => {
                // TODO: surface lookup failures separately from "not found" so an
                // unreachable API server is not mistaken for a missing Service.
                debug!(
                    "error getting service {:?} in namespace {:?}: {}",
                    request.service_name, request.namespace, e
                );
                None
            }
        };

        let target = resolve_target(service.as_ref(), request)?;
        info!(
            "Resolved route {} -> service {} (port: {})",
            target.display_name(),
            target.destination_name(),
            describe_port(target.port_selector())
        );
        Ok(target)
    }
}

/// Resolve a target from an already fetched Service
pub fn resolve_target(
    service: Option<&Service>,
    request: &ExposeRequest,
) -> Result<ExposureTarget> {
    request.validate()?;
    let hint = parse_port_hint(&request.port);

    match classify(service, hint.clone()) {
        Resolution::AbsentWithoutHint => Err(ExposeError::MissingPort {
            service: request.service_name.clone(),
        }),
        Resolution::AbsentWithHint(port) => Ok(ExposureTarget::new(
            &request.service_name,
            &request.route_name,
            BTreeMap::new(),
            Some(port),
        )),
        Resolution::NoTcpPort => Err(ExposeError::UnsupportedProtocol {
            service: service
                .and_then(|s| s.metadata.name.clone())
                .unwrap_or_else(|| request.service_name.clone()),
        }),
        Resolution::Tcp { service, first_tcp } => {
            let labels = service.metadata.labels.clone().unwrap_or_default();
            let port = hint.or_else(|| default_port(service, first_tcp, request.force_port));
            Ok(ExposureTarget::new(
                &request.service_name,
                &request.route_name,
                labels,
                port,
            ))
        }
    }
}

fn classify(service: Option<&Service>, hint: Option<RoutePort>) -> Resolution<'_> {
    match (service, hint) {
        (None, None) => Resolution::AbsentWithoutHint,
        (None, Some(port)) => Resolution::AbsentWithHint(port),
        (Some(service), _) => match first_tcp_port(service) {
            Some(first_tcp) => Resolution::Tcp { service, first_tcp },
            None => Resolution::NoTcpPort,
        },
    }
}

/// First port speaking TCP; an unset protocol defaults to TCP
fn first_tcp_port(service: &Service) -> Option<&ServicePort> {
    service_ports(service)
        .iter()
        .find(|port| port.protocol.as_deref().unwrap_or("TCP") == "TCP")
}

fn service_ports(service: &Service) -> &[ServicePort] {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_deref())
        .unwrap_or_default()
}

/// Port selector used when the caller did not name a port
fn default_port(service: &Service, first_tcp: &ServicePort, force_port: bool) -> Option<RoutePort> {
    let name = first_tcp.name.as_deref().filter(|n| !n.is_empty());
    if name.is_none() && !force_port {
        return None;
    }
    match name {
        Some(name) => Some(RoutePort::named(name)),
        // Without a name the first declared port decides, even if it is not TCP.
        None => service_ports(service).first().map(|port| RoutePort {
            target_port: port
                .target_port
                .clone()
                .unwrap_or(IntOrString::Int(port.port)),
        }),
    }
}

/// Interpret a port hint: base-10 integers select by number, anything else by name
pub fn parse_port_hint(hint: &str) -> Option<RoutePort> {
    if hint.is_empty() {
        return None;
    }
    Some(match hint.parse::<i32>() {
        Ok(number) => RoutePort::number(number),
        Err(_) => RoutePort::named(hint),
    })
}

fn describe_port(port: Option<&RoutePort>) -> String {
    match port.map(|p| &p.target_port) {
        Some(IntOrString::Int(n)) => n.to_string(),
        Some(IntOrString::String(s)) => s.clone(),
        None => "<router default>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ServiceCatalog;
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::ServiceSpec;
    use kube::api::ObjectMeta;

    fn port(name: &str, protocol: &str, target: IntOrString) -> ServicePort {
        ServicePort {
            name: (!name.is_empty()).then(|| name.to_string()),
            protocol: Some(protocol.to_string()),
            port: 80,
            target_port: Some(target),
            ..Default::default()
        }
    }

    fn service(name: &str, ports: Vec<ServicePort>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(BTreeMap::from([("app".to_string(), name.to_string())])),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn request(service_name: &str, port: &str, force_port: bool) -> ExposeRequest {
        ExposeRequest {
            namespace: "default".to_string(),
            service_name: service_name.to_string(),
            route_name: String::new(),
            port: port.to_string(),
            force_port,
        }
    }

    async fn resolver_with(services: Vec<Service>) -> ExposureResolver<ServiceCatalog> {
        let catalog = ServiceCatalog::new();
        for svc in services {
            catalog.register_service("default", svc).await;
        }
        ExposureResolver::new(catalog)
    }

    struct FailingLookup;

    #[async_trait]
    impl ServiceLookup for FailingLookup {
        async fn get_service(&self, _namespace: &str, _name: &str) -> Result<Option<Service>> {
            Err(ExposeError::InvalidConfiguration("connection refused".to_string()))
        }
    }

    #[test]
    fn test_parse_port_hint() {
        assert_eq!(parse_port_hint(""), None);
        assert_eq!(parse_port_hint("8443"), Some(RoutePort::number(8443)));
        assert_eq!(parse_port_hint("http"), Some(RoutePort::named("http")));
        assert_eq!(parse_port_hint("80a"), Some(RoutePort::named("80a")));
        // Beyond i32 a port cannot be numeric, so the hint is taken as a name.
        assert_eq!(
            parse_port_hint("99999999999"),
            Some(RoutePort::named("99999999999"))
        );
    }

    #[tokio::test]
    async fn test_single_unnamed_port_leaves_selector_absent() {
        let resolver = resolver_with(vec![service(
            "web",
            vec![port("", "TCP", IntOrString::Int(8080))],
        )])
        .await;

        let target = resolver.resolve(&request("web", "", false)).await.unwrap();
        assert_eq!(target.destination_name(), "web");
        assert_eq!(target.display_name(), "web");
        assert_eq!(target.port_selector(), None);
        assert_eq!(target.labels()["app"], "web");
    }

    #[tokio::test]
    async fn test_named_first_tcp_port_is_selected() {
        let resolver = resolver_with(vec![service(
            "web",
            vec![
                port("http", "TCP", IntOrString::Int(8080)),
                port("metrics", "TCP", IntOrString::Int(9090)),
            ],
        )])
        .await;

        let target = resolver.resolve(&request("web", "", false)).await.unwrap();
        assert_eq!(target.port_selector(), Some(&RoutePort::named("http")));
    }

    #[tokio::test]
    async fn test_force_port_uses_first_declared_target_port() {
        let resolver = resolver_with(vec![service(
            "dns",
            vec![
                port("", "UDP", IntOrString::Int(5353)),
                port("", "TCP", IntOrString::Int(8053)),
            ],
        )])
        .await;

        let target = resolver.resolve(&request("dns", "", true)).await.unwrap();
        assert_eq!(target.port_selector(), Some(&RoutePort::number(5353)));
    }

    #[tokio::test]
    async fn test_force_port_prefers_tcp_port_name() {
        let resolver = resolver_with(vec![service(
            "dns",
            vec![
                port("dns-udp", "UDP", IntOrString::Int(5353)),
                port("dns-tcp", "TCP", IntOrString::Int(8053)),
            ],
        )])
        .await;

        let target = resolver.resolve(&request("dns", "", true)).await.unwrap();
        assert_eq!(target.port_selector(), Some(&RoutePort::named("dns-tcp")));
    }

    #[tokio::test]
    async fn test_force_port_falls_back_to_service_port() {
        let mut unset = port("", "TCP", IntOrString::Int(0));
        unset.target_port = None;
        unset.port = 8081;
        let resolver = resolver_with(vec![service("web", vec![unset])]).await;

        let target = resolver.resolve(&request("web", "", true)).await.unwrap();
        assert_eq!(target.port_selector(), Some(&RoutePort::number(8081)));
    }

    #[tokio::test]
    async fn test_explicit_hint_overrides_named_port() {
        let resolver = resolver_with(vec![service(
            "web",
            vec![port("http", "TCP", IntOrString::Int(8080))],
        )])
        .await;

        for force_port in [false, true] {
            let target = resolver.resolve(&request("web", "9000", force_port)).await.unwrap();
            assert_eq!(target.port_selector(), Some(&RoutePort::number(9000)));

            let target = resolver.resolve(&request("web", "admin", force_port)).await.unwrap();
            assert_eq!(target.port_selector(), Some(&RoutePort::named("admin")));
        }
    }

    #[tokio::test]
    async fn test_unset_protocol_counts_as_tcp() {
        let mut unset = port("http", "TCP", IntOrString::Int(8080));
        unset.protocol = None;
        let resolver = resolver_with(vec![service("web", vec![unset])]).await;

        let target = resolver.resolve(&request("web", "", false)).await.unwrap();
        assert_eq!(target.port_selector(), Some(&RoutePort::named("http")));
    }

    #[tokio::test]
    async fn test_absent_service_without_port_fails() {
        let resolver = resolver_with(vec![]).await;
        let err = resolver.resolve(&request("ghost", "", true)).await.unwrap_err();
        assert!(matches!(err, ExposeError::MissingPort { ref service } if service == "ghost"));
    }

    #[tokio::test]
    async fn test_absent_service_with_port() {
        let resolver = resolver_with(vec![]).await;
        let mut req = request("ghost", "8443", false);
        req.route_name = "edge".to_string();

        let target = resolver.resolve(&req).await.unwrap();
        assert_eq!(target.destination_name(), "ghost");
        assert_eq!(target.display_name(), "edge");
        assert!(target.labels().is_empty());
        assert_eq!(target.port_selector(), Some(&RoutePort::number(8443)));
    }

    #[tokio::test]
    async fn test_lookup_error_is_treated_as_absent() {
        let resolver = ExposureResolver::new(FailingLookup);

        let err = resolver.resolve(&request("web", "", false)).await.unwrap_err();
        assert!(matches!(err, ExposeError::MissingPort { .. }));

        let target = resolver.resolve(&request("web", "http", false)).await.unwrap();
        assert!(target.labels().is_empty());
        assert_eq!(target.port_selector(), Some(&RoutePort::named("http")));
    }

    #[tokio::test]
    async fn test_service_without_tcp_fails_for_any_hint() {
        let resolver = resolver_with(vec![service(
            "syslog",
            vec![
                port("syslog", "UDP", IntOrString::Int(514)),
                port("sctp", "SCTP", IntOrString::Int(9999)),
            ],
        )])
        .await;

        for hint in ["", "514", "syslog"] {
            for force_port in [false, true] {
                let err = resolver
                    .resolve(&request("syslog", hint, force_port))
                    .await
                    .unwrap_err();
                assert!(matches!(
                    err,
                    ExposeError::UnsupportedProtocol { ref service } if service == "syslog"
                ));
            }
        }
    }

    #[tokio::test]
    async fn test_empty_service_name_is_rejected() {
        let resolver = resolver_with(vec![]).await;

        for hint in ["", "8443"] {
            let err = resolver.resolve(&request("", hint, false)).await.unwrap_err();
            assert!(matches!(err, ExposeError::InvalidConfiguration(_)));
        }

        let web = service("web", vec![port("http", "TCP", IntOrString::Int(8080))]);
        let err = resolve_target(Some(&web), &request("", "", false)).unwrap_err();
        assert!(matches!(err, ExposeError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_service_without_ports_is_unsupported() {
        let resolver = resolver_with(vec![service("empty", vec![])]).await;
        let err = resolver.resolve(&request("empty", "80", false)).await.unwrap_err();
        assert!(matches!(err, ExposeError::UnsupportedProtocol { .. }));
    }
}
