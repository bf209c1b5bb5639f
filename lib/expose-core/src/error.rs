use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExposeError>;

#[derive(Error, Debug)]
pub enum ExposeError {
    #[error("you need to provide a route port when exposing non-existent service {service:?}")]
    MissingPort { service: String },

    #[error("service {service:?} doesn't support TCP")]
    UnsupportedProtocol { service: String },

    #[error("converged to an unexpected state: {0}")]
    Mismatch(String),

    #[error("timed out after {ticks} checks in {elapsed:?}{}", fetch_context(.last_error))]
    Timeout {
        ticks: u32,
        elapsed: Duration,
        last_error: Option<String>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Kubernetes error: {0}")]
    KubernetesError(#[from] kube::Error),
}

fn fetch_context(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(": last fetch error: {}", e),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_includes_last_error() {
        let err = ExposeError::Timeout {
            ticks: 5,
            elapsed: Duration::from_secs(5),
            last_error: Some("daemonsets \"router\" not found".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "timed out after 5 checks in 5s: last fetch error: daemonsets \"router\" not found"
        );
    }

    #[test]
    fn test_timeout_message_without_last_error() {
        let err = ExposeError::Timeout {
            ticks: 2,
            elapsed: Duration::from_secs(2),
            last_error: None,
        };
        assert_eq!(err.to_string(), "timed out after 2 checks in 2s");
    }
}
