//! Core exposure and convergence functionality
//!
//! This library provides:
//! - Exposure-target resolution from live Service definitions
//! - Service lookup against the cluster or an in-memory catalog
//! - A bounded convergence poller for verifying cluster state
//! - Convergence checks for DaemonSets and resource lists

pub mod catalog;
pub mod checks;
pub mod error;
pub mod lookup;
pub mod poll;
pub mod resolver;
pub mod target;

pub use catalog::ServiceCatalog;
pub use error::{ExposeError, Result};
pub use lookup::{KubeServiceLookup, ServiceLookup};
pub use poll::{poll_until, Acceptance, PollConfig, PollResult};
pub use resolver::{ExposeRequest, ExposureResolver};
pub use target::ExposureTarget;
