//! Convergence checks against live cluster state

use k8s_openapi::api::apps::v1::DaemonSet;
use kube::api::ListParams;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::{debug, info};

use crate::poll::{poll_until, Acceptance, PollConfig};
use crate::Result;

/// Accept a DaemonSet whose first pod volume mounts `expected_secret`
///
/// A DaemonSet mounting a different secret has converged on the wrong value,
/// so it is reported as a mismatch rather than retried.
pub fn daemonset_volume_secret(daemonset: &DaemonSet, expected_secret: &str) -> Acceptance {
    let first_volume = daemonset
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .and_then(|pod| pod.volumes.as_ref())
        .and_then(|volumes| volumes.first());

    let Some(volume) = first_volume else {
        return Acceptance::Mismatch("daemonset pod template has no volumes".to_string());
    };

    match volume.secret.as_ref().and_then(|s| s.secret_name.as_deref()) {
        Some(name) if name == expected_secret => Acceptance::Converged,
        Some(name) => Acceptance::Mismatch(format!(
            "volume secret name {} does not match expectation {}",
            name, expected_secret
        )),
        None => Acceptance::Mismatch(format!(
            "volume {} is not backed by a secret, expected {}",
            volume.name, expected_secret
        )),
    }
}

/// Accept once a listed resource set is empty
pub fn list_is_empty<K>(items: &[K]) -> Acceptance {
    if items.is_empty() {
        Acceptance::Converged
    } else {
        debug!("{} resources remaining", items.len());
        Acceptance::NotYet
    }
}

/// Wait for a DaemonSet to mount the expected secret in its first volume
pub async fn wait_for_daemonset_secret(
    client: Client,
    namespace: &str,
    name: &str,
    expected_secret: &str,
    config: &PollConfig,
) -> Result<DaemonSet> {
    config.validate()?;
    info!(
        "Waiting for daemonset {}/{} to mount secret {}",
        namespace, name, expected_secret
    );

    let daemonsets: Api<DaemonSet> = Api::namespaced(client, namespace);
    poll_until(
        config,
        || daemonsets.get(name),
        |ds| daemonset_volume_secret(ds, expected_secret),
    )
    .await
    .into_result()
}

/// Wait until no resources match `params` in the given Api
pub async fn wait_for_empty<K>(api: &Api<K>, params: &ListParams, config: &PollConfig) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    config.validate()?;
    poll_until(
        config,
        || api.list(params),
        |list| list_is_empty(&list.items),
    )
    .await
    .into_result()
    .map(|_| ())
}
