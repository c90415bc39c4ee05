//! Find the live batches of an existing cluster

use crate::cluster::{ClusterSnapshot, Role};
use crate::error::{ClusterError, Result};
use clusterflow_cloud::{ComputeProvider, InstanceBatch};
use tracing::{info, warn};

/// Resolve the current snapshot of `cluster` from the provider
///
/// A batch counts for a role only when it is attached to exactly one group,
/// `<cluster>-<suffix>`, and still has an active instance. Batches attached
/// to several groups never match any role.
pub async fn resolve_existing(
    provider: &dyn ComputeProvider,
    cluster: &str,
) -> Result<ClusterSnapshot> {
    info!("Searching for existing cluster {}...", cluster);

    let mut primary: Option<InstanceBatch> = None;
    let mut worker: Option<InstanceBatch> = None;
    let mut coordinator: Option<InstanceBatch> = None;

    for mut batch in provider.list_batches().await? {
        if !batch.has_active() {
            continue;
        }

        let Some(role) = Role::ALL
            .into_iter()
            .find(|role| batch.belongs_only_to(&role.group_name(cluster)))
        else {
            continue;
        };

        batch.retain_active();
        let slot = match role {
            Role::Primary => &mut primary,
            Role::Worker => &mut worker,
            Role::Coordinator => &mut coordinator,
        };
        if let Some(previous) = slot.as_ref() {
            warn!(
                "Several active {} batches found; using {} instead of {}",
                role, batch.id, previous.id
            );
        }
        *slot = Some(batch);
    }

    match (primary, worker) {
        (Some(primary), Some(worker)) => {
            info!("Found master regid: {}", primary.id);
            info!("Found slave regid: {}", worker.id);
            if let Some(zoo) = &coordinator {
                info!("Found zoo regid: {}", zoo.id);
            }
            Ok(ClusterSnapshot::new(primary, worker, coordinator))
        }
        (None, Some(_)) => Err(partial(cluster, Role::Primary)),
        (Some(_), None) => Err(partial(cluster, Role::Worker)),
        (None, None) => Err(ClusterError::NotFound(cluster.to_string())),
    }
}

fn partial(cluster: &str, missing: Role) -> ClusterError {
    ClusterError::PartialCluster {
        cluster: cluster.to_string(),
        role: missing,
        group: missing.group_name(cluster),
    }
}
