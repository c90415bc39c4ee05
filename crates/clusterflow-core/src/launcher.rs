//! Provision the batches of a new cluster

use crate::cluster::{ClusterSnapshot, Role};
use crate::error::{ClusterError, Result};
use crate::groups::GroupProvisioner;
use clusterflow_cloud::{ComputeProvider, InstanceBatch, LaunchRequest, VolumeSpec};
use tracing::info;

/// Size of the coordinator quorum in fault-tolerant clusters
pub const COORDINATOR_COUNT: u32 = 3;

/// Device the optional block volume is attached as
pub const VOLUME_DEVICE: &str = "/dev/sdv";

/// Sizing and placement of a new cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub slaves: u32,
    /// Number of primaries; above 1 also adds the coordinator quorum
    pub fault_tolerance: u32,
    pub key_pair: Option<String>,
    pub instance_type: String,
    pub master_instance_type: Option<String>,
    pub zone: String,
    pub image_id: String,
    /// Size of the extra volume in GB; 0 means none
    pub ebs_vol_size: u32,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            slaves: 1,
            fault_tolerance: 1,
            key_pair: None,
            instance_type: "m1.large".to_string(),
            master_instance_type: None,
            zone: "us-east-1b".to_string(),
            image_id: "ami-f8806a91".to_string(),
            ebs_vol_size: 0,
        }
    }
}

impl LaunchOptions {
    pub fn validate(&self) -> Result<()> {
        if self.slaves < 1 {
            return Err(ClusterError::Validation(
                "Number of slaves must be at least 1".to_string(),
            ));
        }
        if self.fault_tolerance < 1 {
            return Err(ClusterError::Validation(
                "Fault tolerance must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Instance type used by the primary batch
    pub fn master_type(&self) -> &str {
        self.master_instance_type
            .as_deref()
            .unwrap_or(&self.instance_type)
    }

    fn volume(&self) -> Option<VolumeSpec> {
        (self.ebs_vol_size > 0).then(|| VolumeSpec {
            device: VOLUME_DEVICE.to_string(),
            size_gb: self.ebs_vol_size,
            delete_on_termination: true,
        })
    }

    fn request(&self, cluster: &str, role: Role, instance_type: &str, count: u32) -> LaunchRequest {
        LaunchRequest {
            image_id: self.image_id.clone(),
            key_pair: self.key_pair.clone(),
            security_group: role.group_name(cluster),
            instance_type: instance_type.to_string(),
            zone: self.zone.clone(),
            count,
            volume: self.volume(),
        }
    }
}

pub struct Launcher<'a> {
    provider: &'a dyn ComputeProvider,
}

impl<'a> Launcher<'a> {
    pub fn new(provider: &'a dyn ComputeProvider) -> Self {
        Self { provider }
    }

    /// Create groups and provision workers, primaries and coordinators.
    /// Refuses when any of the cluster's groups already has an active instance.
    pub async fn launch(&self, cluster: &str, opts: &LaunchOptions) -> Result<ClusterSnapshot> {
        opts.validate()?;
        info!("Setting up security groups...");
        let groups = GroupProvisioner::new(self.provider)
            .ensure_cluster_groups(cluster)
            .await?;

        self.check_conflicts(&groups.names()).await?;

        let image = self
            .provider
            .find_image(&opts.image_id)
            .await?
            .ok_or_else(|| ClusterError::ImageNotFound(opts.image_id.clone()))?;
        info!(
            "Using image {} ({})",
            image.id,
            image.name.as_deref().unwrap_or("unnamed")
        );

        let worker = self
            .run(opts.request(cluster, Role::Worker, &opts.instance_type, opts.slaves))
            .await?;
        info!("Launched {} slaves, regid = {}", opts.slaves, worker.id);

        let primary = self
            .run(opts.request(cluster, Role::Primary, opts.master_type(), opts.fault_tolerance))
            .await?;
        info!("Launched master, regid = {}", primary.id);

        let coordinator = if opts.fault_tolerance > 1 {
            let zoo = self
                .run(opts.request(
                    cluster,
                    Role::Coordinator,
                    &opts.instance_type,
                    COORDINATOR_COUNT,
                ))
                .await?;
            info!("Launched zoo, regid = {}", zoo.id);
            Some(zoo)
        } else {
            None
        };

        Ok(ClusterSnapshot::new(primary, worker, coordinator))
    }

    /// Read-then-act check; a concurrent launch of the same name can still race
    async fn check_conflicts(&self, group_names: &[&str]) -> Result<()> {
        let batches = self.provider.list_batches().await?;
        let conflicting: Vec<String> = group_names
            .iter()
            .filter(|name| {
                batches
                    .iter()
                    .any(|batch| batch.has_active() && batch.touches_any([**name]))
            })
            .map(|name| name.to_string())
            .collect();

        if conflicting.is_empty() {
            Ok(())
        } else {
            Err(ClusterError::ClusterConflict {
                groups: conflicting,
            })
        }
    }

    async fn run(&self, request: LaunchRequest) -> Result<InstanceBatch> {
        tracing::debug!(
            "Requesting {} x {} in {}",
            request.count,
            request.instance_type,
            request.security_group
        );
        Ok(self.provider.run_instances(&request).await?)
    }
}
