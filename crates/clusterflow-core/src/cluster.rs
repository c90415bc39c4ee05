//! Cluster naming and the per-invocation cluster snapshot

use clusterflow_cloud::{Instance, InstanceBatch};
use std::fmt;

/// Fixed category of cluster node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Runs the cluster master; fault tolerance decides how many
    Primary,
    /// Runs the worker daemons
    Worker,
    /// ZooKeeper quorum member, only present in fault-tolerant clusters
    Coordinator,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Primary, Role::Worker, Role::Coordinator];

    /// Security group suffix for this role
    pub fn suffix(self) -> &'static str {
        match self {
            Role::Primary => "master",
            Role::Worker => "slaves",
            Role::Coordinator => "zoo",
        }
    }

    /// `<cluster>-<suffix>`
    pub fn group_name(self, cluster: &str) -> String {
        format!("{}-{}", cluster, self.suffix())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Group names for every role of a cluster, in [`Role::ALL`] order
pub fn group_names(cluster: &str) -> [String; 3] {
    Role::ALL.map(|role| role.group_name(cluster))
}

/// The batches that make up one cluster right now
///
/// Built by resolving or launching, used for the rest of one CLI invocation
/// and then dropped. The provider is the only source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSnapshot {
    pub primary: InstanceBatch,
    pub worker: InstanceBatch,
    pub coordinator: Option<InstanceBatch>,
}

impl ClusterSnapshot {
    pub fn new(
        primary: InstanceBatch,
        worker: InstanceBatch,
        coordinator: Option<InstanceBatch>,
    ) -> Self {
        Self {
            primary,
            worker,
            coordinator,
        }
    }

    /// The master that receives configuration and logins
    pub fn active_master(&self) -> Option<&Instance> {
        self.primary.instances.first()
    }

    /// Batches in primary, worker, coordinator order
    pub fn batches(&self) -> Vec<(Role, &InstanceBatch)> {
        let mut batches = vec![(Role::Primary, &self.primary), (Role::Worker, &self.worker)];
        if let Some(coordinator) = &self.coordinator {
            batches.push((Role::Coordinator, coordinator));
        }
        batches
    }

    /// Batches in the order they are powered on: workers first
    pub fn start_order(&self) -> Vec<(Role, &InstanceBatch)> {
        let mut batches = vec![(Role::Worker, &self.worker), (Role::Primary, &self.primary)];
        if let Some(coordinator) = &self.coordinator {
            batches.push((Role::Coordinator, coordinator));
        }
        batches
    }

    pub fn batches_mut(&mut self) -> Vec<&mut InstanceBatch> {
        let mut batches = vec![&mut self.primary, &mut self.worker];
        if let Some(coordinator) = self.coordinator.as_mut() {
            batches.push(coordinator);
        }
        batches
    }
}
