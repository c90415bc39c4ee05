//! Security group provisioning
//!
//! Groups are created once and authorized once. A group that already has
//! rules is left exactly as found, even if its rules differ from the current
//! tables below. This is create-once, not a reconciler.

use crate::cluster::Role;
use crate::error::Result;
use clusterflow_cloud::{ComputeProvider, IngressRule, SecurityGroup};
use tracing::info;

const GROUP_DESCRIPTION: &str = "clusterflow cluster group";
const ANYWHERE: &str = "0.0.0.0/0";
const SSH_PORT: u16 = 22;

/// Public TCP port ranges per role, in addition to ssh
pub fn service_ports(role: Role) -> &'static [(u16, u16)] {
    match role {
        // master web UI, JobTracker, NameNode
        Role::Primary => &[(8080, 8081), (50030, 50030), (50070, 50070)],
        // worker web UI, TaskTracker, DataNode
        Role::Worker => &[(8080, 8081), (50060, 50060), (50075, 50075)],
        // ZooKeeper client, peer and election ports
        Role::Coordinator => &[(2181, 2181), (2888, 2888), (3888, 3888)],
    }
}

/// The three groups of one cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterGroups {
    pub master: SecurityGroup,
    pub slaves: SecurityGroup,
    pub zoo: SecurityGroup,
}

impl ClusterGroups {
    pub fn get(&self, role: Role) -> &SecurityGroup {
        match role {
            Role::Primary => &self.master,
            Role::Worker => &self.slaves,
            Role::Coordinator => &self.zoo,
        }
    }

    pub fn names(&self) -> [&str; 3] {
        [
            self.master.name.as_str(),
            self.slaves.name.as_str(),
            self.zoo.name.as_str(),
        ]
    }

    /// Full rule set a freshly created group of `role` receives
    pub fn rules_for(&self, role: Role) -> Vec<IngressRule> {
        let mut rules: Vec<IngressRule> = [&self.master, &self.slaves, &self.zoo]
            .into_iter()
            .map(IngressRule::from_group)
            .collect();
        rules.push(IngressRule::tcp(SSH_PORT, SSH_PORT, ANYWHERE));
        rules.extend(
            service_ports(role)
                .iter()
                .map(|&(from, to)| IngressRule::tcp(from, to, ANYWHERE)),
        );
        rules
    }

    fn get_mut(&mut self, role: Role) -> &mut SecurityGroup {
        match role {
            Role::Primary => &mut self.master,
            Role::Worker => &mut self.slaves,
            Role::Coordinator => &mut self.zoo,
        }
    }
}

/// Creates and authorizes cluster groups
pub struct GroupProvisioner<'a> {
    provider: &'a dyn ComputeProvider,
}

impl<'a> GroupProvisioner<'a> {
    pub fn new(provider: &'a dyn ComputeProvider) -> Self {
        Self { provider }
    }

    /// Get the group with exactly this name, creating it empty if missing
    pub async fn ensure_group(&self, name: &str) -> Result<SecurityGroup> {
        let groups = self.provider.list_security_groups().await?;
        if let Some(group) = groups.into_iter().find(|g| g.name == name) {
            return Ok(group);
        }

        info!("Creating security group {}", name);
        Ok(self
            .provider
            .create_security_group(name, GROUP_DESCRIPTION)
            .await?)
    }

    /// Ensure all three groups exist; authorize the ones that have no rules
    pub async fn ensure_cluster_groups(&self, cluster: &str) -> Result<ClusterGroups> {
        let mut groups = ClusterGroups {
            master: self.ensure_group(&Role::Primary.group_name(cluster)).await?,
            slaves: self.ensure_group(&Role::Worker.group_name(cluster)).await?,
            zoo: self.ensure_group(&Role::Coordinator.group_name(cluster)).await?,
        };

        for role in Role::ALL {
            // An empty rule set means the group was just created
            if !groups.get(role).rules.is_empty() {
                continue;
            }

            let rules = groups.rules_for(role);
            let group = groups.get(role).clone();
            for rule in &rules {
                tracing::debug!("Authorizing {} on {}", rule, group.name);
                self.provider.authorize_ingress(&group, rule).await?;
            }
            groups.get_mut(role).rules = rules;
        }

        Ok(groups)
    }
}
