//! Provider-side resources as seen by the controller
//!
//! Every value here is a transient, read-only view. The provider owns the
//! real state; callers re-query instead of mutating these structs.

use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle state of a compute instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

impl InstanceState {
    /// Active means "part of the cluster": not terminating or terminated.
    /// Stopped instances count, since a stopped cluster can be started again.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            InstanceState::Pending
                | InstanceState::Running
                | InstanceState::Stopping
                | InstanceState::Stopped
        )
    }

    pub fn is_pending(self) -> bool {
        self == InstanceState::Pending
    }

    /// Whether a stop or start request still makes sense for this instance
    pub fn accepts_power_change(self) -> bool {
        !matches!(
            self,
            InstanceState::ShuttingDown | InstanceState::Terminated
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single compute instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub state: InstanceState,
    /// Public DNS name; empty until the provider assigns one
    pub public_address: Option<String>,
}

impl Instance {
    pub fn new(id: impl Into<String>, state: InstanceState) -> Self {
        Self {
            id: id.into(),
            state,
            public_address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.public_address = Some(address.into());
        self
    }

    /// Public address, or an empty string while none is assigned
    pub fn address(&self) -> &str {
        self.public_address.as_deref().unwrap_or_default()
    }
}

/// The instances created together by one provisioning request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceBatch {
    /// Provider batch identifier (an EC2 reservation id)
    pub id: String,

    /// Instances in launch order
    pub instances: Vec<Instance>,

    /// Names of every security group attached to the batch
    pub group_names: BTreeSet<String>,
}

impl InstanceBatch {
    pub fn new(
        id: impl Into<String>,
        instances: Vec<Instance>,
        group_names: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            id: id.into(),
            instances,
            group_names: group_names.into_iter().collect(),
        }
    }

    pub fn instance_ids(&self) -> Vec<String> {
        self.instances.iter().map(|i| i.id.clone()).collect()
    }

    pub fn has_active(&self) -> bool {
        self.instances.iter().any(|i| i.state.is_active())
    }

    /// Whether the batch is attached to exactly one group, with this name
    pub fn belongs_only_to(&self, group_name: &str) -> bool {
        self.group_names.len() == 1 && self.group_names.contains(group_name)
    }

    /// Whether the batch is attached to any of the given groups
    pub fn touches_any<'a>(&self, group_names: impl IntoIterator<Item = &'a str>) -> bool {
        group_names
            .into_iter()
            .any(|name| self.group_names.contains(name))
    }

    /// Drop instances that are terminating or already gone
    pub fn retain_active(&mut self) {
        self.instances.retain(|i| i.state.is_active());
    }

    /// Public addresses in launch order
    pub fn addresses(&self) -> Vec<&str> {
        self.instances.iter().map(Instance::address).collect()
    }

    /// Replace the cached view of each instance with a fresher one.
    /// Instances the provider did not report keep their previous view.
    pub fn refresh_from(&mut self, fresh: &[Instance]) {
        for instance in &mut self.instances {
            if let Some(update) = fresh.iter().find(|f| f.id == instance.id) {
                *instance = update.clone();
            }
        }
    }
}

/// Inbound firewall rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressRule {
    /// All traffic from members of another group
    FromGroup { group_id: String, group_name: String },

    /// A TCP port range open to a CIDR block
    Tcp {
        from_port: u16,
        to_port: u16,
        cidr: String,
    },
}

impl IngressRule {
    pub fn from_group(group: &SecurityGroup) -> Self {
        IngressRule::FromGroup {
            group_id: group.id.clone(),
            group_name: group.name.clone(),
        }
    }

    pub fn tcp(from_port: u16, to_port: u16, cidr: impl Into<String>) -> Self {
        IngressRule::Tcp {
            from_port,
            to_port,
            cidr: cidr.into(),
        }
    }
}

impl fmt::Display for IngressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngressRule::FromGroup { group_name, .. } => write!(f, "all from {}", group_name),
            IngressRule::Tcp {
                from_port,
                to_port,
                cidr,
            } if from_port == to_port => write!(f, "tcp {} from {}", from_port, cidr),
            IngressRule::Tcp {
                from_port,
                to_port,
                cidr,
            } => write!(f, "tcp {}-{} from {}", from_port, to_port, cidr),
        }
    }
}

/// A named firewall group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub rules: Vec<IngressRule>,
}

impl SecurityGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rules: Vec::new(),
        }
    }
}

/// Machine image to boot instances from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineImage {
    pub id: String,
    pub name: Option<String>,
}

/// Extra block volume attached to every instance of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    pub device: String,
    pub size_gb: u32,
    pub delete_on_termination: bool,
}

/// One provisioning request; the provider turns it into one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub image_id: String,
    pub key_pair: Option<String>,
    pub security_group: String,
    pub instance_type: String,
    pub zone: String,
    pub count: u32,
    pub volume: Option<VolumeSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(groups: &[&str], states: &[InstanceState]) -> InstanceBatch {
        let instances = states
            .iter()
            .enumerate()
            .map(|(n, s)| Instance::new(format!("i-{}", n), *s))
            .collect();
        InstanceBatch::new("r-1", instances, groups.iter().map(|g| g.to_string()))
    }

    /// Anything short of shutting down counts as active
    #[test]
    fn test_active_states() {
        assert!(InstanceState::Pending.is_active());
        assert!(InstanceState::Stopped.is_active());
        assert!(!InstanceState::ShuttingDown.is_active());
        assert!(!InstanceState::Terminated.is_active());
    }

    /// Group membership checks see every group of a batch
    #[test]
    fn test_belongs_only_to() {
        let single = batch(&["demo-master"], &[InstanceState::Running]);
        assert!(single.belongs_only_to("demo-master"));
        assert!(!single.belongs_only_to("demo-slaves"));

        let double = batch(&["demo-master", "demo-slaves"], &[InstanceState::Running]);
        assert!(!double.belongs_only_to("demo-master"));
        assert!(double.touches_any(["demo-slaves"]));
    }

    /// Terminated instances are dropped from a batch
    #[test]
    fn test_retain_active() {
        let mut b = batch(
            &["demo-master"],
            &[InstanceState::Terminated, InstanceState::Running],
        );
        b.retain_active();
        assert_eq!(b.instance_ids(), vec!["i-1".to_string()]);
    }

    /// Instances missing from a refresh keep their last state
    #[test]
    fn test_refresh_from_keeps_unreported() {
        let mut b = batch(
            &["demo-master"],
            &[InstanceState::Pending, InstanceState::Pending],
        );
        let fresh = vec![Instance::new("i-0", InstanceState::Running).with_address("a.example")];
        b.refresh_from(&fresh);

        assert_eq!(b.instances[0].state, InstanceState::Running);
        assert_eq!(b.instances[0].address(), "a.example");
        assert_eq!(b.instances[1].state, InstanceState::Pending);
        assert_eq!(b.instances[1].address(), "");
    }

    /// Rules print as `tcp <ports> from <source>`
    #[test]
    fn test_rule_display() {
        assert_eq!(IngressRule::tcp(22, 22, "0.0.0.0/0").to_string(), "tcp 22 from 0.0.0.0/0");
        assert_eq!(
            IngressRule::tcp(8080, 8081, "0.0.0.0/0").to_string(),
            "tcp 8080-8081 from 0.0.0.0/0"
        );
    }
}
