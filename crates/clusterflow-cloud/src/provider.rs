//! Compute provider trait definition

use crate::error::Result;
use crate::model::{IngressRule, Instance, InstanceBatch, LaunchRequest, MachineImage, SecurityGroup};
use async_trait::async_trait;

/// Compute provider abstraction trait
///
/// The controller only ever talks to the cloud through this trait, so tests
/// can substitute an in-memory account. Every call is a single attempt;
/// retries, if any, belong to the implementation's transport.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Returns the provider name (e.g., "ec2")
    fn name(&self) -> &str;

    /// List every security group visible to the account
    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>>;

    /// Create an empty security group
    async fn create_security_group(&self, name: &str, description: &str)
    -> Result<SecurityGroup>;

    /// Add one inbound rule to a group
    async fn authorize_ingress(&self, group: &SecurityGroup, rule: &IngressRule) -> Result<()>;

    /// List every instance batch visible to the account, including batches
    /// whose instances are all terminated
    async fn list_batches(&self) -> Result<Vec<InstanceBatch>>;

    /// Current view of the given instances
    async fn describe_instances(&self, instance_ids: &[String]) -> Result<Vec<Instance>>;

    /// Look up a machine image; `None` when the id is unknown
    async fn find_image(&self, image_id: &str) -> Result<Option<MachineImage>>;

    /// Provision `request.count` instances as one batch
    async fn run_instances(&self, request: &LaunchRequest) -> Result<InstanceBatch>;

    async fn terminate_instance(&self, instance_id: &str) -> Result<()>;

    async fn stop_instance(&self, instance_id: &str) -> Result<()>;

    async fn start_instance(&self, instance_id: &str) -> Result<()>;
}
