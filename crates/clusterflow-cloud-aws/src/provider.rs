//! EC2 provider implementation

use crate::convert;
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::config::{Credentials, Region};
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ec2::types::{BlockDeviceMapping, EbsBlockDevice, InstanceType, Placement};
use clusterflow_cloud::{
    ComputeProvider, IngressRule, Instance, InstanceBatch, LaunchRequest, MachineImage,
    SecurityGroup,
};

/// Error codes EC2 uses for an unknown or malformed image id
const IMAGE_NOT_FOUND_CODES: &[&str] = &["InvalidAMIID.NotFound", "InvalidAMIID.Malformed"];

/// Error codes EC2 uses for rejected credentials or missing permissions
const AUTH_FAILURE_CODES: &[&str] = &["AuthFailure", "UnauthorizedOperation"];

fn api_error<E>(err: E) -> AwsError
where
    E: std::error::Error + ProvideErrorMetadata,
{
    let denied = err.code().is_some_and(|code| AUTH_FAILURE_CODES.contains(&code));
    let message = DisplayErrorContext(err).to_string();
    if denied {
        AwsError::Unauthorized(message)
    } else {
        AwsError::Api(message)
    }
}

/// EC2 provider
pub struct Ec2Provider {
    client: Client,
    region: String,
}

impl Ec2Provider {
    /// Build a client for the region that contains `zone`
    pub async fn connect(
        credentials: &clusterflow_config::Credentials,
        zone: &str,
    ) -> Result<Self> {
        let region = convert::region_for_zone(zone)?;
        let sdk_credentials = Credentials::new(
            credentials.access_key_id.as_str(),
            credentials.secret_access_key.as_str(),
            None,
            None,
            "clusterflow-environment",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .credentials_provider(sdk_credentials)
            .load()
            .await;

        tracing::debug!("Connected EC2 client for region {}", region);

        Ok(Self {
            client: Client::new(&sdk_config),
            region,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn list_security_groups_inner(&self) -> Result<Vec<SecurityGroup>> {
        let mut groups = Vec::new();
        let mut next_token = None;

        loop {
            let output = self
                .client
                .describe_security_groups()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(api_error)?;

            groups.extend(output.security_groups().iter().map(convert::security_group));

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(groups)
    }

    async fn list_batches_inner(&self) -> Result<Vec<InstanceBatch>> {
        let mut batches = Vec::new();
        let mut next_token = None;

        loop {
            let output = self
                .client
                .describe_instances()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(api_error)?;

            batches.extend(output.reservations().iter().map(convert::batch));

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        tracing::debug!("Found {} reservations", batches.len());
        Ok(batches)
    }

    async fn run_instances_inner(&self, request: &LaunchRequest) -> Result<InstanceBatch> {
        let count =
            i32::try_from(request.count).map_err(|_| AwsError::InvalidCount(request.count))?;

        let mut call = self
            .client
            .run_instances()
            .image_id(&request.image_id)
            .min_count(count)
            .max_count(count)
            .security_groups(&request.security_group)
            .instance_type(InstanceType::from(request.instance_type.as_str()))
            .placement(
                Placement::builder()
                    .availability_zone(&request.zone)
                    .build(),
            );

        if let Some(key_pair) = &request.key_pair {
            call = call.key_name(key_pair);
        }

        if let Some(volume) = &request.volume {
            let size = i32::try_from(volume.size_gb)
                .map_err(|_| AwsError::InvalidVolumeSize(volume.size_gb))?;
            call = call.block_device_mappings(
                BlockDeviceMapping::builder()
                    .device_name(&volume.device)
                    .ebs(
                        EbsBlockDevice::builder()
                            .volume_size(size)
                            .delete_on_termination(volume.delete_on_termination)
                            .build(),
                    )
                    .build(),
            );
        }

        tracing::debug!(
            "RunInstances image={} type={} count={} group={}",
            request.image_id,
            request.instance_type,
            request.count,
            request.security_group
        );

        let output = call.send().await.map_err(api_error)?;
        let reservation_id = output
            .reservation_id()
            .ok_or(AwsError::MissingField("reservation id"))?;

        Ok(InstanceBatch::new(
            reservation_id,
            output.instances().iter().map(convert::instance).collect(),
            [request.security_group.clone()],
        ))
    }
}

#[async_trait]
impl ComputeProvider for Ec2Provider {
    fn name(&self) -> &str {
        "ec2"
    }

    async fn list_security_groups(&self) -> clusterflow_cloud::Result<Vec<SecurityGroup>> {
        Ok(self.list_security_groups_inner().await?)
    }

    async fn create_security_group(
        &self,
        name: &str,
        description: &str,
    ) -> clusterflow_cloud::Result<SecurityGroup> {
        let output = self
            .client
            .create_security_group()
            .group_name(name)
            .description(description)
            .send()
            .await
            .map_err(api_error)?;

        let group_id = output
            .group_id()
            .ok_or(AwsError::MissingField("security group id"))?;

        Ok(SecurityGroup::new(group_id, name))
    }

    async fn authorize_ingress(
        &self,
        group: &SecurityGroup,
        rule: &IngressRule,
    ) -> clusterflow_cloud::Result<()> {
        tracing::debug!("Authorizing {} on {}", rule, group.name);

        self.client
            .authorize_security_group_ingress()
            .group_id(&group.id)
            .ip_permissions(convert::permission(rule))
            .send()
            .await
            .map_err(api_error)?;

        Ok(())
    }

    async fn list_batches(&self) -> clusterflow_cloud::Result<Vec<InstanceBatch>> {
        Ok(self.list_batches_inner().await?)
    }

    async fn describe_instances(
        &self,
        instance_ids: &[String],
    ) -> clusterflow_cloud::Result<Vec<Instance>> {
        let output = self
            .client
            .describe_instances()
            .set_instance_ids(Some(instance_ids.to_vec()))
            .send()
            .await
            .map_err(api_error)?;

        Ok(output
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .map(convert::instance)
            .collect())
    }

    async fn find_image(&self, image_id: &str) -> clusterflow_cloud::Result<Option<MachineImage>> {
        let output = match self.client.describe_images().image_ids(image_id).send().await {
            Ok(output) => output,
            Err(err)
                if err
                    .as_service_error()
                    .and_then(|e| e.code())
                    .is_some_and(|code| IMAGE_NOT_FOUND_CODES.contains(&code)) =>
            {
                return Ok(None);
            }
            Err(err) => return Err(api_error(err).into()),
        };

        Ok(output.images().first().map(|image| MachineImage {
            id: image.image_id().unwrap_or(image_id).to_string(),
            name: image.name().map(str::to_string),
        }))
    }

    async fn run_instances(
        &self,
        request: &LaunchRequest,
    ) -> clusterflow_cloud::Result<InstanceBatch> {
        Ok(self.run_instances_inner(request).await?)
    }

    async fn terminate_instance(&self, instance_id: &str) -> clusterflow_cloud::Result<()> {
        self.client
            .terminate_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn stop_instance(&self, instance_id: &str) -> clusterflow_cloud::Result<()> {
        self.client
            .stop_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn start_instance(&self, instance_id: &str) -> clusterflow_cloud::Result<()> {
        self.client
            .start_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }
}
