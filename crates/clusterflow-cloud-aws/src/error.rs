//! EC2 provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("EC2 request failed: {0}")]
    Api(String),

    #[error("EC2 rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("EC2 returned no {0}")]
    MissingField(&'static str),

    #[error("Instance count out of range: {0}")]
    InvalidCount(u32),

    #[error("Volume size out of range: {0} GB")]
    InvalidVolumeSize(u32),

    #[error("Invalid zone: {0}")]
    InvalidZone(String),
}

impl From<AwsError> for clusterflow_cloud::CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::Api(message) => clusterflow_cloud::CloudError::ApiError(message),
            AwsError::Unauthorized(message) => {
                clusterflow_cloud::CloudError::AuthenticationFailed(message)
            }
            other => clusterflow_cloud::CloudError::InvalidResponse(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
