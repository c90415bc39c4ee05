//! Cluster controller error types

use crate::cluster::Role;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("{0}")]
    Validation(String),

    #[error("There are already instances running in group {}", .groups.join(", "))]
    ClusterConflict { groups: Vec<String> },

    #[error("Could not find any existing cluster named {0}")]
    NotFound(String),

    #[error("Could not find {role} in group {group}")]
    PartialCluster {
        cluster: String,
        role: Role,
        group: String,
    },

    #[error("Could not find AMI {0}")]
    ImageNotFound(String),

    #[error("Remote command `{command}` failed on {host} ({status})")]
    RemoteCommandFailed {
        host: String,
        command: String,
        status: String,
    },

    #[error("Copying {local} to {host}:{remote} failed ({status})")]
    RemoteCopyFailed {
        host: String,
        local: String,
        remote: String,
        status: String,
    },

    #[error("Deploying files to {host} failed ({status})")]
    DeployTransferFailed { host: String, status: String },

    #[error(
        "The shutdown action is no longer available.\n\
        Use either 'destroy' to delete a cluster and all data on it,\n\
        or 'stop' to shut down the machines but have them persist if\n\
        you launched an EBS-backed cluster."
    )]
    DeprecatedAction,

    #[error("Invalid action: {0}")]
    UnknownAction(String),

    #[error("Cloud error: {0}")]
    Cloud(#[from] clusterflow_cloud::CloudError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
