//! EC2 provider for clusterflow
//!
//! This crate implements the ComputeProvider trait on top of the AWS SDK,
//! mapping instance batches onto EC2 reservations.
//!
//! # Requirements
//!
//! - `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY` are read once by
//!   `clusterflow-config` and handed to [`Ec2Provider::connect`]
//! - Security groups are addressed by name, so launches target the
//!   account's default VPC
//!
//! # Example
//!
//! ```ignore
//! use clusterflow_cloud::ComputeProvider;
//! use clusterflow_cloud_aws::Ec2Provider;
//! use clusterflow_config::Credentials;
//!
//! let credentials = Credentials::from_env()?;
//! let provider = Ec2Provider::connect(&credentials, "us-east-1b").await?;
//!
//! for batch in provider.list_batches().await? {
//!     println!("{} {:?}", batch.id, batch.group_names);
//! }
//! ```

mod convert;
pub mod error;
pub mod provider;

pub use convert::region_for_zone;
pub use error::{AwsError, Result};
pub use provider::Ec2Provider;
