//! clusterflow compute abstraction
//!
//! This crate defines the narrow slice of a cloud compute API that the
//! cluster lifecycle controller needs: security groups, instance batches
//! and instance power state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 clusterflow CLI                  │
//! │        (launch / destroy / stop / start)         │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                clusterflow-core                  │
//! │   resolver · launcher · poller · deployer        │
//! └─────────────────┬───────────────────────────────┘
//!                   │ trait ComputeProvider
//! ┌─────────────────▼───────────────────────────────┐
//! │               clusterflow-cloud                  │
//! │   SecurityGroup · InstanceBatch · Instance       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │      EC2      │
//!           │   provider    │
//!           └───────────────┘
//! ```

pub mod error;
pub mod model;
pub mod provider;

// Re-exports
pub use error::{CloudError, Result};
pub use model::{
    IngressRule, Instance, InstanceBatch, InstanceState, LaunchRequest, MachineImage,
    SecurityGroup, VolumeSpec,
};
pub use provider::ComputeProvider;
