//! Cluster lifecycle controller
//!
//! A cluster is nothing but a name: its three security groups
//! `<name>-master`, `<name>-slaves` and `<name>-zoo` and the instance batches
//! attached to exactly one of them. Every action re-resolves the cluster from
//! the provider; no state is kept between invocations.
//!
//! ```text
//!              LifecycleController
//!             /        |          \
//!      resolver    launcher     readiness
//!                     |
//!                  groups
//!
//!   template + deploy --> RemoteShell (ssh / scp / rsync)
//! ```

pub mod cluster;
pub mod deploy;
pub mod error;
pub mod groups;
pub mod launcher;
pub mod lifecycle;
pub mod prompt;
pub mod readiness;
pub mod remote;
pub mod resolver;
pub mod template;

#[cfg(test)]
mod testing;

pub use cluster::{ClusterSnapshot, Role, group_names};
pub use deploy::deploy;
pub use error::{ClusterError, Result};
pub use groups::{ClusterGroups, GroupProvisioner};
pub use launcher::{LaunchOptions, Launcher};
pub use lifecycle::{Action, ClusterOptions, CodeSource, LifecycleController, Outcome};
pub use prompt::{AssumeYes, Confirm, StdinConfirm};
pub use readiness::{ReadinessConfig, ReadinessPoller};
pub use remote::{RemoteShell, SshShell};
pub use resolver::resolve_existing;
pub use template::TemplateVars;
