//! Remote command execution over ssh/scp/rsync
//!
//! Every call is a single attempt attached to the operator's terminal. Only
//! the exit status is observed; the remote program's own output is what the
//! operator reads when something goes wrong.
//!
//! Host-key checking is disabled (`StrictHostKeyChecking=no`). Freshly
//! launched instances have unknown keys and the operator would otherwise be
//! prompted once per node.

use crate::error::{ClusterError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;

/// Account used on every cluster node
pub const REMOTE_USER: &str = "root";

/// Command and file transfer capability against cluster hosts
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run `command` on `host`; fails with `RemoteCommandFailed` on non-zero exit
    async fn run(&self, host: &str, command: &str) -> Result<()>;

    /// Copy one local file to `remote_path` on `host`; fails with `RemoteCopyFailed`
    async fn copy(&self, host: &str, local_path: &Path, remote_path: &str) -> Result<()>;

    /// Recursively mirror the contents of `local_dir` onto `remote_dir`;
    /// fails with `DeployTransferFailed`
    async fn sync_dir(&self, host: &str, local_dir: &Path, remote_dir: &str) -> Result<()>;

    /// Interactive session, optionally with dynamic port forwarding
    async fn login(&self, host: &str, proxy: Option<&str>) -> Result<()>;
}

/// [`RemoteShell`] backed by the system ssh, scp and rsync binaries
pub struct SshShell {
    identity_file: Option<PathBuf>,
}

impl SshShell {
    pub fn new(identity_file: Option<PathBuf>) -> Self {
        Self { identity_file }
    }

    /// Options shared by ssh and scp
    fn ssh_options(&self) -> Vec<String> {
        let mut options = vec!["-o".to_string(), "StrictHostKeyChecking=no".to_string()];
        if let Some(identity) = &self.identity_file {
            options.push("-i".to_string());
            options.push(identity.display().to_string());
        }
        options
    }

    /// The `-e` transport string handed to rsync
    fn rsync_transport(&self) -> String {
        let mut transport = String::from("ssh -o StrictHostKeyChecking=no");
        if let Some(identity) = &self.identity_file {
            transport.push_str(" -i ");
            transport.push_str(&shell_escape(&identity.display().to_string()));
        }
        transport
    }

    async fn status(mut cmd: Command) -> Result<ExitStatus> {
        tracing::debug!("Running: {:?}", cmd.as_std());
        Ok(cmd.status().await?)
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn run(&self, host: &str, command: &str) -> Result<()> {
        let mut cmd = Command::new("ssh");
        cmd.arg("-t")
            .args(self.ssh_options())
            .arg(remote_target(host))
            .arg(command);

        let status = Self::status(cmd).await?;
        if !status.success() {
            return Err(ClusterError::RemoteCommandFailed {
                host: host.to_string(),
                command: command.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }

    async fn copy(&self, host: &str, local_path: &Path, remote_path: &str) -> Result<()> {
        let mut cmd = Command::new("scp");
        cmd.arg("-q")
            .args(self.ssh_options())
            .arg(local_path)
            .arg(format!("{}:{}", remote_target(host), remote_path));

        let status = Self::status(cmd).await?;
        if !status.success() {
            return Err(ClusterError::RemoteCopyFailed {
                host: host.to_string(),
                local: local_path.display().to_string(),
                remote: remote_path.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }

    async fn sync_dir(&self, host: &str, local_dir: &Path, remote_dir: &str) -> Result<()> {
        // Trailing slash: copy the directory's contents, not the directory
        let source = format!("{}/", local_dir.display());

        let mut cmd = Command::new("rsync");
        cmd.arg("-rv")
            .arg("-e")
            .arg(self.rsync_transport())
            .arg(source)
            .arg(format!("{}:{}", remote_target(host), remote_dir));

        let status = Self::status(cmd).await?;
        if !status.success() {
            return Err(ClusterError::DeployTransferFailed {
                host: host.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }

    async fn login(&self, host: &str, proxy: Option<&str>) -> Result<()> {
        let mut cmd = Command::new("ssh");
        cmd.args(self.ssh_options());
        if let Some(proxy) = proxy {
            cmd.arg("-D").arg(proxy);
        }
        cmd.arg(remote_target(host));

        let status = Self::status(cmd).await?;
        if !status.success() {
            return Err(ClusterError::RemoteCommandFailed {
                host: host.to_string(),
                command: "<interactive login>".to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

fn remote_target(host: &str) -> String {
    format!("{}@{}", REMOTE_USER, host)
}

/// Single-quote a string for a POSIX shell
pub fn shell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
