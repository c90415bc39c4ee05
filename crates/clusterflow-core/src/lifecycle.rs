//! Map an operator action onto resolver, launcher, poller and deployer calls

use crate::cluster::ClusterSnapshot;
use crate::deploy::deploy;
use crate::error::{ClusterError, Result};
use crate::launcher::{LaunchOptions, Launcher};
use crate::prompt::Confirm;
use crate::readiness::{ReadinessConfig, ReadinessPoller};
use crate::remote::RemoteShell;
use crate::resolver::resolve_existing;
use crate::template::TemplateVars;
use clusterflow_cloud::ComputeProvider;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Setup program shipped inside the deploy tree
pub const SETUP_SCRIPT: &str = "mesos-ec2/setup";

/// Where the operator's key lands on the master
pub const REMOTE_KEY_PATH: &str = "/root/.ssh/id_rsa";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Launch,
    Destroy,
    Login,
    GetMaster,
    Stop,
    Start,
    /// Removed; kept so the operator gets a pointer to its replacements
    Shutdown,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Launch => "launch",
            Action::Destroy => "destroy",
            Action::Login => "login",
            Action::GetMaster => "get-master",
            Action::Stop => "stop",
            Action::Start => "start",
            Action::Shutdown => "shutdown",
        }
    }

    /// Actions that open ssh connections to the master
    pub fn requires_identity_file(self) -> bool {
        matches!(self, Action::Launch | Action::Login | Action::Start)
    }

    pub fn deploys_templates(self) -> bool {
        matches!(self, Action::Launch | Action::Start)
    }

    /// Checks that need no provider access
    pub fn preflight(self, opts: &ClusterOptions) -> Result<()> {
        if self == Action::Shutdown {
            return Err(ClusterError::DeprecatedAction);
        }
        if self.requires_identity_file() && opts.identity_file.is_none() {
            return Err(ClusterError::Validation(
                "You must provide an identity file (-i) for this action".to_string(),
            ));
        }
        if self == Action::Launch && !opts.resume {
            opts.launch.validate()?;
        }
        Ok(())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "launch" => Ok(Action::Launch),
            "destroy" => Ok(Action::Destroy),
            "login" => Ok(Action::Login),
            "get-master" => Ok(Action::GetMaster),
            "stop" => Ok(Action::Stop),
            "start" => Ok(Action::Start),
            "shutdown" => Ok(Action::Shutdown),
            other => Err(ClusterError::UnknownAction(other.to_string())),
        }
    }
}

/// Where the setup program fetches the framework from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeSource {
    Git,
    #[default]
    None,
}

impl CodeSource {
    pub fn as_str(self) -> &'static str {
        match self {
            CodeSource::Git => "git",
            CodeSource::None => "none",
        }
    }
}

impl FromStr for CodeSource {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "git" => Ok(CodeSource::Git),
            "none" => Ok(CodeSource::None),
            other => Err(ClusterError::Validation(format!(
                "Invalid download source {} (expected git or none)",
                other
            ))),
        }
    }
}

impl fmt::Display for CodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything an action may need besides the cluster name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterOptions {
    pub launch: LaunchOptions,
    pub identity_file: Option<PathBuf>,
    pub os: String,
    pub download: CodeSource,
    pub branch: String,
    /// `[ADDRESS:]PORT` for dynamic forwarding on login
    pub proxy: Option<String>,
    /// Reuse a running cluster instead of launching one
    pub resume: bool,
    /// Local template tree; required by actions that deploy
    pub deploy_root: Option<PathBuf>,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            launch: LaunchOptions::default(),
            identity_file: None,
            os: "lucid64".to_string(),
            download: CodeSource::None,
            branch: "master".to_string(),
            proxy: None,
            resume: false,
            deploy_root: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The operator declined the confirmation prompt
    Aborted,
    /// Address of the active master
    Master(String),
}

pub struct LifecycleController<'a> {
    provider: &'a dyn ComputeProvider,
    shell: &'a dyn RemoteShell,
    confirm: &'a dyn Confirm,
    readiness: ReadinessConfig,
}

impl<'a> LifecycleController<'a> {
    pub fn new(
        provider: &'a dyn ComputeProvider,
        shell: &'a dyn RemoteShell,
        confirm: &'a dyn Confirm,
    ) -> Self {
        Self {
            provider,
            shell,
            confirm,
            readiness: ReadinessConfig::default(),
        }
    }

    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    pub async fn execute(
        &self,
        action: Action,
        cluster: &str,
        opts: &ClusterOptions,
    ) -> Result<Outcome> {
        action.preflight(opts)?;
        debug!("Running {} on {} via {}", action, cluster, self.provider.name());

        match action {
            Action::Launch => self.launch(cluster, opts).await,
            Action::Destroy => self.destroy(cluster).await,
            Action::Login => self.login(cluster, opts).await,
            Action::GetMaster => self.get_master(cluster).await,
            Action::Stop => self.stop(cluster).await,
            Action::Start => self.start(cluster, opts).await,
            Action::Shutdown => Err(ClusterError::DeprecatedAction),
        }
    }

    async fn launch(&self, cluster: &str, opts: &ClusterOptions) -> Result<Outcome> {
        let snapshot = if opts.resume {
            resolve_existing(self.provider, cluster).await?
        } else {
            let mut snapshot = Launcher::new(self.provider)
                .launch(cluster, &opts.launch)
                .await?;
            self.poller().await_cluster(&mut snapshot).await?;
            snapshot
        };

        self.setup_cluster(cluster, &snapshot, opts, true).await?;
        Ok(Outcome::Completed)
    }

    async fn destroy(&self, cluster: &str) -> Result<Outcome> {
        let snapshot = resolve_existing(self.provider, cluster).await?;

        let prompt = format!(
            "Are you sure you want to destroy the cluster {0}?\n\
            ALL DATA ON ALL NODES WILL BE LOST!!\n\
            Destroy cluster {0} (y/N): ",
            cluster
        );
        if !self.confirm.confirm(&prompt)? {
            return Ok(Outcome::Aborted);
        }

        for (role, batch) in snapshot.batches() {
            info!("Terminating {}...", role);
            for instance in &batch.instances {
                self.provider.terminate_instance(&instance.id).await?;
            }
        }
        Ok(Outcome::Completed)
    }

    async fn login(&self, cluster: &str, opts: &ClusterOptions) -> Result<Outcome> {
        let snapshot = resolve_existing(self.provider, cluster).await?;
        let master = master_address(cluster, &snapshot)?;

        info!("Logging into master {}...", master);
        self.shell.login(&master, opts.proxy.as_deref()).await?;
        Ok(Outcome::Completed)
    }

    async fn get_master(&self, cluster: &str) -> Result<Outcome> {
        let snapshot = resolve_existing(self.provider, cluster).await?;
        Ok(Outcome::Master(master_address(cluster, &snapshot)?))
    }

    async fn stop(&self, cluster: &str) -> Result<Outcome> {
        let snapshot = resolve_existing(self.provider, cluster).await?;

        let prompt = format!(
            "Are you sure you want to stop the cluster {0}?\n\
            DATA ON EPHEMERAL DISKS WILL BE LOST, BUT THE CLUSTER WILL KEEP USING SPACE ON\n\
            AMAZON EBS IF IT IS EBS-BACKED!!\n\
            Stop cluster {0} (y/N): ",
            cluster
        );
        if !self.confirm.confirm(&prompt)? {
            return Ok(Outcome::Aborted);
        }

        for (role, batch) in snapshot.batches() {
            info!("Stopping {}...", role);
            for instance in &batch.instances {
                if instance.state.accepts_power_change() {
                    self.provider.stop_instance(&instance.id).await?;
                } else {
                    debug!("Skipping {} ({})", instance.id, instance.state);
                }
            }
        }
        Ok(Outcome::Completed)
    }

    async fn start(&self, cluster: &str, opts: &ClusterOptions) -> Result<Outcome> {
        let mut snapshot = resolve_existing(self.provider, cluster).await?;

        for (role, batch) in snapshot.start_order() {
            info!("Starting {}...", role);
            for instance in &batch.instances {
                if instance.state.accepts_power_change() {
                    self.provider.start_instance(&instance.id).await?;
                } else {
                    debug!("Skipping {} ({})", instance.id, instance.state);
                }
            }
        }

        self.poller().await_cluster(&mut snapshot).await?;
        self.setup_cluster(cluster, &snapshot, opts, false).await?;
        Ok(Outcome::Completed)
    }

    /// Deploy the rendered templates to the active master, optionally push
    /// the operator's key, then run the setup program there
    pub async fn setup_cluster(
        &self,
        cluster: &str,
        snapshot: &ClusterSnapshot,
        opts: &ClusterOptions,
        push_key: bool,
    ) -> Result<()> {
        let deploy_root = opts.deploy_root.as_deref().ok_or_else(|| {
            ClusterError::Validation(format!("No deploy directory found for os {}", opts.os))
        })?;
        let master = master_address(cluster, snapshot)?;

        let vars = TemplateVars::for_cluster(snapshot, &opts.launch.instance_type);
        deploy(deploy_root, &vars, &master, self.shell).await?;

        if push_key {
            let identity = identity_file(opts)?;
            info!("Copying SSH key {} to master...", identity.display());
            self.shell.run(&master, "mkdir -p /root/.ssh").await?;
            self.shell.copy(&master, identity, REMOTE_KEY_PATH).await?;
        }

        info!("Running setup on master...");
        self.shell
            .run(&master, &format!("chmod u+x {}", SETUP_SCRIPT))
            .await?;
        self.shell
            .run(
                &master,
                &format!(
                    "{} {} {} {}",
                    SETUP_SCRIPT, opts.os, opts.download, opts.branch
                ),
            )
            .await?;
        info!("Done!");
        Ok(())
    }

    fn poller(&self) -> ReadinessPoller<'_> {
        ReadinessPoller::new(self.provider, self.readiness)
    }
}

fn master_address(cluster: &str, snapshot: &ClusterSnapshot) -> Result<String> {
    snapshot
        .active_master()
        .map(|instance| instance.address().to_string())
        .ok_or_else(|| ClusterError::NotFound(cluster.to_string()))
}

fn identity_file(opts: &ClusterOptions) -> Result<&Path> {
    opts.identity_file.as_deref().ok_or_else(|| {
        ClusterError::Validation("You must provide an identity file (-i) for this action".to_string())
    })
}
