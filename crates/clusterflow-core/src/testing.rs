//! In-memory provider, shell and prompt used by the unit tests

use crate::error::{ClusterError, Result};
use crate::prompt::Confirm;
use crate::remote::RemoteShell;
use async_trait::async_trait;
use clusterflow_cloud::{
    CloudError, ComputeProvider, IngressRule, Instance, InstanceBatch, InstanceState,
    LaunchRequest, MachineImage, SecurityGroup,
};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const TEST_IMAGE: &str = "ami-test";

#[derive(Default)]
struct AccountState {
    groups: Vec<SecurityGroup>,
    batches: Vec<InstanceBatch>,
    /// Remaining describe calls for which an instance still reports pending
    pending_polls: HashMap<String, usize>,
    next_id: usize,
}

/// Fake cloud account
pub struct FakeProvider {
    state: Mutex<AccountState>,
    /// Describe calls a launched instance stays pending for
    pub launch_pending_polls: usize,
    pub authorize_calls: Mutex<Vec<(String, IngressRule)>>,
    pub describe_calls: Mutex<usize>,
    pub run_requests: Mutex<Vec<LaunchRequest>>,
    pub terminated: Mutex<Vec<String>>,
    pub stopped: Mutex<Vec<String>>,
    pub started: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AccountState::default()),
            launch_pending_polls: 1,
            authorize_calls: Mutex::new(Vec::new()),
            describe_calls: Mutex::new(0),
            run_requests: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
        }
    }

    /// Add an existing batch of instances in `state`, attached to `groups`
    pub fn with_batch(self, id: &str, groups: &[&str], count: usize, state: InstanceState) -> Self {
        {
            let mut account = self.state.lock().unwrap();
            let instances = (0..count)
                .map(|n| {
                    Instance::new(format!("{}-i{}", id, n), state)
                        .with_address(format!("{}-{}.compute.example", id, n))
                })
                .collect();
            account.batches.push(InstanceBatch::new(
                id,
                instances,
                groups.iter().map(|g| g.to_string()),
            ));
        }
        self
    }

    /// Add an existing group that already carries rules
    pub fn with_group(self, name: &str, rules: Vec<IngressRule>) -> Self {
        {
            let mut account = self.state.lock().unwrap();
            let mut group = SecurityGroup::new(format!("sg-{}", name), name);
            group.rules = rules;
            account.groups.push(group);
        }
        self
    }

    /// Keep an instance pending for the next `polls` describe calls
    pub fn hold_pending(&self, instance_id: &str, polls: usize) {
        let mut account = self.state.lock().unwrap();
        account.pending_polls.insert(instance_id.to_string(), polls);
        for batch in &mut account.batches {
            for instance in &mut batch.instances {
                if instance.id == instance_id {
                    instance.state = InstanceState::Pending;
                }
            }
        }
    }

    fn set_state(&self, instance_id: &str, state: InstanceState) {
        let mut account = self.state.lock().unwrap();
        for batch in &mut account.batches {
            for instance in &mut batch.instances {
                if instance.id == instance_id {
                    instance.state = state;
                }
            }
        }
    }

    pub fn group(&self, name: &str) -> Option<SecurityGroup> {
        let account = self.state.lock().unwrap();
        account.groups.iter().find(|g| g.name == name).cloned()
    }

    pub fn group_count(&self) -> usize {
        self.state.lock().unwrap().groups.len()
    }

    pub fn describe_count(&self) -> usize {
        *self.describe_calls.lock().unwrap()
    }
}

#[async_trait]
impl ComputeProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_security_groups(&self) -> clusterflow_cloud::Result<Vec<SecurityGroup>> {
        Ok(self.state.lock().unwrap().groups.clone())
    }

    async fn create_security_group(
        &self,
        name: &str,
        _description: &str,
    ) -> clusterflow_cloud::Result<SecurityGroup> {
        let mut account = self.state.lock().unwrap();
        let group = SecurityGroup::new(format!("sg-{}", name), name);
        account.groups.push(group.clone());
        Ok(group)
    }

    async fn authorize_ingress(
        &self,
        group: &SecurityGroup,
        rule: &IngressRule,
    ) -> clusterflow_cloud::Result<()> {
        let mut account = self.state.lock().unwrap();
        let stored = account
            .groups
            .iter_mut()
            .find(|g| g.id == group.id)
            .ok_or_else(|| CloudError::ResourceNotFound(group.name.clone()))?;
        stored.rules.push(rule.clone());
        self.authorize_calls
            .lock()
            .unwrap()
            .push((group.name.clone(), rule.clone()));
        Ok(())
    }

    async fn list_batches(&self) -> clusterflow_cloud::Result<Vec<InstanceBatch>> {
        Ok(self.state.lock().unwrap().batches.clone())
    }

    async fn describe_instances(
        &self,
        instance_ids: &[String],
    ) -> clusterflow_cloud::Result<Vec<Instance>> {
        *self.describe_calls.lock().unwrap() += 1;

        let mut account = self.state.lock().unwrap();
        let AccountState {
            batches,
            pending_polls,
            ..
        } = &mut *account;

        let mut found = Vec::new();
        for batch in batches.iter_mut() {
            for instance in &mut batch.instances {
                if !instance_ids.contains(&instance.id) {
                    continue;
                }
                if instance.state.is_pending() {
                    match pending_polls.get_mut(&instance.id) {
                        Some(left) if *left > 0 => *left -= 1,
                        _ => instance.state = InstanceState::Running,
                    }
                }
                found.push(instance.clone());
            }
        }
        Ok(found)
    }

    async fn find_image(&self, image_id: &str) -> clusterflow_cloud::Result<Option<MachineImage>> {
        Ok((image_id == TEST_IMAGE).then(|| MachineImage {
            id: image_id.to_string(),
            name: None,
        }))
    }

    async fn run_instances(
        &self,
        request: &LaunchRequest,
    ) -> clusterflow_cloud::Result<InstanceBatch> {
        self.run_requests.lock().unwrap().push(request.clone());

        let mut account = self.state.lock().unwrap();
        account.next_id += 1;
        let batch_id = format!("r-{}", account.next_id);

        let mut instances = Vec::new();
        for n in 0..request.count {
            let id = format!("{}-i{}", batch_id, n);
            account
                .pending_polls
                .insert(id.clone(), self.launch_pending_polls);
            // Addresses only appear once the instance is described again
            instances.push(Instance::new(id, InstanceState::Pending));
        }

        let stored: Vec<Instance> = instances
            .iter()
            .map(|i| i.clone().with_address(format!("{}.compute.example", i.id)))
            .collect();
        account.batches.push(InstanceBatch::new(
            batch_id.clone(),
            stored,
            [request.security_group.clone()],
        ));

        Ok(InstanceBatch::new(
            batch_id,
            instances,
            [request.security_group.clone()],
        ))
    }

    async fn terminate_instance(&self, instance_id: &str) -> clusterflow_cloud::Result<()> {
        self.set_state(instance_id, InstanceState::ShuttingDown);
        self.terminated.lock().unwrap().push(instance_id.to_string());
        Ok(())
    }

    async fn stop_instance(&self, instance_id: &str) -> clusterflow_cloud::Result<()> {
        self.set_state(instance_id, InstanceState::Stopping);
        self.stopped.lock().unwrap().push(instance_id.to_string());
        Ok(())
    }

    async fn start_instance(&self, instance_id: &str) -> clusterflow_cloud::Result<()> {
        self.set_state(instance_id, InstanceState::Pending);
        self.started.lock().unwrap().push(instance_id.to_string());
        Ok(())
    }
}

/// A recorded remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCall {
    Run { host: String, command: String },
    Copy { host: String, local: PathBuf, remote: String },
    Sync {
        host: String,
        remote: String,
        staging: PathBuf,
        /// Relative path -> content, captured while the staging tree existed
        files: BTreeMap<PathBuf, String>,
    },
    Login { host: String, proxy: Option<String> },
}

#[derive(Default)]
pub struct FakeShell {
    pub calls: Mutex<Vec<ShellCall>>,
    pub fail_sync: bool,
    /// Delete the staging directory during the transfer
    pub remove_staging: bool,
    /// Fail any `run` whose command contains this text
    pub fail_command: Option<String>,
}

impl FakeShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ShellCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ShellCall::Run { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ShellCall) {
        self.calls.lock().unwrap().push(call);
    }
}

fn snapshot_tree(root: &Path) -> BTreeMap<PathBuf, String> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let relative = path.strip_prefix(root).unwrap().to_path_buf();
                let content = std::fs::read(&path).unwrap();
                files.insert(relative, String::from_utf8_lossy(&content).into_owned());
            }
        }
    }
    files
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn run(&self, host: &str, command: &str) -> Result<()> {
        self.record(ShellCall::Run {
            host: host.to_string(),
            command: command.to_string(),
        });
        if let Some(pattern) = &self.fail_command {
            if command.contains(pattern.as_str()) {
                return Err(ClusterError::RemoteCommandFailed {
                    host: host.to_string(),
                    command: command.to_string(),
                    status: "exit status: 1".to_string(),
                });
            }
        }
        Ok(())
    }

    async fn copy(&self, host: &str, local_path: &Path, remote_path: &str) -> Result<()> {
        self.record(ShellCall::Copy {
            host: host.to_string(),
            local: local_path.to_path_buf(),
            remote: remote_path.to_string(),
        });
        Ok(())
    }

    async fn sync_dir(&self, host: &str, local_dir: &Path, remote_dir: &str) -> Result<()> {
        self.record(ShellCall::Sync {
            host: host.to_string(),
            remote: remote_dir.to_string(),
            staging: local_dir.to_path_buf(),
            files: snapshot_tree(local_dir),
        });
        if self.remove_staging {
            std::fs::remove_dir_all(local_dir).unwrap();
        }
        if self.fail_sync {
            return Err(ClusterError::DeployTransferFailed {
                host: host.to_string(),
                status: "exit status: 23".to_string(),
            });
        }
        Ok(())
    }

    async fn login(&self, host: &str, proxy: Option<&str>) -> Result<()> {
        self.record(ShellCall::Login {
            host: host.to_string(),
            proxy: proxy.map(str::to_string),
        });
        Ok(())
    }
}

/// Scripted operator answer
pub struct FakeConfirm {
    pub answer: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeConfirm {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl Confirm for FakeConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answer)
    }
}
