//! Placeholder substitution for the deploy template tree
//!
//! Placeholders are literal `{{name}}` tokens. There is no escaping, no
//! nesting and no whitespace inside the braces; unknown placeholders are
//! left in the output untouched.

use crate::cluster::ClusterSnapshot;
use crate::error::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const ZOO_CLIENT_PORT: u16 = 2181;
const MASTER_PORT: u16 = 5050;

/// Placeholder name -> rendered value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars(BTreeMap<String, String>);

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Variables describing `snapshot`; `instance_type` picks the disk layout
    pub fn for_cluster(snapshot: &ClusterSnapshot, instance_type: &str) -> Self {
        let masters = snapshot.primary.addresses();
        let slaves = snapshot.worker.addresses();
        let zoos = snapshot
            .coordinator
            .as_ref()
            .map(|batch| batch.addresses())
            .unwrap_or_default();
        let active_master = masters.first().copied().unwrap_or_default();

        let (zoo_list, cluster_url) = if zoos.is_empty() {
            (
                "NONE".to_string(),
                format!("1@{}:{}", active_master, MASTER_PORT),
            )
        } else {
            let quorum: Vec<String> = zoos
                .iter()
                .map(|zoo| format!("{}:{}/mesos", zoo, ZOO_CLIENT_PORT))
                .collect();
            (zoos.join("\n"), format!("zoo://{}", quorum.join(",")))
        };

        let disks = local_disk_count(instance_type);

        let mut vars = Self::new();
        vars.insert("master_list", masters.join("\n"));
        vars.insert("active_master", active_master);
        vars.insert("slave_list", slaves.join("\n"));
        vars.insert("zoo_list", zoo_list);
        vars.insert("cluster_url", cluster_url);
        vars.insert("hdfs_data_dirs", disk_paths(disks, "hdfs/dfs/data"));
        vars.insert("mapred_local_dirs", disk_paths(disks, "hadoop/mrlocal"));
        vars
    }
}

/// Number of local ephemeral disks an instance type comes with
pub fn local_disk_count(instance_type: &str) -> usize {
    match instance_type {
        "m1.xlarge" | "c1.xlarge" | "m2.xlarge" | "cc1.4xlarge" => 4,
        "m1.small" | "c1.medium" => 1,
        _ => 2,
    }
}

/// `/mnt/<suffix>,/mnt2/<suffix>,...` for `count` disks
fn disk_paths(count: usize, suffix: &str) -> String {
    let mut paths = vec![format!("/mnt/{}", suffix)];
    paths.extend((2..=count).map(|n| format!("/mnt{}/{}", n, suffix)));
    paths.join(",")
}

/// Replace every `{{name}}` of a known variable in one left-to-right pass.
/// Works on raw bytes; substituted values are never expanded again.
pub fn render(text: &[u8], vars: &TemplateVars) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = find(rest, b"{{") {
        out.extend_from_slice(&rest[..start]);
        let after = &rest[start + 2..];
        let known = find(after, b"}}").and_then(|end| {
            let name = std::str::from_utf8(&after[..end]).ok()?;
            vars.get(name).map(|value| (value, end))
        });

        match known {
            Some((value, end)) => {
                out.extend_from_slice(value.as_bytes());
                rest = &after[end + 2..];
            }
            None => {
                // a placeholder may still start at the next brace
                out.push(b'{');
                rest = &rest[start + 1..];
            }
        }
    }

    out.extend_from_slice(rest);
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Editor backups, lock files and dotfiles are not deployed
pub fn is_template_file(name: &str) -> bool {
    !(name.starts_with('#')
        || name.starts_with('.')
        || name.starts_with('~')
        || name.ends_with('~'))
}

/// Render every template file under `source` into the same relative path
/// under `staging`. Directories are mirrored even when they end up empty.
/// Links to files are rendered like the file itself; links to directories
/// are not descended into. Returns the number of files written.
pub fn render_tree(source: &Path, staging: &Path, vars: &TemplateVars) -> Result<usize> {
    let mut written = 0;

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        let target = staging.join(entry.file_name());

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            written += render_tree(&path, &target, vars)?;
            continue;
        }

        let is_file = if file_type.is_symlink() {
            match fs::metadata(&path) {
                Ok(meta) => meta.is_file(),
                Err(err) => {
                    warn!("Skipping dangling link {}: {}", path.display(), err);
                    false
                }
            }
        } else {
            file_type.is_file()
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_file || !is_template_file(&name) {
            debug!("Skipping {}", path.display());
            continue;
        }

        let content = fs::read(&path)?;
        fs::write(&target, render(&content, vars))?;
        written += 1;
    }

    Ok(written)
}
