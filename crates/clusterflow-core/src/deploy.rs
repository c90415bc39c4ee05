//! Render the template tree and push it onto a host

use crate::error::Result;
use crate::remote::RemoteShell;
use crate::template::{TemplateVars, render_tree};
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Remote directory the rendered tree is mirrored onto
pub const DEPLOY_ROOT: &str = "/";

/// Render `source_root` with `vars` into a private staging directory and
/// mirror it onto `host`. The staging directory is removed whether the
/// transfer succeeds or not.
pub async fn deploy(
    source_root: &Path,
    vars: &TemplateVars,
    host: &str,
    shell: &dyn RemoteShell,
) -> Result<()> {
    info!("Deploying files to {}...", host);
    for (name, value) in vars.iter() {
        debug!("{} = {:?}", name, value);
    }

    let staging = TempDir::with_prefix("clusterflow-deploy-")?;
    let written = render_tree(source_root, staging.path(), vars)?;
    debug!(
        "Rendered {} files into {}",
        written,
        staging.path().display()
    );

    match shell.sync_dir(host, staging.path(), DEPLOY_ROOT).await {
        Ok(()) => Ok(staging.close()?),
        Err(err) => {
            // the transfer error is the one worth reporting
            if let Err(cleanup) = staging.close() {
                warn!("Failed to remove staging directory: {}", cleanup);
            }
            Err(err)
        }
    }
}
