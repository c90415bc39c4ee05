pub mod error;

pub use error::*;

use std::fmt;
use std::path::PathBuf;

pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
pub const DEPLOY_DIR_ENV: &str = "CLUSTERFLOW_DEPLOY_DIR";

/// Cloud API credentials, read once at startup and passed down explicitly
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    /// Read both keys from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read both keys through `lookup`; unset and empty values are errors
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        };

        Ok(Self {
            access_key_id: read(ACCESS_KEY_ENV)?,
            secret_access_key: read(SECRET_KEY_ENV)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Per-user configuration directory (~/.config/clusterflow)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("clusterflow"))
}

/// Locate the template directory for an OS tag
///
/// Search order:
/// 1. `CLUSTERFLOW_DEPLOY_DIR` (used as the template root itself)
/// 2. `./deploy.<os>`
/// 3. `~/.config/clusterflow/deploy.<os>`
pub fn find_deploy_dir(os: &str) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DEPLOY_DIR_ENV) {
        let path = PathBuf::from(dir);
        if path.is_dir() {
            tracing::debug!("Using template directory from {}", DEPLOY_DIR_ENV);
            return Ok(path);
        }
        tracing::warn!(
            "{} points at {}, which is not a directory",
            DEPLOY_DIR_ENV,
            path.display()
        );
    }

    let dir_name = format!("deploy.{}", os);

    let local = std::env::current_dir()?.join(&dir_name);
    if local.is_dir() {
        return Ok(local);
    }

    if let Some(global) = config_dir().map(|dir| dir.join(&dir_name)) {
        if global.is_dir() {
            return Ok(global);
        }
    }

    Err(ConfigError::DeployDirNotFound(os.to_string()))
}
