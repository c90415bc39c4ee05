use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("The environment variable {0} must be set")]
    MissingEnv(&'static str),

    #[error(
        "Template directory deploy.{0} not found. Looked in:\n\
        - $CLUSTERFLOW_DEPLOY_DIR\n\
        - the current directory\n\
        - ~/.config/clusterflow/"
    )]
    DeployDirNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
