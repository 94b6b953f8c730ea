use std::path::PathBuf;

use nimbus_model::ProviderKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to load run settings: {0:#}")]
    Settings(#[source] anyhow::Error),
    #[error("invalid rate limit settings: {0:#}")]
    RateLimit(#[source] anyhow::Error),
    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnvVar { name: &'static str, value: String },
    #[error("settings target {settings} but credentials are for {auth}")]
    ProviderMismatch {
        settings: ProviderKind,
        auth: ProviderKind,
    },
    #[error("max_workers must be at least 1")]
    NoWorkers,
    #[error("failed to read env file {path}")]
    EnvFileIo {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}
