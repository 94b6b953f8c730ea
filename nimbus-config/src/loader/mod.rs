//! Resolves run settings from `.env`, settings files and `NIMBUS_*`
//! environment overrides, in that order.

pub mod error;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    models::settings::{RunSettings, RunSettingsSource},
    util::apply_env_overrides,
};
use error::ConfigLoadError;

/// Result of a successful load.
#[derive(Debug, Clone)]
pub struct SettingsLoad {
    pub settings: RunSettings,
    pub source: RunSettingsSource,
    /// `.env` file that was applied, if any.
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsLoader {
    env_file: Option<PathBuf>,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this `.env` file instead of searching the working directory.
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<SettingsLoad, ConfigLoadError> {
        let env_file = self.load_env_file()?;

        let (mut settings, source) =
            RunSettings::load_from_env().map_err(ConfigLoadError::Settings)?;
        apply_env_overrides(&mut settings)?;

        if settings.max_workers == 0 {
            return Err(ConfigLoadError::NoWorkers);
        }
        settings
            .rate_limit
            .to_rule()
            .map_err(ConfigLoadError::RateLimit)?;

        info!(
            target: "nimbus::config",
            source = ?source,
            provider = %settings.provider,
            "run settings loaded"
        );
        Ok(SettingsLoad {
            settings,
            source,
            env_file,
        })
    }

    fn load_env_file(&self) -> Result<Option<PathBuf>, ConfigLoadError> {
        match &self.env_file {
            Some(path) => {
                load_env_path(path)?;
                Ok(Some(path.clone()))
            }
            None => match dotenvy::dotenv() {
                Ok(path) => {
                    debug!(target: "nimbus::config", path = %path.display(), "applied .env");
                    Ok(Some(path))
                }
                Err(err) if err.not_found() => Ok(None),
                Err(err) => Err(err.into()),
            },
        }
    }
}

fn load_env_path(path: &Path) -> Result<(), ConfigLoadError> {
    dotenvy::from_path(path).map_err(|source| ConfigLoadError::EnvFileIo {
        path: path.to_path_buf(),
        source,
    })
}
