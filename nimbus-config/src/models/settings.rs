use anyhow::{Context, anyhow};
use nimbus_core::{
    AccountScope, AuthOptions, RunOptions,
    fetch::DEFAULT_MAX_WORKERS,
    pipeline::options::DEFAULT_REPORT_DIR,
};
use nimbus_model::{
    ProviderKind, ip_ranges::DEFAULT_IP_RANGES_NAME_KEY, ruleset::DEFAULT_RULESET,
};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use super::rate_limit::RateLimitSettings;
use crate::loader::error::ConfigLoadError;

/// Source that produced the run settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunSettingsSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Account scope flags as written in settings files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScopeSettings {
    pub subscription_ids: Vec<String>,
    pub all_subscriptions: bool,
    pub project_id: Option<String>,
    pub folder_id: Option<String>,
    pub organization_id: Option<String>,
    pub all_projects: bool,
}

impl From<ScopeSettings> for AccountScope {
    fn from(scope: ScopeSettings) -> Self {
        AccountScope {
            subscription_ids: scope.subscription_ids,
            all_subscriptions: scope.all_subscriptions,
            project_id: scope.project_id,
            folder_id: scope.folder_id,
            organization_id: scope.organization_id,
            all_projects: scope.all_projects,
        }
    }
}

/// Everything about a scan run that can come from configuration. Credentials
/// are deliberately absent; they are supplied as [`AuthOptions`] when the
/// settings are turned into [`RunOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunSettings {
    pub provider: ProviderKind,
    /// Services to scan. Empty scans everything the provider offers.
    pub services: Vec<String>,
    pub skipped_services: Vec<String>,
    pub regions: Vec<String>,
    pub excluded_regions: Vec<String>,
    pub scope: ScopeSettings,
    pub rate_limit: RateLimitSettings,
    /// Concurrent service fetches.
    pub max_workers: usize,
    pub ruleset: PathBuf,
    pub exceptions: Option<PathBuf>,
    pub ip_ranges: Vec<PathBuf>,
    pub ip_ranges_name_key: String,
    pub report_name: Option<String>,
    pub report_dir: PathBuf,
    /// Carry over services from the previous run that this run skips.
    pub update: bool,
    /// Re-evaluate the previous run's data without fetching.
    pub fetch_local: bool,
    pub list_services: bool,
    pub persist_results: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Aws,
            services: Vec::new(),
            skipped_services: Vec::new(),
            regions: Vec::new(),
            excluded_regions: Vec::new(),
            scope: ScopeSettings::default(),
            rate_limit: RateLimitSettings::default(),
            max_workers: DEFAULT_MAX_WORKERS,
            ruleset: PathBuf::from(DEFAULT_RULESET),
            exceptions: None,
            ip_ranges: Vec::new(),
            ip_ranges_name_key: DEFAULT_IP_RANGES_NAME_KEY.to_string(),
            report_name: None,
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            update: false,
            fetch_local: false,
            list_services: false,
            persist_results: false,
        }
    }
}

impl RunSettings {
    /// Load run settings using environment variables.
    /// Evaluation order:
    /// 1) `$NIMBUS_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$NIMBUS_CONFIG_JSON` (inline JSON),
    /// 3) the first default file that exists,
    /// 4) defaults.
    pub fn load_from_env() -> anyhow::Result<(Self, RunSettingsSource)> {
        if let Ok(path_str) = env::var("NIMBUS_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let settings = Self::load_from_file(&path)?;
            return Ok((settings, RunSettingsSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var("NIMBUS_CONFIG_JSON")
            && !raw.trim().is_empty()
        {
            let parsed = Self::parse_json(&raw)
                .context("failed to parse NIMBUS_CONFIG_JSON")?;
            return Ok((parsed, RunSettingsSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file() {
            let settings = Self::load_from_file(&path)?;
            return Ok((settings, RunSettingsSource::File(path)));
        }

        Ok((Self::default(), RunSettingsSource::Default))
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| {
            format!("failed to read run settings from {}", path.display())
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents).with_context(|| {
                format!("invalid run settings {}", path.display())
            }),
            Some("toml") => toml::from_str(&contents).map_err(|err| {
                anyhow!("invalid run settings {}: {}", path.display(), err)
            }),
            _ => Self::parse_from_str(&contents, &path.display().to_string()),
        }
    }

    pub fn parse_from_str(contents: &str, origin: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                anyhow!(
                    "failed to parse run settings {}: toml error: {}; json error: {}",
                    origin,
                    toml_err,
                    json_err
                )
            })
        })
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| anyhow!("invalid run settings json: {err}"))
    }

    fn find_default_file() -> Option<PathBuf> {
        const CANDIDATES: &[&str] = &[
            "nimbus.toml",
            "nimbus.json",
            "config/nimbus.toml",
            "config/nimbus.json",
        ];

        CANDIDATES
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(|path| path.to_path_buf())
    }

    /// Combines the settings with credentials for the same provider.
    pub fn into_run_options(
        self,
        auth: AuthOptions,
    ) -> Result<RunOptions, ConfigLoadError> {
        if auth.provider() != self.provider {
            return Err(ConfigLoadError::ProviderMismatch {
                settings: self.provider,
                auth: auth.provider(),
            });
        }

        let rate_limit = self
            .rate_limit
            .to_rule()
            .map_err(ConfigLoadError::RateLimit)?;

        let mut options = RunOptions::new(auth);
        options.scope = self.scope.into();
        options.services = self.services;
        options.skipped_services = self.skipped_services;
        options.regions = self.regions;
        options.excluded_regions = self.excluded_regions;
        options.rate_limit = rate_limit;
        options.max_workers = self.max_workers;
        options.ruleset = self.ruleset;
        options.exceptions = self.exceptions;
        options.ip_ranges = self.ip_ranges;
        options.ip_ranges_name_key = self.ip_ranges_name_key;
        options.report_name = self.report_name;
        options.report_dir = self.report_dir;
        options.update = self.update;
        options.fetch_local = self.fetch_local;
        options.list_services = self.list_services;
        options.persist_results = self.persist_results;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_settings_fill_unset_fields_with_defaults() {
        let settings = RunSettings::parse_from_str(
            r#"
provider = "gcp"
services = ["iam", "cloudstorage"]
update = true

[rate_limit]
max_rate = 25
window = "2s"

[scope]
project_id = "my-project"
"#,
            "inline",
        )
        .unwrap();

        assert_eq!(settings.provider, ProviderKind::Gcp);
        assert_eq!(settings.services, vec!["iam", "cloudstorage"]);
        assert!(settings.update);
        assert_eq!(settings.max_workers, 10);
        assert_eq!(settings.ruleset, PathBuf::from("default.json"));
        assert_eq!(settings.scope.project_id.as_deref(), Some("my-project"));
        assert_eq!(settings.rate_limit.max_rate, Some(25));
    }

    #[test]
    fn json_settings_are_accepted() {
        let settings = RunSettings::parse_from_str(
            r#"{"provider": "azure", "skipped_services": ["aad"], "max_workers": 4}"#,
            "inline",
        )
        .unwrap();

        assert_eq!(settings.provider, ProviderKind::Azure);
        assert_eq!(settings.skipped_services, vec!["aad"]);
        assert_eq!(settings.max_workers, 4);
    }

    #[test]
    fn unknown_provider_code_fails_to_parse() {
        let err = RunSettings::parse_json(r#"{"provider": "mainframe"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn run_options_carry_every_setting() {
        let settings = RunSettings {
            provider: ProviderKind::Aws,
            services: vec!["iam".into()],
            regions: vec!["us-east-1".into()],
            rate_limit: RateLimitSettings {
                max_rate: Some(10),
                window: "1s".into(),
            },
            persist_results: true,
            ..Default::default()
        };

        let options = settings
            .into_run_options(AuthOptions::default_for(ProviderKind::Aws))
            .unwrap();

        assert_eq!(options.services, vec!["iam"]);
        assert_eq!(options.regions, vec!["us-east-1"]);
        assert_eq!(options.rate_limit.limit, 10);
        assert!(options.persist_results);
    }

    #[test]
    fn credentials_for_another_provider_are_rejected() {
        let err = RunSettings::default()
            .into_run_options(AuthOptions::default_for(ProviderKind::Oci))
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::ProviderMismatch { .. }));
    }
}
