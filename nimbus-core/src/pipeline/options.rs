use std::path::PathBuf;

use nimbus_model::{
    ProviderKind, RateLimitRule, ip_ranges::DEFAULT_IP_RANGES_NAME_KEY,
    ruleset::DEFAULT_RULESET,
};
use tokio_util::sync::CancellationToken;

use crate::{
    auth::{AccountScope, AuthOptions},
    backend::{RegionFilter, Selection},
    fetch::DEFAULT_MAX_WORKERS,
};

pub const DEFAULT_REPORT_DIR: &str = "nimbus-report";

/// Where a run's inventory comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    /// Fetch everything from the provider.
    Fetch,
    /// Fetch, then carry over services only a previous run covered.
    IncrementalUpdate,
    /// Skip fetching; rehydrate from the previous run.
    LocalData,
}

/// Everything one run needs. Build with [`RunOptions::new`] and adjust
/// fields; defaults match an unrestricted full scan.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub auth: AuthOptions,
    pub scope: AccountScope,
    pub services: Vec<String>,
    pub skipped_services: Vec<String>,
    pub regions: Vec<String>,
    pub excluded_regions: Vec<String>,
    pub rate_limit: RateLimitRule,
    pub max_workers: usize,
    pub ruleset: PathBuf,
    pub exceptions: Option<PathBuf>,
    pub ip_ranges: Vec<PathBuf>,
    pub ip_ranges_name_key: String,
    /// Overrides the provider's default report name.
    pub report_name: Option<String>,
    pub report_dir: PathBuf,
    pub update: bool,
    pub fetch_local: bool,
    pub list_services: bool,
    pub persist_results: bool,
    pub cancel: CancellationToken,
}

impl RunOptions {
    pub fn new(auth: AuthOptions) -> Self {
        Self {
            auth,
            scope: AccountScope::default(),
            services: Vec::new(),
            skipped_services: Vec::new(),
            regions: Vec::new(),
            excluded_regions: Vec::new(),
            rate_limit: RateLimitRule::default(),
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
            cancel: CancellationToken::new(),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.auth.provider()
    }

    /// Errors when both `update` and `fetch_local` are set.
    pub fn data_mode(&self) -> Result<DataMode, &'static str> {
        match (self.update, self.fetch_local) {
            (true, true) => Err("incremental update and local-data mode are mutually exclusive"),
            (true, false) => Ok(DataMode::IncrementalUpdate),
            (false, true) => Ok(DataMode::LocalData),
            (false, false) => Ok(DataMode::Fetch),
        }
    }

    pub fn selection(&self) -> Selection {
        Selection {
            services: self.services.clone(),
            skipped_services: self.skipped_services.clone(),
            regions: RegionFilter::new(
                self.regions.clone(),
                self.excluded_regions.clone(),
            ),
            scope: self.scope.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_a_full_unrestricted_scan() {
        let options = RunOptions::new(AuthOptions::default_for(ProviderKind::Aws));

        assert_eq!(options.max_workers, 10);
        assert!(options.rate_limit.is_unbounded());
        assert_eq!(options.ruleset, PathBuf::from("default.json"));
        assert_eq!(options.ip_ranges_name_key, "name");
        assert_eq!(options.data_mode(), Ok(DataMode::Fetch));
    }

    #[test]
    fn update_and_local_data_conflict() {
        let mut options = RunOptions::new(AuthOptions::default_for(ProviderKind::Gcp));
        options.update = true;
        options.fetch_local = true;
        assert!(options.data_mode().is_err());
    }
}
