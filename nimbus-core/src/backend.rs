//! Seam between the pipeline and a concrete cloud provider.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use nimbus_model::{IpRangeTable, LastRun, ProviderKind, ResourceTree, ServiceTree};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::{
    auth::{AccountScope, AuthOptions},
    credentials::Credentials,
    error::FetchError,
    limiter::CallThrottle,
};

static REGION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("valid region pattern")
});

/// What a provider reports about the account behind a set of credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescription {
    pub account_id: String,
    pub environment: String,
    /// Services the provider can fetch, in display order.
    pub services: Vec<String>,
    /// Report name used when the run does not configure one.
    pub report_name: String,
}

/// Region inclusion and exclusion lists for a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionFilter {
    /// Empty means every region the provider offers.
    pub regions: Vec<String>,
    pub excluded: Vec<String>,
}

impl RegionFilter {
    pub fn new(regions: Vec<String>, excluded: Vec<String>) -> Self {
        Self { regions, excluded }
    }

    /// Checks region names and rejects a region that is both included and
    /// excluded.
    pub fn validate(&self) -> Result<(), FetchError> {
        for region in self.regions.iter().chain(&self.excluded) {
            if !REGION_NAME.is_match(region) {
                return Err(FetchError::InvalidRegions(format!(
                    "'{region}' is not a valid region name"
                )));
            }
        }

        if let Some(region) =
            self.regions.iter().find(|region| self.excluded.contains(region))
        {
            return Err(FetchError::InvalidRegions(format!(
                "'{region}' is both selected and excluded"
            )));
        }

        Ok(())
    }

    pub fn allows(&self, region: &str) -> bool {
        let included = self.regions.is_empty()
            || self.regions.iter().any(|selected| selected == region);
        included && !self.excluded.iter().any(|excluded| excluded == region)
    }
}

/// Provider selection the handle is constructed with.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub services: Vec<String>,
    pub skipped_services: Vec<String>,
    pub regions: RegionFilter,
    pub scope: AccountScope,
}

/// Inputs for fetching one service.
#[derive(Clone)]
pub struct FetchContext {
    pub service: String,
    pub regions: RegionFilter,
    /// Shared run-wide limiter; gate any inner API calls through it.
    pub throttle: Arc<dyn CallThrottle>,
    pub cancel: CancellationToken,
}

impl fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchContext")
            .field("service", &self.service)
            .field("regions", &self.regions)
            .field("throttle", &self.throttle)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Per-provider collaborator: authentication, account description, resource
/// fetching and the optional pre/post-processing hooks.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// `Ok(None)` means the authenticator found no usable credentials.
    async fn authenticate(
        &self,
        options: &AuthOptions,
    ) -> anyhow::Result<Option<Credentials>>;

    async fn describe(
        &self,
        credentials: &Credentials,
        scope: &AccountScope,
    ) -> anyhow::Result<ProviderDescription>;

    /// Fetches one service. The returned subtree is owned by the caller.
    async fn fetch_service(
        &self,
        credentials: &Credentials,
        context: FetchContext,
    ) -> anyhow::Result<ServiceTree>;

    async fn preprocess(
        &self,
        _tree: &mut ResourceTree,
        _ip_ranges: &IpRangeTable,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn postprocess(
        &self,
        _tree: &mut ResourceTree,
        _last_run: &LastRun,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Backends available to a pipeline, one per provider.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    backends: HashMap<ProviderKind, Arc<dyn ProviderBackend>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.backends.keys().copied().collect();
        kinds.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &kinds)
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend under its own kind, replacing any previous one.
    pub fn register(&mut self, backend: Arc<dyn ProviderBackend>) -> &mut Self {
        self.backends.insert(backend.kind(), backend);
        self
    }

    pub fn with(mut self, backend: Arc<dyn ProviderBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ProviderBackend>> {
        self.backends.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.backends.contains_key(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(regions: &[&str], excluded: &[&str]) -> RegionFilter {
        RegionFilter::new(
            regions.iter().map(|s| s.to_string()).collect(),
            excluded.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn region_lists_accept_provider_style_names() {
        assert!(filter(&["us-east-1", "eu-west-3"], &["ap-south-1"])
            .validate()
            .is_ok());
        assert!(filter(&[], &[]).validate().is_ok());
    }

    #[test]
    fn malformed_region_names_are_rejected() {
        for bad in ["US-EAST-1", "", "-east", "us east"] {
            let err = filter(&[bad], &[]).validate().unwrap_err();
            assert!(matches!(err, FetchError::InvalidRegions(_)), "{bad}");
        }
    }

    #[test]
    fn overlapping_include_and_exclude_is_rejected() {
        let err = filter(&["us-east-1"], &["us-east-1"]).validate().unwrap_err();
        assert!(err.to_string().contains("both selected and excluded"));
    }

    #[test]
    fn exclusion_wins_when_no_regions_are_selected() {
        let regions = filter(&[], &["us-west-2"]);
        assert!(regions.allows("us-east-1"));
        assert!(!regions.allows("us-west-2"));
    }
}
