//! Provider handle: the per-run view of one authenticated cloud account.

use std::{fmt, sync::Arc};

use anyhow::Context;
use nimbus_model::{
    LastRun, ProviderKind, ResourceTree, RunMetadata, STATE_BLOB_VERSION,
    ServiceList, StateBlob,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    backend::{ProviderBackend, Selection},
    credentials::Credentials,
    error::{FetchError, HandleStateError, PipelineError, StateLoadError},
    fetch::{FailedService, FetchCoordinator, FetchReport},
};

/// Lifecycle of a [`ProviderHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    Uninitialized,
    Fetching,
    Fetched,
    Hydrated,
}

impl HandleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleState::Uninitialized => "uninitialized",
            HandleState::Fetching => "fetching",
            HandleState::Fetched => "fetched",
            HandleState::Hydrated => "hydrated",
        }
    }

    fn can_move_to(self, next: HandleState) -> bool {
        matches!(
            (self, next),
            (HandleState::Uninitialized, HandleState::Fetching)
                | (HandleState::Fetching, HandleState::Fetched)
                | (HandleState::Uninitialized, HandleState::Hydrated)
        )
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ProviderHandle {
    backend: Arc<dyn ProviderBackend>,
    credentials: Credentials,
    selection: Selection,
    metadata: RunMetadata,
    report_name: String,
    available_services: Vec<String>,
    service_list: ServiceList,
    tree: ResourceTree,
    last_run: Option<LastRun>,
    state: HandleState,
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("provider", &self.metadata.provider)
            .field("account_id", &self.metadata.account_id)
            .field("state", &self.state)
            .field("service_list", &self.service_list)
            .field("services_in_tree", &self.tree.len())
            .finish_non_exhaustive()
    }
}

impl ProviderHandle {
    /// Describes the account behind `credentials` and resolves the service
    /// list. Every failure here is an initialization failure.
    pub async fn initialize(
        backend: Arc<dyn ProviderBackend>,
        credentials: Credentials,
        selection: Selection,
    ) -> Result<Self, PipelineError> {
        let provider = backend.kind();
        let description = backend
            .describe(&credentials, &selection.scope)
            .await
            .with_context(|| format!("failed to describe {provider} account"))
            .map_err(PipelineError::Initialization)?;

        let service_list = ServiceList::select(
            &description.services,
            &selection.services,
            &selection.skipped_services,
        )
        .map_err(|err| PipelineError::Initialization(err.into()))?;

        info!(
            target: "nimbus::provider",
            provider = %provider,
            account_id = %description.account_id,
            services = service_list.len(),
            "provider initialized"
        );

        Ok(Self {
            metadata: RunMetadata::new(
                provider,
                description.account_id,
                description.environment,
            ),
            report_name: description.report_name,
            available_services: description.services,
            backend,
            credentials,
            selection,
            service_list,
            tree: ResourceTree::new(),
            last_run: None,
            state: HandleState::Uninitialized,
        })
    }

    pub fn provider(&self) -> ProviderKind {
        self.metadata.provider
    }

    pub fn account_id(&self) -> &str {
        &self.metadata.account_id
    }

    pub fn environment(&self) -> &str {
        &self.metadata.environment
    }

    pub fn report_name(&self) -> &str {
        &self.report_name
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn service_list(&self) -> &ServiceList {
        &self.service_list
    }

    /// Every service the provider offers, regardless of selection.
    pub fn available_services(&self) -> &[String] {
        &self.available_services
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn backend(&self) -> &Arc<dyn ProviderBackend> {
        &self.backend
    }

    pub fn tree(&self) -> &ResourceTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ResourceTree {
        &mut self.tree
    }

    /// Tree and service list together, for stages that extend both.
    pub fn parts_mut(&mut self) -> (&mut ResourceTree, &mut ServiceList) {
        (&mut self.tree, &mut self.service_list)
    }

    pub fn last_run(&self) -> Option<&LastRun> {
        self.last_run.as_ref()
    }

    pub fn set_last_run(&mut self, last_run: LastRun) {
        self.last_run = Some(last_run);
    }

    fn transition(&mut self, next: HandleState) -> Result<(), HandleStateError> {
        if !self.state.can_move_to(next) {
            return Err(HandleStateError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Gathers every selected service. Services that fail are recorded in
    /// the report and left out of the tree.
    ///
    /// On cancellation the tree keeps only the services that completed
    /// before the signal and `FetchError::Cancelled` is returned.
    pub async fn fetch(
        &mut self,
        coordinator: &FetchCoordinator,
        cancel: &CancellationToken,
    ) -> Result<FetchReport, FetchError> {
        self.transition(HandleState::Fetching)?;

        let outcome = coordinator
            .gather(
                Arc::clone(&self.backend),
                self.credentials.clone(),
                &self.service_list,
                &self.selection.regions,
                cancel,
            )
            .await?;

        let mut report = FetchReport::default();
        for (service, subtree) in outcome.services {
            self.tree.insert_service(service.clone(), subtree);
            report.fetched.push(service);
        }

        if outcome.cancelled {
            return Err(FetchError::Cancelled {
                completed: report.fetched.len(),
            });
        }

        report.failed = outcome.failures.iter().map(FailedService::from).collect();
        self.transition(HandleState::Fetched)?;
        Ok(report)
    }

    /// Replaces tree, service list, metadata and last-run summary with a
    /// persisted snapshot.
    pub fn hydrate(&mut self, blob: StateBlob) -> Result<(), StateLoadError> {
        if blob.version != STATE_BLOB_VERSION {
            return Err(StateLoadError::UnsupportedVersion {
                found: blob.version,
                expected: STATE_BLOB_VERSION,
            });
        }
        if blob.metadata.provider != self.provider() {
            return Err(StateLoadError::ProviderMismatch {
                expected: self.provider(),
                found: blob.metadata.provider,
            });
        }
        self.transition(HandleState::Hydrated)?;

        self.metadata = blob.metadata;
        self.service_list = blob.service_list;
        self.tree = blob.services;
        self.last_run = blob.last_run;
        Ok(())
    }

    pub fn snapshot(&self) -> StateBlob {
        StateBlob {
            version: STATE_BLOB_VERSION,
            metadata: self.metadata.clone(),
            service_list: self.service_list.clone(),
            services: self.tree.clone(),
            last_run: self.last_run.clone(),
        }
    }

    /// Consumes the handle; credentials are dropped with it.
    pub fn into_snapshot(self) -> StateBlob {
        StateBlob {
            version: STATE_BLOB_VERSION,
            metadata: self.metadata,
            service_list: self.service_list,
            services: self.tree,
            last_run: self.last_run,
        }
    }
}
