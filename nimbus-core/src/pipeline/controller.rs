use std::{path::Path, sync::Arc};

use anyhow::{Context, anyhow};
use nimbus_model::{ExceptionTable, RuleType};
use tracing::{Instrument, error, info, info_span, warn};

use crate::{
    backend::{ProviderBackend, ProviderRegistry},
    credentials,
    error::PipelineError,
    exceptions::load_exceptions,
    fetch::FetchCoordinator,
    limiter::FixedWindowLimiter,
    merge::{load_local, merge_with_prior},
    postprocess::run_postprocessing,
    preprocess::run_preprocessing,
    provider::ProviderHandle,
    rules::{RuleEngine, RulePipeline, apply_exceptions, filters_path},
    state_store::{JsonFileStateStore, StateStore},
};

use super::{
    options::{DataMode, RunOptions},
    outcome::{RunFailure, RunOutcome, ScanReport},
    stage::PipelineStage,
};

/// Drives one run through every stage, converting each stage's failure into
/// its exit code. Stages run strictly in order; there is no retry.
#[derive(Debug, Clone)]
pub struct ScanPipeline {
    registry: ProviderRegistry,
    rules: RulePipeline,
    store: Arc<dyn StateStore>,
}

fn enter(stage: PipelineStage) {
    info!(target: "nimbus::pipeline", stage = %stage, "{}", stage.banner());
}

/// Report names double as state-store keys and file stems.
fn resolve_report_name(
    configured: Option<&str>,
    handle: &ProviderHandle,
) -> Result<String, PipelineError> {
    let name = configured.unwrap_or_else(|| handle.report_name()).trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(PipelineError::ReportInit(anyhow!(
            "report name '{name}' is not usable"
        )));
    }
    if name.contains(['/', '\\']) {
        return Err(PipelineError::ReportInit(anyhow!(
            "report name '{name}' must not contain path separators"
        )));
    }
    Ok(name.to_string())
}

impl ScanPipeline {
    pub fn new(
        registry: ProviderRegistry,
        engine: Arc<dyn RuleEngine>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            registry,
            rules: RulePipeline::new(engine),
            store,
        }
    }

    /// Pipeline for a single provider.
    pub fn with_backend(
        backend: Arc<dyn ProviderBackend>,
        engine: Arc<dyn RuleEngine>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self::new(ProviderRegistry::new().with(backend), engine, store)
    }

    pub async fn execute(&self, options: RunOptions) -> RunOutcome {
        let span = info_span!(
            target: "nimbus::pipeline",
            "scan_run",
            provider = %options.provider()
        );

        match self.run(&options).instrument(span).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    target: "nimbus::pipeline",
                    stage = %err.stage(),
                    exit_code = err.exit_code(),
                    "{err}"
                );
                RunOutcome::Failed(RunFailure::from(&err))
            }
        }
    }

    async fn run(&self, options: &RunOptions) -> Result<RunOutcome, PipelineError> {
        let provider = options.provider();

        enter(PipelineStage::Authenticating);
        let backend = self.registry.get(provider).ok_or_else(|| {
            PipelineError::Authentication(anyhow!(
                "no backend registered for {}",
                provider.display_name()
            ))
        })?;
        let credentials = credentials::resolve(backend.as_ref(), &options.auth).await?;

        enter(PipelineStage::ProviderInit);
        let mode = options
            .data_mode()
            .map_err(|reason| PipelineError::Initialization(anyhow!(reason)))?;
        options
            .rate_limit
            .validate()
            .map_err(|err| PipelineError::Initialization(err.into()))?;
        let mut handle =
            ProviderHandle::initialize(backend, credentials, options.selection())
                .await?;

        enter(PipelineStage::ReportInit);
        let report_name =
            resolve_report_name(options.report_name.as_deref(), &handle)?;
        ensure_report_dir(&options.report_dir).await?;

        if options.list_services {
            enter(PipelineStage::ListServicesAndExit);
            return Ok(RunOutcome::ServicesListed(
                handle.available_services().to_vec(),
            ));
        }

        let mut failed_services = Vec::new();
        let mut carried_over = Vec::new();
        match mode {
            DataMode::Fetch | DataMode::IncrementalUpdate => {
                enter(PipelineStage::Gathering);
                let coordinator = FetchCoordinator::new(
                    options.max_workers,
                    FixedWindowLimiter::shared(options.rate_limit.clone()),
                );
                let report = handle.fetch(&coordinator, &options.cancel).await?;
                failed_services = report.failed;

                if mode == DataMode::IncrementalUpdate {
                    enter(PipelineStage::Merging);
                    match merge_with_prior(&mut handle, self.store.as_ref(), &report_name)
                        .await
                    {
                        Ok(carried) => carried_over = carried,
                        Err(err) => warn!(
                            target: "nimbus::pipeline",
                            error = %err,
                            "could not merge persisted state; continuing with fetched data"
                        ),
                    }
                }
            }
            DataMode::LocalData => {
                enter(PipelineStage::Merging);
                if let Err(err) =
                    load_local(&mut handle, self.store.as_ref(), &report_name).await
                {
                    warn!(
                        target: "nimbus::pipeline",
                        error = %err,
                        "could not load persisted state; continuing with empty data"
                    );
                }
            }
        }

        if options.cancel.is_cancelled() {
            let stage = match mode {
                DataMode::Fetch => PipelineStage::Gathering,
                DataMode::IncrementalUpdate | DataMode::LocalData => {
                    PipelineStage::Merging
                }
            };
            return Err(PipelineError::Cancelled(stage));
        }

        enter(PipelineStage::Preprocessing);
        let ip_ranges = run_preprocessing(
            &mut handle,
            &options.ip_ranges,
            &options.ip_ranges_name_key,
        )
        .await?;

        enter(PipelineStage::RuleEvaluation);
        let findings_request = RulePipeline::request(
            options.ruleset.clone(),
            RuleType::Findings,
            &ip_ranges,
            handle.account_id(),
            handle.environment(),
        );
        self.rules
            .run_findings(&findings_request, handle.tree_mut())?;

        enter(PipelineStage::FilterEvaluation);
        let filters_request = RulePipeline::request(
            filters_path(&options.ruleset),
            RuleType::Filters,
            &ip_ranges,
            handle.account_id(),
            handle.environment(),
        );
        self.rules.run_filters(&filters_request, handle.tree_mut())?;

        let mut exceptions_applied = 0;
        if let Some(path) = &options.exceptions {
            enter(PipelineStage::ExceptionHandling);
            let table = match load_exceptions(path, handle.account_id()).await {
                Ok(table) => table,
                Err(err) => {
                    warn!(
                        target: "nimbus::pipeline",
                        error = %err,
                        "failed to load exceptions; none applied"
                    );
                    ExceptionTable::new()
                }
            };
            exceptions_applied = apply_exceptions(handle.tree_mut(), &table);
        }

        enter(PipelineStage::PostProcessing);
        let last_run = run_postprocessing(&mut handle, &findings_request.name()).await?;

        let snapshot = handle.into_snapshot();
        let report = ScanReport {
            metadata: snapshot.metadata,
            report_name,
            service_list: snapshot.service_list,
            services: snapshot.services,
            last_run,
            failed_services,
            exceptions_applied,
            carried_over,
        };

        if options.persist_results {
            self.store
                .persist(&report.report_name, &report.to_state_blob())
                .await
                .map_err(PipelineError::PostProcessing)?;
        }

        enter(PipelineStage::Done);
        info!(
            target: "nimbus::pipeline",
            report = %report.report_name,
            services = report.service_list.len(),
            findings = report.findings_count(),
            failed_services = report.failed_services.len(),
            "scan finished"
        );
        Ok(RunOutcome::Completed(Box::new(report)))
    }
}

async fn ensure_report_dir(dir: &Path) -> Result<(), PipelineError> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create report dir {}", dir.display()))
        .map_err(PipelineError::ReportInit)
}

/// Runs one scan with a JSON file state store rooted at the report
/// directory.
pub async fn execute_run(
    backend: Arc<dyn ProviderBackend>,
    engine: Arc<dyn RuleEngine>,
    options: RunOptions,
) -> RunOutcome {
    let store = Arc::new(JsonFileStateStore::new(options.report_dir.clone()));
    ScanPipeline::with_backend(backend, engine, store)
        .execute(options)
        .await
}
