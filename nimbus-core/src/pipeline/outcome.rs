use nimbus_model::{
    LastRun, ResourceTree, RunMetadata, STATE_BLOB_VERSION, ServiceList, StateBlob,
};
use serde::Serialize;

use crate::{error::PipelineError, fetch::FailedService};

use super::stage::{PipelineStage, exit_codes};

/// Finalized result of a successful scan, ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub metadata: RunMetadata,
    pub report_name: String,
    pub service_list: ServiceList,
    pub services: ResourceTree,
    pub last_run: LastRun,
    /// Services whose fetch failed; absent from `services`.
    pub failed_services: Vec<FailedService>,
    pub exceptions_applied: usize,
    /// Services copied from the previous run in incremental-update mode.
    pub carried_over: Vec<String>,
}

impl ScanReport {
    /// Rules with at least one non-excepted flagged resource.
    pub fn findings_count(&self) -> usize {
        self.services.findings_count()
    }

    pub fn to_state_blob(&self) -> StateBlob {
        StateBlob {
            version: STATE_BLOB_VERSION,
            metadata: self.metadata.clone(),
            service_list: self.service_list.clone(),
            services: self.services.clone(),
            last_run: Some(self.last_run.clone()),
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    pub stage: PipelineStage,
    pub exit_code: i32,
    pub message: String,
}

impl From<&PipelineError> for RunFailure {
    fn from(err: &PipelineError) -> Self {
        Self {
            stage: err.stage(),
            exit_code: err.exit_code(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(Box<ScanReport>),
    /// List-services mode: every service the provider offers, nothing
    /// fetched.
    ServicesListed(Vec<String>),
    Failed(RunFailure),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed(_) | RunOutcome::ServicesListed(_) => {
                exit_codes::SUCCESS
            }
            RunOutcome::Failed(failure) => failure.exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == exit_codes::SUCCESS
    }

    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        match self {
            RunOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}
