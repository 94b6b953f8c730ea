use std::sync::Arc;

use chrono::Utc;
use nimbus_model::{LastRun, RunParameters};

use crate::{backend::Selection, error::PipelineError, provider::ProviderHandle};

impl From<&Selection> for RunParameters {
    fn from(selection: &Selection) -> Self {
        RunParameters {
            services: selection.services.clone(),
            skipped_services: selection.skipped_services.clone(),
            regions: selection.regions.regions.clone(),
            excluded_regions: selection.regions.excluded.clone(),
        }
    }
}

/// Summarizes the annotated tree, runs the backend's post-processing hook
/// and stores the summary on the handle.
pub async fn run_postprocessing(
    handle: &mut ProviderHandle,
    ruleset_name: &str,
) -> Result<LastRun, PipelineError> {
    let parameters = RunParameters::from(handle.selection());
    let last_run = LastRun::summarize(Utc::now(), parameters, ruleset_name, handle.tree());

    let backend = Arc::clone(handle.backend());
    backend
        .postprocess(handle.tree_mut(), &last_run)
        .await
        .map_err(PipelineError::PostProcessing)?;

    tracing::debug!(
        target: "nimbus::postprocess",
        flagged_items = last_run.total_flagged_items(),
        "post-processing complete"
    );
    handle.set_last_run(last_run.clone());
    Ok(last_run)
}
