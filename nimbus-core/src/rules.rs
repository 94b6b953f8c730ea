//! Finding, filter and exception passes over the resource tree.
//!
//! Rule semantics live behind [`RuleEngine`]; this module only turns the
//! evaluator's annotations into tree state. Every pass first clears what it
//! owns and then sets annotations keyed by rule id, so re-running a pass
//! with the same inputs leaves the tree unchanged.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use nimbus_model::{
    Annotation, ExceptionTable, Finding, IpRangeTable, ResourceTree, RuleType,
    RulesetRequest, ruleset::FILTERS_RULESET,
};
use tracing::debug;

use crate::error::PipelineError;

/// Evaluates a ruleset against the tree. Runs to completion without
/// suspending; it must not mutate anything.
pub trait RuleEngine: Send + Sync {
    fn evaluate(
        &self,
        request: &RulesetRequest,
        tree: &ResourceTree,
    ) -> anyhow::Result<Vec<Annotation>>;
}

/// Records findings. Returns the number of annotations applied.
pub fn apply_findings(tree: &mut ResourceTree, annotations: &[Annotation]) -> usize {
    for (_, service) in tree.services_mut() {
        service.findings.clear();
        for resource in service.resources.values_mut() {
            resource.flagged_by.clear();
            resource.excepted_for.clear();
        }
    }

    let mut applied = 0;
    for annotation in annotations {
        let Some(service) = tree.service_mut(&annotation.service) else {
            debug!(
                target: "nimbus::rules",
                service = %annotation.service,
                rule = %annotation.rule_id,
                "finding for a service not in the tree; ignored"
            );
            continue;
        };

        let mut items = std::collections::BTreeSet::new();
        for id in &annotation.flagged {
            match service.resources.get_mut(id) {
                Some(resource) => {
                    resource.flagged_by.insert(annotation.rule_id.clone());
                    items.insert(id.clone());
                }
                None => debug!(
                    target: "nimbus::rules",
                    service = %annotation.service,
                    rule = %annotation.rule_id,
                    resource = %id,
                    "flagged resource not in the tree; ignored"
                ),
            }
        }

        service.findings.insert(
            annotation.rule_id.clone(),
            Finding {
                description: annotation.description.clone(),
                level: annotation.level,
                checked_items: annotation.checked_items,
                items,
                excepted_items: Default::default(),
            },
        );
        applied += 1;
    }
    applied
}

/// Marks resources hidden by display filters. Nothing is removed.
pub fn apply_filters(tree: &mut ResourceTree, annotations: &[Annotation]) -> usize {
    for (_, service) in tree.services_mut() {
        service.filters.clear();
        for resource in service.resources.values_mut() {
            resource.hidden_by.clear();
        }
    }

    let mut applied = 0;
    for annotation in annotations {
        let Some(service) = tree.service_mut(&annotation.service) else {
            debug!(
                target: "nimbus::rules",
                service = %annotation.service,
                filter = %annotation.rule_id,
                "filter for a service not in the tree; ignored"
            );
            continue;
        };

        let mut items = std::collections::BTreeSet::new();
        for id in &annotation.flagged {
            if let Some(resource) = service.resources.get_mut(id) {
                resource.hidden_by.insert(annotation.rule_id.clone());
                items.insert(id.clone());
            }
        }

        service.filters.insert(
            annotation.rule_id.clone(),
            Finding {
                description: annotation.description.clone(),
                level: annotation.level,
                checked_items: annotation.checked_items,
                items,
                excepted_items: Default::default(),
            },
        );
        applied += 1;
    }
    applied
}

/// Marks flagged resources the table excepts. Returns the number of
/// (rule, resource) pairs excepted.
pub fn apply_exceptions(tree: &mut ResourceTree, table: &ExceptionTable) -> usize {
    let mut excepted = 0;

    for (_, service) in tree.services_mut() {
        for (rule_id, finding) in service.findings.iter_mut() {
            finding.excepted_items.clear();
            let Some(excluded) = table.excluded_for(rule_id) else {
                continue;
            };

            for id in finding.items.intersection(excluded) {
                finding.excepted_items.insert(id.clone());
                if let Some(resource) = service.resources.get_mut(id) {
                    resource.excepted_for.insert(rule_id.clone());
                }
                excepted += 1;
            }
        }
    }

    excepted
}

/// Fixed filters ruleset, resolved next to the findings ruleset.
pub fn filters_path(ruleset: &Path) -> PathBuf {
    ruleset
        .parent()
        .map(|dir| dir.join(FILTERS_RULESET))
        .unwrap_or_else(|| PathBuf::from(FILTERS_RULESET))
}

/// Runs the findings and filters passes through a [`RuleEngine`].
#[derive(Clone)]
pub struct RulePipeline {
    engine: Arc<dyn RuleEngine>,
}

impl fmt::Debug for RulePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RulePipeline")
            .field("engine", &std::any::type_name_of_val(self.engine.as_ref()))
            .finish()
    }
}

impl RulePipeline {
    pub fn new(engine: Arc<dyn RuleEngine>) -> Self {
        Self { engine }
    }

    pub fn request(
        path: PathBuf,
        rule_type: RuleType,
        ip_ranges: &IpRangeTable,
        account_id: &str,
        environment: &str,
    ) -> RulesetRequest {
        RulesetRequest {
            path,
            rule_type,
            ip_ranges: ip_ranges.clone(),
            account_id: account_id.to_string(),
            environment: environment.to_string(),
        }
    }

    pub fn run_findings(
        &self,
        request: &RulesetRequest,
        tree: &mut ResourceTree,
    ) -> Result<usize, PipelineError> {
        let annotations = self
            .engine
            .evaluate(request, tree)
            .map_err(PipelineError::RuleEngine)?;
        Ok(apply_findings(tree, &annotations))
    }

    pub fn run_filters(
        &self,
        request: &RulesetRequest,
        tree: &mut ResourceTree,
    ) -> Result<usize, PipelineError> {
        let annotations = self
            .engine
            .evaluate(request, tree)
            .map_err(PipelineError::FilterEngine)?;
        Ok(apply_filters(tree, &annotations))
    }
}
