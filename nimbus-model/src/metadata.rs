use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ids::RunId,
    provider::ProviderKind,
    resource::{ResourceTree, RuleLevel},
};

/// Identity of the scanned account for one run. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunMetadata {
    pub run_id: RunId,
    pub provider: ProviderKind,
    pub account_id: String,
    pub environment: String,
    pub started_at: DateTime<Utc>,
}

impl RunMetadata {
    pub fn new(
        provider: ProviderKind,
        account_id: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            run_id: RunId::new(),
            provider,
            account_id: account_id.into(),
            environment: environment.into(),
            started_at: Utc::now(),
        }
    }
}

/// Selection parameters recorded alongside the results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunParameters {
    pub services: Vec<String>,
    pub skipped_services: Vec<String>,
    pub regions: Vec<String>,
    pub excluded_regions: Vec<String>,
}

/// Per-service roll-up of the finding pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSummary {
    pub resources_count: u64,
    pub rules_count: u64,
    pub checked_items: u64,
    pub flagged_items: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_level: Option<RuleLevel>,
}

/// Summary written by post-processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LastRun {
    pub time: DateTime<Utc>,
    pub run_parameters: RunParameters,
    pub ruleset_name: String,
    pub summary: BTreeMap<String, ServiceSummary>,
}

impl LastRun {
    pub fn summarize(
        time: DateTime<Utc>,
        run_parameters: RunParameters,
        ruleset_name: impl Into<String>,
        tree: &ResourceTree,
    ) -> Self {
        let summary = tree
            .services()
            .map(|(name, service)| {
                let mut entry = ServiceSummary {
                    resources_count: service.resource_count() as u64,
                    rules_count: service.findings.len() as u64,
                    ..Default::default()
                };
                for finding in service.findings.values() {
                    entry.checked_items += finding.checked_items;
                    let flagged = finding.flagged_items();
                    entry.flagged_items += flagged;
                    if flagged > 0 {
                        entry.max_level = entry.max_level.max(Some(finding.level));
                    }
                }
                (name.to_string(), entry)
            })
            .collect();

        Self {
            time,
            run_parameters,
            ruleset_name: ruleset_name.into(),
            summary,
        }
    }

    pub fn total_flagged_items(&self) -> u64 {
        self.summary.values().map(|s| s.flagged_items).sum()
    }
}
