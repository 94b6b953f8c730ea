use std::{collections::BTreeSet, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{ip_ranges::IpRangeTable, resource::RuleLevel};

/// Default finding ruleset shipped with the rule collaborator.
pub const DEFAULT_RULESET: &str = "default.json";
/// Fixed ruleset holding display filters.
pub const FILTERS_RULESET: &str = "filters.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Findings,
    Filters,
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleType::Findings => f.write_str("findings"),
            RuleType::Filters => f.write_str("filters"),
        }
    }
}

/// Everything the rule evaluator needs for one pass. Each pass builds its
/// own request.
#[derive(Debug, Clone, PartialEq)]
pub struct RulesetRequest {
    pub path: PathBuf,
    pub rule_type: RuleType,
    pub ip_ranges: IpRangeTable,
    pub account_id: String,
    pub environment: String,
}

impl RulesetRequest {
    /// Ruleset name as recorded in the run summary.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Result of one rule over one service, as produced by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub service: String,
    pub rule_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub level: RuleLevel,
    #[serde(default)]
    pub checked_items: u64,
    /// Resource identifiers within `service` the rule matched.
    #[serde(default)]
    pub flagged: BTreeSet<String>,
}
