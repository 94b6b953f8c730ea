use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Operator-declared suppressions: rule id to excluded resource ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExceptionTable {
    rules: BTreeMap<String, BTreeSet<String>>,
}

impl ExceptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        rule_id: impl Into<String>,
        resource_id: impl Into<String>,
    ) {
        self.rules
            .entry(rule_id.into())
            .or_default()
            .insert(resource_id.into());
    }

    pub fn excluded_for(&self, rule_id: &str) -> Option<&BTreeSet<String>> {
        self.rules.get(rule_id)
    }

    pub fn is_excepted(&self, rule_id: &str, resource_id: &str) -> bool {
        self.rules
            .get(rule_id)
            .is_some_and(|resources| resources.contains(resource_id))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.values().all(BTreeSet::is_empty)
    }

    /// Number of (rule, resource) pairs declared.
    pub fn len(&self) -> usize {
        self.rules.values().map(BTreeSet::len).sum()
    }
}

impl FromIterator<(String, String)> for ExceptionTable {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut table = ExceptionTable::new();
        for (rule, resource) in iter {
            table.insert(rule, resource);
        }
        table
    }
}
