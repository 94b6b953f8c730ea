//! In-memory aggregate of discovered cloud resources.
//!
//! The tree is keyed by service name, then by resource identifier. Source
//! attributes are opaque JSON owned by the fetch collaborator; the pipeline
//! only ever adds annotations next to them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Severity attached to a finding rule.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RuleLevel {
    #[default]
    Warning,
    Danger,
}

/// A single discovered resource plus the annotations rule passes set on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resource {
    pub attributes: serde_json::Value,
    /// Finding rules that flagged this resource.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub flagged_by: BTreeSet<String>,
    /// Display filters that hide this resource by default.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub hidden_by: BTreeSet<String>,
    /// Finding rules for which an operator exception applies.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub excepted_for: BTreeSet<String>,
}

impl Resource {
    pub fn new(attributes: serde_json::Value) -> Self {
        Self {
            attributes,
            ..Default::default()
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.flagged_by.iter().any(|rule| !self.excepted_for.contains(rule))
    }
}

/// Outcome of one rule over one service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Finding {
    pub description: String,
    pub level: RuleLevel,
    pub checked_items: u64,
    /// Resource identifiers the rule matched.
    pub items: BTreeSet<String>,
    /// Subset of `items` suppressed by operator exceptions.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub excepted_items: BTreeSet<String>,
}

impl Finding {
    /// Matched items that are not excepted.
    pub fn flagged_items(&self) -> u64 {
        self.items.difference(&self.excepted_items).count() as u64
    }
}

/// Everything gathered and derived for a single service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceTree {
    #[serde(default)]
    pub resources: BTreeMap<String, Resource>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub findings: BTreeMap<String, Finding>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, Finding>,
}

impl ServiceTree {
    pub fn with_resources<I, K>(resources: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        Self {
            resources: resources
                .into_iter()
                .map(|(id, attributes)| (id.into(), Resource::new(attributes)))
                .collect(),
            ..Default::default()
        }
    }

    pub fn insert_resource(
        &mut self,
        id: impl Into<String>,
        attributes: serde_json::Value,
    ) {
        self.resources.insert(id.into(), Resource::new(attributes));
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

/// Resources of every gathered service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceTree {
    services: BTreeMap<String, ServiceTree>,
}

impl ResourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a service subtree, replacing any previous one outright.
    pub fn insert_service(
        &mut self,
        name: impl Into<String>,
        service: ServiceTree,
    ) -> Option<ServiceTree> {
        self.services.insert(name.into(), service)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceTree> {
        self.services.get(name)
    }

    pub fn service_mut(&mut self, name: &str) -> Option<&mut ServiceTree> {
        self.services.get_mut(name)
    }

    pub fn remove_service(&mut self, name: &str) -> Option<ServiceTree> {
        self.services.remove(name)
    }

    pub fn contains_service(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn services(&self) -> impl Iterator<Item = (&str, &ServiceTree)> {
        self.services.iter().map(|(name, tree)| (name.as_str(), tree))
    }

    pub fn services_mut(
        &mut self,
    ) -> impl Iterator<Item = (&str, &mut ServiceTree)> {
        self.services
            .iter_mut()
            .map(|(name, tree)| (name.as_str(), tree))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Total number of findings across services with at least one
    /// non-excepted flagged item.
    pub fn findings_count(&self) -> usize {
        self.services
            .values()
            .flat_map(|service| service.findings.values())
            .filter(|finding| finding.flagged_items() > 0)
            .count()
    }
}
