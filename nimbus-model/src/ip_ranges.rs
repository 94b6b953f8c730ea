use serde::{Deserialize, Serialize};

/// Name key used when an ip-range file does not say otherwise.
pub const DEFAULT_IP_RANGES_NAME_KEY: &str = "name";

/// A named network prefix rules may substitute for raw addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRange {
    pub prefix: String,
    pub name: String,
}

/// Substitution table shared read-only by every rule pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRangeTable {
    pub ranges: Vec<IpRange>,
}

impl IpRangeTable {
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ranges.iter().map(|range| range.name.as_str())
    }
}
