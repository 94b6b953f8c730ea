use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Ordered, duplicate-free list of services a run covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ServiceList(Vec<String>);

impl ServiceList {
    /// Resolves the services to fetch.
    ///
    /// An empty `requested` list selects everything in `available`. Skipped
    /// names always win over requested ones. Requesting a service the
    /// provider does not offer is an error; skipping one is not.
    pub fn select(
        available: &[String],
        requested: &[String],
        skipped: &[String],
    ) -> Result<Self, ModelError> {
        let skipped: BTreeSet<&str> = skipped.iter().map(String::as_str).collect();

        let candidates: Vec<&String> = if requested.is_empty() {
            available.iter().collect()
        } else {
            for name in requested {
                if skipped.contains(name.as_str()) {
                    continue;
                }
                if !available.iter().any(|offered| offered == name) {
                    return Err(ModelError::UnknownService(name.clone()));
                }
            }
            requested.iter().collect()
        };

        let mut list = ServiceList::default();
        for name in candidates {
            if !skipped.contains(name.as_str()) {
                list.push(name.clone())?;
            }
        }
        Ok(list)
    }

    /// Appends a service unless already present. Returns whether it was added.
    pub fn push(&mut self, name: impl Into<String>) -> Result<bool, ModelError> {
        let name = name.into();
        if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
            return Err(ModelError::InvalidServiceName(name));
        }
        if self.contains(&name) {
            return Ok(false);
        }
        self.0.push(name);
        Ok(true)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|existing| existing == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<String>> for ServiceList {
    type Error = ModelError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        let mut list = ServiceList::default();
        for name in names {
            list.push(name)?;
        }
        Ok(list)
    }
}

impl From<ServiceList> for Vec<String> {
    fn from(list: ServiceList) -> Self {
        list.0
    }
}

impl<'a> IntoIterator for &'a ServiceList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn skip_wins_over_request() {
        let available = names(&["iam", "s3", "ec2"]);
        let list = ServiceList::select(
            &available,
            &names(&["iam", "s3"]),
            &names(&["s3"]),
        )
        .unwrap();
        assert_eq!(list.as_slice(), &names(&["iam"])[..]);
    }

    #[test]
    fn empty_request_selects_all_available_minus_skipped() {
        let available = names(&["iam", "s3", "ec2"]);
        let list =
            ServiceList::select(&available, &[], &names(&["ec2"])).unwrap();
        assert_eq!(list.as_slice(), &names(&["iam", "s3"])[..]);
    }

    #[test]
    fn requesting_unknown_service_fails() {
        let available = names(&["iam"]);
        let err = ServiceList::select(&available, &names(&["lambda"]), &[])
            .unwrap_err();
        assert_eq!(err, ModelError::UnknownService("lambda".into()));
    }

    #[test]
    fn skipping_an_unknown_requested_service_is_not_an_error() {
        let available = names(&["iam"]);
        let list = ServiceList::select(
            &available,
            &names(&["iam", "lambda"]),
            &names(&["lambda"]),
        )
        .unwrap();
        assert_eq!(list.as_slice(), &names(&["iam"])[..]);
    }

    #[test]
    fn duplicates_collapse_and_keep_first_position() {
        let available = names(&["iam", "s3"]);
        let list = ServiceList::select(
            &available,
            &names(&["s3", "iam", "s3"]),
            &[],
        )
        .unwrap();
        assert_eq!(list.as_slice(), &names(&["s3", "iam"])[..]);
    }

    #[test]
    fn deserializing_rejects_blank_names() {
        let err = serde_json::from_str::<ServiceList>(r#"["iam", " "]"#);
        assert!(err.is_err());
    }
}
