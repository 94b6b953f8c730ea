use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use nimbus_model::ExceptionTable;
use serde::Deserialize;

use crate::error::ExceptionLoadError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExceptionsFile {
    #[serde(default)]
    account_id: Option<String>,
    #[serde(default)]
    exceptions: BTreeMap<String, BTreeSet<String>>,
}

/// Reads an exceptions file. When the file names an account it must match
/// `account_id`.
pub async fn load_exceptions(
    path: &Path,
    account_id: &str,
) -> Result<ExceptionTable, ExceptionLoadError> {
    let raw = tokio::fs::read(path)
        .await
        .map_err(|source| ExceptionLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let file: ExceptionsFile =
        serde_json::from_slice(&raw).map_err(|source| ExceptionLoadError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;

    if let Some(found) = file.account_id
        && found != account_id
    {
        return Err(ExceptionLoadError::AccountMismatch {
            expected: account_id.to_string(),
            found,
        });
    }

    Ok(file
        .exceptions
        .into_iter()
        .flat_map(|(rule, resources)| {
            resources.into_iter().map(move |id| (rule.clone(), id))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn load(body: &str, account: &str) -> Result<ExceptionTable, ExceptionLoadError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exceptions.json");
        std::fs::write(&path, body).unwrap();
        load_exceptions(&path, account).await
    }

    #[tokio::test]
    async fn parses_rule_to_resource_sets() {
        let table = load(
            r#"{"account_id": "123", "exceptions": {"s3-public": ["bucket-a", "bucket-b"]}}"#,
            "123",
        )
        .await
        .unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.is_excepted("s3-public", "bucket-b"));
    }

    #[tokio::test]
    async fn malformed_file_is_invalid() {
        let err = load(r#"{"exceptions": ["#, "123").await.unwrap_err();
        assert!(matches!(err, ExceptionLoadError::Invalid { .. }));
    }

    #[tokio::test]
    async fn other_account_is_rejected() {
        let err = load(r#"{"account_id": "999", "exceptions": {}}"#, "123")
            .await
            .unwrap_err();
        assert!(matches!(err, ExceptionLoadError::AccountMismatch { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = load_exceptions(Path::new("/nonexistent/exceptions.json"), "123")
            .await
            .unwrap_err();
        assert!(matches!(err, ExceptionLoadError::Io { .. }));
    }
}
