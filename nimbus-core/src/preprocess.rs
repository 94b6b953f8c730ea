//! Pre-processing: ip-range tables and the provider's own preparation hook.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, anyhow};
use ipnetwork::IpNetwork;
use nimbus_model::{IpRange, IpRangeTable};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{error::PipelineError, provider::ProviderHandle};

#[derive(Debug, Deserialize)]
struct IpRangeFile {
    #[serde(default)]
    prefixes: Vec<Map<String, Value>>,
}

fn parse_prefix(
    entry: &Map<String, Value>,
    name_key: &str,
) -> anyhow::Result<IpRange> {
    let prefix = entry
        .get("ip_prefix")
        .or_else(|| entry.get("ipv6_prefix"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("entry has no ip_prefix or ipv6_prefix"))?;
    let network: IpNetwork = prefix
        .parse()
        .with_context(|| format!("invalid network prefix '{prefix}'"))?;
    let name = entry
        .get(name_key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("prefix {prefix} has no '{name_key}' field"))?;

    Ok(IpRange {
        prefix: network.to_string(),
        name: name.to_string(),
    })
}

/// Reads every file into one table, in file order. `name_key` selects the
/// per-prefix field used as the range name.
pub async fn load_ip_ranges(
    paths: &[PathBuf],
    name_key: &str,
) -> anyhow::Result<IpRangeTable> {
    let mut table = IpRangeTable::default();

    for path in paths {
        let raw = tokio::fs::read(path).await.with_context(|| {
            format!("failed to read ip ranges file {}", path.display())
        })?;
        let file: IpRangeFile = serde_json::from_slice(&raw).with_context(|| {
            format!("ip ranges file {} is not valid JSON", path.display())
        })?;

        for (index, entry) in file.prefixes.iter().enumerate() {
            let range = parse_prefix(entry, name_key).with_context(|| {
                format!("{}: prefix #{index}", path.display())
            })?;
            table.ranges.push(range);
        }
    }

    Ok(table)
}

/// Loads the ip-range table and runs the backend's pre-processing hook over
/// the gathered tree.
pub async fn run_preprocessing(
    handle: &mut ProviderHandle,
    paths: &[PathBuf],
    name_key: &str,
) -> Result<IpRangeTable, PipelineError> {
    let table = load_ip_ranges(paths, name_key)
        .await
        .map_err(PipelineError::Preprocessing)?;

    let backend = Arc::clone(handle.backend());
    backend
        .preprocess(handle.tree_mut(), &table)
        .await
        .map_err(PipelineError::Preprocessing)?;

    tracing::debug!(
        target: "nimbus::preprocess",
        ip_ranges = table.len(),
        "pre-processing complete"
    );
    Ok(table)
}
