use std::{path::PathBuf, str::FromStr};

use nimbus_model::ProviderKind;

use crate::{loader::error::ConfigLoadError, models::settings::RunSettings};

pub fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| {
        raw.split(',')
            .filter_map(|part| {
                let trimmed = part.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect()
    })
}

/// Parse a boolean value from a raw string, accepting common env-style forms.
///
/// Accepted truthy values (case-insensitive): `"1"`, `"true"`, `"yes"`, `"on"`.
/// Accepted falsy values: `"0"`, `"false"`, `"no"`, `"off"`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn bool_var(name: &'static str) -> Result<Option<bool>, ConfigLoadError> {
    match non_empty_var(name) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or(ConfigLoadError::InvalidEnvVar { name, value: raw }),
        None => Ok(None),
    }
}

fn parsed_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigLoadError> {
    match non_empty_var(name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigLoadError::InvalidEnvVar { name, value: raw }),
        None => Ok(None),
    }
}

/// Applies `NIMBUS_*` environment overrides on top of loaded settings.
/// Unset or blank variables leave the setting untouched; unparsable values
/// are errors.
pub fn apply_env_overrides(settings: &mut RunSettings) -> Result<(), ConfigLoadError> {
    if let Some(provider) = parsed_var::<ProviderKind>("NIMBUS_PROVIDER")? {
        settings.provider = provider;
    }
    if let Some(services) = parse_csv_var("NIMBUS_SERVICES") {
        settings.services = services;
    }
    if let Some(skipped) = parse_csv_var("NIMBUS_SKIPPED_SERVICES") {
        settings.skipped_services = skipped;
    }
    if let Some(regions) = parse_csv_var("NIMBUS_REGIONS") {
        settings.regions = regions;
    }
    if let Some(excluded) = parse_csv_var("NIMBUS_EXCLUDED_REGIONS") {
        settings.excluded_regions = excluded;
    }
    if let Some(max_rate) = parsed_var::<u32>("NIMBUS_MAX_RATE")? {
        settings.rate_limit.max_rate = Some(max_rate);
    }
    if let Some(max_workers) = parsed_var::<usize>("NIMBUS_MAX_WORKERS")? {
        settings.max_workers = max_workers;
    }
    if let Some(update) = bool_var("NIMBUS_UPDATE")? {
        settings.update = update;
    }
    if let Some(fetch_local) = bool_var("NIMBUS_FETCH_LOCAL")? {
        settings.fetch_local = fetch_local;
    }
    if let Some(ruleset) = non_empty_var("NIMBUS_RULESET") {
        settings.ruleset = PathBuf::from(ruleset);
    }
    if let Some(exceptions) = non_empty_var("NIMBUS_EXCEPTIONS") {
        settings.exceptions = Some(PathBuf::from(exceptions));
    }
    if let Some(report_dir) = non_empty_var("NIMBUS_REPORT_DIR") {
        settings.report_dir = PathBuf::from(report_dir);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_style_booleans() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
