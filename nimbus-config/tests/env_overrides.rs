use std::{fs, path::PathBuf, sync::Mutex};

use nimbus_config::{ConfigLoadError, RunSettingsSource, SettingsLoader};
use nimbus_model::ProviderKind;
use once_cell::sync::Lazy;

static SERIAL: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const VARS: &[&str] = &[
    "NIMBUS_CONFIG_PATH",
    "NIMBUS_CONFIG_JSON",
    "NIMBUS_PROVIDER",
    "NIMBUS_SERVICES",
    "NIMBUS_SKIPPED_SERVICES",
    "NIMBUS_REGIONS",
    "NIMBUS_EXCLUDED_REGIONS",
    "NIMBUS_MAX_RATE",
    "NIMBUS_MAX_WORKERS",
    "NIMBUS_UPDATE",
    "NIMBUS_FETCH_LOCAL",
    "NIMBUS_RULESET",
    "NIMBUS_EXCEPTIONS",
    "NIMBUS_REPORT_DIR",
];

fn serial_guard() -> std::sync::MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

fn clear_env() {
    for key in VARS {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
fn settings_file_from_env_path_with_overrides() {
    let _guard = serial_guard();
    clear_env();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nimbus.toml");
    fs::write(
        &path,
        r#"
provider = "aws"
services = ["iam", "s3"]
max_workers = 4

[rate_limit]
max_rate = 50
"#,
    )
    .unwrap();

    unsafe {
        std::env::set_var("NIMBUS_CONFIG_PATH", &path);
        std::env::set_var("NIMBUS_SERVICES", "iam, ec2,,");
        std::env::set_var("NIMBUS_MAX_RATE", "5");
        std::env::set_var("NIMBUS_UPDATE", "yes");
    }

    let load = SettingsLoader::new().load().unwrap();
    clear_env();

    assert_eq!(load.source, RunSettingsSource::EnvPath(path));
    assert_eq!(load.settings.services, vec!["iam", "ec2"]);
    assert_eq!(load.settings.max_workers, 4);
    assert_eq!(load.settings.rate_limit.max_rate, Some(5));
    assert!(load.settings.update);
}

#[test]
fn inline_json_settings() {
    let _guard = serial_guard();
    clear_env();

    unsafe {
        std::env::set_var(
            "NIMBUS_CONFIG_JSON",
            r#"{"provider": "do", "fetch_local": true, "report_dir": "out"}"#,
        );
    }

    let load = SettingsLoader::new().load().unwrap();
    clear_env();

    assert_eq!(load.source, RunSettingsSource::EnvInline);
    assert_eq!(load.settings.provider, ProviderKind::DigitalOcean);
    assert!(load.settings.fetch_local);
    assert_eq!(load.settings.report_dir, PathBuf::from("out"));
}

#[test]
fn invalid_override_values_are_reported() {
    let _guard = serial_guard();
    clear_env();

    unsafe { std::env::set_var("NIMBUS_FETCH_LOCAL", "sometimes") };
    let err = SettingsLoader::new().load().unwrap_err();
    clear_env();
    assert!(matches!(
        err,
        ConfigLoadError::InvalidEnvVar { name: "NIMBUS_FETCH_LOCAL", .. }
    ));

    unsafe { std::env::set_var("NIMBUS_MAX_WORKERS", "0") };
    let err = SettingsLoader::new().load().unwrap_err();
    clear_env();
    assert!(matches!(err, ConfigLoadError::NoWorkers));
}

#[test]
fn explicit_env_file_is_applied() {
    let _guard = serial_guard();
    clear_env();

    let dir = tempfile::tempdir().unwrap();
    let env_file = dir.path().join("scan.env");
    fs::write(&env_file, "NIMBUS_PROVIDER=gcp\nNIMBUS_REGIONS=us-central1\n").unwrap();

    let load = SettingsLoader::new().with_env_file(&env_file).load().unwrap();
    unsafe {
        std::env::remove_var("NIMBUS_PROVIDER");
        std::env::remove_var("NIMBUS_REGIONS");
    }

    assert_eq!(load.env_file, Some(env_file));
    assert_eq!(load.settings.provider, ProviderKind::Gcp);
    assert_eq!(load.settings.regions, vec!["us-central1"]);
}

#[test]
fn missing_explicit_env_file_is_an_error() {
    let _guard = serial_guard();
    clear_env();

    let err = SettingsLoader::new()
        .with_env_file("/nonexistent/nimbus.env")
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::EnvFileIo { .. }));
}
