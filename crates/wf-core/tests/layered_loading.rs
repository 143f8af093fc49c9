//! Layered settings loading against real files on disk.

use std::fs;
use std::time::Duration;

use wf_core::{ConfigError, HostEnvironment, Settings};

const BASE: &str = r#"{
    "AzureAd": {
        "Instance": "https://login.microsoftonline.com/",
        "TenantId": "base-tenant",
        "ClientId": "base-client"
    },
    "Swagger": { "ClientId": "swagger-client" },
    "Server": { "Port": 5000 }
}"#;

fn no_vars() -> Vec<(String, String)> {
    Vec::new()
}

#[test]
fn base_file_alone_is_enough() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("appsettings.json"), BASE).unwrap();

    let settings =
        Settings::load_with_vars(dir.path(), &HostEnvironment::Production, no_vars()).unwrap();
    assert_eq!(settings.azure_ad.tenant_id, "base-tenant");
    assert_eq!(settings.server.port, 5000);
}

#[test]
fn environment_overlay_overrides_base() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("appsettings.json"), BASE).unwrap();
    fs::write(
        dir.path().join("appsettings.Development.json"),
        r#"{ "azuread": { "tenantid": "dev-tenant" }, "Server": { "HttpsPort": 5001 } }"#,
    )
    .unwrap();

    let settings =
        Settings::load_with_vars(dir.path(), &HostEnvironment::Development, no_vars()).unwrap();
    assert_eq!(settings.azure_ad.tenant_id, "dev-tenant");
    assert_eq!(settings.azure_ad.client_id, "base-client");
    assert_eq!(settings.server.https_port, Some(5001));

    // The overlay for another environment is not consulted.
    let production =
        Settings::load_with_vars(dir.path(), &HostEnvironment::Production, no_vars()).unwrap();
    assert_eq!(production.azure_ad.tenant_id, "base-tenant");
}

#[test]
fn environment_variables_override_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("appsettings.json"), BASE).unwrap();
    fs::write(
        dir.path().join("appsettings.Staging.json"),
        r#"{ "AzureAd": { "TenantId": "staging-tenant" } }"#,
    )
    .unwrap();

    let vars = vec![
        ("AzureAd__TenantId".to_string(), "env-tenant".to_string()),
        ("METADATA__REFRESHINTERVALSECS".to_string(), "60".to_string()),
        ("PATH".to_string(), "/usr/bin".to_string()),
    ];
    let settings = Settings::load_with_vars(dir.path(), &HostEnvironment::Staging, vars).unwrap();
    assert_eq!(settings.azure_ad.tenant_id, "env-tenant");
    assert_eq!(settings.metadata.refresh_interval, Duration::from_secs(60));
}

#[test]
fn process_variable_sharing_a_section_name_keeps_file_values() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("appsettings.json"),
        r#"{
            "AzureAd": {
                "Instance": "https://login.microsoftonline.com/",
                "TenantId": "t",
                "ClientId": "c"
            },
            "Swagger": { "ClientId": "s" },
            "Server": { "Port": 8080, "HttpsPort": 8443 }
        }"#,
    )
    .unwrap();

    let vars = vec![("SERVER".to_string(), "nginx".to_string())];
    let settings = Settings::load_with_vars(dir.path(), &HostEnvironment::Production, vars).unwrap();
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.server.https_port, Some(8443));
}

#[test]
fn settings_can_come_entirely_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let vars = vec![
        ("AzureAd__Instance".to_string(), "https://login.microsoftonline.com".to_string()),
        ("AzureAd__TenantId".to_string(), "t".to_string()),
        ("AzureAd__ClientId".to_string(), "c".to_string()),
        ("Swagger__ClientId".to_string(), "s".to_string()),
        ("Server__Port".to_string(), "8080".to_string()),
    ];
    let settings = Settings::load_with_vars(dir.path(), &HostEnvironment::Production, vars).unwrap();
    assert_eq!(settings.azure_ad.instance, "https://login.microsoftonline.com/");
    assert_eq!(settings.server.port, 8080);
}

#[test]
fn missing_files_fail_validation_not_io() {
    let dir = tempfile::tempdir().unwrap();
    let err =
        Settings::load_with_vars(dir.path(), &HostEnvironment::Production, no_vars()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
    assert_eq!(err.problems().len(), 4);
}

#[test]
fn malformed_file_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("appsettings.json");
    fs::write(&path, "{ not json").unwrap();

    let err =
        Settings::load_with_vars(dir.path(), &HostEnvironment::Production, no_vars()).unwrap_err();
    match err {
        ConfigError::Malformed { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn top_level_array_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("appsettings.json"), "[1, 2]").unwrap();

    let err =
        Settings::load_with_vars(dir.path(), &HostEnvironment::Production, no_vars()).unwrap_err();
    assert!(matches!(err, ConfigError::NotAnObject { .. }));
}
