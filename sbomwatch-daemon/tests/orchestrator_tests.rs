//! Orchestrator integration tests -- assembly and store bootstrap.

use std::fs;

use sbomwatch_core::config::SbomwatchConfig;
use sbomwatch_core::store::ScanStore;
use sbomwatch_daemon::orchestrator::Orchestrator;

fn test_config(data_dir: &std::path::Path) -> SbomwatchConfig {
    let mut config = SbomwatchConfig::default();
    config.general.data_dir = data_dir.display().to_string();
    config.general.pid_file = String::new();
    config.metrics.enabled = false;
    config
}

#[tokio::test]
async fn builds_and_bootstraps_store_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let sbom_dir = dir.path().join("sboms");
    fs::create_dir_all(&sbom_dir).unwrap();
    fs::write(
        sbom_dir.join("payments-api.sbom.json"),
        r#"{"components": []}"#,
    )
    .unwrap();

    let orchestrator = Orchestrator::build_from_config(test_config(dir.path()))
        .await
        .unwrap();

    let store = orchestrator.store();
    assert_eq!(store.sbom_count().await, 1);
    assert!(
        store
            .sbom_content("payments-api")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn builds_on_fresh_host_without_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("does-not-exist-yet"));

    let orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    assert_eq!(orchestrator.store().sbom_count().await, 0);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.general.log_level = "verbose".to_owned();

    let err = Orchestrator::build_from_config(config).await.unwrap_err();
    assert!(err.to_string().contains("config validation failed"));
}

#[tokio::test]
async fn pipelines_are_initialized_but_not_started() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::build_from_config(test_config(dir.path()))
        .await
        .unwrap();

    for (name, status) in orchestrator.health().await {
        assert!(status.is_unhealthy(), "{name} should not be running yet");
    }
}

#[tokio::test]
async fn config_is_exposed_for_introspection() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::build_from_config(test_config(dir.path()))
        .await
        .unwrap();

    assert_eq!(orchestrator.config().scanner.command, "grype");
    assert!(orchestrator.config().scheduler.enabled);
}
