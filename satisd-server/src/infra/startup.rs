use std::path::PathBuf;

use satisd_core::{DocumentError, DocumentStore};
use thiserror::Error;
use tracing::{info, warn};

use crate::infra::config::DaemonConfig;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("satis binary not found at {0}")]
    BuilderMissing(PathBuf),
    #[error("satis configuration not found at {0}")]
    ConfigMissing(PathBuf),
    #[error("satis configuration is not a valid document")]
    InvalidConfig(#[source] DocumentError),
}

/// Checks the paths the daemon depends on and opens the configuration
/// document. Any failure here is fatal.
pub async fn validate(
    config: &DaemonConfig,
) -> Result<DocumentStore, StartupError> {
    if !tokio::fs::try_exists(&config.builder_path)
        .await
        .unwrap_or(false)
    {
        return Err(StartupError::BuilderMissing(config.builder_path.clone()));
    }

    if !tokio::fs::try_exists(&config.config_path)
        .await
        .unwrap_or(false)
    {
        return Err(StartupError::ConfigMissing(config.config_path.clone()));
    }

    let (store, document) = DocumentStore::open(&config.config_path)
        .await
        .map_err(StartupError::InvalidConfig)?;

    info!(
        path = %config.config_path.display(),
        repositories = document.repositories.len(),
        packages = document.require.len(),
        "satis configuration loaded"
    );

    if !tokio::fs::try_exists(&config.output_path)
        .await
        .unwrap_or(false)
    {
        warn!(
            path = %config.output_path.display(),
            "repository directory does not exist yet; it will be served once satis creates it"
        );
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use satisd_core::{BuildWorkerConfig, MergeWorkerConfig};

    use super::*;

    fn config(dir: &std::path::Path) -> DaemonConfig {
        DaemonConfig {
            builder_path: dir.join("satis"),
            config_path: dir.join("satis.json"),
            output_path: dir.join("public"),
            listen: "127.0.0.1:0".parse().unwrap(),
            merge: MergeWorkerConfig::default(),
            build: BuildWorkerConfig {
                poll_interval: Duration::from_millis(10),
                ..BuildWorkerConfig::default()
            },
            terminate_builder_on_shutdown: false,
        }
    }

    #[tokio::test]
    async fn missing_builder_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::write(&config.config_path, "{}").unwrap();

        let err = validate(&config).await.expect_err("no builder");
        assert!(matches!(err, StartupError::BuilderMissing(_)));
    }

    #[tokio::test]
    async fn missing_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::write(&config.builder_path, "").unwrap();

        let err = validate(&config).await.expect_err("no config");
        assert!(matches!(err, StartupError::ConfigMissing(_)));
    }

    #[tokio::test]
    async fn malformed_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::write(&config.builder_path, "").unwrap();
        std::fs::write(&config.config_path, "{\"repositories\": ").unwrap();

        let err = validate(&config).await.expect_err("bad config");
        assert!(matches!(err, StartupError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn valid_setup_opens_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::write(&config.builder_path, "").unwrap();
        std::fs::write(&config.config_path, r#"{"name": "acme"}"#).unwrap();

        let store = validate(&config).await.expect("valid");
        assert_eq!(store.path(), config.config_path);
        assert_eq!(store.generation(), 0);
    }
}
