//! Worker command.

use std::sync::Arc;

use funcworker_runtime::{ManifestInspector, Registry, SchemaInspector, Worker};
use tracing::info;

use crate::config::{CliConfig, InspectorKind};
use crate::error::CliResult;
use crate::samples;

/// Builds the function registry for the configured inspector.
pub fn registry(config: &CliConfig) -> Registry {
    let inspector: Arc<dyn SchemaInspector> = match config.functions.inspector {
        InspectorKind::Static => Arc::new(samples::inspector()),
        InspectorKind::Manifest => Arc::new(ManifestInspector),
    };
    Registry::new(Arc::new(samples::catalog()), inspector)
}

/// Connect to the host and serve until the stream closes.
pub async fn run(config: &CliConfig) -> CliResult<()> {
    let worker_config = config.worker_config()?;
    info!(
        address = %worker_config.address(),
        worker_id = %worker_config.worker_id,
        inspector = ?config.functions.inspector,
        "starting worker"
    );
    Worker::new(worker_config, Arc::new(registry(config)))
        .run()
        .await?;
    info!("worker stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use funcworker_core::Direction;
    use funcworker_protocol::RpcFunctionMetadata;

    use super::*;

    fn metadata(directory: &str) -> RpcFunctionMetadata {
        RpcFunctionMetadata {
            name: "HttpTriggerQueueBindings".to_string(),
            directory: directory.to_string(),
            ..Default::default()
        }
        .with_binding("req", "httpTrigger", Direction::In)
        .with_binding("out", "queue", Direction::Out)
    }

    #[tokio::test]
    async fn static_registry_loads_samples() {
        let registry = registry(&CliConfig::default());
        registry.load("fn-1", &metadata("")).await.unwrap();
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn manifest_registry_reads_function_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("function.toml"),
            "[Run]\nparams = [\"ctx\", \"req\"]\nresults = [\"out\"]\n",
        )
        .unwrap();

        let mut config = CliConfig::default();
        config.functions.inspector = InspectorKind::Manifest;
        let registry = registry(&config);

        let found = metadata(&dir.path().display().to_string());
        registry.load("fn-1", &found).await.unwrap();
        assert!(registry.get("fn-1").await.is_some());

        let empty = tempfile::tempdir().unwrap();
        let missing = metadata(&empty.path().display().to_string());
        assert!(registry.load("fn-2", &missing).await.is_err());
    }
}
