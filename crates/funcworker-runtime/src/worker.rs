//! TCP entry point.

use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::info;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::registry::Registry;
use crate::session::Session;

/// A language worker bound to one host endpoint.
pub struct Worker {
    config: WorkerConfig,
    registry: Arc<Registry>,
}

impl Worker {
    pub fn new(config: WorkerConfig, registry: Arc<Registry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Connects to the host and serves the stream until it closes.
    pub async fn run(self) -> WorkerResult<()> {
        self.config.validate()?;

        let address = self.config.address();
        let stream = TcpStream::connect(&address).await?;
        stream.set_nodelay(true)?;
        info!(%address, worker_id = %self.config.worker_id, "connected to host");

        let (reader, writer) = stream.into_split();
        Session::new(self.config, self.registry)
            .run(reader, writer)
            .await
    }
}
