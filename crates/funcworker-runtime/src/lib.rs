//! Worker runtime: function registry, invocation dispatch, protocol session.
//!
//! This crate provides the language-worker side of the host stream:
//! - Handler registration ([`HandlerCatalog`]) and parameter naming
//!   ([`ManifestInspector`], [`StaticInspector`])
//! - The function [`Registry`] built from host load requests
//! - The [`Dispatcher`] that runs one invocation
//! - The [`Session`] that serves one stream, and the TCP [`Worker`]
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use funcworker_runtime::{
//!     HandlerCatalog, ManifestInspector, Registry, Worker, WorkerConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::new(Arc::new(HandlerCatalog::new()), Arc::new(ManifestInspector));
//!     let config = WorkerConfig::new("127.0.0.1", 50051).with_worker_id("worker-1");
//!     Worker::new(config, Arc::new(registry)).run().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod dispatcher;
mod error;
mod handler;
mod inspector;
mod registry;
mod session;
mod worker;

pub use config::WorkerConfig;
pub use connection::{FrameReader, FrameWriter};
pub use dispatcher::{Dispatcher, InvocationState};
pub use error::{InvocationFailure, LoadError, Slot, WorkerError, WorkerResult};
pub use handler::{
    DEFAULT_ENTRY_POINT, Handler, HandlerCatalog, HandlerLoader, LoadedHandler, Signature,
    entry_point,
};
pub use inspector::{
    ANONYMOUS_RESULT, CallSite, MANIFEST_FILE, ManifestInspector, SchemaInspector,
    StaticInspector,
};
pub use registry::{
    FunctionDescriptor, ParamDescriptor, ParamDirection, ParamKind, RETURN_BINDING, Registry,
    build_descriptor,
};
pub use session::{Outbound, Session, SessionState, StreamLogSink};
pub use worker::Worker;
