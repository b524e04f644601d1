//! Handler registration.
//!
//! Handlers are plain Rust callables registered up front together with their
//! [`Signature`]. The [`HandlerLoader`] trait is what the registry uses to
//! resolve a host load request to one of them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use funcworker_core::{NativeValue, TypeShape};
use funcworker_protocol::RpcFunctionMetadata;
use tracing::debug;

use crate::error::LoadError;

/// Entry point assumed when the host does not name one.
pub const DEFAULT_ENTRY_POINT: &str = "Run";

/// A callable handler.
///
/// `args` holds one value per declared parameter, in order. Out-direction
/// parameters arrive as zero values and are read back after the call. The
/// returned vector holds one value per declared result.
pub trait Handler: Send + Sync {
    fn call(&self, args: &mut [NativeValue]) -> Vec<NativeValue>;
}

impl<F> Handler for F
where
    F: Fn(&mut [NativeValue]) -> Vec<NativeValue> + Send + Sync,
{
    fn call(&self, args: &mut [NativeValue]) -> Vec<NativeValue> {
        self(args)
    }
}

/// Declared parameter and result shapes of a handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<TypeShape>,
    pub results: Vec<TypeShape>,
}

impl Signature {
    pub fn new(params: Vec<TypeShape>, results: Vec<TypeShape>) -> Self {
        Self { params, results }
    }
}

/// A resolved handler plus its signature.
#[derive(Clone)]
pub struct LoadedHandler {
    pub handler: Arc<dyn Handler>,
    pub signature: Signature,
}

impl fmt::Debug for LoadedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedHandler")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Resolves host function metadata to a handler.
pub trait HandlerLoader: Send + Sync {
    fn load(&self, metadata: &RpcFunctionMetadata) -> Result<LoadedHandler, LoadError>;
}

/// Returns the entry point named by the metadata, or [`DEFAULT_ENTRY_POINT`].
pub fn entry_point(metadata: &RpcFunctionMetadata) -> &str {
    if metadata.entry_point.is_empty() {
        DEFAULT_ENTRY_POINT
    } else {
        &metadata.entry_point
    }
}

/// Handlers registered in code, keyed by function name and entry point.
#[derive(Default)]
pub struct HandlerCatalog {
    entries: HashMap<(String, String), LoadedHandler>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler.
    pub fn register<H>(
        &mut self,
        name: impl Into<String>,
        entry_point: impl Into<String>,
        signature: Signature,
        handler: H,
    ) -> &mut Self
    where
        H: Handler + 'static,
    {
        let key = (name.into(), entry_point.into());
        debug!(function = %key.0, entry_point = %key.1, "registering handler");
        self.entries.insert(
            key,
            LoadedHandler {
                handler: Arc::new(handler),
                signature,
            },
        );
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<H>(
        mut self,
        name: impl Into<String>,
        entry_point: impl Into<String>,
        signature: Signature,
        handler: H,
    ) -> Self
    where
        H: Handler + 'static,
    {
        self.register(name, entry_point, signature, handler);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered (function name, entry point) pairs, sorted.
    pub fn names(&self) -> Vec<(String, String)> {
        let mut names: Vec<_> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

impl HandlerLoader for HandlerCatalog {
    fn load(&self, metadata: &RpcFunctionMetadata) -> Result<LoadedHandler, LoadError> {
        let entry_point = entry_point(metadata);
        self.entries
            .get(&(metadata.name.clone(), entry_point.to_string()))
            .cloned()
            .ok_or_else(|| LoadError::handler_not_found(&metadata.name, entry_point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(args: &mut [NativeValue]) -> Vec<NativeValue> {
        vec![args[0].clone()]
    }

    fn metadata(name: &str, entry_point: &str) -> RpcFunctionMetadata {
        RpcFunctionMetadata {
            name: name.to_string(),
            entry_point: entry_point.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn closures_are_handlers() {
        let handler = |args: &mut [NativeValue]| vec![NativeValue::Int(args.len() as i64)];
        let mut args = vec![NativeValue::Nil, NativeValue::Nil];
        assert_eq!(Handler::call(&handler, &mut args), vec![NativeValue::Int(2)]);
    }

    #[test]
    fn catalog_resolves_by_name_and_entry_point() {
        let catalog = HandlerCatalog::new().with(
            "Echo",
            "Run",
            Signature::new(vec![TypeShape::String], vec![TypeShape::String]),
            echo,
        );
        assert_eq!(catalog.len(), 1);

        let loaded = catalog.load(&metadata("Echo", "Run")).unwrap();
        assert_eq!(loaded.signature.params, vec![TypeShape::String]);

        let mut args = vec![NativeValue::from("hi")];
        assert_eq!(loaded.handler.call(&mut args), vec![NativeValue::from("hi")]);
    }

    #[test]
    fn empty_entry_point_defaults_to_run() {
        let catalog = HandlerCatalog::new().with("Echo", "Run", Signature::default(), echo);
        assert!(catalog.load(&metadata("Echo", "")).is_ok());
    }

    #[test]
    fn unknown_handler() {
        let catalog = HandlerCatalog::new().with("Echo", "Run", Signature::default(), echo);
        let err = catalog.load(&metadata("Echo", "Main")).unwrap_err();
        assert!(matches!(
            err,
            LoadError::HandlerNotFound { ref name, ref entry_point } if name == "Echo" && entry_point == "Main"
        ));
    }
}
