//! Function descriptor registry.
//!
//! A load request is resolved in three steps: the [`HandlerLoader`] returns
//! the callable and its shapes, the [`SchemaInspector`] names each slot, and
//! the host bindings give each name a kind and a direction. The result is an
//! immutable [`FunctionDescriptor`] shared with invocation tasks.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use funcworker_core::{BindingKind, TypeShape};
use funcworker_protocol::RpcFunctionMetadata;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{LoadError, Slot};
use crate::handler::{Handler, HandlerLoader, LoadedHandler};
use crate::inspector::{CallSite, SchemaInspector};

/// Host binding name reserved for the return value.
pub const RETURN_BINDING: &str = "$return";

/// What a handler parameter is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    Binding(BindingKind),
    /// Receives the invocation context.
    Context,
    /// No host binding carries this name; the handler gets a zero value.
    Unbound,
    /// The host declared a binding type this worker does not know.
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    In,
    /// Out argument, allocated before the call and read back after it.
    Out,
    /// Named result slot.
    Return,
}

/// One named slot of a handler: a parameter or a named result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: String,
    /// Index in the parameter list, or in the result list for `Return`.
    pub position: usize,
    pub kind: ParamKind,
    pub direction: ParamDirection,
    pub shape: TypeShape,
}

/// A loaded function, ready to be invoked.
#[derive(Clone)]
pub struct FunctionDescriptor {
    pub id: String,
    pub name: String,
    /// In-direction parameters, in position order.
    pub inputs: Vec<ParamDescriptor>,
    /// Out arguments followed by named results.
    pub outputs: Vec<ParamDescriptor>,
    pub params: Vec<TypeShape>,
    pub results: Vec<TypeShape>,
    /// Position of the trailing error result.
    pub error_slot: Option<usize>,
    /// Result positions that are neither named outputs nor the error slot.
    pub anonymous: Vec<usize>,
    /// Input binding names the host may send.
    pub declared_inputs: BTreeSet<String>,
    handler: Arc<dyn Handler>,
}

impl FunctionDescriptor {
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn input(&self, name: &str) -> Option<&ParamDescriptor> {
        self.inputs.iter().find(|param| param.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&ParamDescriptor> {
        self.outputs.iter().find(|param| param.name == name)
    }
}

impl std::fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("results", &self.results)
            .field("error_slot", &self.error_slot)
            .finish_non_exhaustive()
    }
}

/// Builds a descriptor from its three sources.
pub fn build_descriptor(
    id: &str,
    metadata: &RpcFunctionMetadata,
    loaded: LoadedHandler,
    site: CallSite,
) -> Result<FunctionDescriptor, LoadError> {
    let signature = &loaded.signature;

    if signature.params.len() != site.params.len() {
        return Err(LoadError::ArityMismatch {
            slot: Slot::Parameters,
            declared: signature.params.len(),
            discovered: site.params.len(),
        });
    }
    if signature.results.len() != site.results.len() {
        return Err(LoadError::ArityMismatch {
            slot: Slot::Results,
            declared: signature.results.len(),
            discovered: site.results.len(),
        });
    }

    let last = signature.results.len().checked_sub(1);
    if let Some(position) = signature
        .results
        .iter()
        .position(|shape| *shape == TypeShape::Error)
        .filter(|position| Some(*position) != last)
    {
        return Err(LoadError::ErrorNotLast { position });
    }

    let mut seen = HashSet::new();
    let mut contexts = 0;
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();

    for (position, (name, shape)) in site.params.iter().zip(&signature.params).enumerate() {
        if !seen.insert(name.as_str()) {
            return Err(LoadError::DuplicateName(name.clone()));
        }

        if *shape == TypeShape::Context {
            contexts += 1;
            if contexts > 1 {
                return Err(LoadError::MultipleContexts);
            }
            inputs.push(ParamDescriptor {
                name: name.clone(),
                position,
                kind: ParamKind::Context,
                direction: ParamDirection::In,
                shape: *shape,
            });
            continue;
        }

        let Some(info) = metadata.bindings.get(name) else {
            debug!(function = %metadata.name, param = %name, "parameter has no host binding");
            inputs.push(ParamDescriptor {
                name: name.clone(),
                position,
                kind: ParamKind::Unbound,
                direction: ParamDirection::In,
                shape: *shape,
            });
            continue;
        };

        let kind = match info.kind() {
            Ok(kind) => ParamKind::Binding(kind),
            Err(_) => ParamKind::Unsupported(info.binding_type.clone()),
        };

        if info.direction.is_out() {
            if !shape.is_allocatable() {
                return Err(LoadError::UnallocatableOutput {
                    name: name.clone(),
                    shape: *shape,
                });
            }
            outputs.push(ParamDescriptor {
                name: name.clone(),
                position,
                kind,
                direction: ParamDirection::Out,
                shape: *shape,
            });
        } else {
            inputs.push(ParamDescriptor {
                name: name.clone(),
                position,
                kind,
                direction: ParamDirection::In,
                shape: *shape,
            });
        }
    }

    let error_slot = last.filter(|last| signature.results[*last] == TypeShape::Error);
    let mut anonymous = Vec::new();

    for (position, (name, shape)) in site.results.iter().zip(&signature.results).enumerate() {
        if Some(position) == error_slot {
            continue;
        }
        let bound = name.as_ref().and_then(|name| {
            metadata
                .bindings
                .get(name)
                .filter(|info| info.direction.is_out())
                .map(|info| (name, info))
        });
        let Some((name, info)) = bound else {
            anonymous.push(position);
            continue;
        };
        if !seen.insert(name.as_str()) {
            return Err(LoadError::DuplicateName(name.clone()));
        }
        outputs.push(ParamDescriptor {
            name: name.clone(),
            position,
            kind: info
                .kind()
                .map(ParamKind::Binding)
                .unwrap_or_else(|_| ParamKind::Unsupported(info.binding_type.clone())),
            direction: ParamDirection::Return,
            shape: *shape,
        });
    }

    let declared_inputs = metadata
        .bindings
        .iter()
        .filter(|(name, info)| !info.direction.is_out() && name.as_str() != RETURN_BINDING)
        .map(|(name, _)| name.clone())
        .collect();

    Ok(FunctionDescriptor {
        id: id.to_string(),
        name: metadata.name.clone(),
        inputs,
        outputs,
        params: loaded.signature.params.clone(),
        results: loaded.signature.results.clone(),
        error_slot,
        anonymous,
        declared_inputs,
        handler: loaded.handler,
    })
}

/// Loaded functions keyed by function id.
pub struct Registry {
    loader: Arc<dyn HandlerLoader>,
    inspector: Arc<dyn SchemaInspector>,
    functions: RwLock<HashMap<String, Arc<FunctionDescriptor>>>,
}

impl Registry {
    pub fn new(loader: Arc<dyn HandlerLoader>, inspector: Arc<dyn SchemaInspector>) -> Self {
        Self {
            loader,
            inspector,
            functions: RwLock::new(HashMap::new()),
        }
    }

    /// Loads a function and stores it under `function_id`, replacing any
    /// previous descriptor. A failed load leaves the id unregistered.
    #[tracing::instrument(skip(self, metadata), fields(function = %metadata.name))]
    pub async fn load(
        &self,
        function_id: &str,
        metadata: &RpcFunctionMetadata,
    ) -> Result<Arc<FunctionDescriptor>, LoadError> {
        let built = self.loader.load(metadata).and_then(|loaded| {
            let site = self.inspector.inspect(metadata)?;
            build_descriptor(function_id, metadata, loaded, site)
        });

        let mut functions = self.functions.write().await;
        match built {
            Ok(descriptor) => {
                let descriptor = Arc::new(descriptor);
                if functions
                    .insert(function_id.to_string(), Arc::clone(&descriptor))
                    .is_some()
                {
                    info!("replaced previously loaded function");
                }
                info!(
                    inputs = descriptor.inputs.len(),
                    outputs = descriptor.outputs.len(),
                    "function loaded"
                );
                Ok(descriptor)
            }
            Err(e) => {
                functions.remove(function_id);
                warn!(error = %e, "function load failed");
                Err(e)
            }
        }
    }

    pub async fn get(&self, function_id: &str) -> Option<Arc<FunctionDescriptor>> {
        self.functions.read().await.get(function_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.functions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.functions.read().await.is_empty()
    }
}
