//! Messages exchanged on the host/worker stream.

use std::collections::BTreeMap;

use funcworker_core::{BindingKind, ConversionResult, Direction, LogLevel, WireValue};
use serde::{Deserialize, Serialize};

use crate::PROTOCOL_VERSION;

/// Message envelope wrapping every frame on the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Protocol version (always "1" for v1).
    pub protocol_version: String,
    /// Request id of the stream or of the host request being answered.
    pub request_id: String,
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Creates a new envelope with the current protocol version.
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    /// Checks if this envelope uses a compatible protocol version.
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

/// Every message kind carried on the stream, in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamingMessage {
    /// Worker → host, first frame after connecting.
    StartStream { worker_id: String },

    /// Host → worker handshake.
    WorkerInitRequest {
        #[serde(default)]
        host_version: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        capabilities: BTreeMap<String, String>,
    },

    WorkerInitResponse {
        result: StatusResult,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        worker_version: String,
    },

    /// Host → worker: prepare a function for invocation.
    FunctionLoadRequest {
        function_id: String,
        metadata: RpcFunctionMetadata,
    },

    FunctionLoadResponse {
        function_id: String,
        result: StatusResult,
    },

    InvocationRequest(InvocationRequest),

    InvocationResponse(InvocationResponse),

    /// Worker → host log line, tied to an invocation.
    RpcLog(RpcLog),

    /// Any kind this worker does not handle.
    #[serde(other)]
    Unknown,
}

impl StreamingMessage {
    /// Short name of the message kind, for logs and errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::StartStream { .. } => "start_stream",
            Self::WorkerInitRequest { .. } => "worker_init_request",
            Self::WorkerInitResponse { .. } => "worker_init_response",
            Self::FunctionLoadRequest { .. } => "function_load_request",
            Self::FunctionLoadResponse { .. } => "function_load_response",
            Self::InvocationRequest(_) => "invocation_request",
            Self::InvocationResponse(_) => "invocation_response",
            Self::RpcLog(_) => "rpc_log",
            Self::Unknown => "unknown",
        }
    }

    pub fn start_stream(worker_id: impl Into<String>) -> Self {
        Self::StartStream {
            worker_id: worker_id.into(),
        }
    }

    pub fn init_response(result: StatusResult) -> Self {
        Self::WorkerInitResponse {
            result,
            worker_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn load_response(function_id: impl Into<String>, result: StatusResult) -> Self {
        Self::FunctionLoadResponse {
            function_id: function_id.into(),
            result,
        }
    }
}

/// Outcome status of a host request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Failure,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcException {
    pub message: String,
}

/// Status plus optional exception, as attached to every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<RpcException>,
}

impl StatusResult {
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            exception: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failure,
            exception: Some(RpcException {
                message: message.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Exception text, if any.
    pub fn message(&self) -> Option<&str> {
        self.exception.as_ref().map(|e| e.message.as_str())
    }
}

/// Host description of a function to load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcFunctionMetadata {
    pub name: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub script_file: String,
    #[serde(default)]
    pub entry_point: String,
    /// Binding name to declaration.
    #[serde(default)]
    pub bindings: BTreeMap<String, BindingInfo>,
}

impl RpcFunctionMetadata {
    /// Builder: declare a binding.
    pub fn with_binding(
        mut self,
        name: impl Into<String>,
        binding_type: impl Into<String>,
        direction: Direction,
    ) -> Self {
        self.bindings.insert(
            name.into(),
            BindingInfo {
                binding_type: binding_type.into(),
                direction,
            },
        );
        self
    }
}

/// One binding declaration. The type string is kept verbatim so that kinds
/// this worker does not know can be reported by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingInfo {
    #[serde(rename = "type")]
    pub binding_type: String,
    #[serde(default)]
    pub direction: Direction,
}

impl BindingInfo {
    pub fn kind(&self) -> ConversionResult<BindingKind> {
        self.binding_type.parse()
    }
}

/// A named value: an invocation input or output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterBinding {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<WireValue>,
}

impl ParameterBinding {
    pub fn new(name: impl Into<String>, data: Option<WireValue>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub invocation_id: String,
    pub function_id: String,
    #[serde(default)]
    pub input_data: Vec<ParameterBinding>,
    #[serde(default)]
    pub trigger_metadata: BTreeMap<String, WireValue>,
}

impl InvocationRequest {
    /// Returns the named input.
    pub fn input(&self, name: &str) -> Option<&ParameterBinding> {
        self.input_data.iter().find(|binding| binding.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub invocation_id: String,
    pub result: StatusResult,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_data: Vec<ParameterBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<WireValue>,
}

impl InvocationResponse {
    /// Failed response carrying no outputs.
    pub fn failure(invocation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            result: StatusResult::failure(message),
            output_data: Vec::new(),
            return_value: None,
        }
    }

    /// Returns the named output.
    pub fn output(&self, name: &str) -> Option<&ParameterBinding> {
        self.output_data.iter().find(|binding| binding.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcLog {
    #[serde(default)]
    pub invocation_id: String,
    pub level: LogLevel,
    pub message: String,
}
