//! Native values passed to and returned from handlers.

use std::fmt;

use crate::composite::{
    Blob, CompositeKind, EventGridEvent, EventHubEvent, QueueMessage, ServiceBusMessage, Timer,
};
use crate::context::InvocationContext;
use crate::http::{HttpRequest, HttpResponse};

/// Declared type of a handler parameter or result slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeShape {
    Context,
    HttpRequest,
    HttpResponse,
    String,
    Int,
    Float,
    Bool,
    Bytes,
    Stream,
    /// An open JSON object.
    Map,
    /// Any JSON value.
    Json,
    Composite(CompositeKind),
    /// Trailing error slot of a result list.
    Error,
}

impl TypeShape {
    /// Returns true if the dispatcher can allocate a zero value of this shape
    /// for an out-direction argument.
    pub fn is_allocatable(self) -> bool {
        !matches!(
            self,
            Self::Context | Self::HttpRequest | Self::Stream | Self::Error
        )
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Context => f.write_str("context"),
            Self::HttpRequest => f.write_str("http request"),
            Self::HttpResponse => f.write_str("http response"),
            Self::String => f.write_str("string"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Bool => f.write_str("bool"),
            Self::Bytes => f.write_str("bytes"),
            Self::Stream => f.write_str("stream"),
            Self::Map => f.write_str("map"),
            Self::Json => f.write_str("json"),
            Self::Composite(kind) => write!(f, "{kind}"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A value as seen by handler code.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Opaque stream handle.
    Stream(String),
    Map(serde_json::Map<String, serde_json::Value>),
    Json(serde_json::Value),
    HttpRequest(Box<HttpRequest>),
    HttpResponse(HttpResponse),
    Blob(Blob),
    QueueMessage(QueueMessage),
    Timer(Timer),
    EventGridEvent(EventGridEvent),
    EventHubEvent(EventHubEvent),
    ServiceBusMessage(ServiceBusMessage),
    Context(InvocationContext),
    /// Error slot. `None` means no error.
    Error(Option<String>),
}

impl NativeValue {
    /// Fresh zero value of `shape`, or `None` if the shape cannot be allocated.
    pub fn zero(shape: TypeShape) -> Option<Self> {
        let value = match shape {
            TypeShape::HttpResponse => Self::HttpResponse(HttpResponse::default()),
            TypeShape::String => Self::String(String::new()),
            TypeShape::Int => Self::Int(0),
            TypeShape::Float => Self::Float(0.0),
            TypeShape::Bool => Self::Bool(false),
            TypeShape::Bytes => Self::Bytes(Vec::new()),
            TypeShape::Map => Self::Map(serde_json::Map::new()),
            TypeShape::Json => Self::Json(serde_json::Value::Null),
            TypeShape::Composite(kind) => match kind {
                CompositeKind::Blob => Self::Blob(Blob::default()),
                CompositeKind::QueueMessage => Self::QueueMessage(QueueMessage::default()),
                CompositeKind::Timer => Self::Timer(Timer::default()),
                CompositeKind::EventGridEvent => Self::EventGridEvent(EventGridEvent::default()),
                CompositeKind::EventHubEvent => Self::EventHubEvent(EventHubEvent::default()),
                CompositeKind::ServiceBusMessage => {
                    Self::ServiceBusMessage(ServiceBusMessage::default())
                }
            },
            TypeShape::Context | TypeShape::HttpRequest | TypeShape::Stream | TypeShape::Error => {
                return None;
            }
        };
        Some(value)
    }

    /// Successful error slot.
    pub fn ok() -> Self {
        Self::Error(None)
    }

    /// Failed error slot.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(Some(message.into()))
    }

    /// Short name of the variant, used in logs and errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Stream(_) => "stream",
            Self::Map(_) => "map",
            Self::Json(_) => "json",
            Self::HttpRequest(_) => "http request",
            Self::HttpResponse(_) => "http response",
            Self::Blob(_) => "Blob",
            Self::QueueMessage(_) => "QueueMessage",
            Self::Timer(_) => "Timer",
            Self::EventGridEvent(_) => "EventGridEvent",
            Self::EventHubEvent(_) => "EventHubEvent",
            Self::ServiceBusMessage(_) => "ServiceBusMessage",
            Self::Context(_) => "context",
            Self::Error(_) => "error",
        }
    }

    /// Returns the error text of a non-empty error slot.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(Some(message)) if !message.is_empty() => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_http_request(&self) -> Option<&HttpRequest> {
        match self {
            Self::HttpRequest(req) => Some(req.as_ref()),
            _ => None,
        }
    }
}

macro_rules! accessors {
    ($($variant:ident => $get:ident, $get_mut:ident: $ty:ty;)*) => {
        impl NativeValue {
            $(
                pub fn $get(&self) -> Option<&$ty> {
                    match self {
                        Self::$variant(value) => Some(value),
                        _ => None,
                    }
                }

                pub fn $get_mut(&mut self) -> Option<&mut $ty> {
                    match self {
                        Self::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            )*
        }
    };
}

accessors! {
    String => as_string, as_string_mut: String;
    Int => as_int, as_int_mut: i64;
    Map => as_map, as_map_mut: serde_json::Map<String, serde_json::Value>;
    Json => as_json, as_json_mut: serde_json::Value;
    HttpResponse => as_http_response, as_http_response_mut: HttpResponse;
    Blob => as_blob, as_blob_mut: Blob;
    QueueMessage => as_queue_message, as_queue_message_mut: QueueMessage;
    Timer => as_timer, as_timer_mut: Timer;
    EventGridEvent => as_event_grid_event, as_event_grid_event_mut: EventGridEvent;
    EventHubEvent => as_event_hub_event, as_event_hub_event_mut: EventHubEvent;
    ServiceBusMessage => as_service_bus_message, as_service_bus_message_mut: ServiceBusMessage;
    Context => as_context, as_context_mut: InvocationContext;
}

macro_rules! from_impls {
    ($($ty:ty => $variant:ident;)*) => {
        $(
            impl From<$ty> for NativeValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

from_impls! {
    bool => Bool;
    i64 => Int;
    f64 => Float;
    String => String;
    Vec<u8> => Bytes;
    serde_json::Map<String, serde_json::Value> => Map;
    serde_json::Value => Json;
    HttpResponse => HttpResponse;
    Blob => Blob;
    QueueMessage => QueueMessage;
    Timer => Timer;
    EventGridEvent => EventGridEvent;
    EventHubEvent => EventHubEvent;
    ServiceBusMessage => ServiceBusMessage;
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}
