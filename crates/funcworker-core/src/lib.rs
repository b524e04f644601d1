//! Core types: binding kinds, wire and native values, conversion, tracing

pub mod binding;
pub mod composite;
pub mod context;
pub mod convert;
pub mod error;
pub mod http;
pub mod native;
pub mod tracing;
pub mod wire;

pub use binding::{BindingKind, Direction};
pub use composite::{
    Blob, BlobProperties, CompositeKind, EventGridEvent, EventHubEvent, FieldShape, FieldSpec,
    QueueMessage, ScheduleStatus, ServiceBusMessage, Source, Timer,
};
pub use context::{InvocationContext, LogLevel, LogSink, TracingSink};
pub use convert::{Converter, ConverterConfig, Metadata, PrimaryFieldRule};
pub use error::{ConversionError, ConversionResult};
pub use http::{HttpRequest, HttpResponse};
pub use native::{NativeValue, TypeShape};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
pub use wire::{RpcHttp, WireValue};
