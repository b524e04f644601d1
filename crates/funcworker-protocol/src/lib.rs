//! Stream protocol between the functions host and a language worker.
//!
//! Messages are sent as length-prefixed JSON:
//! - 4 bytes: message length (u32, big-endian)
//! - N bytes: JSON payload
//!
//! Every frame is an [`Envelope`] around a [`StreamingMessage`]. The worker
//! opens the stream with `start_stream`; the host then sends
//! `worker_init_request`, `function_load_request` and `invocation_request`
//! frames, each answered by the matching response. `rpc_log` frames may be
//! sent by the worker at any time.
//!
//! ```rust
//! use funcworker_protocol::{Envelope, StreamingMessage, encode_message, decode_message};
//!
//! let start = Envelope::new("req-123", StreamingMessage::start_stream("worker-1"));
//! let bytes = encode_message(&start).unwrap();
//! let decoded: Envelope<StreamingMessage> = decode_message(&bytes).unwrap();
//! assert_eq!(decoded, start);
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{
    check_frame_len, decode_message, decode_message_with_limit, encode_message,
    encode_message_with_limit,
};
pub use types::{
    BindingInfo, Envelope, InvocationRequest, InvocationResponse, ParameterBinding, RpcException,
    RpcFunctionMetadata, RpcLog, Status, StatusResult, StreamingMessage,
};

/// Protocol version constant.
pub const PROTOCOL_VERSION: &str = "1";

/// Default maximum frame size, matching the host's default message limit.
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = i32::MAX as u32;
