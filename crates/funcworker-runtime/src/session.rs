//! Protocol session: one duplex stream to the host.
//!
//! A single receive loop reads frames in order. Init and load requests are
//! answered inline; invocations run on their own tasks. Every outbound frame
//! goes through one writer task fed by an mpsc queue.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use funcworker_core::{LogLevel, LogSink};
use funcworker_protocol::{
    Envelope, InvocationRequest, InvocationResponse, ProtocolError, ProtocolResult, RpcLog,
    StatusResult, StreamingMessage, encode_message_with_limit,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use crate::config::WorkerConfig;
use crate::connection::{FrameReader, FrameWriter};
use crate::dispatcher::Dispatcher;
use crate::error::{InvocationFailure, WorkerError, WorkerResult};
use crate::registry::Registry;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Initialized,
    Serving,
    Closed,
}

impl SessionState {
    fn is_initialized(self) -> bool {
        matches!(self, Self::Initialized | Self::Serving)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Initialized => "initialized",
            Self::Serving => "serving",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

enum WriterCommand {
    Frame(Envelope<StreamingMessage>),
    Shutdown,
}

/// Handle to the session writer. Cheap to clone.
#[derive(Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<WriterCommand>,
    closed: Arc<AtomicBool>,
    request_id: Arc<str>,
}

impl Outbound {
    fn new(tx: mpsc::UnboundedSender<WriterCommand>, request_id: &str) -> Self {
        Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
            request_id: Arc::from(request_id),
        }
    }

    /// Queues a worker-originated frame under the stream request id.
    pub fn send(&self, message: StreamingMessage) {
        let request_id = Arc::clone(&self.request_id);
        self.send_reply(&request_id, message);
    }

    /// Queues a reply to the host request `request_id`.
    ///
    /// Frames queued after the session closed are dropped.
    pub fn send_reply(&self, request_id: &str, message: StreamingMessage) {
        let kind = message.kind_name();
        if self.is_closed() {
            warn!(kind, request_id, "session closed, dropping outbound frame");
            return;
        }
        if self
            .tx
            .send(WriterCommand::Frame(Envelope::new(request_id, message)))
            .is_err()
        {
            warn!(kind, request_id, "writer gone, dropping outbound frame");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn shutdown(&self) {
        self.close();
        let _ = self.tx.send(WriterCommand::Shutdown);
    }
}

/// Sends handler logs to the host as `rpc_log` frames.
pub struct StreamLogSink {
    outbound: Outbound,
}

impl StreamLogSink {
    pub fn new(outbound: Outbound) -> Self {
        Self { outbound }
    }
}

impl LogSink for StreamLogSink {
    fn log(&self, invocation_id: &str, level: LogLevel, message: &str) {
        if level == LogLevel::None {
            return;
        }
        trace!(invocation_id, %level, "forwarding handler log");
        self.outbound.send(StreamingMessage::RpcLog(RpcLog {
            invocation_id: invocation_id.to_string(),
            level,
            message: message.to_string(),
        }));
    }
}

async fn write_loop<W>(
    mut writer: FrameWriter<W>,
    mut rx: mpsc::UnboundedReceiver<WriterCommand>,
    closed: Arc<AtomicBool>,
) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        let WriterCommand::Frame(envelope) = command else {
            break;
        };
        let kind = envelope.payload.kind_name();
        match writer.write_message(&envelope).await {
            Ok(()) => {}
            // Encoding fails before any byte is written.
            Err(e @ (ProtocolError::MessageTooLarge { .. } | ProtocolError::Serialization(_))) => {
                warn!(
                    error = %e,
                    kind,
                    request_id = %envelope.request_id,
                    "dropping unencodable frame"
                );
            }
            Err(e) => {
                closed.store(true, Ordering::Release);
                error!(error = %e, kind, "failed to write frame");
                return Err(e);
            }
        }
    }
    debug!("writer stopped");
    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "failed to shut down write half");
    }
    Ok(())
}

/// One host connection.
pub struct Session {
    config: WorkerConfig,
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
    state: SessionState,
}

impl Session {
    pub fn new(config: WorkerConfig, registry: Arc<Registry>) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(config.converter.clone()));
        Self {
            config,
            registry,
            dispatcher,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "session state");
            self.state = state;
        }
    }

    /// Serves the stream until the host closes it or a protocol error occurs.
    ///
    /// Invocations still running when the session closes are detached; their
    /// responses are dropped.
    #[tracing::instrument(skip_all, fields(worker_id = %self.config.worker_id))]
    pub async fn run<R, W>(&mut self, reader: R, writer: W) -> WorkerResult<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let max = self.config.max_message_length;
        let mut reader = FrameReader::new(reader, max);
        let (tx, rx) = mpsc::unbounded_channel();
        let outbound = Outbound::new(tx, &self.config.request_id);
        let mut writer_task = tokio::spawn(write_loop(
            FrameWriter::new(writer, max),
            rx,
            Arc::clone(&outbound.closed),
        ));
        let mut writer_finished = false;
        let mut tasks = JoinSet::new();

        self.set_state(SessionState::Connected);
        outbound.send(StreamingMessage::start_stream(&self.config.worker_id));

        let result = loop {
            tokio::select! {
                frame = reader.read_message::<Envelope<StreamingMessage>>() => match frame {
                    Ok(Some(envelope)) => {
                        if let Err(e) = self.handle(envelope, &outbound, &mut tasks).await {
                            break Err(WorkerError::from(e));
                        }
                    }
                    Ok(None) => {
                        info!("host closed the stream");
                        break Ok(());
                    }
                    Err(e) => break Err(WorkerError::from(e)),
                },
                joined = &mut writer_task => {
                    writer_finished = true;
                    break match joined {
                        Ok(Err(e)) => Err(WorkerError::from(e)),
                        Ok(Ok(())) => Err(WorkerError::Io(std::io::Error::other("writer stopped"))),
                        Err(e) => Err(WorkerError::Io(std::io::Error::other(format!(
                            "writer task failed: {e}"
                        )))),
                    };
                }
            }

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "invocation task failed");
                }
            }
        };

        self.set_state(SessionState::Closed);
        if let Err(e) = &result {
            error!(error = %e, "session ended with an error");
        }

        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "detaching in-flight invocations");
        }
        tasks.detach_all();

        outbound.shutdown();
        if !writer_finished {
            match writer_task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "writer failed while closing"),
                Err(e) => warn!(error = %e, "writer task failed while closing"),
            }
        }

        result
    }

    async fn handle(
        &mut self,
        envelope: Envelope<StreamingMessage>,
        outbound: &Outbound,
        tasks: &mut JoinSet<()>,
    ) -> ProtocolResult<()> {
        if !envelope.is_compatible() {
            return Err(ProtocolError::UnsupportedVersion(envelope.protocol_version));
        }
        let request_id = envelope.request_id;

        match envelope.payload {
            StreamingMessage::WorkerInitRequest { host_version, .. } => {
                if self.state.is_initialized() {
                    warn!(host_version, "duplicate worker init request");
                } else {
                    info!(host_version, "worker initialized");
                    self.set_state(SessionState::Initialized);
                }
                outbound.send_reply(
                    &request_id,
                    StreamingMessage::init_response(StatusResult::success()),
                );
            }
            StreamingMessage::FunctionLoadRequest {
                function_id,
                metadata,
            } => {
                self.require_initialized("function_load_request")?;
                let result = match self.registry.load(&function_id, &metadata).await {
                    Ok(_) => StatusResult::success(),
                    Err(e) => StatusResult::failure(e.to_string()),
                };
                outbound.send_reply(
                    &request_id,
                    StreamingMessage::load_response(function_id, result),
                );
                self.set_state(SessionState::Serving);
            }
            StreamingMessage::InvocationRequest(request) => {
                self.require_initialized("invocation_request")?;
                self.set_state(SessionState::Serving);
                self.dispatch(request_id, request, outbound, tasks).await;
            }
            other => {
                debug!(kind = other.kind_name(), "ignoring message");
            }
        }
        Ok(())
    }

    fn require_initialized(&self, kind: &'static str) -> ProtocolResult<()> {
        if self.state.is_initialized() {
            Ok(())
        } else {
            Err(ProtocolError::unexpected(kind, self.state))
        }
    }

    async fn dispatch(
        &self,
        request_id: String,
        request: InvocationRequest,
        outbound: &Outbound,
        tasks: &mut JoinSet<()>,
    ) {
        let Some(descriptor) = self.registry.get(&request.function_id).await else {
            let failure = InvocationFailure::FunctionNotLoaded(request.function_id.clone());
            warn!(invocation_id = %request.invocation_id, error = %failure, "cannot invoke");
            outbound.send_reply(
                &request_id,
                StreamingMessage::InvocationResponse(InvocationResponse::failure(
                    &request.invocation_id,
                    failure.to_string(),
                )),
            );
            return;
        };

        let dispatcher = Arc::clone(&self.dispatcher);
        let max = self.config.max_message_length;
        let outbound = outbound.clone();
        let sink: Arc<dyn LogSink> = Arc::new(StreamLogSink::new(outbound.clone()));

        tasks.spawn(async move {
            let invocation_id = request.invocation_id.clone();
            let response = match tokio::task::spawn_blocking(move || {
                dispatcher.execute(&descriptor, &request, sink)
            })
            .await
            {
                Ok(response) => response,
                Err(e) => InvocationResponse::failure(
                    invocation_id,
                    InvocationFailure::Panicked(e.to_string()).to_string(),
                ),
            };
            let reply = bounded_response(&request_id, response, max);
            outbound.send_reply(&request_id, reply);
        });
    }
}

/// Replaces a response that would not fit in one frame with a failure.
fn bounded_response(request_id: &str, response: InvocationResponse, max: u32) -> StreamingMessage {
    let invocation_id = response.invocation_id.clone();
    let envelope = Envelope::new(request_id, StreamingMessage::InvocationResponse(response));
    match encode_message_with_limit(&envelope, max) {
        Err(ProtocolError::MessageTooLarge { size, .. }) => {
            let failure = InvocationFailure::ResponseTooLarge { size, max };
            warn!(%invocation_id, error = %failure, "invocation failed");
            StreamingMessage::InvocationResponse(InvocationResponse::failure(
                invocation_id,
                failure.to_string(),
            ))
        }
        _ => envelope.payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names() {
        assert_eq!(SessionState::Serving.to_string(), "serving");
        assert!(SessionState::Initialized.is_initialized());
        assert!(!SessionState::Connected.is_initialized());
    }

    #[test]
    fn oversized_response_becomes_failure() {
        let response = InvocationResponse {
            invocation_id: "inv-1".to_string(),
            result: StatusResult::success(),
            output_data: Vec::new(),
            return_value: Some(funcworker_core::WireValue::string("x".repeat(500))),
        };

        let small = bounded_response("req-1", response.clone(), 4096);
        assert_eq!(small, StreamingMessage::InvocationResponse(response.clone()));

        let StreamingMessage::InvocationResponse(failed) = bounded_response("req-1", response, 256)
        else {
            panic!("expected an invocation response");
        };
        assert_eq!(failed.invocation_id, "inv-1");
        assert!(!failed.result.is_success());
        assert!(
            failed
                .result
                .message()
                .is_some_and(|m| m.starts_with("response exceeds max message length"))
        );
    }

    #[tokio::test]
    async fn writer_skips_oversized_frames() {
        let (worker, host) = tokio::io::duplex(4096);
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let writer = tokio::spawn(write_loop(FrameWriter::new(worker, 256), rx, Arc::clone(&closed)));

        let outbound = Outbound::new(tx, "stream-1");
        outbound.send(StreamingMessage::RpcLog(RpcLog {
            invocation_id: "inv-1".to_string(),
            level: LogLevel::Information,
            message: "y".repeat(1000),
        }));
        outbound.send(StreamingMessage::start_stream("w"));
        outbound.shutdown();

        writer.await.unwrap().unwrap();
        let mut reader = FrameReader::new(host, 256);
        let frame: Envelope<StreamingMessage> = reader.read_message().await.unwrap().unwrap();
        assert_eq!(frame.payload, StreamingMessage::start_stream("w"));
        let end: Option<Envelope<StreamingMessage>> = reader.read_message().await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn outbound_drops_after_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outbound = Outbound::new(tx, "stream-1");

        outbound.send(StreamingMessage::start_stream("w"));
        outbound.close();
        outbound.send(StreamingMessage::start_stream("w"));

        let Some(WriterCommand::Frame(first)) = rx.recv().await else {
            panic!("expected a frame");
        };
        assert_eq!(first.request_id, "stream-1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn log_sink_emits_rpc_log() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = StreamLogSink::new(Outbound::new(tx, "stream-1"));

        sink.log("inv-1", LogLevel::Warning, "careful");
        sink.log("inv-1", LogLevel::None, "muted");

        let Some(WriterCommand::Frame(frame)) = rx.recv().await else {
            panic!("expected a frame");
        };
        assert_eq!(
            frame.payload,
            StreamingMessage::RpcLog(RpcLog {
                invocation_id: "inv-1".to_string(),
                level: LogLevel::Warning,
                message: "careful".to_string(),
            })
        );
        assert!(rx.try_recv().is_err());
    }
}
