//! Invocation dispatcher.
//!
//! Turns one invocation request into one response: inputs are converted to
//! native values, out arguments are allocated, the handler is called, and
//! the outputs and return value are encoded back to wire values. Every
//! failure becomes a failed response; nothing here ends the session.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use funcworker_core::{
    Converter, ConverterConfig, InvocationContext, LogSink, NativeValue, WireValue,
};
use funcworker_protocol::{InvocationRequest, InvocationResponse, ParameterBinding, StatusResult};
use tracing::{debug, warn};

use crate::error::InvocationFailure;
use crate::registry::{FunctionDescriptor, ParamDirection, ParamKind};

/// Progress of a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Received,
    ResolvingInputs,
    Invoking,
    EncodingOutputs,
    Completed,
    Failed,
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::ResolvingInputs => "resolving_inputs",
            Self::Invoking => "invoking",
            Self::EncodingOutputs => "encoding_outputs",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Executes invocations against loaded descriptors.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    converter: Converter,
}

impl Dispatcher {
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            converter: Converter::new(config),
        }
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Runs one invocation. Handler logs go to `sink`.
    #[tracing::instrument(
        skip_all,
        fields(function_id = %descriptor.id, invocation_id = %request.invocation_id)
    )]
    pub fn execute(
        &self,
        descriptor: &FunctionDescriptor,
        request: &InvocationRequest,
        sink: Arc<dyn LogSink>,
    ) -> InvocationResponse {
        debug!(state = %InvocationState::Received, function = %descriptor.name);

        match self.run(descriptor, request, sink) {
            Ok(response) => {
                debug!(state = %InvocationState::Completed);
                response
            }
            Err(failure) => {
                warn!(state = %InvocationState::Failed, error = %failure, "invocation failed");
                InvocationResponse::failure(&request.invocation_id, failure.to_string())
            }
        }
    }

    fn run(
        &self,
        descriptor: &FunctionDescriptor,
        request: &InvocationRequest,
        sink: Arc<dyn LogSink>,
    ) -> Result<InvocationResponse, InvocationFailure> {
        debug!(state = %InvocationState::ResolvingInputs);
        let mut args = self.resolve_inputs(descriptor, request, sink)?;

        debug!(state = %InvocationState::Invoking);
        let handler = descriptor.handler();
        let results = panic::catch_unwind(AssertUnwindSafe(|| handler.call(&mut args)))
            .map_err(|payload| InvocationFailure::Panicked(panic_message(payload.as_ref())))?;

        if results.len() != descriptor.results.len() {
            return Err(InvocationFailure::Schema(format!(
                "handler returned {} results but declares {}",
                results.len(),
                descriptor.results.len()
            )));
        }

        if let Some(slot) = descriptor.error_slot
            && let Some(message) = results[slot].error_message()
        {
            return Err(InvocationFailure::Handler(message.to_string()));
        }

        debug!(state = %InvocationState::EncodingOutputs);
        let mut output_data = Vec::with_capacity(descriptor.outputs.len());
        for output in &descriptor.outputs {
            let value = match output.direction {
                ParamDirection::Return => &results[output.position],
                ParamDirection::Out | ParamDirection::In => &args[output.position],
            };
            let data = self.encode(&output.name, value)?;
            output_data.push(ParameterBinding::new(&output.name, data));
        }

        let max = self.converter.config().max_anonymous_results;
        if descriptor.anonymous.len() > max {
            return Err(InvocationFailure::Schema(format!(
                "expected at most {max} anonymous return values, got {}",
                descriptor.anonymous.len()
            )));
        }

        let mut anonymous = descriptor.anonymous.iter().map(|position| &results[*position]);
        let return_value = match anonymous.next() {
            Some(value) => self.encode("$return", value)?,
            None => None,
        };
        for extra in anonymous {
            debug!(kind = extra.kind_name(), "ignoring extra anonymous result");
        }

        Ok(InvocationResponse {
            invocation_id: request.invocation_id.clone(),
            result: StatusResult::success(),
            output_data,
            return_value,
        })
    }

    fn resolve_inputs(
        &self,
        descriptor: &FunctionDescriptor,
        request: &InvocationRequest,
        sink: Arc<dyn LogSink>,
    ) -> Result<Vec<NativeValue>, InvocationFailure> {
        if let Some(undeclared) = request
            .input_data
            .iter()
            .find(|input| !descriptor.declared_inputs.contains(&input.name))
        {
            return Err(InvocationFailure::BindingResolution(format!(
                "cannot find input {} in function bindings",
                undeclared.name
            )));
        }

        if let Some((name, binding_type)) = descriptor
            .inputs
            .iter()
            .chain(&descriptor.outputs)
            .find_map(|param| match &param.kind {
                ParamKind::Unsupported(binding_type) => Some((&param.name, binding_type)),
                _ => None,
            })
        {
            return Err(InvocationFailure::BindingResolution(format!(
                "unsupported binding type {binding_type} for {name}"
            )));
        }

        let mut args = vec![NativeValue::Nil; descriptor.params.len()];

        for input in &descriptor.inputs {
            args[input.position] = match &input.kind {
                ParamKind::Context => NativeValue::Context(InvocationContext::new(
                    &descriptor.id,
                    &request.invocation_id,
                    Arc::clone(&sink),
                )),
                ParamKind::Unbound | ParamKind::Unsupported(_) => {
                    NativeValue::zero(input.shape).unwrap_or(NativeValue::Nil)
                }
                ParamKind::Binding(kind) => {
                    let binding = request.input(&input.name).ok_or_else(|| {
                        InvocationFailure::BindingResolution(format!(
                            "missing input {} for function {}",
                            input.name, descriptor.name
                        ))
                    })?;
                    self.converter
                        .to_native(
                            *kind,
                            binding.data.as_ref(),
                            &request.trigger_metadata,
                            input.shape,
                        )
                        .map_err(|e| InvocationFailure::conversion(&input.name, e))?
                }
            };
        }

        for output in &descriptor.outputs {
            if output.direction == ParamDirection::Out {
                args[output.position] = NativeValue::zero(output.shape).unwrap_or(NativeValue::Nil);
            }
        }

        Ok(args)
    }

    fn encode(
        &self,
        name: &str,
        value: &NativeValue,
    ) -> Result<Option<WireValue>, InvocationFailure> {
        self.converter
            .from_native(value)
            .map_err(|e| InvocationFailure::conversion(name, e))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use funcworker_core::{
        Blob, CompositeKind, Direction, HttpResponse, LogLevel, RpcHttp, TracingSink, TypeShape,
    };
    use funcworker_protocol::{RpcFunctionMetadata, Status};

    use super::*;
    use crate::handler::{Handler, LoadedHandler, Signature};
    use crate::inspector::CallSite;
    use crate::registry::build_descriptor;

    const BLOB: TypeShape = TypeShape::Composite(CompositeKind::Blob);

    #[derive(Default)]
    struct Collect(Mutex<Vec<(String, LogLevel, String)>>);

    impl LogSink for Collect {
        fn log(&self, invocation_id: &str, level: LogLevel, message: &str) {
            self.0
                .lock()
                .unwrap()
                .push((invocation_id.to_string(), level, message.to_string()));
        }
    }

    fn descriptor<H: Handler + 'static>(
        metadata: &RpcFunctionMetadata,
        signature: Signature,
        site: CallSite,
        handler: H,
    ) -> FunctionDescriptor {
        let loaded = LoadedHandler {
            handler: Arc::new(handler),
            signature,
        };
        build_descriptor("fn-1", metadata, loaded, site).unwrap()
    }

    fn blob_metadata() -> RpcFunctionMetadata {
        RpcFunctionMetadata {
            name: "HttpTriggerBlobBindings".to_string(),
            ..Default::default()
        }
        .with_binding("req", "httpTrigger", Direction::In)
        .with_binding("inBlob", "blob", Direction::In)
        .with_binding("outBlob", "blob", Direction::Out)
    }

    fn copy_blob(args: &mut [NativeValue]) -> Vec<NativeValue> {
        let name = args[1]
            .as_http_request()
            .and_then(|req| req.query("name"))
            .unwrap_or_default();
        if let NativeValue::Context(ctx) = &args[0] {
            ctx.info(format!("copying blob for {name}"));
        }
        let content = args[2].as_blob().map(|b| b.content.clone()).unwrap_or_default();
        if let Some(out) = args[3].as_blob_mut() {
            out.content = content;
        }
        vec![NativeValue::ok()]
    }

    fn blob_function() -> FunctionDescriptor {
        descriptor(
            &blob_metadata(),
            Signature::new(
                vec![TypeShape::Context, TypeShape::HttpRequest, BLOB, BLOB],
                vec![TypeShape::Error],
            ),
            CallSite::new(&["ctx", "req", "inBlob", "outBlob"], &[None]),
            copy_blob,
        )
    }

    fn request(inputs: Vec<ParameterBinding>) -> InvocationRequest {
        InvocationRequest {
            invocation_id: "inv-1".to_string(),
            function_id: "fn-1".to_string(),
            input_data: inputs,
            trigger_metadata: BTreeMap::new(),
        }
    }

    fn http_trigger() -> ParameterBinding {
        ParameterBinding::new(
            "req",
            Some(WireValue::http(RpcHttp::request(
                "GET",
                "http://localhost:7071/api/blob?name=test",
            ))),
        )
    }

    #[test]
    fn blob_copy_scenario() {
        let sink = Arc::new(Collect::default());
        let response = Dispatcher::default().execute(
            &blob_function(),
            &request(vec![
                http_trigger(),
                ParameterBinding::new("inBlob", Some(WireValue::string("hello"))),
            ]),
            sink.clone(),
        );

        assert_eq!(response.result.status, Status::Success);
        assert_eq!(
            response.output_data,
            vec![ParameterBinding::new(
                "outBlob",
                Some(WireValue::json(r#"{"Content":"hello"}"#))
            )]
        );
        assert!(response.return_value.is_none());

        let logs = sink.0.lock().unwrap();
        assert_eq!(
            *logs,
            vec![(
                "inv-1".to_string(),
                LogLevel::Information,
                "copying blob for test".to_string()
            )]
        );
    }

    #[test]
    fn undeclared_input_fails() {
        let response = Dispatcher::default().execute(
            &blob_function(),
            &request(vec![
                http_trigger(),
                ParameterBinding::new("inBlob", Some(WireValue::string("hello"))),
                ParameterBinding::new("stray", Some(WireValue::string("x"))),
            ]),
            Arc::new(TracingSink),
        );
        assert_eq!(response.result.status, Status::Failure);
        assert_eq!(
            response.result.message(),
            Some("cannot find input stray in function bindings")
        );
    }

    #[test]
    fn missing_input_fails() {
        let response = Dispatcher::default().execute(
            &blob_function(),
            &request(vec![http_trigger()]),
            Arc::new(TracingSink),
        );
        assert_eq!(response.result.status, Status::Failure);
        assert!(response.result.message().unwrap().contains("missing input inBlob"));
    }

    #[test]
    fn conversion_failure_fails_invocation() {
        let response = Dispatcher::default().execute(
            &blob_function(),
            &request(vec![
                ParameterBinding::new("req", Some(WireValue::string("not http"))),
                ParameterBinding::new("inBlob", Some(WireValue::string("hello"))),
            ]),
            Arc::new(TracingSink),
        );
        assert_eq!(response.result.status, Status::Failure);
        assert!(response.result.message().unwrap().starts_with("cannot convert binding req"));
    }

    #[test]
    fn error_short_circuits_outputs() {
        let failing = descriptor(
            &blob_metadata(),
            Signature::new(vec![BLOB], vec![TypeShape::String, TypeShape::Error]),
            CallSite::new(&["outBlob"], &[None, None]),
            |args: &mut [NativeValue]| {
                if let Some(out) = args[0].as_blob_mut() {
                    out.content = "partial".to_string();
                }
                vec![NativeValue::from("ignored"), NativeValue::error("blob store is down")]
            },
        );
        let response =
            Dispatcher::default().execute(&failing, &request(vec![]), Arc::new(TracingSink));

        assert_eq!(response, InvocationResponse::failure("inv-1", "blob store is down"));
    }

    #[test]
    fn empty_error_is_success() {
        let function = descriptor(
            &blob_metadata(),
            Signature::new(vec![], vec![TypeShape::String, TypeShape::Error]),
            CallSite::new(&[], &[None, None]),
            |_: &mut [NativeValue]| vec![NativeValue::from("done"), NativeValue::error("")],
        );
        let response =
            Dispatcher::default().execute(&function, &request(vec![]), Arc::new(TracingSink));
        assert_eq!(response.result.status, Status::Success);
        assert_eq!(response.return_value, Some(WireValue::json(r#""done""#)));
    }

    #[test]
    fn http_response_return_value() {
        let metadata = RpcFunctionMetadata::default()
            .with_binding("req", "httpTrigger", Direction::In)
            .with_binding("$return", "http", Direction::Out);
        let function = descriptor(
            &metadata,
            Signature::new(vec![TypeShape::HttpRequest], vec![TypeShape::HttpResponse]),
            CallSite::new(&["req"], &[None]),
            |args: &mut [NativeValue]| {
                let name = args[0]
                    .as_http_request()
                    .and_then(|req| req.query("name"))
                    .unwrap_or_default();
                vec![NativeValue::from(
                    HttpResponse::new(200)
                        .with_header("Content-Type", "text/plain")
                        .with_body(format!("Hello, {name}")),
                )]
            },
        );

        let response =
            Dispatcher::default().execute(&function, &request(vec![http_trigger()]), Arc::new(TracingSink));
        assert_eq!(response.result.status, Status::Success);
        assert!(response.output_data.is_empty());

        let http = response.return_value.as_ref().and_then(WireValue::as_http).unwrap();
        assert_eq!(http.status_code.as_deref(), Some("200"));
        assert_eq!(http.body.as_deref(), Some(&WireValue::string("Hello, test")));
    }

    #[test]
    fn named_result_is_output() {
        let function = descriptor(
            &blob_metadata(),
            Signature::new(vec![], vec![BLOB]),
            CallSite::new(&[], &[Some("outBlob")]),
            |_: &mut [NativeValue]| {
                vec![NativeValue::from(Blob {
                    content: "from result".to_string(),
                    ..Default::default()
                })]
            },
        );
        let response =
            Dispatcher::default().execute(&function, &request(vec![]), Arc::new(TracingSink));
        assert_eq!(
            response.output("outBlob").and_then(|o| o.data.clone()),
            Some(WireValue::json(r#"{"Content":"from result"}"#))
        );
        assert!(response.return_value.is_none());
    }

    fn two_anonymous() -> FunctionDescriptor {
        descriptor(
            &blob_metadata(),
            Signature::new(vec![], vec![TypeShape::String, TypeShape::Int]),
            CallSite::new(&[], &[None, None]),
            |_: &mut [NativeValue]| vec![NativeValue::from("first"), NativeValue::Int(2)],
        )
    }

    #[test]
    fn anonymous_limit_of_one() {
        let response =
            Dispatcher::default().execute(&two_anonymous(), &request(vec![]), Arc::new(TracingSink));
        assert_eq!(response.result.status, Status::Failure);
        assert_eq!(
            response.result.message(),
            Some("expected at most 1 anonymous return values, got 2")
        );
    }

    #[test]
    fn anonymous_limit_of_two() {
        let dispatcher =
            Dispatcher::new(ConverterConfig::default().with_max_anonymous_results(2));
        let response = dispatcher.execute(&two_anonymous(), &request(vec![]), Arc::new(TracingSink));
        assert_eq!(response.result.status, Status::Success);
        assert_eq!(response.return_value, Some(WireValue::json(r#""first""#)));
    }

    #[test]
    fn unbound_parameter_gets_zero_value() {
        let function = descriptor(
            &blob_metadata(),
            Signature::new(vec![TypeShape::Int], vec![TypeShape::Int]),
            CallSite::new(&["count"], &[None]),
            |args: &mut [NativeValue]| vec![args[0].clone()],
        );
        let response =
            Dispatcher::default().execute(&function, &request(vec![]), Arc::new(TracingSink));
        assert_eq!(response.return_value, Some(WireValue::json("0")));
    }

    #[test]
    fn unsupported_binding_type() {
        let metadata = blob_metadata().with_binding("doc", "sqlBinding", Direction::In);
        let function = descriptor(
            &metadata,
            Signature::new(vec![TypeShape::Json], vec![]),
            CallSite::new(&["doc"], &[]),
            |_: &mut [NativeValue]| Vec::<NativeValue>::new(),
        );
        let response = Dispatcher::default().execute(
            &function,
            &request(vec![ParameterBinding::new("doc", Some(WireValue::json("{}")))]),
            Arc::new(TracingSink),
        );
        assert_eq!(
            response.result.message(),
            Some("unsupported binding type sqlBinding for doc")
        );
    }

    #[test]
    fn panic_is_reported() {
        let function = descriptor(
            &blob_metadata(),
            Signature::default(),
            CallSite::default(),
            |_: &mut [NativeValue]| -> Vec<NativeValue> { panic!("kaboom") },
        );
        let response =
            Dispatcher::default().execute(&function, &request(vec![]), Arc::new(TracingSink));
        assert_eq!(response.result.message(), Some("handler panicked: kaboom"));
    }

    #[test]
    fn wrong_result_count() {
        let function = descriptor(
            &blob_metadata(),
            Signature::new(vec![], vec![TypeShape::Error]),
            CallSite::new(&[], &[None]),
            |_: &mut [NativeValue]| Vec::<NativeValue>::new(),
        );
        let response =
            Dispatcher::default().execute(&function, &request(vec![]), Arc::new(TracingSink));
        assert_eq!(
            response.result.message(),
            Some("handler returned 0 results but declares 1")
        );
    }

    #[test]
    fn state_names() {
        assert_eq!(InvocationState::ResolvingInputs.to_string(), "resolving_inputs");
        assert_eq!(InvocationState::Failed.to_string(), "failed");
    }
}
