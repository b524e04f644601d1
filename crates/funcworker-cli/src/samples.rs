//! Sample functions shipped with the worker binary.
//!
//! Each sample is registered under its function name with the default entry
//! point, together with the call site used when the static inspector is
//! selected.

use funcworker_core::{
    CompositeKind, HttpResponse, InvocationContext, LogLevel, NativeValue, TypeShape,
};
use funcworker_runtime::{CallSite, DEFAULT_ENTRY_POINT, HandlerCatalog, Signature, StaticInspector};
use serde_json::{Value, json};

const BLOB: TypeShape = TypeShape::Composite(CompositeKind::Blob);

fn context(args: &[NativeValue]) -> Option<&InvocationContext> {
    args.first().and_then(NativeValue::as_context)
}

fn query(args: &[NativeValue], index: usize, name: &str) -> String {
    args.get(index)
        .and_then(NativeValue::as_http_request)
        .and_then(|req| req.query(name))
        .unwrap_or_default()
}

fn greeting(name: &str) -> HttpResponse {
    HttpResponse::new(200)
        .with_header("customHeader", "azfuncHello")
        .with_body(format!("Hello world, {name}!"))
}

fn http_response(args: &mut [NativeValue]) -> Vec<NativeValue> {
    if let Some(ctx) = context(args) {
        ctx.info(format!(
            "function invoked: function {}, invocation {}",
            ctx.function_id(),
            ctx.invocation_id()
        ));
    }
    vec![greeting(&query(args, 1, "name")).into()]
}

fn http_error_output(args: &mut [NativeValue]) -> Vec<NativeValue> {
    let name = query(args, 1, "name");
    if name.is_empty() {
        let response = HttpResponse::new(400).with_body("missing required parameter: name");
        return vec![
            response.into(),
            NativeValue::error("missing required parameter: name"),
        ];
    }
    vec![greeting(&name).into(), NativeValue::ok()]
}

fn http_blob_bindings(args: &mut [NativeValue]) -> Vec<NativeValue> {
    let name = query(args, 1, "name");
    if let Some(ctx) = context(args) {
        ctx.info(format!("copying blob for {name}"));
    }
    let content = args[2].as_blob().map(|b| b.content.clone()).unwrap_or_default();
    if let Some(out) = args[3].as_blob_mut() {
        out.content = content;
    }
    Vec::new()
}

fn http_queue_bindings(args: &mut [NativeValue]) -> Vec<NativeValue> {
    if let Some(ctx) = context(args) {
        ctx.info(format!(
            "log message from function {}, invocation {}",
            ctx.function_id(),
            ctx.invocation_id()
        ));
    }
    let body = args[1]
        .as_http_request()
        .and_then(|req| req.body.clone())
        .unwrap_or_default();
    vec![NativeValue::String(body)]
}

fn http_table_bindings(args: &mut [NativeValue]) -> Vec<NativeValue> {
    let person = args[2]
        .as_map()
        .and_then(|row| row.get("name"))
        .cloned()
        .unwrap_or(Value::Null);
    if let Some(ctx) = context(args) {
        ctx.log(LogLevel::Debug, format!("person name: {person}"));
    }
    if let Some(out) = args[3].as_map_mut() {
        out.insert("name".to_string(), json!("new name"));
        out.insert("RowKey".to_string(), json!("newTestKey"));
    }
    Vec::new()
}

fn timer_trigger(args: &mut [NativeValue]) -> Vec<NativeValue> {
    if let (Some(ctx), Some(timer)) = (context(args), args[1].as_timer()) {
        ctx.info(format!("timer fired, past due: {}", timer.past_due));
    }
    Vec::new()
}

fn queue_trigger(args: &mut [NativeValue]) -> Vec<NativeValue> {
    if let (Some(ctx), Some(message)) = (context(args), args[1].as_queue_message()) {
        ctx.info(format!(
            "queue message {} dequeued {} times: {}",
            message.id, message.dequeue_count, message.text
        ));
    }
    Vec::new()
}

fn blob_trigger(args: &mut [NativeValue]) -> Vec<NativeValue> {
    if let (Some(ctx), Some(blob)) = (context(args), args[1].as_blob()) {
        ctx.log(
            LogLevel::Debug,
            format!("blob {} with {} bytes", blob.name, blob.content.len()),
        );
    }
    Vec::new()
}

fn event_grid_trigger(args: &mut [NativeValue]) -> Vec<NativeValue> {
    if let (Some(ctx), Some(event)) = (context(args), args[1].as_event_grid_event()) {
        ctx.info(format!("event {} from topic {}", event.event_type, event.topic));
    }
    Vec::new()
}

fn event_hub_output(args: &mut [NativeValue]) -> Vec<NativeValue> {
    if let (Some(ctx), Some(event)) = (context(args), args[1].as_event_hub_event()) {
        ctx.info(format!(
            "event {} from partition {}: {}",
            event.sequence_number, event.partition_key, event.data
        ));
    }
    vec![NativeValue::from("Hello from Azure Functions")]
}

fn service_bus_output(args: &mut [NativeValue]) -> Vec<NativeValue> {
    let delivery_count = args[1]
        .as_service_bus_message()
        .map(|msg| msg.delivery_count)
        .unwrap_or_default();
    if let Some(ctx) = context(args) {
        ctx.info(format!("creating task for delivery {delivery_count}"));
    }
    vec![NativeValue::Json(json!({
        "Name": format!("{delivery_count}-task"),
        "Priority": 1,
        "Type": "investigation",
    }))]
}

fn cosmos_output(args: &mut [NativeValue]) -> Vec<NativeValue> {
    let reports = match &args[1] {
        NativeValue::Json(Value::Array(reports)) => reports.clone(),
        _ => Vec::new(),
    };
    let tasks: Vec<Value> = reports
        .iter()
        .map(|report| {
            json!({
                "Name": format!("{}-task", report["ID"].as_str().unwrap_or_default()),
                "Priority": report["Priority"].as_i64().unwrap_or_default(),
                "Type": "investigation",
            })
        })
        .collect();
    if let Some(ctx) = context(args) {
        ctx.info(format!("created {} tasks", tasks.len()));
    }
    vec![NativeValue::Json(Value::Array(tasks))]
}

struct Sample {
    name: &'static str,
    params: &'static [(&'static str, TypeShape)],
    results: &'static [(Option<&'static str>, TypeShape)],
    handler: fn(&mut [NativeValue]) -> Vec<NativeValue>,
}

const CTX: (&str, TypeShape) = ("ctx", TypeShape::Context);
const REQ: (&str, TypeShape) = ("req", TypeShape::HttpRequest);

const SAMPLES: &[Sample] = &[
    Sample {
        name: "HttpTriggerHttpResponse",
        params: &[CTX, REQ],
        results: &[(None, TypeShape::HttpResponse)],
        handler: http_response,
    },
    Sample {
        name: "HttpTriggerErrorOutput",
        params: &[CTX, REQ],
        results: &[(None, TypeShape::HttpResponse), (None, TypeShape::Error)],
        handler: http_error_output,
    },
    Sample {
        name: "HttpTriggerBlobBindings",
        params: &[CTX, REQ, ("inBlob", BLOB), ("outBlob", BLOB)],
        results: &[],
        handler: http_blob_bindings,
    },
    Sample {
        name: "HttpTriggerQueueBindings",
        params: &[CTX, REQ],
        results: &[(Some("out"), TypeShape::String)],
        handler: http_queue_bindings,
    },
    Sample {
        name: "HttpTriggerTableBindings",
        params: &[CTX, REQ, ("in", TypeShape::Map), ("out", TypeShape::Map)],
        results: &[],
        handler: http_table_bindings,
    },
    Sample {
        name: "TimerTrigger",
        params: &[CTX, ("timer", TypeShape::Composite(CompositeKind::Timer))],
        results: &[],
        handler: timer_trigger,
    },
    Sample {
        name: "QueueTrigger",
        params: &[
            CTX,
            ("queueMsg", TypeShape::Composite(CompositeKind::QueueMessage)),
        ],
        results: &[],
        handler: queue_trigger,
    },
    Sample {
        name: "BlobTrigger",
        params: &[CTX, ("in", BLOB)],
        results: &[],
        handler: blob_trigger,
    },
    Sample {
        name: "EventGridTrigger",
        params: &[
            CTX,
            ("event", TypeShape::Composite(CompositeKind::EventGridEvent)),
        ],
        results: &[],
        handler: event_grid_trigger,
    },
    Sample {
        name: "EventHubTriggerEventHubOutput",
        params: &[
            CTX,
            ("ehMsg", TypeShape::Composite(CompositeKind::EventHubEvent)),
        ],
        results: &[(Some("ehOut"), TypeShape::String)],
        handler: event_hub_output,
    },
    Sample {
        name: "ServiceBusTriggerServiceBusOutput",
        params: &[
            CTX,
            ("msg", TypeShape::Composite(CompositeKind::ServiceBusMessage)),
        ],
        results: &[(Some("task"), TypeShape::Json)],
        handler: service_bus_output,
    },
    Sample {
        name: "CosmosTriggerCosmosOutput",
        params: &[CTX, ("reports", TypeShape::Json)],
        results: &[(Some("tasks"), TypeShape::Json)],
        handler: cosmos_output,
    },
];

/// Handlers for every sample.
pub fn catalog() -> HandlerCatalog {
    let mut catalog = HandlerCatalog::new();
    for sample in SAMPLES {
        let signature = Signature::new(
            sample.params.iter().map(|(_, shape)| *shape).collect(),
            sample.results.iter().map(|(_, shape)| *shape).collect(),
        );
        catalog.register(sample.name, DEFAULT_ENTRY_POINT, signature, sample.handler);
    }
    catalog
}

/// Call sites for every sample.
pub fn inspector() -> StaticInspector {
    let mut inspector = StaticInspector::new();
    for sample in SAMPLES {
        let params: Vec<&str> = sample.params.iter().map(|(name, _)| *name).collect();
        let results: Vec<Option<&str>> = sample.results.iter().map(|(name, _)| *name).collect();
        inspector.register(
            sample.name,
            DEFAULT_ENTRY_POINT,
            CallSite::new(&params, &results),
        );
    }
    inspector
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use funcworker_core::{Direction, RpcHttp, TracingSink, WireValue};
    use funcworker_protocol::{
        InvocationRequest, InvocationResponse, ParameterBinding, RpcFunctionMetadata, Status,
    };
    use funcworker_runtime::{Dispatcher, HandlerLoader, SchemaInspector, build_descriptor};

    use super::*;

    fn invoke(
        metadata: RpcFunctionMetadata,
        inputs: Vec<ParameterBinding>,
        trigger_metadata: BTreeMap<String, WireValue>,
    ) -> InvocationResponse {
        let loaded = catalog().load(&metadata).unwrap();
        let site = inspector().inspect(&metadata).unwrap();
        let descriptor = build_descriptor("fn-1", &metadata, loaded, site).unwrap();
        let request = InvocationRequest {
            invocation_id: "inv-1".to_string(),
            function_id: "fn-1".to_string(),
            input_data: inputs,
            trigger_metadata,
        };
        Dispatcher::default().execute(&descriptor, &request, Arc::new(TracingSink))
    }

    fn metadata(name: &str) -> RpcFunctionMetadata {
        RpcFunctionMetadata {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn http(url: &str) -> ParameterBinding {
        ParameterBinding::new("req", Some(WireValue::http(RpcHttp::request("GET", url))))
    }

    #[test]
    fn every_sample_is_registered() {
        let catalog = catalog();
        let inspector = inspector();
        assert_eq!(catalog.len(), SAMPLES.len());
        for sample in SAMPLES {
            let metadata = metadata(sample.name);
            let loaded = catalog.load(&metadata).unwrap();
            let site = inspector.inspect(&metadata).unwrap();
            assert_eq!(loaded.signature.params.len(), site.params.len());
            assert_eq!(loaded.signature.results.len(), site.results.len());
        }
    }

    #[test]
    fn http_response_sample() {
        let response = invoke(
            metadata("HttpTriggerHttpResponse")
                .with_binding("req", "httpTrigger", Direction::In)
                .with_binding("$return", "http", Direction::Out),
            vec![http("http://localhost/api/hello?name=Ada")],
            BTreeMap::new(),
        );
        assert_eq!(response.result.status, Status::Success);

        let http = response
            .return_value
            .as_ref()
            .and_then(WireValue::as_http)
            .unwrap();
        assert_eq!(http.status_code.as_deref(), Some("200"));
        assert_eq!(http.headers["customHeader"], "azfuncHello");
        assert_eq!(
            http.body.as_deref(),
            Some(&WireValue::string("Hello world, Ada!"))
        );
    }

    #[test]
    fn error_output_sample() {
        let metadata = metadata("HttpTriggerErrorOutput")
            .with_binding("req", "httpTrigger", Direction::In)
            .with_binding("$return", "http", Direction::Out);

        let failed = invoke(
            metadata.clone(),
            vec![http("http://localhost/api/hello")],
            BTreeMap::new(),
        );
        assert_eq!(
            failed,
            InvocationResponse::failure("inv-1", "missing required parameter: name")
        );

        let ok = invoke(
            metadata,
            vec![http("http://localhost/api/hello?name=Ada")],
            BTreeMap::new(),
        );
        assert_eq!(ok.result.status, Status::Success);
        assert!(ok.return_value.is_some());
    }

    #[test]
    fn table_sample_writes_out_map() {
        let response = invoke(
            metadata("HttpTriggerTableBindings")
                .with_binding("req", "httpTrigger", Direction::In)
                .with_binding("in", "table", Direction::In)
                .with_binding("out", "table", Direction::Out),
            vec![
                http("http://localhost/api/table"),
                ParameterBinding::new("in", Some(WireValue::json(r#"{"name":"bestnametest"}"#))),
            ],
            BTreeMap::new(),
        );
        let data = response.output("out").and_then(|o| o.data.clone()).unwrap();
        let value: Value = serde_json::from_str(data.as_json().unwrap()).unwrap();
        assert_eq!(value, json!({"name": "new name", "RowKey": "newTestKey"}));
    }

    #[test]
    fn service_bus_sample_named_output() {
        let mut trigger_metadata = BTreeMap::new();
        trigger_metadata.insert("DeliveryCount".to_string(), WireValue::json("3"));

        let response = invoke(
            metadata("ServiceBusTriggerServiceBusOutput")
                .with_binding("msg", "serviceBusTrigger", Direction::In)
                .with_binding("task", "serviceBus", Direction::Out),
            vec![ParameterBinding::new(
                "msg",
                Some(WireValue::string("investigate this")),
            )],
            trigger_metadata,
        );
        assert_eq!(response.result.status, Status::Success);
        let data = response.output("task").and_then(|o| o.data.clone()).unwrap();
        let value: Value = serde_json::from_str(data.as_json().unwrap()).unwrap();
        assert_eq!(value["Name"], "3-task");
    }

    #[test]
    fn cosmos_sample_maps_documents() {
        let response = invoke(
            metadata("CosmosTriggerCosmosOutput")
                .with_binding("reports", "cosmosDBTrigger", Direction::In)
                .with_binding("tasks", "cosmosDB", Direction::Out),
            vec![ParameterBinding::new(
                "reports",
                Some(WireValue::json(
                    r#"[{"ID":"r1","Priority":2},{"ID":"r2","Priority":5}]"#,
                )),
            )],
            BTreeMap::new(),
        );
        let data = response.output("tasks").and_then(|o| o.data.clone()).unwrap();
        let value: Value = serde_json::from_str(data.as_json().unwrap()).unwrap();
        assert_eq!(value[1]["Name"], "r2-task");
        assert_eq!(value[1]["Priority"], 5);
    }
}
