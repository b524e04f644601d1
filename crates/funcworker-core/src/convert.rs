//! Conversion between wire values and native values.
//!
//! [`Converter::to_native`] turns a binding payload (plus trigger metadata)
//! into the value a handler parameter expects. Composite targets are built
//! from their [`FieldSpec`] tables; when no field of the table is populated
//! the payload is decoded directly into the whole target instead.
//!
//! [`Converter::from_native`] goes the other way for outputs and return
//! values.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::binding::BindingKind;
use crate::composite::{CompositeKind, FieldShape, FieldSpec, Source};
use crate::error::{ConversionError, ConversionResult};
use crate::http::HttpRequest;
use crate::native::{NativeValue, TypeShape};
use crate::wire::{RpcHttp, WireValue};

/// Trigger metadata sent alongside an invocation.
pub type Metadata = BTreeMap<String, WireValue>;

/// How the primary payload field of a composite is identified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryFieldRule {
    /// Only a field tagged [`Source::Primary`] receives the payload.
    #[default]
    Sentinel,
    /// The first field without a metadata tag receives the payload, provided
    /// the composite has at least one metadata-tagged field.
    FirstUntagged,
}

/// Converter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub primary_field: PrimaryFieldRule,
    /// Anonymous result values accepted from a handler (1 or 2).
    pub max_anonymous_results: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            primary_field: PrimaryFieldRule::Sentinel,
            max_anonymous_results: 1,
        }
    }
}

impl ConverterConfig {
    #[must_use]
    pub fn with_primary_field(mut self, rule: PrimaryFieldRule) -> Self {
        self.primary_field = rule;
        self
    }

    /// Values outside 1..=2 are clamped.
    #[must_use]
    pub fn with_max_anonymous_results(mut self, max: usize) -> Self {
        self.max_anonymous_results = max.clamp(1, 2);
        self
    }

    /// Returns true if the settings are within range.
    pub fn is_valid(&self) -> bool {
        (1..=2).contains(&self.max_anonymous_results)
    }
}

/// Stateless translator between [`WireValue`] and [`NativeValue`].
#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: ConverterConfig,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Converts an input binding payload into a value of shape `target`.
    pub fn to_native(
        &self,
        kind: BindingKind,
        payload: Option<&WireValue>,
        metadata: &Metadata,
        target: TypeShape,
    ) -> ConversionResult<NativeValue> {
        let Some(payload) = payload else {
            return Err(ConversionError::MissingData {
                expected: if kind.is_http() { "http" } else { "binding" },
            });
        };

        match (payload, target) {
            (WireValue::Http(http), TypeShape::HttpRequest) => {
                Ok(NativeValue::HttpRequest(Box::new(http_request(http)?)))
            }
            (WireValue::Http(_), _) => Err(ConversionError::mismatch("http", target)),
            (other, _) if kind.is_http() || target == TypeShape::HttpRequest => {
                Err(ConversionError::mismatch(other.variant_name(), target))
            }
            (_, TypeShape::Composite(composite)) => {
                self.to_composite(composite, payload, metadata)
            }
            _ => decode_whole(payload, target),
        }
    }

    fn to_composite(
        &self,
        kind: CompositeKind,
        payload: &WireValue,
        metadata: &Metadata,
    ) -> ConversionResult<NativeValue> {
        if !has_tagged_metadata(kind, metadata)
            && let Some(value) = serialized_composite(kind, payload)
        {
            tracing::trace!(composite = %kind, "payload is an already serialized record");
            return composite_from_value(kind, value);
        }

        match self.decode_fields(kind.as_str(), kind.fields(), payload, metadata)? {
            Some(fields) => composite_from_value(kind, Value::Object(fields)),
            None => decode_whole(payload, TypeShape::Composite(kind)),
        }
    }

    /// Tagged decode over a field table.
    ///
    /// Returns the populated fields keyed by serialized name, or `None` when
    /// neither the payload nor any metadata key matched a field.
    pub fn decode_fields(
        &self,
        target: &str,
        fields: &[FieldSpec],
        payload: &WireValue,
        metadata: &Metadata,
    ) -> ConversionResult<Option<Map<String, Value>>> {
        let primary = self.primary_index(fields);
        let mut decoded = Map::new();
        let mut matched = false;

        for (index, field) in fields.iter().enumerate() {
            let source = if primary == Some(index) {
                Some(payload)
            } else if let Source::Metadata(key) = field.source {
                metadata.get(key)
            } else {
                None
            };

            if let Some(wire) = source {
                let label = format!("{target}.{}", field.name);
                decoded.insert(field.name.to_string(), decode_field(wire, field.shape, &label)?);
                matched = true;
            }
        }

        Ok(matched.then_some(decoded))
    }

    fn primary_index(&self, fields: &[FieldSpec]) -> Option<usize> {
        match self.config.primary_field {
            PrimaryFieldRule::Sentinel => fields
                .iter()
                .position(|field| field.source == Source::Primary),
            PrimaryFieldRule::FirstUntagged => {
                let tagged = fields
                    .iter()
                    .any(|field| matches!(field.source, Source::Metadata(_)));
                if !tagged {
                    return None;
                }
                fields
                    .iter()
                    .position(|field| !matches!(field.source, Source::Metadata(_)))
            }
        }
    }

    /// Encodes an output or return value. `Nil` encodes to an absent value.
    pub fn from_native(&self, value: &NativeValue) -> ConversionResult<Option<WireValue>> {
        let json = match value {
            NativeValue::Nil => return Ok(None),
            NativeValue::HttpResponse(resp) => {
                let headers = resp
                    .headers
                    .iter()
                    .map(|(name, values)| (name.clone(), values.join(",")))
                    .collect();
                return Ok(Some(WireValue::http(RpcHttp {
                    status_code: Some(resp.status.to_string()),
                    headers,
                    body: Some(Box::new(WireValue::String(resp.body.clone()))),
                    ..Default::default()
                })));
            }
            NativeValue::Context(_) | NativeValue::Error(_) | NativeValue::HttpRequest(_) => {
                return Err(ConversionError::NotEncodable(value.kind_name().to_string()));
            }
            NativeValue::Bool(b) => serde_json::to_string(b),
            NativeValue::Int(i) => serde_json::to_string(i),
            NativeValue::Float(f) => serde_json::to_string(f),
            NativeValue::String(s) | NativeValue::Stream(s) => serde_json::to_string(s),
            NativeValue::Bytes(bytes) => serde_json::to_string(&STANDARD.encode(bytes)),
            NativeValue::Map(map) => serde_json::to_string(map),
            NativeValue::Json(json) => serde_json::to_string(json),
            NativeValue::Blob(blob) => serde_json::to_string(blob),
            NativeValue::QueueMessage(msg) => serde_json::to_string(msg),
            NativeValue::Timer(timer) => serde_json::to_string(timer),
            NativeValue::EventGridEvent(event) => serde_json::to_string(event),
            NativeValue::EventHubEvent(event) => serde_json::to_string(event),
            NativeValue::ServiceBusMessage(msg) => serde_json::to_string(msg),
        }
        .map_err(ConversionError::Encode)?;

        Ok(Some(WireValue::Json(json)))
    }
}

/// Builds a request from the host's HTTP message.
///
/// Header names are lowercased; when two names collide the later one wins.
/// The body is kept only when the raw body is a `string` value.
fn http_request(http: &RpcHttp) -> ConversionResult<HttpRequest> {
    let url = Url::parse(&http.url).map_err(|source| ConversionError::InvalidUrl {
        url: http.url.clone(),
        source,
    })?;

    let mut headers = BTreeMap::new();
    for (name, value) in &http.headers {
        headers.insert(name.to_ascii_lowercase(), value.clone());
    }

    let body = match http.raw_body.as_deref() {
        Some(WireValue::String(body)) => Some(body.clone()),
        _ => None,
    };

    let method = if http.method.is_empty() {
        "GET".to_string()
    } else {
        http.method.to_ascii_uppercase()
    };

    Ok(HttpRequest {
        method,
        url,
        headers,
        params: http.params.clone(),
        body,
    })
}

/// Returns true if `metadata` carries any key that a field of `kind` is tagged with.
fn has_tagged_metadata(kind: CompositeKind, metadata: &Metadata) -> bool {
    kind.fields().iter().any(|field| match field.source {
        Source::Metadata(key) => metadata.contains_key(key),
        _ => false,
    })
}

/// A `json` payload holding an object whose keys all belong to `kind` is a
/// record that went through [`Converter::from_native`]; decode it as is.
/// `{}` is the all-default record.
fn serialized_composite(kind: CompositeKind, payload: &WireValue) -> Option<Value> {
    let text = payload.as_json()?;
    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;
    if !object.keys().all(|key| kind.has_field(key)) {
        return None;
    }
    Some(value)
}

fn composite_from_value(kind: CompositeKind, value: Value) -> ConversionResult<NativeValue> {
    let decoded = match kind {
        CompositeKind::Blob => serde_json::from_value(value).map(NativeValue::Blob),
        CompositeKind::QueueMessage => serde_json::from_value(value).map(NativeValue::QueueMessage),
        CompositeKind::Timer => serde_json::from_value(value).map(NativeValue::Timer),
        CompositeKind::EventGridEvent => {
            serde_json::from_value(value).map(NativeValue::EventGridEvent)
        }
        CompositeKind::EventHubEvent => serde_json::from_value(value).map(NativeValue::EventHubEvent),
        CompositeKind::ServiceBusMessage => {
            serde_json::from_value(value).map(NativeValue::ServiceBusMessage)
        }
    };
    decoded.map_err(|e| ConversionError::decode(kind, e))
}

/// Decodes the payload into the whole target, ignoring field tags.
fn decode_whole(payload: &WireValue, target: TypeShape) -> ConversionResult<NativeValue> {
    let label = target.to_string();
    match target {
        TypeShape::String => Ok(NativeValue::String(as_text(decode_field(
            payload,
            FieldShape::Text,
            &label,
        )?))),
        TypeShape::Int => decode_field(payload, FieldShape::Integer, &label)?
            .as_i64()
            .map(NativeValue::Int)
            .ok_or_else(|| ConversionError::mismatch(payload.variant_name(), target)),
        TypeShape::Float => decode_field(payload, FieldShape::Float, &label)?
            .as_f64()
            .map(NativeValue::Float)
            .ok_or_else(|| ConversionError::mismatch(payload.variant_name(), target)),
        TypeShape::Bool => decode_field(payload, FieldShape::Bool, &label)?
            .as_bool()
            .map(NativeValue::Bool)
            .ok_or_else(|| ConversionError::mismatch(payload.variant_name(), target)),
        TypeShape::Json => Ok(NativeValue::Json(decode_field(
            payload,
            FieldShape::Any,
            &label,
        )?)),
        TypeShape::Bytes => match payload {
            WireValue::Bytes(bytes) => Ok(NativeValue::Bytes(bytes.clone())),
            WireValue::String(text) | WireValue::Json(text) => {
                Ok(NativeValue::Bytes(text.as_bytes().to_vec()))
            }
            other => Err(ConversionError::mismatch(other.variant_name(), target)),
        },
        TypeShape::Stream => match payload {
            WireValue::Stream(handle) => Ok(NativeValue::Stream(handle.clone())),
            other => Err(ConversionError::mismatch(other.variant_name(), target)),
        },
        TypeShape::Map => {
            let value = parse_json(payload, target)?;
            serde_json::from_value(value)
                .map(NativeValue::Map)
                .map_err(|e| ConversionError::decode(target, e))
        }
        TypeShape::Composite(kind) => composite_from_value(kind, parse_json(payload, target)?),
        TypeShape::Context
        | TypeShape::HttpRequest
        | TypeShape::HttpResponse
        | TypeShape::Error => Err(ConversionError::mismatch(payload.variant_name(), target)),
    }
}

/// Structured targets accept only the `json` variant.
fn parse_json(payload: &WireValue, target: TypeShape) -> ConversionResult<Value> {
    match payload {
        WireValue::Json(text) => {
            serde_json::from_str(text).map_err(|e| ConversionError::decode(target, e))
        }
        other => Err(ConversionError::mismatch(other.variant_name(), target)),
    }
}

/// Decodes a single wire value into a JSON value of the given field shape.
fn decode_field(wire: &WireValue, shape: FieldShape, label: &str) -> ConversionResult<Value> {
    match wire {
        WireValue::Json(text) => {
            let value: Value =
                serde_json::from_str(text).map_err(|e| ConversionError::decode(label, e))?;
            coerce_json(value, text, shape, label)
        }
        WireValue::String(text) | WireValue::Stream(text) => coerce_text(text, shape, label),
        WireValue::Bytes(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|_| {
                ConversionError::parse(format!("<{} bytes>", bytes.len()), label)
            })?;
            coerce_text(text, shape, label)
        }
        WireValue::Http(_) => Err(ConversionError::mismatch("http", label)),
    }
}

fn coerce_json(value: Value, raw: &str, shape: FieldShape, label: &str) -> ConversionResult<Value> {
    match (shape, value) {
        (FieldShape::Any, value) => Ok(value),
        (FieldShape::Text, Value::String(text)) => Ok(Value::String(text)),
        (FieldShape::Text, _) => Ok(Value::String(raw.to_string())),
        (FieldShape::Integer, value @ Value::Number(_)) if value.is_i64() => Ok(value),
        (FieldShape::Float, value @ Value::Number(_)) => Ok(value),
        (FieldShape::Bool, value @ Value::Bool(_)) => Ok(value),
        (_, Value::String(text)) => coerce_text(&text, shape, label),
        (_, _) => Err(ConversionError::parse(raw, label)),
    }
}

fn coerce_text(text: &str, shape: FieldShape, label: &str) -> ConversionResult<Value> {
    let trimmed = text.trim();
    match shape {
        FieldShape::Text | FieldShape::Any => Ok(Value::String(text.to_string())),
        FieldShape::Integer => trimmed
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| ConversionError::parse(text, label)),
        FieldShape::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| ConversionError::parse(text, label)),
        FieldShape::Bool => trimmed
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| ConversionError::parse(text, label)),
    }
}

fn as_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
