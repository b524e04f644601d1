//! Wire values exchanged with the host.
//!
//! A [`WireValue`] carries exactly one variant. On the stream it is encoded
//! externally tagged, e.g. `{"string": "hello"}` or `{"json": "{\"a\":1}"}`.
//! A value with no variant at all is represented as `Option::None` by the
//! message types that hold one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A tagged value as received from or sent to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireValue {
    /// JSON text.
    Json(String),
    /// A plain string.
    String(String),
    /// Raw bytes, base64 on the wire.
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    /// An HTTP request or response.
    Http(Box<RpcHttp>),
    /// An opaque stream handle.
    Stream(String),
}

impl WireValue {
    /// Creates a JSON value from already-encoded text.
    pub fn json(text: impl Into<String>) -> Self {
        Self::Json(text.into())
    }

    /// Creates a string value.
    pub fn string(text: impl Into<String>) -> Self {
        Self::String(text.into())
    }

    /// Creates a JSON value by serializing `value`.
    pub fn from_json_value(value: &serde_json::Value) -> Self {
        Self::Json(value.to_string())
    }

    /// Creates an HTTP value.
    pub fn http(http: RpcHttp) -> Self {
        Self::Http(Box::new(http))
    }

    /// Returns the variant name, as used in error messages.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Http(_) => "http",
            Self::Stream(_) => "stream",
        }
    }

    /// Returns the JSON text if this is the `json` variant.
    pub fn as_json(&self) -> Option<&str> {
        match self {
            Self::Json(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the string if this is the `string` variant.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the HTTP message if this is the `http` variant.
    pub fn as_http(&self) -> Option<&RpcHttp> {
        match self {
            Self::Http(http) => Some(http),
            _ => None,
        }
    }
}

/// HTTP message as carried by [`WireValue::Http`].
///
/// Requests populate `method`, `url`, `headers`, `params` and `raw_body`;
/// responses populate `status_code`, `headers` and `body`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcHttp {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Route parameters extracted by the host.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<Box<WireValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Box<WireValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,
}

impl RpcHttp {
    /// Creates a request message.
    pub fn request(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    /// Builder: add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Builder: set the raw request body.
    pub fn with_raw_body(mut self, body: WireValue) -> Self {
        self.raw_body = Some(Box::new(body));
        self
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn externally_tagged_encoding() {
        let value = WireValue::string("hello");
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"string":"hello"}"#);

        let value = WireValue::json(r#"{"Content":"hello"}"#);
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"json":"{\"Content\":\"hello\"}"}"#
        );
    }

    #[test]
    fn bytes_are_base64_on_the_wire() {
        let value = WireValue::Bytes(b"hi!".to_vec());
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"bytes":"aGkh"}"#);

        let back: WireValue = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn bytes_reject_invalid_base64() {
        let result: Result<WireValue, _> = serde_json::from_str(r#"{"bytes":"***"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn http_request_omits_empty_fields() {
        let http = RpcHttp::request("GET", "https://example.org/api?name=test")
            .with_header("accept", "*/*");
        let json = serde_json::to_value(WireValue::http(http)).unwrap();

        assert_eq!(json["http"]["method"], "GET");
        assert_eq!(json["http"]["headers"]["accept"], "*/*");
        assert!(json["http"].get("raw_body").is_none());
        assert!(json["http"].get("status_code").is_none());
    }

    #[test]
    fn variant_accessors() {
        let value = WireValue::string("x");
        assert_eq!(value.variant_name(), "string");
        assert_eq!(value.as_string(), Some("x"));
        assert!(value.as_json().is_none());
        assert!(value.as_http().is_none());
    }
}
