//! Fixed-shape records handed to handlers for storage and messaging bindings.
//!
//! Every composite carries a static [`FieldSpec`] table. The table tells the
//! converter where each field comes from: the binding payload itself, a key of
//! the trigger metadata, or nowhere (left at its zero value).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the converter fetches a field's value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The binding payload.
    Primary,
    /// A key of the trigger metadata.
    Metadata(&'static str),
    /// Not populated by tagged decode.
    None,
}

/// Scalar shape a single field value is decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Text,
    Integer,
    Float,
    Bool,
    /// Any JSON value (objects, arrays, nested records).
    Any,
}

/// One entry of a composite's field-tag table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Serialized name of the field.
    pub name: &'static str,
    pub source: Source,
    pub shape: FieldShape,
}

impl FieldSpec {
    pub const fn primary(name: &'static str, shape: FieldShape) -> Self {
        Self {
            name,
            source: Source::Primary,
            shape,
        }
    }

    pub const fn metadata(name: &'static str, key: &'static str, shape: FieldShape) -> Self {
        Self {
            name,
            source: Source::Metadata(key),
            shape,
        }
    }

    pub const fn untagged(name: &'static str, shape: FieldShape) -> Self {
        Self {
            name,
            source: Source::None,
            shape,
        }
    }
}

/// The composite record types known to the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    Blob,
    QueueMessage,
    Timer,
    EventGridEvent,
    EventHubEvent,
    ServiceBusMessage,
}

impl CompositeKind {
    /// Field-tag table, in declaration order.
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Self::Blob => BLOB_FIELDS,
            Self::QueueMessage => QUEUE_MESSAGE_FIELDS,
            Self::Timer => TIMER_FIELDS,
            Self::EventGridEvent => EVENT_GRID_FIELDS,
            Self::EventHubEvent => EVENT_HUB_FIELDS,
            Self::ServiceBusMessage => SERVICE_BUS_FIELDS,
        }
    }

    /// Returns true if `name` is the serialized name of one of the fields.
    pub fn has_field(self, name: &str) -> bool {
        self.fields().iter().any(|field| field.name == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "Blob",
            Self::QueueMessage => "QueueMessage",
            Self::Timer => "Timer",
            Self::EventGridEvent => "EventGridEvent",
            Self::EventHubEvent => "EventHubEvent",
            Self::ServiceBusMessage => "ServiceBusMessage",
        }
    }
}

impl fmt::Display for CompositeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const BLOB_FIELDS: &[FieldSpec] = &[
    FieldSpec::metadata("Name", "name", FieldShape::Text),
    FieldSpec::primary("Content", FieldShape::Text),
    FieldSpec::metadata("URI", "Uri", FieldShape::Text),
    FieldSpec::metadata("Properties", "Properties", FieldShape::Any),
];

const QUEUE_MESSAGE_FIELDS: &[FieldSpec] = &[
    FieldSpec::primary("Text", FieldShape::Text),
    FieldSpec::metadata("Id", "Id", FieldShape::Text),
    FieldSpec::metadata("DequeueCount", "DequeueCount", FieldShape::Integer),
    FieldSpec::metadata("InsertionTime", "InsertionTime", FieldShape::Text),
    FieldSpec::metadata("ExpirationTime", "ExpirationTime", FieldShape::Text),
    FieldSpec::metadata("NextVisibleTime", "NextVisibleTime", FieldShape::Text),
    FieldSpec::metadata("PopReceipt", "PopReceipt", FieldShape::Text),
];

const TIMER_FIELDS: &[FieldSpec] = &[
    FieldSpec::untagged("IsPastDue", FieldShape::Bool),
    FieldSpec::untagged("ScheduleStatus", FieldShape::Any),
];

const EVENT_GRID_FIELDS: &[FieldSpec] = &[
    FieldSpec::untagged("id", FieldShape::Text),
    FieldSpec::untagged("topic", FieldShape::Text),
    FieldSpec::untagged("subject", FieldShape::Text),
    FieldSpec::untagged("data", FieldShape::Any),
    FieldSpec::untagged("eventType", FieldShape::Text),
    FieldSpec::untagged("eventTime", FieldShape::Text),
    FieldSpec::untagged("metadataVersion", FieldShape::Text),
    FieldSpec::untagged("dataVersion", FieldShape::Text),
];

const EVENT_HUB_FIELDS: &[FieldSpec] = &[
    FieldSpec::primary("Data", FieldShape::Any),
    FieldSpec::metadata("EnqueuedTimeUtc", "EnqueuedTimeUtc", FieldShape::Text),
    FieldSpec::metadata("SequenceNumber", "SequenceNumber", FieldShape::Integer),
    FieldSpec::metadata("Offset", "Offset", FieldShape::Text),
    FieldSpec::metadata("PartitionKey", "PartitionKey", FieldShape::Text),
];

const SERVICE_BUS_FIELDS: &[FieldSpec] = &[
    FieldSpec::primary("Data", FieldShape::Any),
    FieldSpec::metadata("MessageId", "MessageId", FieldShape::Text),
    FieldSpec::metadata("DeliveryCount", "DeliveryCount", FieldShape::Integer),
    FieldSpec::metadata("ContentType", "ContentType", FieldShape::Text),
    FieldSpec::metadata("Label", "Label", FieldShape::Text),
    FieldSpec::metadata("ExpiresAtUtc", "ExpiresAtUtc", FieldShape::Text),
    FieldSpec::metadata("EnqueuedTimeUtc", "EnqueuedTimeUtc", FieldShape::Text),
];

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Contents of a blob, read as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blob {
    #[serde(rename = "Name", skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(rename = "Content", skip_serializing_if = "String::is_empty")]
    pub content: String,

    #[serde(rename = "URI", skip_serializing_if = "String::is_empty")]
    pub uri: String,

    #[serde(rename = "Properties", skip_serializing_if = "is_default")]
    pub properties: BlobProperties,
}

/// Storage properties of a blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct BlobProperties {
    #[serde(rename = "ContentMD5", skip_serializing_if = "String::is_empty")]
    pub content_md5: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub content_type: String,

    #[serde(rename = "ETag", skip_serializing_if = "String::is_empty")]
    pub etag: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_modified: String,

    #[serde(skip_serializing_if = "is_default")]
    pub length: i64,
}

/// A storage queue message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct QueueMessage {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(skip_serializing_if = "is_default")]
    pub dequeue_count: i64,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub insertion_time: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub expiration_time: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_visible_time: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub pop_receipt: String,
}

impl QueueMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Timer trigger payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Timer {
    #[serde(rename = "IsPastDue")]
    pub past_due: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_status: Option<ScheduleStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ScheduleStatus {
    pub last: String,
    pub next: String,
    pub last_updated: String,
}

/// An event published to an Event Grid topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventGridEvent {
    pub id: String,
    pub topic: String,
    pub subject: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
    pub event_type: String,
    pub event_time: String,
    pub metadata_version: String,
    pub data_version: String,
}

/// An Event Hubs event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct EventHubEvent {
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub enqueued_time_utc: String,

    #[serde(skip_serializing_if = "is_default")]
    pub sequence_number: i64,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub offset: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition_key: String,
}

/// A Service Bus message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ServiceBusMessage {
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub message_id: String,

    #[serde(skip_serializing_if = "is_default")]
    pub delivery_count: i64,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub content_type: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub label: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub expires_at_utc: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub enqueued_time_utc: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_match_serialized_names() {
        let blob = serde_json::to_value(Blob {
            name: "n".into(),
            content: "c".into(),
            uri: "u".into(),
            properties: BlobProperties {
                length: 1,
                ..Default::default()
            },
        })
        .unwrap();
        for field in CompositeKind::Blob.fields() {
            assert!(blob.get(field.name).is_some(), "missing {}", field.name);
        }

        let message = serde_json::to_value(QueueMessage {
            text: "t".into(),
            id: "i".into(),
            dequeue_count: 1,
            insertion_time: "a".into(),
            expiration_time: "b".into(),
            next_visible_time: "c".into(),
            pop_receipt: "d".into(),
        })
        .unwrap();
        for field in CompositeKind::QueueMessage.fields() {
            assert!(message.get(field.name).is_some(), "missing {}", field.name);
        }
    }

    #[test]
    fn empty_fields_are_not_serialized() {
        let blob = Blob {
            content: "hello".into(),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&blob).unwrap(), r#"{"Content":"hello"}"#);
    }

    #[test]
    fn timer_uses_is_past_due() {
        let timer: Timer = serde_json::from_str(r#"{"IsPastDue":true}"#).unwrap();
        assert!(timer.past_due);
        assert!(timer.schedule_status.is_none());
    }

    #[test]
    fn only_storage_and_messaging_records_have_primary_fields() {
        let primary = |kind: CompositeKind| {
            kind.fields()
                .iter()
                .any(|field| field.source == Source::Primary)
        };
        assert!(primary(CompositeKind::Blob));
        assert!(primary(CompositeKind::QueueMessage));
        assert!(primary(CompositeKind::EventHubEvent));
        assert!(primary(CompositeKind::ServiceBusMessage));
        assert!(!primary(CompositeKind::Timer));
        assert!(!primary(CompositeKind::EventGridEvent));
    }
}
