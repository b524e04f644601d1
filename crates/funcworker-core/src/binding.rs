//! Binding kinds and directions declared by the host in function metadata.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

/// Category of a trigger or binding.
///
/// The set is closed: a type string the worker does not know is an error
/// ([`ConversionError::UnsupportedBindingKind`]), never a silent pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    HttpTrigger,
    Http,
    BlobTrigger,
    Blob,
    QueueTrigger,
    Queue,
    TimerTrigger,
    EventGridTrigger,
    Table,
    EventHubTrigger,
    EventHub,
    ServiceBusTrigger,
    ServiceBus,
    CosmosDbTrigger,
    CosmosDb,
}

impl BindingKind {
    /// All known kinds, in declaration order.
    pub const ALL: [BindingKind; 15] = [
        BindingKind::HttpTrigger,
        BindingKind::Http,
        BindingKind::BlobTrigger,
        BindingKind::Blob,
        BindingKind::QueueTrigger,
        BindingKind::Queue,
        BindingKind::TimerTrigger,
        BindingKind::EventGridTrigger,
        BindingKind::Table,
        BindingKind::EventHubTrigger,
        BindingKind::EventHub,
        BindingKind::ServiceBusTrigger,
        BindingKind::ServiceBus,
        BindingKind::CosmosDbTrigger,
        BindingKind::CosmosDb,
    ];

    /// Returns the type string used by the host for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HttpTrigger => "httpTrigger",
            Self::Http => "http",
            Self::BlobTrigger => "blobTrigger",
            Self::Blob => "blob",
            Self::QueueTrigger => "queueTrigger",
            Self::Queue => "queue",
            Self::TimerTrigger => "timerTrigger",
            Self::EventGridTrigger => "eventGridTrigger",
            Self::Table => "table",
            Self::EventHubTrigger => "eventHubTrigger",
            Self::EventHub => "eventHub",
            Self::ServiceBusTrigger => "serviceBusTrigger",
            Self::ServiceBus => "serviceBus",
            Self::CosmosDbTrigger => "cosmosDBTrigger",
            Self::CosmosDb => "cosmosDB",
        }
    }

    /// Returns true for the HTTP trigger and HTTP output binding.
    pub fn is_http(self) -> bool {
        matches!(self, Self::HttpTrigger | Self::Http)
    }

    /// Returns true if this kind starts an invocation.
    pub fn is_trigger(self) -> bool {
        matches!(
            self,
            Self::HttpTrigger
                | Self::BlobTrigger
                | Self::QueueTrigger
                | Self::TimerTrigger
                | Self::EventGridTrigger
                | Self::EventHubTrigger
                | Self::ServiceBusTrigger
                | Self::CosmosDbTrigger
        )
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BindingKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The host is not consistent about the casing of "cosmosDB".
        BindingKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConversionError::UnsupportedBindingKind(s.to_string()))
    }
}

/// Data flow direction of a binding as declared by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    In,
    Out,
    #[serde(rename = "inout")]
    InOut,
}

impl Direction {
    /// Returns true if the handler writes this binding.
    pub fn is_out(self) -> bool {
        matches!(self, Self::Out)
    }
}
