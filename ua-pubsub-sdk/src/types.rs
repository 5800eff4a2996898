use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt::{self, Display, Formatter};

/// Operational state of a WriterGroup, ReaderGroup, writer or reader.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i16)]
pub enum PubSubState {
    Disabled = 0,
    Paused = 1,
    Operational = 2,
    Error = 3,
}

impl Display for PubSubState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            PubSubState::Disabled => "Disabled",
            PubSubState::Paused => "Paused",
            PubSubState::Operational => "Operational",
            PubSubState::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Why a state transition happened. Cascade removal uses `Shutdown`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StateChangeCause {
    None,
    Shutdown,
    Error,
}

/// Message encoding carried by a WriterGroup.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageEncoding {
    Uadp,
    Json,
}

/// The kind of dataset a PublishedDataSet configuration describes.
///
/// Only `PublishedItems` is supported; events and template variants are
/// rejected at creation time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i16)]
pub enum PublishedDataSetType {
    PublishedItems = 0,
    PublishedEvents = 1,
    PublishedItemsTemplate = 2,
    PublishedEventsTemplate = 3,
}

/// Which wire-id namespace a reservation belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveIdKind {
    WriterGroup,
    DataSetWriter,
}

/// PubSub component addressed by a monitoring operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PubSubComponentKind {
    Connection,
    WriterGroup,
    DataSetWriter,
    ReaderGroup,
    DataSetReader,
}

/// Kind of monitoring requested for a component.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MonitoringKind {
    MessageReceiveTimeout,
}

/// How a cyclic callback catches up after missing a cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum CycleMissPolicy {
    /// Resume with the current time as the new base.
    #[default]
    CurrentTime,
    /// Keep the original base time and fire the missed cycles.
    BaseTime,
}

/// Message security applied to a ReaderGroup.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize_repr, Deserialize_repr, Default)]
#[repr(i16)]
pub enum SecurityMode {
    #[default]
    None = 0,
    Sign = 1,
    SignAndEncrypt = 2,
}
