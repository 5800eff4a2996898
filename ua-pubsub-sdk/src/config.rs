use crate::{
    node_id::NodeId,
    types::{MessageEncoding, PublishedDataSetType, SecurityMode},
    value::PublisherId,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Free-form property attached to a Connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: serde_json::Value,
}

/// Network address of a Connection: the endpoint URL plus an optional
/// interface the transport should bind to.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkAddressUrl {
    pub network_interface: Option<String>,
    pub url: String,
}

/// Configuration of a PubSub Connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub name: String,
    pub enabled: bool,
    pub transport_profile_uri: String,
    pub address: NetworkAddressUrl,
    pub publisher_id: PublisherId,
    pub connection_properties: Vec<KeyValuePair>,
}

/// Configuration of a WriterGroup.
///
/// A `writer_group_id` of 0 requests auto-assignment; the id must otherwise
/// be unique among live writer groups under connections sharing the same
/// transport profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WriterGroupConfig {
    pub name: String,
    pub writer_group_id: u16,
    pub publishing_interval: Duration,
    pub keep_alive_time: Duration,
    pub priority: u8,
    pub encoding: MessageEncoding,
    /// Transport/encoding specific settings, opaque to the manager.
    pub message_settings: Option<serde_json::Value>,
}

impl Default for WriterGroupConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            writer_group_id: 0,
            publishing_interval: Duration::from_millis(100),
            keep_alive_time: Duration::from_millis(10_000),
            priority: 0,
            encoding: MessageEncoding::Uadp,
            message_settings: None,
        }
    }
}

/// Configuration of a DataSetWriter.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DataSetWriterConfig {
    pub name: String,
    /// 0 requests auto-assignment, same scoping rule as writer-group ids.
    pub data_set_writer_id: u16,
    pub key_frame_count: u32,
    pub data_set_field_content_mask: u32,
    pub message_settings: Option<serde_json::Value>,
}

/// Version pair peers compare to detect dataset-schema drift.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationVersion {
    pub major_version: u32,
    pub minor_version: u32,
}

/// Description of one field inside a dataset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldMetaData {
    pub name: String,
    pub description: String,
    pub built_in_type: u8,
    pub value_rank: i32,
    pub data_set_field_id: Uuid,
}

/// Metadata of a published or subscribed dataset.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DataSetMetaData {
    pub name: String,
    pub description: String,
    pub data_set_class_id: Option<Uuid>,
    pub configuration_version: ConfigurationVersion,
    pub fields: Vec<FieldMetaData>,
}

/// Configuration of a PublishedDataSet.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublishedDataSetConfig {
    pub name: String,
    pub data_set_type: PublishedDataSetType,
}

/// Configuration of one field added to a PublishedDataSet.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataSetFieldConfig {
    pub field_name_alias: String,
    pub promoted_field: bool,
    /// The address-space variable this field publishes.
    pub published_variable: NodeId,
}

/// Security parameters of a ReaderGroup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReaderGroupSecurityParameters {
    pub security_mode: SecurityMode,
    pub security_group_id: Option<String>,
}

/// Configuration of a ReaderGroup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReaderGroupConfig {
    pub name: String,
    pub security: ReaderGroupSecurityParameters,
    /// Transport specific settings forwarded to the channel on registration.
    pub transport_settings: Option<serde_json::Value>,
}

/// Where a reader stores the dataset values it receives.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SubscribedDataSetPayload {
    TargetVariables(Vec<FieldTargetVariable>),
    Mirror { parent_node_name: String },
}

/// Binding of one received dataset field to an address-space variable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldTargetVariable {
    pub data_set_field_id: Uuid,
    pub target_node_id: NodeId,
    pub attribute_id: u32,
}

/// Configuration of a DataSetReader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataSetReaderConfig {
    pub name: String,
    /// Publisher the reader listens to.
    pub publisher_id: PublisherId,
    pub writer_group_id: u16,
    pub data_set_writer_id: u16,
    pub data_set_meta_data: DataSetMetaData,
    pub subscribed_data_set: SubscribedDataSetPayload,
    /// Name of a StandaloneSubscribedDataSet to bind on creation.
    pub linked_standalone_subscribed_data_set: Option<String>,
    pub message_receive_timeout: Duration,
}

/// Configuration of a StandaloneSubscribedDataSet.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StandaloneSubscribedDataSetConfig {
    pub name: String,
    pub data_set_meta_data: DataSetMetaData,
    pub subscribed_data_set: SubscribedDataSetPayload,
}
