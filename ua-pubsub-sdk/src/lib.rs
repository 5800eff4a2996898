mod config;
mod event_loop;
mod mirror;
mod monitoring;
mod node_id;
mod session;
mod transport;
mod types;
mod value;

pub use config::{
    ConfigurationVersion, ConnectionConfig, DataSetFieldConfig, DataSetMetaData,
    DataSetReaderConfig, DataSetWriterConfig, FieldMetaData, FieldTargetVariable, KeyValuePair,
    NetworkAddressUrl, PublishedDataSetConfig, ReaderGroupConfig, ReaderGroupSecurityParameters,
    StandaloneSubscribedDataSetConfig, SubscribedDataSetPayload, WriterGroupConfig,
};
pub use event_loop::{EventLoop, TimerCallback, TimerId};
pub use mirror::AddressSpaceMirror;
pub use monitoring::ReceiveTimeoutCallback;
pub use node_id::{Identifier, NodeId};
pub use session::{InMemorySessionRegistry, SessionRegistry};
pub use transport::{
    is_mqtt_profile, PubSubChannel, PublishReceivedCallback, TransportLayer, PROFILE_MQTT_JSON,
    PROFILE_MQTT_UADP, PROFILE_UDP_UADP,
};
pub use types::{
    CycleMissPolicy, MessageEncoding, MonitoringKind, PubSubComponentKind, PubSubState,
    PublishedDataSetType, ReserveIdKind, SecurityMode, StateChangeCause,
};
pub use value::PublisherId;
