#![allow(dead_code)]

use async_trait::async_trait;
use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Once,
    },
    time::Duration,
};
use tracing::Level;
use ua_pubsub_core::PubSubManager;
use ua_pubsub_error::{PubSubError, PubSubResult};
use ua_pubsub_sdk::{
    ConnectionConfig, DataSetReaderConfig, DataSetWriterConfig, InMemorySessionRegistry,
    MessageEncoding, NetworkAddressUrl, NodeId, PubSubChannel, PublishedDataSetConfig,
    PublishedDataSetType, PublisherId, ReaderGroupConfig, SessionRegistry,
    StandaloneSubscribedDataSetConfig, SubscribedDataSetPayload, TransportLayer,
    WriterGroupConfig, PROFILE_MQTT_JSON, PROFILE_UDP_UADP,
};
use uuid::Uuid;

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .without_time()
            .try_init();
    });
}

/// Channel that records register calls; the test asserts on the counter.
pub struct TestChannel {
    register_calls: Arc<AtomicU32>,
}

#[async_trait]
impl PubSubChannel for TestChannel {
    async fn register(
        &mut self,
        _transport_settings: Option<&serde_json::Value>,
    ) -> PubSubResult<()> {
        self.register_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Transport layer handing out [`TestChannel`]s for one profile.
pub struct TestTransportLayer {
    profile: &'static str,
    pub register_calls: Arc<AtomicU32>,
}

impl TestTransportLayer {
    pub fn new(profile: &'static str) -> Arc<Self> {
        Arc::new(Self {
            profile,
            register_calls: Arc::new(AtomicU32::new(0)),
        })
    }
}

#[async_trait]
impl TransportLayer for TestTransportLayer {
    fn transport_profile_uri(&self) -> &str {
        self.profile
    }

    async fn create_channel(
        &self,
        _config: &ConnectionConfig,
    ) -> PubSubResult<Box<dyn PubSubChannel>> {
        Ok(Box::new(TestChannel {
            register_calls: Arc::clone(&self.register_calls),
        }))
    }
}

/// Transport layer whose channel creation always fails, for rollback tests.
pub struct BrokenTransportLayer;

#[async_trait]
impl TransportLayer for BrokenTransportLayer {
    fn transport_profile_uri(&self) -> &str {
        PROFILE_MQTT_JSON
    }

    async fn create_channel(
        &self,
        _config: &ConnectionConfig,
    ) -> PubSubResult<Box<dyn PubSubChannel>> {
        Err(PubSubError::InternalError("socket unavailable".to_string()))
    }
}

pub fn admin_session() -> NodeId {
    NodeId::guid(0, Uuid::nil())
}

/// Manager with a UDP-UADP test transport and an in-memory session registry.
pub async fn build_manager() -> (PubSubManager, Arc<InMemorySessionRegistry>, Arc<TestTransportLayer>)
{
    init_tracing();
    let sessions = Arc::new(InMemorySessionRegistry::new(admin_session()));
    let manager = PubSubManager::builder()
        .with_session_registry(Arc::clone(&sessions) as Arc<dyn SessionRegistry>)
        .build();
    let layer = TestTransportLayer::new(PROFILE_UDP_UADP);
    manager
        .register_transport_layer(Arc::clone(&layer) as Arc<dyn TransportLayer>)
        .await;
    (manager, sessions, layer)
}

pub fn udp_connection_config(name: &str) -> ConnectionConfig {
    ConnectionConfig {
        name: name.to_string(),
        enabled: true,
        transport_profile_uri: PROFILE_UDP_UADP.to_string(),
        address: NetworkAddressUrl {
            network_interface: None,
            url: "opc.udp://224.0.0.22:4840/".to_string(),
        },
        publisher_id: PublisherId::UInt16(2234),
        connection_properties: Vec::new(),
    }
}

pub fn writer_group_config(name: &str, writer_group_id: u16) -> WriterGroupConfig {
    WriterGroupConfig {
        name: name.to_string(),
        writer_group_id,
        publishing_interval: Duration::from_millis(1000),
        keep_alive_time: Duration::from_millis(10_000),
        priority: 0,
        encoding: MessageEncoding::Uadp,
        message_settings: None,
    }
}

pub fn data_set_writer_config(name: &str, data_set_writer_id: u16) -> DataSetWriterConfig {
    DataSetWriterConfig {
        name: name.to_string(),
        data_set_writer_id,
        key_frame_count: 10,
        data_set_field_content_mask: 0,
        message_settings: None,
    }
}

pub fn published_data_set_config(name: &str, data_set_type: PublishedDataSetType) -> PublishedDataSetConfig {
    PublishedDataSetConfig {
        name: name.to_string(),
        data_set_type,
    }
}

pub fn reader_group_config(name: &str) -> ReaderGroupConfig {
    ReaderGroupConfig {
        name: name.to_string(),
        ..Default::default()
    }
}

pub fn data_set_reader_config(name: &str, timeout: Duration) -> DataSetReaderConfig {
    DataSetReaderConfig {
        name: name.to_string(),
        publisher_id: PublisherId::UInt16(2234),
        writer_group_id: 100,
        data_set_writer_id: 62541,
        data_set_meta_data: Default::default(),
        subscribed_data_set: SubscribedDataSetPayload::TargetVariables(Vec::new()),
        linked_standalone_subscribed_data_set: None,
        message_receive_timeout: timeout,
    }
}

pub fn standalone_subscribed_data_set_config(name: &str) -> StandaloneSubscribedDataSetConfig {
    StandaloneSubscribedDataSetConfig {
        name: name.to_string(),
        data_set_meta_data: Default::default(),
        subscribed_data_set: SubscribedDataSetPayload::TargetVariables(Vec::new()),
    }
}
