use crate::{
    connection::Connection,
    published_data_set::PublishedDataSet,
    reserve_id::{ReserveId, RESERVE_ID_FIRST},
    subscribed_data_set::StandaloneSubscribedDataSet,
    timer::TimerEventLoop,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use ua_pubsub_error::{PubSubError, PubSubResult};
use ua_pubsub_sdk::{
    AddressSpaceMirror, EventLoop, InMemorySessionRegistry, NodeId, PublishReceivedCallback,
    SessionRegistry, TransportLayer,
};
use uuid::Uuid;

/// Binding of a ReaderGroup to a transport topic, used by MQTT-like
/// transports to route received PUBLISH messages.
#[derive(Clone, Debug)]
pub struct TopicAssign {
    pub reader_group: NodeId,
    pub topic: String,
}

/// The whole object graph owned by the manager. Every mutation happens with
/// this struct locked; the lock is the ordering guarantee between callers.
pub(crate) struct ManagerState {
    pub(crate) connections: Vec<Connection>,
    pub(crate) published_data_sets: Vec<PublishedDataSet>,
    pub(crate) subscribed_data_sets: Vec<StandaloneSubscribedDataSet>,
    pub(crate) topic_assigns: Vec<TopicAssign>,
    pub(crate) reserve_ids: Vec<ReserveId>,
    pub(crate) transport_layers: Vec<Arc<dyn TransportLayer>>,
    /// Next candidate writer-group wire id probed by the allocator.
    pub(crate) next_writer_group_id: u16,
    /// Next candidate dataset-writer wire id probed by the allocator.
    pub(crate) next_data_set_writer_id: u16,
    pub(crate) unique_id_count: u32,
}

impl ManagerState {
    fn new() -> Self {
        Self {
            connections: Vec::new(),
            published_data_sets: Vec::new(),
            subscribed_data_sets: Vec::new(),
            topic_assigns: Vec::new(),
            reserve_ids: Vec::new(),
            transport_layers: Vec::new(),
            next_writer_group_id: RESERVE_ID_FIRST,
            next_data_set_writer_id: RESERVE_ID_FIRST,
            unique_id_count: 0,
        }
    }

    /// Produce a numeric node id unique within the manager's lifetime.
    pub(crate) fn generate_unique_node_id(&mut self) -> NodeId {
        self.unique_id_count += 1;
        NodeId::numeric(1, self.unique_id_count)
    }

    /// Whether any live entity carries the given node id.
    pub(crate) fn node_id_in_use(&self, id: &NodeId) -> bool {
        for c in &self.connections {
            if &c.id == id {
                return true;
            }
            for g in &c.writer_groups {
                if &g.id == id || g.writers.iter().any(|w| &w.id == id) {
                    return true;
                }
            }
            for g in &c.reader_groups {
                if &g.id == id || g.readers.iter().any(|r| &r.id == id) {
                    return true;
                }
            }
        }
        self.published_data_sets
            .iter()
            .any(|p| &p.id == id || p.fields.iter().any(|f| &f.id == id))
            || self.subscribed_data_sets.iter().any(|s| &s.id == id)
    }
}

pub(crate) struct ManagerInner {
    pub(crate) state: Mutex<ManagerState>,
    pub(crate) event_loop: Arc<dyn EventLoop>,
    pub(crate) sessions: Arc<dyn SessionRegistry>,
    pub(crate) mirror: Option<Arc<dyn AddressSpaceMirror>>,
    pub(crate) publish_received: Option<PublishReceivedCallback>,
    pub(crate) default_publisher_id: u64,
}

/// Root aggregate of the PubSub configuration tree.
///
/// Owns the connections (with their nested writer/reader graphs), published
/// and standalone subscribed datasets, topic assignments, id reservations and
/// the registered transport layers. Cheap to clone; all clones share the same
/// serialized state.
#[derive(Clone)]
pub struct PubSubManager {
    pub(crate) inner: Arc<ManagerInner>,
}

/// Builder wiring the manager's collaborators.
#[derive(Default)]
pub struct PubSubManagerBuilder {
    event_loop: Option<Arc<dyn EventLoop>>,
    sessions: Option<Arc<dyn SessionRegistry>>,
    mirror: Option<Arc<dyn AddressSpaceMirror>>,
    publish_received: Option<PublishReceivedCallback>,
}

impl PubSubManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a host-provided event loop instead of the built-in tokio timers.
    pub fn with_event_loop(mut self, event_loop: Arc<dyn EventLoop>) -> Self {
        self.event_loop = Some(event_loop);
        self
    }

    /// Session liveness source for the reserve-id sweep.
    pub fn with_session_registry(mut self, sessions: Arc<dyn SessionRegistry>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Mirror entities into the host's address space; entity ids then come
    /// from the mirror.
    pub fn with_mirror(mut self, mirror: Arc<dyn AddressSpaceMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Callback wired into MQTT-family channels for received PUBLISH
    /// messages.
    pub fn with_publish_received_callback(mut self, callback: PublishReceivedCallback) -> Self {
        self.publish_received = Some(callback);
        self
    }

    pub fn build(self) -> PubSubManager {
        let event_loop = self
            .event_loop
            .unwrap_or_else(|| Arc::new(TimerEventLoop::new()));
        let sessions = self
            .sessions
            .unwrap_or_else(|| Arc::new(InMemorySessionRegistry::new(NodeId::guid(0, Uuid::nil()))));
        PubSubManager {
            inner: Arc::new(ManagerInner {
                state: Mutex::new(ManagerState::new()),
                event_loop,
                sessions,
                mirror: self.mirror,
                publish_received: self.publish_received,
                default_publisher_id: random_publisher_id(),
            }),
        }
    }
}

/// Seed the default publisher id from a fresh random GUID.
fn random_publisher_id() -> u64 {
    let (d1, d2, d3, _) = Uuid::new_v4().as_fields();
    let id = u64::from(d1);
    let id = id.wrapping_shl(32).wrapping_add(u64::from(d2));
    id.wrapping_shl(16).wrapping_add(u64::from(d3))
}

impl Default for PubSubManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSubManager {
    pub fn builder() -> PubSubManagerBuilder {
        PubSubManagerBuilder::new()
    }

    /// Manager with the built-in event loop and an empty session registry.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Publisher id used when a connection configuration does not carry one.
    /// Seeded once at initialization from a random 64-bit value.
    #[inline]
    pub fn default_publisher_id(&self) -> u64 {
        self.inner.default_publisher_id
    }

    /// Register a transport layer. Connections can only be created for
    /// profiles with a registered layer.
    pub async fn register_transport_layer(&self, layer: Arc<dyn TransportLayer>) {
        let mut state = self.inner.state.lock().await;
        state.transport_layers.push(layer);
    }

    /// Numeric node id unique within this manager's lifetime. Hosts with an
    /// address-space mirror get ids from the mirror instead.
    pub async fn generate_unique_node_id(&self) -> NodeId {
        let mut state = self.inner.state.lock().await;
        state.generate_unique_node_id()
    }

    /// GUID-flavored node id not used by any live entity.
    pub async fn generate_unique_guid(&self) -> NodeId {
        let state = self.inner.state.lock().await;
        loop {
            let candidate = NodeId::guid(1, Uuid::new_v4());
            if !state.node_id_in_use(&candidate) {
                return candidate;
            }
        }
    }

    /// Bind a ReaderGroup to a transport topic.
    pub async fn add_topic_assign(
        &self,
        reader_group: &NodeId,
        topic: impl Into<String>,
    ) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        if state.reader_group(reader_group).is_none() {
            return Err(PubSubError::NotFound(format!(
                "reader group {reader_group}"
            )));
        }
        state.topic_assigns.push(TopicAssign {
            reader_group: reader_group.clone(),
            topic: topic.into(),
        });
        Ok(())
    }

    /// Snapshot of all topic assignments.
    pub async fn topic_assigns(&self) -> Vec<TopicAssign> {
        let state = self.inner.state.lock().await;
        state.topic_assigns.clone()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.state.lock().await.connections.len()
    }

    pub async fn published_data_set_count(&self) -> usize {
        self.inner.state.lock().await.published_data_sets.len()
    }

    pub async fn subscribed_data_set_count(&self) -> usize {
        self.inner.state.lock().await.subscribed_data_sets.len()
    }

    pub async fn reserve_id_count(&self) -> usize {
        self.inner.state.lock().await.reserve_ids.len()
    }

    pub async fn topic_assign_count(&self) -> usize {
        self.inner.state.lock().await.topic_assigns.len()
    }

    /// Tear down the whole configuration: connections (cascading to their
    /// groups, writers and readers), published datasets, topic assignments,
    /// reservations, transport layers, standalone subscribed datasets.
    /// Idempotent on an already-empty manager.
    pub async fn shutdown(&self) {
        info!("PubSub cleanup was called");

        let connection_ids: Vec<NodeId> = {
            let state = self.inner.state.lock().await;
            state.connections.iter().map(|c| c.id.clone()).collect()
        };
        for id in connection_ids {
            if let Err(e) = self.remove_connection(&id).await {
                warn!(error = %e, "Connection removal during cleanup failed");
            }
        }

        let pds_ids: Vec<NodeId> = {
            let mut state = self.inner.state.lock().await;
            // Frozen flags do not survive teardown.
            for pds in &mut state.published_data_sets {
                pds.configuration_frozen = false;
            }
            state
                .published_data_sets
                .iter()
                .map(|p| p.id.clone())
                .collect()
        };
        for id in pds_ids {
            if let Err(e) = self.remove_published_data_set(&id).await {
                warn!(error = %e, "PublishedDataSet removal during cleanup failed");
            }
        }

        {
            let mut state = self.inner.state.lock().await;
            state.topic_assigns.clear();
            state.reserve_ids.clear();
            state.transport_layers.clear();
            state.next_writer_group_id = RESERVE_ID_FIRST;
            state.next_data_set_writer_id = RESERVE_ID_FIRST;
        }

        let sds_ids: Vec<NodeId> = {
            let state = self.inner.state.lock().await;
            state
                .subscribed_data_sets
                .iter()
                .map(|s| s.id.clone())
                .collect()
        };
        for id in sds_ids {
            if let Err(e) = self.remove_standalone_subscribed_data_set(&id).await {
                warn!(error = %e, "SubscribedDataSet removal during cleanup failed");
            }
        }
    }
}
