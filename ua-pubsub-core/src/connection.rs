use crate::{
    manager::{ManagerState, PubSubManager},
    reader_group::ReaderGroup,
    writer_group::WriterGroup,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use ua_pubsub_error::{PubSubError, PubSubResult};
use ua_pubsub_sdk::{
    is_mqtt_profile, ConnectionConfig, NodeId, PubSubChannel, PubSubState, PublisherId,
    ReaderGroupConfig, StateChangeCause,
};

/// A transport binding owning the writer and reader groups below it.
pub(crate) struct Connection {
    pub(crate) id: NodeId,
    pub(crate) config: ConnectionConfig,
    /// Opened by the transport layer right after insertion; `None` only for
    /// the short window between insertion and channel creation.
    pub(crate) channel: Option<Box<dyn PubSubChannel>>,
    pub(crate) is_registered: bool,
    pub(crate) configuration_frozen: bool,
    pub(crate) writer_groups: Vec<WriterGroup>,
    pub(crate) reader_groups: Vec<ReaderGroup>,
}

/// Read-only view of a Connection.
#[derive(Clone, Debug)]
pub struct ConnectionSnapshot {
    pub id: NodeId,
    pub name: String,
    pub transport_profile_uri: String,
    pub publisher_id: PublisherId,
    pub is_registered: bool,
    pub configuration_frozen: bool,
    pub writer_groups: Vec<NodeId>,
    pub reader_groups: Vec<NodeId>,
}

impl Connection {
    pub(crate) fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            id: self.id.clone(),
            name: self.config.name.clone(),
            transport_profile_uri: self.config.transport_profile_uri.clone(),
            publisher_id: self.config.publisher_id.clone(),
            is_registered: self.is_registered,
            configuration_frozen: self.configuration_frozen,
            writer_groups: self.writer_groups.iter().map(|g| g.id.clone()).collect(),
            reader_groups: self.reader_groups.iter().map(|g| g.id.clone()).collect(),
        }
    }
}

impl ManagerState {
    pub(crate) fn connection(&self, id: &NodeId) -> Option<&Connection> {
        self.connections.iter().find(|c| &c.id == id)
    }

    pub(crate) fn connection_mut(&mut self, id: &NodeId) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| &c.id == id)
    }

    pub(crate) fn connection_index(&self, id: &NodeId) -> Option<usize> {
        self.connections.iter().position(|c| &c.id == id)
    }
}

impl PubSubManager {
    /// Create a connection from the given configuration.
    ///
    /// The configuration is moved into the manager. A transport layer must be
    /// registered for `transport_profile_uri`; the layer opens the
    /// communication channel, and a failed open rolls the insertion back.
    pub async fn add_connection(&self, config: ConnectionConfig) -> PubSubResult<NodeId> {
        let mut state = self.inner.state.lock().await;

        let uri = config.transport_profile_uri.clone();
        let Some(layer) = state
            .transport_layers
            .iter()
            .find(|l| l.transport_profile_uri() == uri)
            .cloned()
        else {
            error!("Connection creation failed: no transport layer registered for profile {uri}");
            return Err(PubSubError::NotFound(format!("transport layer for {uri}")));
        };
        if state
            .connections
            .iter()
            .any(|c| c.config.name == config.name)
        {
            error!(
                "Connection creation failed: connection with name [{}] already exists",
                config.name
            );
            return Err(PubSubError::BrowseNameDuplicated(config.name));
        }

        let channel_config = config.clone();
        state.connections.push(Connection {
            id: NodeId::numeric(0, 0),
            config,
            channel: None,
            is_registered: false,
            configuration_frozen: false,
            writer_groups: Vec::new(),
            reader_groups: Vec::new(),
        });
        let idx = state.connections.len() - 1;

        let mut channel = match layer.create_channel(&channel_config).await {
            Ok(channel) => channel,
            Err(e) => {
                state.connections.pop();
                error!(error = %e, "Connection creation failed: transport channel creation problem");
                return Err(PubSubError::InternalError(
                    "transport channel creation failed".to_string(),
                ));
            }
        };

        // MQTT-family channels deliver received PUBLISH messages through the
        // host's callback.
        if is_mqtt_profile(&uri) {
            if let Some(callback) = &self.inner.publish_received {
                channel.set_publish_received_callback(Arc::clone(callback));
            }
        }

        let id = match &self.inner.mirror {
            Some(mirror) => match mirror.add_connection_representation(&channel_config) {
                Ok(id) => id,
                Err(e) => {
                    state.connections.pop();
                    error!(error = %e, "Connection creation failed: mirror rejected the representation");
                    return Err(e);
                }
            },
            None => state.generate_unique_node_id(),
        };

        if let Some(conn) = state.connections.get_mut(idx) {
            conn.channel = Some(channel);
            conn.id = id.clone();
        }
        info!("Connection [{}] created ({id})", channel_config.name);
        Ok(id)
    }

    /// Remove a connection, cascading over its writer and reader groups:
    /// each group is disabled with cause `Shutdown`, unfrozen, and removed.
    pub async fn remove_connection(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.remove_connection_locked(&mut state, id)
    }

    pub(crate) fn remove_connection_locked(
        &self,
        state: &mut ManagerState,
        id: &NodeId,
    ) -> PubSubResult<()> {
        let Some(conn) = state.connection(id) else {
            return Err(PubSubError::NotFound(format!("connection {id}")));
        };
        let writer_group_ids: Vec<NodeId> =
            conn.writer_groups.iter().map(|g| g.id.clone()).collect();
        let reader_group_ids: Vec<NodeId> =
            conn.reader_groups.iter().map(|g| g.id.clone()).collect();

        for group in &writer_group_ids {
            if let Err(e) = self.set_writer_group_state_locked(
                state,
                group,
                PubSubState::Disabled,
                StateChangeCause::Shutdown,
            ) {
                warn!(error = %e, "WriterGroup disable during connection teardown failed");
            }
            if let Err(e) = self.unfreeze_writer_group_locked(state, group) {
                warn!(error = %e, "WriterGroup unfreeze during connection teardown failed");
            }
            if let Err(e) = self.remove_writer_group_locked(state, group) {
                warn!(error = %e, "WriterGroup removal during connection teardown failed");
            }
        }
        for group in &reader_group_ids {
            if let Err(e) = self.set_reader_group_state_locked(
                state,
                group,
                PubSubState::Disabled,
                StateChangeCause::Shutdown,
            ) {
                warn!(error = %e, "ReaderGroup disable during connection teardown failed");
            }
            if let Err(e) = self.unfreeze_reader_group_locked(state, group) {
                warn!(error = %e, "ReaderGroup unfreeze during connection teardown failed");
            }
            if let Err(e) = self.remove_reader_group_locked(state, group) {
                warn!(error = %e, "ReaderGroup removal during connection teardown failed");
            }
        }

        if let Some(mirror) = &self.inner.mirror {
            mirror.remove_connection_representation(id);
        }

        if let Some(idx) = state.connection_index(id) {
            let conn = state.connections.remove(idx);
            info!("Connection [{}] removed", conn.config.name);
        }
        Ok(())
    }

    /// Register the connection's channel for receiving, optionally with
    /// reader-group transport settings. Idempotent: a second call returns
    /// success without touching the channel. The registered flag latches on
    /// any outcome; the returned status reflects the channel's register call.
    pub async fn register_connection(
        &self,
        id: &NodeId,
        reader_group_config: Option<&ReaderGroupConfig>,
    ) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        let Some(conn) = state.connection_mut(id) else {
            return Err(PubSubError::NotFound(format!("connection {id}")));
        };
        if conn.is_registered {
            info!("Connection [{}] already registered", conn.config.name);
            return Ok(());
        }

        let transport_settings =
            reader_group_config.and_then(|config| config.transport_settings.as_ref());
        let result = match conn.channel.as_mut() {
            Some(channel) => channel.register(transport_settings).await,
            None => Err(PubSubError::InternalError(
                "connection has no open channel".to_string(),
            )),
        };
        if let Err(e) = &result {
            warn!(error = %e, "register channel failed");
        }
        conn.is_registered = true;
        result
    }

    /// Linear scan over the connection list.
    pub async fn find_connection_by_id(&self, id: &NodeId) -> Option<ConnectionSnapshot> {
        let state = self.inner.state.lock().await;
        state.connection(id).map(Connection::snapshot)
    }
}
