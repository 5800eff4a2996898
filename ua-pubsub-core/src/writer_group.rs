use crate::manager::{ManagerState, PubSubManager};
use std::collections::HashSet;
use tracing::{info, warn};
use ua_pubsub_error::{PubSubError, PubSubResult};
use ua_pubsub_sdk::{
    DataSetWriterConfig, NodeId, PubSubState, StateChangeCause, WriterGroupConfig,
};

/// Scheduling/encoding envelope for the writers below it.
pub(crate) struct WriterGroup {
    pub(crate) id: NodeId,
    pub(crate) connection: NodeId,
    pub(crate) config: WriterGroupConfig,
    pub(crate) state: PubSubState,
    pub(crate) configuration_frozen: bool,
    pub(crate) writers: Vec<DataSetWriter>,
}

/// Per-dataset publishing endpoint. A writer without a connected
/// PublishedDataSet publishes heartbeats.
pub(crate) struct DataSetWriter {
    pub(crate) id: NodeId,
    pub(crate) writer_group: NodeId,
    pub(crate) config: DataSetWriterConfig,
    pub(crate) connected_data_set: Option<NodeId>,
    pub(crate) state: PubSubState,
    pub(crate) configuration_frozen: bool,
}

/// Read-only view of a WriterGroup.
#[derive(Clone, Debug)]
pub struct WriterGroupSnapshot {
    pub id: NodeId,
    pub connection: NodeId,
    pub name: String,
    pub writer_group_id: u16,
    pub state: PubSubState,
    pub configuration_frozen: bool,
    pub writers: Vec<NodeId>,
}

/// Read-only view of a DataSetWriter.
#[derive(Clone, Debug)]
pub struct DataSetWriterSnapshot {
    pub id: NodeId,
    pub writer_group: NodeId,
    pub name: String,
    pub data_set_writer_id: u16,
    pub connected_data_set: Option<NodeId>,
    pub state: PubSubState,
    pub configuration_frozen: bool,
}

impl WriterGroup {
    fn snapshot(&self) -> WriterGroupSnapshot {
        WriterGroupSnapshot {
            id: self.id.clone(),
            connection: self.connection.clone(),
            name: self.config.name.clone(),
            writer_group_id: self.config.writer_group_id,
            state: self.state,
            configuration_frozen: self.configuration_frozen,
            writers: self.writers.iter().map(|w| w.id.clone()).collect(),
        }
    }
}

impl DataSetWriter {
    fn snapshot(&self) -> DataSetWriterSnapshot {
        DataSetWriterSnapshot {
            id: self.id.clone(),
            writer_group: self.writer_group.clone(),
            name: self.config.name.clone(),
            data_set_writer_id: self.config.data_set_writer_id,
            connected_data_set: self.connected_data_set.clone(),
            state: self.state,
            configuration_frozen: self.configuration_frozen,
        }
    }
}

impl ManagerState {
    pub(crate) fn writer_group(&self, id: &NodeId) -> Option<&WriterGroup> {
        self.connections
            .iter()
            .flat_map(|c| c.writer_groups.iter())
            .find(|g| &g.id == id)
    }

    pub(crate) fn writer_group_mut(&mut self, id: &NodeId) -> Option<&mut WriterGroup> {
        self.connections
            .iter_mut()
            .flat_map(|c| c.writer_groups.iter_mut())
            .find(|g| &g.id == id)
    }

    pub(crate) fn data_set_writer(&self, id: &NodeId) -> Option<&DataSetWriter> {
        self.connections
            .iter()
            .flat_map(|c| c.writer_groups.iter())
            .flat_map(|g| g.writers.iter())
            .find(|w| &w.id == id)
    }

    /// Whether a live WriterGroup under a connection with the given transport
    /// profile already uses this wire id.
    pub(crate) fn writer_group_wire_id_in_use(&self, transport_profile_uri: &str, id: u16) -> bool {
        self.connections
            .iter()
            .filter(|c| c.config.transport_profile_uri == transport_profile_uri)
            .flat_map(|c| c.writer_groups.iter())
            .any(|g| g.config.writer_group_id == id)
    }

    /// Same check for dataset-writer wire ids.
    pub(crate) fn data_set_writer_wire_id_in_use(
        &self,
        transport_profile_uri: &str,
        id: u16,
    ) -> bool {
        self.connections
            .iter()
            .filter(|c| c.config.transport_profile_uri == transport_profile_uri)
            .flat_map(|c| c.writer_groups.iter())
            .flat_map(|g| g.writers.iter())
            .any(|w| w.config.data_set_writer_id == id)
    }
}

impl PubSubManager {
    /// Add a WriterGroup under a connection. A `writer_group_id` of 0 is
    /// auto-assigned with the lowest unused id in the connection's
    /// transport-profile scope.
    pub async fn add_writer_group(
        &self,
        connection: &NodeId,
        mut config: WriterGroupConfig,
    ) -> PubSubResult<NodeId> {
        let mut state = self.inner.state.lock().await;

        let (uri, frozen) = match state.connection(connection) {
            Some(conn) => (
                conn.config.transport_profile_uri.clone(),
                conn.configuration_frozen,
            ),
            None => return Err(PubSubError::NotFound(format!("connection {connection}"))),
        };
        if frozen {
            return Err(PubSubError::ConfigurationError(
                "cannot add a WriterGroup to a frozen connection".to_string(),
            ));
        }

        if config.writer_group_id == 0 {
            let mut candidate: u16 = 1;
            while state.writer_group_wire_id_in_use(&uri, candidate) {
                candidate = candidate.checked_add(1).ok_or_else(|| {
                    PubSubError::InternalError("no free writer group id".to_string())
                })?;
            }
            config.writer_group_id = candidate;
        } else if state.writer_group_wire_id_in_use(&uri, config.writer_group_id) {
            return Err(PubSubError::InvalidArgument(format!(
                "writer group id {} already in use under profile {uri}",
                config.writer_group_id
            )));
        }

        let id = match &self.inner.mirror {
            Some(mirror) => mirror.add_writer_group_representation(connection, &config)?,
            None => state.generate_unique_node_id(),
        };
        let name = config.name.clone();
        if let Some(conn) = state.connection_mut(connection) {
            conn.writer_groups.push(WriterGroup {
                id: id.clone(),
                connection: connection.clone(),
                config,
                state: PubSubState::Disabled,
                configuration_frozen: false,
                writers: Vec::new(),
            });
        }
        info!("WriterGroup [{name}] added ({id})");
        Ok(id)
    }

    /// Remove a WriterGroup and its writers. Fails on a frozen group.
    pub async fn remove_writer_group(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.remove_writer_group_locked(&mut state, id)
    }

    pub(crate) fn remove_writer_group_locked(
        &self,
        state: &mut ManagerState,
        id: &NodeId,
    ) -> PubSubResult<()> {
        let Some(group) = state.writer_group(id) else {
            return Err(PubSubError::NotFound(format!("writer group {id}")));
        };
        if group.configuration_frozen {
            warn!(
                "Remove WriterGroup failed: WriterGroup [{}] is frozen",
                group.config.name
            );
            return Err(PubSubError::ConfigurationError(
                "writer group is frozen".to_string(),
            ));
        }
        let name = group.config.name.clone();
        let writer_ids: Vec<NodeId> = group.writers.iter().map(|w| w.id.clone()).collect();

        for writer in &writer_ids {
            if let Err(e) = self.remove_data_set_writer_locked(state, writer) {
                warn!(error = %e, "DataSetWriter removal during WriterGroup teardown failed");
            }
        }
        if let Some(mirror) = &self.inner.mirror {
            mirror.remove_writer_group_representation(id);
        }
        for conn in &mut state.connections {
            conn.writer_groups.retain(|g| &g.id != id);
        }
        info!("WriterGroup [{name}] removed");
        Ok(())
    }

    /// Add a DataSetWriter under a WriterGroup, connected to a
    /// PublishedDataSet or publishing heartbeats when `published_data_set`
    /// is `None`. A `data_set_writer_id` of 0 is auto-assigned.
    pub async fn add_data_set_writer(
        &self,
        writer_group: &NodeId,
        published_data_set: Option<&NodeId>,
        mut config: DataSetWriterConfig,
    ) -> PubSubResult<NodeId> {
        let mut state = self.inner.state.lock().await;

        let (connection_id, frozen) = match state.writer_group(writer_group) {
            Some(group) => (group.connection.clone(), group.configuration_frozen),
            None => {
                return Err(PubSubError::NotFound(format!(
                    "writer group {writer_group}"
                )))
            }
        };
        if frozen {
            return Err(PubSubError::ConfigurationError(
                "cannot add a DataSetWriter to a frozen WriterGroup".to_string(),
            ));
        }
        let Some(uri) = state
            .connection(&connection_id)
            .map(|c| c.config.transport_profile_uri.clone())
        else {
            return Err(PubSubError::InternalError(
                "writer group without parent connection".to_string(),
            ));
        };

        if let Some(pds) = published_data_set {
            if state.published_data_set(pds).is_none() {
                return Err(PubSubError::NotFound(format!("published data set {pds}")));
            }
        }

        if config.data_set_writer_id == 0 {
            let mut candidate: u16 = 1;
            while state.data_set_writer_wire_id_in_use(&uri, candidate) {
                candidate = candidate.checked_add(1).ok_or_else(|| {
                    PubSubError::InternalError("no free dataset writer id".to_string())
                })?;
            }
            config.data_set_writer_id = candidate;
        } else if state.data_set_writer_wire_id_in_use(&uri, config.data_set_writer_id) {
            return Err(PubSubError::InvalidArgument(format!(
                "dataset writer id {} already in use under profile {uri}",
                config.data_set_writer_id
            )));
        }

        let id = match &self.inner.mirror {
            Some(mirror) => mirror.add_data_set_writer_representation(writer_group, &config)?,
            None => state.generate_unique_node_id(),
        };
        let name = config.name.clone();
        if let Some(group) = state.writer_group_mut(writer_group) {
            group.writers.push(DataSetWriter {
                id: id.clone(),
                writer_group: writer_group.clone(),
                config,
                connected_data_set: published_data_set.cloned(),
                state: PubSubState::Disabled,
                configuration_frozen: false,
            });
        }
        info!("DataSetWriter [{name}] added ({id})");
        Ok(id)
    }

    /// Remove a DataSetWriter. Fails on a frozen writer.
    pub async fn remove_data_set_writer(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.remove_data_set_writer_locked(&mut state, id)
    }

    pub(crate) fn remove_data_set_writer_locked(
        &self,
        state: &mut ManagerState,
        id: &NodeId,
    ) -> PubSubResult<()> {
        let Some(writer) = state.data_set_writer(id) else {
            return Err(PubSubError::NotFound(format!("dataset writer {id}")));
        };
        if writer.configuration_frozen {
            return Err(PubSubError::ConfigurationError(
                "dataset writer is frozen".to_string(),
            ));
        }
        let name = writer.config.name.clone();
        if let Some(mirror) = &self.inner.mirror {
            mirror.remove_data_set_writer_representation(id);
        }
        for conn in &mut state.connections {
            for group in &mut conn.writer_groups {
                group.writers.retain(|w| &w.id != id);
            }
        }
        info!("DataSetWriter [{name}] removed");
        Ok(())
    }

    /// Transition a WriterGroup (and its writers) to Operational.
    pub async fn set_writer_group_operational(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.set_writer_group_state_locked(
            &mut state,
            id,
            PubSubState::Operational,
            StateChangeCause::None,
        )
    }

    /// Transition a WriterGroup (and its writers) to Disabled.
    pub async fn set_writer_group_disabled(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.set_writer_group_state_locked(
            &mut state,
            id,
            PubSubState::Disabled,
            StateChangeCause::None,
        )
    }

    pub(crate) fn set_writer_group_state_locked(
        &self,
        state: &mut ManagerState,
        id: &NodeId,
        new_state: PubSubState,
        cause: StateChangeCause,
    ) -> PubSubResult<()> {
        let Some(group) = state.writer_group_mut(id) else {
            return Err(PubSubError::NotFound(format!("writer group {id}")));
        };
        if group.state != new_state {
            info!(
                "WriterGroup [{}] state {} -> {} ({cause:?})",
                group.config.name, group.state, new_state
            );
            group.state = new_state;
        }
        for writer in &mut group.writers {
            writer.state = new_state;
        }
        Ok(())
    }

    /// Latch the frozen flag on the group, its writers, every referenced
    /// PublishedDataSet, and the parent connection.
    pub async fn freeze_writer_group_configuration(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.freeze_writer_group_locked(&mut state, id)
    }

    pub(crate) fn freeze_writer_group_locked(
        &self,
        state: &mut ManagerState,
        id: &NodeId,
    ) -> PubSubResult<()> {
        let connection_id;
        let mut referenced = Vec::new();
        {
            let Some(group) = state.writer_group_mut(id) else {
                return Err(PubSubError::NotFound(format!("writer group {id}")));
            };
            group.configuration_frozen = true;
            connection_id = group.connection.clone();
            for writer in &mut group.writers {
                writer.configuration_frozen = true;
                if let Some(pds) = &writer.connected_data_set {
                    referenced.push(pds.clone());
                }
            }
        }
        for pds in &mut state.published_data_sets {
            if referenced.contains(&pds.id) {
                pds.configuration_frozen = true;
            }
        }
        if let Some(conn) = state.connection_mut(&connection_id) {
            conn.configuration_frozen = true;
        }
        Ok(())
    }

    /// Clear the frozen flag on the group and its writers; the connection and
    /// PublishedDataSet flags are recomputed from the remaining frozen
    /// references.
    pub async fn unfreeze_writer_group_configuration(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.unfreeze_writer_group_locked(&mut state, id)
    }

    pub(crate) fn unfreeze_writer_group_locked(
        &self,
        state: &mut ManagerState,
        id: &NodeId,
    ) -> PubSubResult<()> {
        let connection_id;
        {
            let Some(group) = state.writer_group_mut(id) else {
                return Err(PubSubError::NotFound(format!("writer group {id}")));
            };
            group.configuration_frozen = false;
            connection_id = group.connection.clone();
            for writer in &mut group.writers {
                writer.configuration_frozen = false;
            }
        }

        let still_frozen: HashSet<NodeId> = state
            .connections
            .iter()
            .flat_map(|c| c.writer_groups.iter())
            .flat_map(|g| g.writers.iter())
            .filter(|w| w.configuration_frozen)
            .filter_map(|w| w.connected_data_set.clone())
            .collect();
        for pds in &mut state.published_data_sets {
            pds.configuration_frozen = still_frozen.contains(&pds.id);
        }

        let connection_frozen = state
            .connection(&connection_id)
            .map(|c| {
                c.writer_groups.iter().any(|g| g.configuration_frozen)
                    || c.reader_groups.iter().any(|g| g.configuration_frozen)
            })
            .unwrap_or(false);
        if let Some(conn) = state.connection_mut(&connection_id) {
            conn.configuration_frozen = connection_frozen;
        }
        Ok(())
    }

    pub async fn find_writer_group_by_id(&self, id: &NodeId) -> Option<WriterGroupSnapshot> {
        let state = self.inner.state.lock().await;
        state.writer_group(id).map(WriterGroup::snapshot)
    }

    pub async fn find_data_set_writer_by_id(&self, id: &NodeId) -> Option<DataSetWriterSnapshot> {
        let state = self.inner.state.lock().await;
        state.data_set_writer(id).map(DataSetWriter::snapshot)
    }
}
