use crate::manager::{ManagerState, PubSubManager};
use std::time::Duration;
use tracing::{info, warn};
use ua_pubsub_error::{PubSubError, PubSubResult};
use ua_pubsub_sdk::{
    DataSetReaderConfig, NodeId, PubSubState, PublisherId, ReaderGroupConfig,
    ReceiveTimeoutCallback, StateChangeCause, TimerId,
};

/// Reception context for the readers below it.
pub(crate) struct ReaderGroup {
    pub(crate) id: NodeId,
    pub(crate) connection: NodeId,
    pub(crate) config: ReaderGroupConfig,
    pub(crate) state: PubSubState,
    pub(crate) configuration_frozen: bool,
    pub(crate) readers: Vec<DataSetReader>,
}

/// Per-dataset receiving endpoint with an optional receive-timeout timer.
pub(crate) struct DataSetReader {
    pub(crate) id: NodeId,
    pub(crate) reader_group: NodeId,
    pub(crate) config: DataSetReaderConfig,
    pub(crate) state: PubSubState,
    pub(crate) configuration_frozen: bool,
    /// Recorded by `create_monitoring`, fired by the timeout trampoline.
    pub(crate) timeout_callback: Option<ReceiveTimeoutCallback>,
    /// Cyclic-callback handle; 0 means unarmed.
    pub(crate) timer_id: TimerId,
    /// Bumped on every arm/stop so a trampoline in flight for an earlier
    /// arming cannot act on a newer timer.
    pub(crate) arm_generation: u64,
}

/// Read-only view of a ReaderGroup.
#[derive(Clone, Debug)]
pub struct ReaderGroupSnapshot {
    pub id: NodeId,
    pub connection: NodeId,
    pub name: String,
    pub state: PubSubState,
    pub configuration_frozen: bool,
    pub readers: Vec<NodeId>,
}

/// Read-only view of a DataSetReader.
#[derive(Clone, Debug)]
pub struct DataSetReaderSnapshot {
    pub id: NodeId,
    pub reader_group: NodeId,
    pub name: String,
    pub publisher_id: PublisherId,
    pub writer_group_id: u16,
    pub data_set_writer_id: u16,
    pub message_receive_timeout: Duration,
    pub state: PubSubState,
    pub configuration_frozen: bool,
    /// 0 when the receive-timeout timer is unarmed.
    pub timer_id: TimerId,
}

impl ReaderGroup {
    fn snapshot(&self) -> ReaderGroupSnapshot {
        ReaderGroupSnapshot {
            id: self.id.clone(),
            connection: self.connection.clone(),
            name: self.config.name.clone(),
            state: self.state,
            configuration_frozen: self.configuration_frozen,
            readers: self.readers.iter().map(|r| r.id.clone()).collect(),
        }
    }
}

impl DataSetReader {
    fn snapshot(&self) -> DataSetReaderSnapshot {
        DataSetReaderSnapshot {
            id: self.id.clone(),
            reader_group: self.reader_group.clone(),
            name: self.config.name.clone(),
            publisher_id: self.config.publisher_id.clone(),
            writer_group_id: self.config.writer_group_id,
            data_set_writer_id: self.config.data_set_writer_id,
            message_receive_timeout: self.config.message_receive_timeout,
            state: self.state,
            configuration_frozen: self.configuration_frozen,
            timer_id: self.timer_id,
        }
    }
}

impl ManagerState {
    pub(crate) fn reader_group(&self, id: &NodeId) -> Option<&ReaderGroup> {
        self.connections
            .iter()
            .flat_map(|c| c.reader_groups.iter())
            .find(|g| &g.id == id)
    }

    pub(crate) fn reader_group_mut(&mut self, id: &NodeId) -> Option<&mut ReaderGroup> {
        self.connections
            .iter_mut()
            .flat_map(|c| c.reader_groups.iter_mut())
            .find(|g| &g.id == id)
    }

    pub(crate) fn data_set_reader(&self, id: &NodeId) -> Option<&DataSetReader> {
        self.connections
            .iter()
            .flat_map(|c| c.reader_groups.iter())
            .flat_map(|g| g.readers.iter())
            .find(|r| &r.id == id)
    }

    pub(crate) fn data_set_reader_mut(&mut self, id: &NodeId) -> Option<&mut DataSetReader> {
        self.connections
            .iter_mut()
            .flat_map(|c| c.reader_groups.iter_mut())
            .flat_map(|g| g.readers.iter_mut())
            .find(|r| &r.id == id)
    }
}

impl PubSubManager {
    /// Add a ReaderGroup under a connection.
    pub async fn add_reader_group(
        &self,
        connection: &NodeId,
        config: ReaderGroupConfig,
    ) -> PubSubResult<NodeId> {
        let mut state = self.inner.state.lock().await;

        let frozen = match state.connection(connection) {
            Some(conn) => conn.configuration_frozen,
            None => return Err(PubSubError::NotFound(format!("connection {connection}"))),
        };
        if frozen {
            return Err(PubSubError::ConfigurationError(
                "cannot add a ReaderGroup to a frozen connection".to_string(),
            ));
        }

        let id = match &self.inner.mirror {
            Some(mirror) => mirror.add_reader_group_representation(connection, &config)?,
            None => state.generate_unique_node_id(),
        };
        let name = config.name.clone();
        if let Some(conn) = state.connection_mut(connection) {
            conn.reader_groups.push(ReaderGroup {
                id: id.clone(),
                connection: connection.clone(),
                config,
                state: PubSubState::Disabled,
                configuration_frozen: false,
                readers: Vec::new(),
            });
        }
        info!("ReaderGroup [{name}] added ({id})");
        Ok(id)
    }

    /// Remove a ReaderGroup and its readers; topic assignments pointing at
    /// the group are dropped with it. Fails on a frozen group.
    pub async fn remove_reader_group(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.remove_reader_group_locked(&mut state, id)
    }

    pub(crate) fn remove_reader_group_locked(
        &self,
        state: &mut ManagerState,
        id: &NodeId,
    ) -> PubSubResult<()> {
        let Some(group) = state.reader_group(id) else {
            return Err(PubSubError::NotFound(format!("reader group {id}")));
        };
        if group.configuration_frozen {
            warn!(
                "Remove ReaderGroup failed: ReaderGroup [{}] is frozen",
                group.config.name
            );
            return Err(PubSubError::ConfigurationError(
                "reader group is frozen".to_string(),
            ));
        }
        let name = group.config.name.clone();
        let reader_ids: Vec<NodeId> = group.readers.iter().map(|r| r.id.clone()).collect();

        for reader in &reader_ids {
            if let Err(e) = self.remove_data_set_reader_locked(state, reader) {
                warn!(error = %e, "DataSetReader removal during ReaderGroup teardown failed");
            }
        }
        if let Some(mirror) = &self.inner.mirror {
            mirror.remove_reader_group_representation(id);
        }
        state.topic_assigns.retain(|t| &t.reader_group != id);
        for conn in &mut state.connections {
            conn.reader_groups.retain(|g| &g.id != id);
        }
        info!("ReaderGroup [{name}] removed");
        Ok(())
    }

    /// Add a DataSetReader under a ReaderGroup. When the configuration names
    /// a StandaloneSubscribedDataSet, the reader is bound to it.
    pub async fn add_data_set_reader(
        &self,
        reader_group: &NodeId,
        config: DataSetReaderConfig,
    ) -> PubSubResult<NodeId> {
        let mut state = self.inner.state.lock().await;

        let frozen = match state.reader_group(reader_group) {
            Some(group) => group.configuration_frozen,
            None => {
                return Err(PubSubError::NotFound(format!(
                    "reader group {reader_group}"
                )))
            }
        };
        if frozen {
            return Err(PubSubError::ConfigurationError(
                "cannot add a DataSetReader to a frozen ReaderGroup".to_string(),
            ));
        }

        // Resolve the linked standalone dataset before anything is inserted.
        let linked_sds = match &config.linked_standalone_subscribed_data_set {
            Some(sds_name) => {
                let Some(sds) = state
                    .subscribed_data_sets
                    .iter()
                    .find(|s| &s.config.name == sds_name)
                else {
                    return Err(PubSubError::NotFound(format!(
                        "standalone subscribed data set {sds_name}"
                    )));
                };
                if sds.is_connected {
                    return Err(PubSubError::ConfigurationError(format!(
                        "standalone subscribed data set {sds_name} is already connected"
                    )));
                }
                Some(sds.id.clone())
            }
            None => None,
        };

        let id = match &self.inner.mirror {
            Some(mirror) => mirror.add_data_set_reader_representation(reader_group, &config)?,
            None => state.generate_unique_node_id(),
        };
        let name = config.name.clone();
        if let Some(group) = state.reader_group_mut(reader_group) {
            group.readers.push(DataSetReader {
                id: id.clone(),
                reader_group: reader_group.clone(),
                config,
                state: PubSubState::Disabled,
                configuration_frozen: false,
                timeout_callback: None,
                timer_id: 0,
                arm_generation: 0,
            });
        }
        if let Some(sds_id) = linked_sds {
            if let Some(sds) = state.subscribed_data_sets.iter_mut().find(|s| s.id == sds_id) {
                sds.connected_reader = Some(id.clone());
                sds.is_connected = true;
            }
        }
        info!("DataSetReader [{name}] added ({id})");
        Ok(id)
    }

    /// Remove a DataSetReader: an armed receive-timeout timer is released,
    /// and any standalone dataset bound to the reader is disconnected.
    pub async fn remove_data_set_reader(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.remove_data_set_reader_locked(&mut state, id)
    }

    pub(crate) fn remove_data_set_reader_locked(
        &self,
        state: &mut ManagerState,
        id: &NodeId,
    ) -> PubSubResult<()> {
        let (name, timer_id) = {
            let Some(reader) = state.data_set_reader_mut(id) else {
                return Err(PubSubError::NotFound(format!("dataset reader {id}")));
            };
            if reader.configuration_frozen {
                return Err(PubSubError::ConfigurationError(
                    "dataset reader is frozen".to_string(),
                ));
            }
            let timer_id = reader.timer_id;
            reader.timer_id = 0;
            reader.arm_generation += 1;
            (reader.config.name.clone(), timer_id)
        };
        if timer_id != 0 {
            self.inner.event_loop.remove_cyclic_callback(timer_id);
        }

        for sds in &mut state.subscribed_data_sets {
            if sds.connected_reader.as_ref() == Some(id) {
                sds.connected_reader = None;
                sds.is_connected = false;
            }
        }
        if let Some(mirror) = &self.inner.mirror {
            mirror.remove_data_set_reader_representation(id);
        }
        for conn in &mut state.connections {
            for group in &mut conn.reader_groups {
                group.readers.retain(|r| &r.id != id);
            }
        }
        info!("DataSetReader [{name}] removed");
        Ok(())
    }

    /// Transition a ReaderGroup (and its readers) to Operational.
    pub async fn set_reader_group_operational(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.set_reader_group_state_locked(
            &mut state,
            id,
            PubSubState::Operational,
            StateChangeCause::None,
        )
    }

    /// Transition a ReaderGroup (and its readers) to Disabled.
    pub async fn set_reader_group_disabled(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.set_reader_group_state_locked(
            &mut state,
            id,
            PubSubState::Disabled,
            StateChangeCause::None,
        )
    }

    pub(crate) fn set_reader_group_state_locked(
        &self,
        state: &mut ManagerState,
        id: &NodeId,
        new_state: PubSubState,
        cause: StateChangeCause,
    ) -> PubSubResult<()> {
        let Some(group) = state.reader_group_mut(id) else {
            return Err(PubSubError::NotFound(format!("reader group {id}")));
        };
        if group.state != new_state {
            info!(
                "ReaderGroup [{}] state {} -> {} ({cause:?})",
                group.config.name, group.state, new_state
            );
            group.state = new_state;
        }
        for reader in &mut group.readers {
            reader.state = new_state;
        }
        Ok(())
    }

    /// Latch the frozen flag on the group, its readers, and the parent
    /// connection.
    pub async fn freeze_reader_group_configuration(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.freeze_reader_group_locked(&mut state, id)
    }

    pub(crate) fn freeze_reader_group_locked(
        &self,
        state: &mut ManagerState,
        id: &NodeId,
    ) -> PubSubResult<()> {
        let connection_id;
        {
            let Some(group) = state.reader_group_mut(id) else {
                return Err(PubSubError::NotFound(format!("reader group {id}")));
            };
            group.configuration_frozen = true;
            connection_id = group.connection.clone();
            for reader in &mut group.readers {
                reader.configuration_frozen = true;
            }
        }
        if let Some(conn) = state.connection_mut(&connection_id) {
            conn.configuration_frozen = true;
        }
        Ok(())
    }

    /// Clear the frozen flag on the group and its readers; the connection
    /// flag is recomputed from the remaining frozen groups.
    pub async fn unfreeze_reader_group_configuration(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.unfreeze_reader_group_locked(&mut state, id)
    }

    pub(crate) fn unfreeze_reader_group_locked(
        &self,
        state: &mut ManagerState,
        id: &NodeId,
    ) -> PubSubResult<()> {
        let connection_id;
        {
            let Some(group) = state.reader_group_mut(id) else {
                return Err(PubSubError::NotFound(format!("reader group {id}")));
            };
            group.configuration_frozen = false;
            connection_id = group.connection.clone();
            for reader in &mut group.readers {
                reader.configuration_frozen = false;
            }
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

    pub async fn find_reader_group_by_id(&self, id: &NodeId) -> Option<ReaderGroupSnapshot> {
        let state = self.inner.state.lock().await;
        state.reader_group(id).map(ReaderGroup::snapshot)
    }

    pub async fn find_data_set_reader_by_id(&self, id: &NodeId) -> Option<DataSetReaderSnapshot> {
        let state = self.inner.state.lock().await;
        state.data_set_reader(id).map(DataSetReader::snapshot)
    }
}
