use crate::manager::{ManagerState, PubSubManager};
use tracing::{info, warn};
use ua_pubsub_error::{PubSubError, PubSubResult};
use ua_pubsub_sdk::{NodeId, StandaloneSubscribedDataSetConfig};

/// Subscriber-side dataset target, optionally bound to one DataSetReader.
pub(crate) struct StandaloneSubscribedDataSet {
    pub(crate) id: NodeId,
    pub(crate) config: StandaloneSubscribedDataSetConfig,
    pub(crate) connected_reader: Option<NodeId>,
    pub(crate) is_connected: bool,
}

/// Read-only view of a StandaloneSubscribedDataSet.
#[derive(Clone, Debug)]
pub struct SubscribedDataSetSnapshot {
    pub id: NodeId,
    pub name: String,
    pub connected_reader: Option<NodeId>,
    pub is_connected: bool,
}

impl StandaloneSubscribedDataSet {
    fn snapshot(&self) -> SubscribedDataSetSnapshot {
        SubscribedDataSetSnapshot {
            id: self.id.clone(),
            name: self.config.name.clone(),
            connected_reader: self.connected_reader.clone(),
            is_connected: self.is_connected,
        }
    }
}

impl ManagerState {
    pub(crate) fn subscribed_data_set(&self, id: &NodeId) -> Option<&StandaloneSubscribedDataSet> {
        self.subscribed_data_sets.iter().find(|s| &s.id == id)
    }
}

impl PubSubManager {
    /// Create a StandaloneSubscribedDataSet. It starts unbound; a
    /// DataSetReader configuration naming it binds it on reader creation.
    pub async fn add_standalone_subscribed_data_set(
        &self,
        config: StandaloneSubscribedDataSetConfig,
    ) -> PubSubResult<NodeId> {
        let mut state = self.inner.state.lock().await;

        if state
            .subscribed_data_sets
            .iter()
            .any(|s| s.config.name == config.name)
        {
            warn!(
                "SubscribedDataSet creation failed: dataset with name [{}] already exists",
                config.name
            );
            return Err(PubSubError::BrowseNameDuplicated(config.name));
        }

        let id = match &self.inner.mirror {
            Some(mirror) => mirror.add_subscribed_data_set_representation(&config)?,
            None => state.generate_unique_node_id(),
        };
        let name = config.name.clone();
        state
            .subscribed_data_sets
            .push(StandaloneSubscribedDataSet {
                id: id.clone(),
                config,
                connected_reader: None,
                is_connected: false,
            });
        info!("SubscribedDataSet [{name}] created ({id})");
        Ok(id)
    }

    /// Remove a StandaloneSubscribedDataSet; the reader bound to it (if any)
    /// is removed first.
    pub async fn remove_standalone_subscribed_data_set(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.remove_standalone_subscribed_data_set_locked(&mut state, id)
    }

    pub(crate) fn remove_standalone_subscribed_data_set_locked(
        &self,
        state: &mut ManagerState,
        id: &NodeId,
    ) -> PubSubResult<()> {
        let Some(sds) = state.subscribed_data_set(id) else {
            return Err(PubSubError::NotFound(format!(
                "standalone subscribed data set {id}"
            )));
        };
        let name = sds.config.name.clone();

        // Collect the bound reader ids first; removal mutates the graph.
        let bound_readers: Vec<NodeId> = match &sds.connected_reader {
            Some(reader_id) => state
                .connections
                .iter()
                .flat_map(|c| c.reader_groups.iter())
                .flat_map(|g| g.readers.iter())
                .filter(|r| &r.id == reader_id)
                .map(|r| r.id.clone())
                .collect(),
            None => Vec::new(),
        };
        for reader in &bound_readers {
            if let Err(e) = self.remove_data_set_reader_locked(state, reader) {
                warn!(error = %e, "DataSetReader removal during SubscribedDataSet teardown failed");
            }
        }

        if let Some(mirror) = &self.inner.mirror {
            mirror.remove_subscribed_data_set_representation(id);
        }
        state.subscribed_data_sets.retain(|s| &s.id != id);
        info!("SubscribedDataSet [{name}] removed");
        Ok(())
    }

    pub async fn find_standalone_subscribed_data_set_by_id(
        &self,
        id: &NodeId,
    ) -> Option<SubscribedDataSetSnapshot> {
        let state = self.inner.state.lock().await;
        state
            .subscribed_data_set(id)
            .map(StandaloneSubscribedDataSet::snapshot)
    }

    pub async fn find_standalone_subscribed_data_set_by_name(
        &self,
        name: &str,
    ) -> Option<SubscribedDataSetSnapshot> {
        let state = self.inner.state.lock().await;
        state
            .subscribed_data_sets
            .iter()
            .find(|s| s.config.name == name)
            .map(StandaloneSubscribedDataSet::snapshot)
    }
}
