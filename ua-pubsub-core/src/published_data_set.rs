use crate::manager::{ManagerState, PubSubManager};
use chrono::Utc;
use tracing::{error, info, warn};
use ua_pubsub_error::{PubSubError, PubSubResult};
use ua_pubsub_sdk::{
    ConfigurationVersion, DataSetFieldConfig, DataSetMetaData, FieldMetaData, NodeId,
    PublishedDataSetConfig, PublishedDataSetType,
};
use uuid::Uuid;

/// 2000-01-01T00:00:00Z as Unix seconds.
const PUBSUB_EPOCH_2000_UNIX: i64 = 946_684_800;

/// 32-bit configuration-version stamp: the 100-ns tick count since
/// 2000-01-01T00:00:00Z, truncated.
///
/// Peers compare these values to detect dataset-schema drift, so the epoch
/// and the truncation must not change. Two calls within the same tick return
/// equal values; this is expected.
pub fn configuration_version_time_difference() -> u32 {
    let now = Utc::now();
    let ticks = (now.timestamp() - PUBSUB_EPOCH_2000_UNIX).wrapping_mul(10_000_000)
        + i64::from(now.timestamp_subsec_nanos() / 100);
    ticks as u32
}

/// A named, versioned collection of fields offered to publishers.
pub(crate) struct PublishedDataSet {
    pub(crate) id: NodeId,
    pub(crate) config: PublishedDataSetConfig,
    pub(crate) meta_data: DataSetMetaData,
    pub(crate) configuration_frozen: bool,
    pub(crate) fields: Vec<DataSetField>,
}

/// One field of a PublishedDataSet, in publish order.
pub(crate) struct DataSetField {
    pub(crate) id: NodeId,
    pub(crate) config: DataSetFieldConfig,
    pub(crate) field_meta_data: FieldMetaData,
}

/// Returned by a successful `add_published_data_set`.
#[derive(Clone, Debug)]
pub struct AddPublishedDataSetResult {
    pub id: NodeId,
    pub configuration_version: ConfigurationVersion,
    pub meta_data: DataSetMetaData,
}

/// Returned by a successful field add/remove, carrying the bumped version.
#[derive(Clone, Debug)]
pub struct DataSetFieldResult {
    pub field_id: NodeId,
    pub configuration_version: ConfigurationVersion,
}

/// Read-only view of a PublishedDataSet.
#[derive(Clone, Debug)]
pub struct PublishedDataSetSnapshot {
    pub id: NodeId,
    pub name: String,
    pub data_set_type: PublishedDataSetType,
    pub configuration_version: ConfigurationVersion,
    pub configuration_frozen: bool,
    pub fields: Vec<NodeId>,
}

impl PublishedDataSet {
    fn snapshot(&self) -> PublishedDataSetSnapshot {
        PublishedDataSetSnapshot {
            id: self.id.clone(),
            name: self.config.name.clone(),
            data_set_type: self.config.data_set_type,
            configuration_version: self.meta_data.configuration_version,
            configuration_frozen: self.configuration_frozen,
            fields: self.fields.iter().map(|f| f.id.clone()).collect(),
        }
    }
}

impl ManagerState {
    pub(crate) fn published_data_set(&self, id: &NodeId) -> Option<&PublishedDataSet> {
        self.published_data_sets.iter().find(|p| &p.id == id)
    }

    pub(crate) fn published_data_set_mut(&mut self, id: &NodeId) -> Option<&mut PublishedDataSet> {
        self.published_data_sets.iter_mut().find(|p| &p.id == id)
    }

    pub(crate) fn published_data_set_by_name(&self, name: &str) -> Option<&PublishedDataSet> {
        self.published_data_sets
            .iter()
            .find(|p| p.config.name == name)
    }
}

impl PubSubManager {
    /// Create a PublishedDataSet. Only the `PublishedItems` type is
    /// supported; names must be non-empty and unique among published
    /// datasets.
    pub async fn add_published_data_set(
        &self,
        config: PublishedDataSetConfig,
    ) -> PubSubResult<AddPublishedDataSetResult> {
        let mut state = self.inner.state.lock().await;

        match config.data_set_type {
            PublishedDataSetType::PublishedItems => {}
            PublishedDataSetType::PublishedEvents
            | PublishedDataSetType::PublishedEventsTemplate => {
                error!("PublishedDataSet creation failed: unsupported PublishedDataSet type");
                return Err(PubSubError::NotSupported(
                    "event datasets are not supported".to_string(),
                ));
            }
            PublishedDataSetType::PublishedItemsTemplate => {
                error!("PublishedDataSet creation failed: template datasets are not implemented");
                return Err(PubSubError::InternalError(
                    "template datasets are not implemented".to_string(),
                ));
            }
        }

        if config.name.is_empty() {
            error!("PublishedDataSet creation failed: invalid name");
            return Err(PubSubError::InvalidArgument(
                "published data set name must not be empty".to_string(),
            ));
        }
        if state.published_data_set_by_name(&config.name).is_some() {
            error!(
                "PublishedDataSet creation failed: dataset with name [{}] already exists",
                config.name
            );
            return Err(PubSubError::BrowseNameDuplicated(config.name));
        }

        // Major and minor come from two independent clock reads; they may
        // coincide on fast machines.
        let configuration_version = ConfigurationVersion {
            major_version: configuration_version_time_difference(),
            minor_version: configuration_version_time_difference(),
        };
        let meta_data = DataSetMetaData {
            name: config.name.clone(),
            description: String::new(),
            data_set_class_id: None,
            configuration_version,
            fields: Vec::new(),
        };

        let id = match &self.inner.mirror {
            Some(mirror) => mirror.add_published_data_set_representation(&config)?,
            None => state.generate_unique_node_id(),
        };
        let name = config.name.clone();
        state.published_data_sets.push(PublishedDataSet {
            id: id.clone(),
            config,
            meta_data: meta_data.clone(),
            configuration_frozen: false,
            fields: Vec::new(),
        });
        info!("PublishedDataSet [{name}] created ({id})");
        Ok(AddPublishedDataSetResult {
            id,
            configuration_version,
            meta_data,
        })
    }

    /// Remove a PublishedDataSet. Every DataSetWriter referring to it is
    /// removed first (writers must stay connected to a live dataset).
    pub async fn remove_published_data_set(&self, id: &NodeId) -> PubSubResult<()> {
        let mut state = self.inner.state.lock().await;
        self.remove_published_data_set_locked(&mut state, id)
    }

    pub(crate) fn remove_published_data_set_locked(
        &self,
        state: &mut ManagerState,
        id: &NodeId,
    ) -> PubSubResult<()> {
        let Some(pds) = state.published_data_set(id) else {
            return Err(PubSubError::NotFound(format!("published data set {id}")));
        };
        if pds.configuration_frozen {
            warn!(
                "Remove PublishedDataSet failed: PublishedDataSet [{}] is frozen",
                pds.config.name
            );
            return Err(PubSubError::ConfigurationError(
                "published data set is frozen".to_string(),
            ));
        }
        let name = pds.config.name.clone();

        let referring_writers: Vec<NodeId> = state
            .connections
            .iter()
            .flat_map(|c| c.writer_groups.iter())
            .flat_map(|g| g.writers.iter())
            .filter(|w| w.connected_data_set.as_ref() == Some(id))
            .map(|w| w.id.clone())
            .collect();
        for writer in &referring_writers {
            if let Err(e) = self.remove_data_set_writer_locked(state, writer) {
                warn!(error = %e, "DataSetWriter removal during PublishedDataSet teardown failed");
            }
        }

        if let Some(mirror) = &self.inner.mirror {
            mirror.remove_published_data_set_representation(id);
        }
        state.published_data_sets.retain(|p| &p.id != id);
        info!("PublishedDataSet [{name}] removed");
        Ok(())
    }

    /// Append a field to a PublishedDataSet and bump the minor configuration
    /// version.
    pub async fn add_data_set_field(
        &self,
        pds: &NodeId,
        config: DataSetFieldConfig,
    ) -> PubSubResult<DataSetFieldResult> {
        let mut state = self.inner.state.lock().await;
        let field_id = state.generate_unique_node_id();
        let Some(pds) = state.published_data_set_mut(pds) else {
            return Err(PubSubError::NotFound(format!("published data set {pds}")));
        };
        if pds.configuration_frozen {
            return Err(PubSubError::ConfigurationError(
                "published data set is frozen".to_string(),
            ));
        }

        let field_meta_data = FieldMetaData {
            name: config.field_name_alias.clone(),
            description: String::new(),
            built_in_type: 0,
            value_rank: -1,
            data_set_field_id: Uuid::new_v4(),
        };
        pds.fields.push(DataSetField {
            id: field_id.clone(),
            config,
            field_meta_data,
        });
        pds.meta_data.fields = pds
            .fields
            .iter()
            .map(|f| f.field_meta_data.clone())
            .collect();
        pds.meta_data.configuration_version.minor_version = configuration_version_time_difference();
        Ok(DataSetFieldResult {
            field_id,
            configuration_version: pds.meta_data.configuration_version,
        })
    }

    /// Remove a field from a PublishedDataSet and bump the minor
    /// configuration version.
    pub async fn remove_data_set_field(
        &self,
        pds: &NodeId,
        field_id: &NodeId,
    ) -> PubSubResult<DataSetFieldResult> {
        let mut state = self.inner.state.lock().await;
        let Some(pds) = state.published_data_set_mut(pds) else {
            return Err(PubSubError::NotFound(format!("published data set {pds}")));
        };
        if pds.configuration_frozen {
            return Err(PubSubError::ConfigurationError(
                "published data set is frozen".to_string(),
            ));
        }
        let before = pds.fields.len();
        pds.fields.retain(|f| &f.id != field_id);
        if pds.fields.len() == before {
            return Err(PubSubError::NotFound(format!("dataset field {field_id}")));
        }
        pds.meta_data.fields = pds
            .fields
            .iter()
            .map(|f| f.field_meta_data.clone())
            .collect();
        pds.meta_data.configuration_version.minor_version = configuration_version_time_difference();
        Ok(DataSetFieldResult {
            field_id: field_id.clone(),
            configuration_version: pds.meta_data.configuration_version,
        })
    }

    /// Linear scan by name.
    pub async fn find_published_data_set_by_name(
        &self,
        name: &str,
    ) -> Option<PublishedDataSetSnapshot> {
        let state = self.inner.state.lock().await;
        state
            .published_data_set_by_name(name)
            .map(PublishedDataSet::snapshot)
    }

    /// Linear scan by id.
    pub async fn find_published_data_set_by_id(
        &self,
        id: &NodeId,
    ) -> Option<PublishedDataSetSnapshot> {
        let state = self.inner.state.lock().await;
        state.published_data_set(id).map(PublishedDataSet::snapshot)
    }
}
