use crate::{
    config::{
        ConnectionConfig, DataSetReaderConfig, DataSetWriterConfig, PublishedDataSetConfig,
        ReaderGroupConfig, StandaloneSubscribedDataSetConfig, WriterGroupConfig,
    },
    node_id::NodeId,
};
use ua_pubsub_error::PubSubResult;

/// Optional address-space mirror of the PubSub configuration tree.
///
/// When present, every create hands the entity to the mirror, which surfaces
/// it as a node and returns the node id the manager should use; every destroy
/// notifies the mirror to drop the representation. When absent, the manager
/// generates identifiers locally.
pub trait AddressSpaceMirror: Send + Sync {
    fn add_connection_representation(&self, config: &ConnectionConfig) -> PubSubResult<NodeId>;
    fn remove_connection_representation(&self, id: &NodeId);

    fn add_writer_group_representation(
        &self,
        connection: &NodeId,
        config: &WriterGroupConfig,
    ) -> PubSubResult<NodeId>;
    fn remove_writer_group_representation(&self, id: &NodeId);

    fn add_data_set_writer_representation(
        &self,
        writer_group: &NodeId,
        config: &DataSetWriterConfig,
    ) -> PubSubResult<NodeId>;
    fn remove_data_set_writer_representation(&self, id: &NodeId);

    fn add_published_data_set_representation(
        &self,
        config: &PublishedDataSetConfig,
    ) -> PubSubResult<NodeId>;
    fn remove_published_data_set_representation(&self, id: &NodeId);

    fn add_reader_group_representation(
        &self,
        connection: &NodeId,
        config: &ReaderGroupConfig,
    ) -> PubSubResult<NodeId>;
    fn remove_reader_group_representation(&self, id: &NodeId);

    fn add_data_set_reader_representation(
        &self,
        reader_group: &NodeId,
        config: &DataSetReaderConfig,
    ) -> PubSubResult<NodeId>;
    fn remove_data_set_reader_representation(&self, id: &NodeId);

    fn add_subscribed_data_set_representation(
        &self,
        config: &StandaloneSubscribedDataSetConfig,
    ) -> PubSubResult<NodeId>;
    fn remove_subscribed_data_set_representation(&self, id: &NodeId);
}
