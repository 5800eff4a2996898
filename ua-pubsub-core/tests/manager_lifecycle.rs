mod common;

use common::{
    build_manager, data_set_reader_config, data_set_writer_config, published_data_set_config,
    reader_group_config, standalone_subscribed_data_set_config, udp_connection_config,
    writer_group_config, BrokenTransportLayer,
};
use std::{sync::atomic::Ordering, sync::Arc, time::Duration};
use ua_pubsub_error::PubSubError;
use ua_pubsub_sdk::{
    DataSetFieldConfig, NodeId, PublishedDataSetType, TransportLayer, PROFILE_MQTT_JSON,
};

#[tokio::test]
async fn add_and_remove_round_trip() {
    let (manager, _sessions, _layer) = build_manager().await;

    let connection = manager
        .add_connection(udp_connection_config("c1"))
        .await
        .unwrap();
    let pds = manager
        .add_published_data_set(published_data_set_config(
            "pds1",
            PublishedDataSetType::PublishedItems,
        ))
        .await
        .unwrap();
    let writer_group = manager
        .add_writer_group(&connection, writer_group_config("wg1", 0))
        .await
        .unwrap();
    let writer = manager
        .add_data_set_writer(&writer_group, Some(&pds.id), data_set_writer_config("dsw1", 0))
        .await
        .unwrap();

    // Auto-assigned wire ids are nonzero.
    let wg_snapshot = manager.find_writer_group_by_id(&writer_group).await.unwrap();
    assert_ne!(wg_snapshot.writer_group_id, 0);
    let dsw_snapshot = manager.find_data_set_writer_by_id(&writer).await.unwrap();
    assert_ne!(dsw_snapshot.data_set_writer_id, 0);

    manager.remove_connection(&connection).await.unwrap();

    // The published dataset survives the connection teardown.
    assert!(manager.find_published_data_set_by_id(&pds.id).await.is_some());
    assert!(manager.find_connection_by_id(&connection).await.is_none());
    assert!(manager.find_writer_group_by_id(&writer_group).await.is_none());
    assert!(manager.find_data_set_writer_by_id(&writer).await.is_none());
    assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test]
async fn duplicate_published_data_set_name_is_rejected() {
    let (manager, _sessions, _layer) = build_manager().await;

    manager
        .add_published_data_set(published_data_set_config(
            "x",
            PublishedDataSetType::PublishedItems,
        ))
        .await
        .unwrap();
    let err = manager
        .add_published_data_set(published_data_set_config(
            "x",
            PublishedDataSetType::PublishedItems,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, PubSubError::BrowseNameDuplicated(_)));
    assert_eq!(manager.published_data_set_count().await, 1);
}

#[tokio::test]
async fn unsupported_data_set_types_are_rejected() {
    let (manager, _sessions, _layer) = build_manager().await;

    let err = manager
        .add_published_data_set(published_data_set_config(
            "e",
            PublishedDataSetType::PublishedEvents,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, PubSubError::NotSupported(_)));

    let err = manager
        .add_published_data_set(published_data_set_config(
            "t",
            PublishedDataSetType::PublishedItemsTemplate,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, PubSubError::InternalError(_)));

    let err = manager
        .add_published_data_set(published_data_set_config(
            "",
            PublishedDataSetType::PublishedItems,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, PubSubError::InvalidArgument(_)));

    assert_eq!(manager.published_data_set_count().await, 0);
}

#[tokio::test]
async fn removing_a_published_data_set_removes_its_writers() {
    let (manager, _sessions, _layer) = build_manager().await;

    let connection = manager
        .add_connection(udp_connection_config("c1"))
        .await
        .unwrap();
    let pds = manager
        .add_published_data_set(published_data_set_config(
            "pds1",
            PublishedDataSetType::PublishedItems,
        ))
        .await
        .unwrap();
    let writer_group = manager
        .add_writer_group(&connection, writer_group_config("wg1", 0))
        .await
        .unwrap();
    let connected = manager
        .add_data_set_writer(&writer_group, Some(&pds.id), data_set_writer_config("dsw1", 0))
        .await
        .unwrap();
    let heartbeat = manager
        .add_data_set_writer(&writer_group, None, data_set_writer_config("hb", 0))
        .await
        .unwrap();

    manager.remove_published_data_set(&pds.id).await.unwrap();

    assert!(manager.find_data_set_writer_by_id(&connected).await.is_none());
    // The heartbeat writer has no dataset reference and survives.
    assert!(manager.find_data_set_writer_by_id(&heartbeat).await.is_some());
    assert!(manager.find_published_data_set_by_id(&pds.id).await.is_none());
}

#[tokio::test]
async fn writer_referencing_missing_data_set_is_rejected() {
    let (manager, _sessions, _layer) = build_manager().await;

    let connection = manager
        .add_connection(udp_connection_config("c1"))
        .await
        .unwrap();
    let writer_group = manager
        .add_writer_group(&connection, writer_group_config("wg1", 0))
        .await
        .unwrap();
    let missing = NodeId::numeric(1, 9999);
    let err = manager
        .add_data_set_writer(&writer_group, Some(&missing), data_set_writer_config("dsw", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, PubSubError::NotFound(_)));
}

#[tokio::test]
async fn removing_a_subscribed_data_set_removes_the_bound_reader() {
    let (manager, _sessions, _layer) = build_manager().await;

    let connection = manager
        .add_connection(udp_connection_config("c1"))
        .await
        .unwrap();
    let reader_group = manager
        .add_reader_group(&connection, reader_group_config("rg1"))
        .await
        .unwrap();
    let sds = manager
        .add_standalone_subscribed_data_set(standalone_subscribed_data_set_config("sds1"))
        .await
        .unwrap();

    let mut reader_config = data_set_reader_config("dsr1", Duration::from_millis(1000));
    reader_config.linked_standalone_subscribed_data_set = Some("sds1".to_string());
    let reader = manager
        .add_data_set_reader(&reader_group, reader_config)
        .await
        .unwrap();
    let unbound = manager
        .add_data_set_reader(
            &reader_group,
            data_set_reader_config("dsr2", Duration::from_millis(1000)),
        )
        .await
        .unwrap();

    let snapshot = manager
        .find_standalone_subscribed_data_set_by_id(&sds)
        .await
        .unwrap();
    assert_eq!(snapshot.connected_reader.as_ref(), Some(&reader));
    assert!(snapshot.is_connected);

    manager.remove_standalone_subscribed_data_set(&sds).await.unwrap();

    assert!(manager.find_data_set_reader_by_id(&reader).await.is_none());
    assert!(manager.find_data_set_reader_by_id(&unbound).await.is_some());
    assert_eq!(manager.subscribed_data_set_count().await, 0);
}

#[tokio::test]
async fn register_connection_is_idempotent() {
    let (manager, _sessions, layer) = build_manager().await;

    let connection = manager
        .add_connection(udp_connection_config("c1"))
        .await
        .unwrap();
    manager.register_connection(&connection, None).await.unwrap();
    manager.register_connection(&connection, None).await.unwrap();

    assert_eq!(layer.register_calls.load(Ordering::Relaxed), 1);
    let snapshot = manager.find_connection_by_id(&connection).await.unwrap();
    assert!(snapshot.is_registered);
}

#[tokio::test]
async fn failed_channel_creation_rolls_back_the_connection() {
    let (manager, _sessions, _layer) = build_manager().await;
    manager
        .register_transport_layer(Arc::new(BrokenTransportLayer) as Arc<dyn TransportLayer>)
        .await;

    let mut config = udp_connection_config("broken");
    config.transport_profile_uri = PROFILE_MQTT_JSON.to_string();
    let err = manager.add_connection(config).await.unwrap_err();
    assert!(matches!(err, PubSubError::InternalError(_)));
    assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test]
async fn unknown_transport_profile_is_not_found() {
    let (manager, _sessions, _layer) = build_manager().await;

    let mut config = udp_connection_config("c1");
    config.transport_profile_uri = "http://example.org/unknown-profile".to_string();
    let err = manager.add_connection(config).await.unwrap_err();
    assert!(matches!(err, PubSubError::NotFound(_)));
}

#[tokio::test]
async fn duplicate_explicit_wire_id_is_rejected() {
    let (manager, _sessions, _layer) = build_manager().await;

    let connection = manager
        .add_connection(udp_connection_config("c1"))
        .await
        .unwrap();
    manager
        .add_writer_group(&connection, writer_group_config("wg1", 100))
        .await
        .unwrap();
    let err = manager
        .add_writer_group(&connection, writer_group_config("wg2", 100))
        .await
        .unwrap_err();
    assert!(matches!(err, PubSubError::InvalidArgument(_)));
}

#[tokio::test]
async fn frozen_writer_group_blocks_removal_until_unfrozen() {
    let (manager, _sessions, _layer) = build_manager().await;

    let connection = manager
        .add_connection(udp_connection_config("c1"))
        .await
        .unwrap();
    let pds = manager
        .add_published_data_set(published_data_set_config(
            "pds1",
            PublishedDataSetType::PublishedItems,
        ))
        .await
        .unwrap();
    let writer_group = manager
        .add_writer_group(&connection, writer_group_config("wg1", 0))
        .await
        .unwrap();
    manager
        .add_data_set_writer(&writer_group, Some(&pds.id), data_set_writer_config("dsw1", 0))
        .await
        .unwrap();

    manager
        .freeze_writer_group_configuration(&writer_group)
        .await
        .unwrap();

    let err = manager.remove_writer_group(&writer_group).await.unwrap_err();
    assert!(err.is_configuration_error());
    // The referenced dataset froze with the group.
    let err = manager.remove_published_data_set(&pds.id).await.unwrap_err();
    assert!(err.is_configuration_error());

    manager
        .unfreeze_writer_group_configuration(&writer_group)
        .await
        .unwrap();
    manager.remove_writer_group(&writer_group).await.unwrap();
    manager.remove_published_data_set(&pds.id).await.unwrap();
}

#[tokio::test]
async fn removing_a_connection_force_unfreezes_its_groups() {
    let (manager, _sessions, _layer) = build_manager().await;

    let connection = manager
        .add_connection(udp_connection_config("c1"))
        .await
        .unwrap();
    let writer_group = manager
        .add_writer_group(&connection, writer_group_config("wg1", 0))
        .await
        .unwrap();
    let reader_group = manager
        .add_reader_group(&connection, reader_group_config("rg1"))
        .await
        .unwrap();
    manager
        .freeze_writer_group_configuration(&writer_group)
        .await
        .unwrap();
    manager
        .freeze_reader_group_configuration(&reader_group)
        .await
        .unwrap();

    manager.remove_connection(&connection).await.unwrap();
    assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test]
async fn data_set_field_operations_bump_the_minor_version() {
    let (manager, _sessions, _layer) = build_manager().await;

    let pds = manager
        .add_published_data_set(published_data_set_config(
            "pds1",
            PublishedDataSetType::PublishedItems,
        ))
        .await
        .unwrap();
    let created_version = pds.configuration_version;

    let field = manager
        .add_data_set_field(
            &pds.id,
            DataSetFieldConfig {
                field_name_alias: "temperature".to_string(),
                promoted_field: false,
                published_variable: NodeId::numeric(1, 42),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        field.configuration_version.major_version,
        created_version.major_version
    );
    assert!(field.configuration_version.minor_version >= created_version.minor_version);

    let snapshot = manager.find_published_data_set_by_id(&pds.id).await.unwrap();
    assert_eq!(snapshot.fields.len(), 1);

    let removed = manager
        .remove_data_set_field(&pds.id, &field.field_id)
        .await
        .unwrap();
    assert_eq!(
        removed.configuration_version.major_version,
        created_version.major_version
    );
    let snapshot = manager.find_published_data_set_by_id(&pds.id).await.unwrap();
    assert!(snapshot.fields.is_empty());
}

#[tokio::test]
async fn shutdown_empties_every_collection() {
    let (manager, sessions, _layer) = build_manager().await;

    let connection = manager
        .add_connection(udp_connection_config("c1"))
        .await
        .unwrap();
    let reader_group = manager
        .add_reader_group(&connection, reader_group_config("rg1"))
        .await
        .unwrap();
    manager
        .add_topic_assign(&reader_group, "factory/line1")
        .await
        .unwrap();
    manager
        .add_published_data_set(published_data_set_config(
            "pds1",
            PublishedDataSetType::PublishedItems,
        ))
        .await
        .unwrap();
    manager
        .add_standalone_subscribed_data_set(standalone_subscribed_data_set_config("sds1"))
        .await
        .unwrap();
    let session = NodeId::guid(0, uuid::Uuid::new_v4());
    sessions.open_session(session.clone());
    manager
        .reserve_ids(&session, 2, 2, ua_pubsub_sdk::PROFILE_UDP_UADP)
        .await
        .unwrap();

    manager.shutdown().await;

    assert_eq!(manager.connection_count().await, 0);
    assert_eq!(manager.published_data_set_count().await, 0);
    assert_eq!(manager.subscribed_data_set_count().await, 0);
    assert_eq!(manager.topic_assign_count().await, 0);
    assert_eq!(manager.reserve_id_count().await, 0);

    // Idempotent on an already-empty manager.
    manager.shutdown().await;
    assert_eq!(manager.connection_count().await, 0);
}
