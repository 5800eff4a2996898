mod common;

use common::{build_manager, udp_connection_config, writer_group_config};
use ua_pubsub_error::PubSubError;
use ua_pubsub_sdk::{NodeId, ReserveIdKind, PROFILE_UDP_UADP};
use uuid::Uuid;

fn session() -> NodeId {
    NodeId::guid(0, Uuid::new_v4())
}

#[tokio::test]
async fn ids_are_sequential_from_an_empty_state() {
    let (manager, sessions, _layer) = build_manager().await;
    let s = session();
    sessions.open_session(s.clone());

    let reserved = manager
        .reserve_ids(&s, 3, 2, PROFILE_UDP_UADP)
        .await
        .unwrap();
    assert_eq!(reserved.writer_group_ids, vec![0x8000, 0x8001, 0x8002]);
    // The dataset-writer cursor is independent of the writer-group cursor.
    assert_eq!(reserved.data_set_writer_ids, vec![0x8000, 0x8001]);
    assert_eq!(manager.reserve_id_count().await, 5);
}

#[tokio::test]
async fn unknown_transport_profile_is_rejected() {
    let (manager, sessions, _layer) = build_manager().await;
    let s = session();
    sessions.open_session(s.clone());

    let err = manager
        .reserve_ids(&s, 1, 0, "http://example.org/unknown-profile")
        .await
        .unwrap_err();
    assert!(matches!(err, PubSubError::InvalidArgument(_)));
    assert_eq!(manager.reserve_id_count().await, 0);
}

#[tokio::test]
async fn reservation_does_not_block_binding_but_blocks_other_reservations() {
    let (manager, sessions, _layer) = build_manager().await;
    let s1 = session();
    let s2 = session();
    sessions.open_session(s1.clone());
    sessions.open_session(s2.clone());

    let reserved = manager
        .reserve_ids(&s1, 3, 0, PROFILE_UDP_UADP)
        .await
        .unwrap();
    assert_eq!(reserved.writer_group_ids, vec![0x8000, 0x8001, 0x8002]);

    // Binding a reserved id with an explicit add succeeds; the reservation
    // protects against allocator hand-outs, not against the owner's use.
    let connection = manager
        .add_connection(udp_connection_config("c1"))
        .await
        .unwrap();
    let writer_group = manager
        .add_writer_group(&connection, writer_group_config("wg", 0x8001))
        .await
        .unwrap();
    let snapshot = manager.find_writer_group_by_id(&writer_group).await.unwrap();
    assert_eq!(snapshot.writer_group_id, 0x8001);

    // An unrelated session skips both the reservations and the live group.
    let reserved = manager
        .reserve_ids(&s2, 2, 0, PROFILE_UDP_UADP)
        .await
        .unwrap();
    assert_eq!(reserved.writer_group_ids, vec![0x8003, 0x8004]);
}

#[tokio::test]
async fn live_wire_ids_are_skipped_by_the_allocator() {
    let (manager, sessions, _layer) = build_manager().await;
    let s = session();
    sessions.open_session(s.clone());

    let connection = manager
        .add_connection(udp_connection_config("c1"))
        .await
        .unwrap();
    // Occupy the first id of the reserved range with a live group.
    manager
        .add_writer_group(&connection, writer_group_config("wg", 0x8000))
        .await
        .unwrap();

    let reserved = manager
        .reserve_ids(&s, 2, 0, PROFILE_UDP_UADP)
        .await
        .unwrap();
    assert_eq!(reserved.writer_group_ids, vec![0x8001, 0x8002]);
}

#[tokio::test]
async fn expired_sessions_are_reclaimed_before_allocation() {
    let (manager, sessions, _layer) = build_manager().await;
    let s1 = session();
    let s2 = session();
    sessions.open_session(s1.clone());
    sessions.open_session(s2.clone());

    manager
        .reserve_ids(&s1, 2, 0, PROFILE_UDP_UADP)
        .await
        .unwrap();
    assert_eq!(manager.reserve_id_count().await, 2);

    sessions.close_session(&s1);

    let reserved = manager
        .reserve_ids(&s2, 1, 0, PROFILE_UDP_UADP)
        .await
        .unwrap();
    // Allocation continues from the cursor even after the reclaim.
    assert_eq!(reserved.writer_group_ids, vec![0x8002]);

    let remaining = manager.reservations().await;
    assert_eq!(remaining.len(), 1);
    assert!(remaining.iter().all(|r| r.session_id == s2));
    assert!(remaining
        .iter()
        .all(|r| r.kind == ReserveIdKind::WriterGroup));
}

#[tokio::test]
async fn admin_session_reservations_survive_the_sweep() {
    let (manager, sessions, _layer) = build_manager().await;
    let admin = common::admin_session();
    let s = session();
    sessions.open_session(s.clone());

    manager
        .reserve_ids(&admin, 1, 0, PROFILE_UDP_UADP)
        .await
        .unwrap();
    manager.reserve_ids(&s, 1, 0, PROFILE_UDP_UADP).await.unwrap();
    sessions.close_session(&s);

    manager.free_ids().await;

    let remaining = manager.reservations().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].session_id, admin);
}

#[tokio::test]
async fn reservations_are_scoped_by_transport_profile() {
    let (manager, sessions, _layer) = build_manager().await;
    let s = session();
    sessions.open_session(s.clone());

    let udp = manager
        .reserve_ids(&s, 1, 0, PROFILE_UDP_UADP)
        .await
        .unwrap();
    let mqtt = manager
        .reserve_ids(&s, 1, 0, ua_pubsub_sdk::PROFILE_MQTT_UADP)
        .await
        .unwrap();
    // Same numeric id can be live in two different profile scopes; only the
    // shared cursor advanced between the calls.
    assert_eq!(udp.writer_group_ids, vec![0x8000]);
    assert_eq!(mqtt.writer_group_ids, vec![0x8001]);
    assert_eq!(manager.reserve_id_count().await, 2);
}
