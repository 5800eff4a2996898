mod common;

use common::{build_manager, data_set_reader_config, reader_group_config, udp_connection_config};
use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};
use ua_pubsub_core::PubSubManager;
use ua_pubsub_error::PubSubError;
use ua_pubsub_sdk::{MonitoringKind, NodeId, PubSubComponentKind, ReceiveTimeoutCallback};

async fn reader_with_timeout(
    manager: &PubSubManager,
    timeout: Duration,
) -> (NodeId, Arc<AtomicU32>) {
    let connection = manager
        .add_connection(udp_connection_config("c1"))
        .await
        .unwrap();
    let reader_group = manager
        .add_reader_group(&connection, reader_group_config("rg1"))
        .await
        .unwrap();
    let reader = manager
        .add_data_set_reader(&reader_group, data_set_reader_config("dsr1", timeout))
        .await
        .unwrap();

    let fired = Arc::new(AtomicU32::new(0));
    let fired_in_cb = Arc::clone(&fired);
    let callback: ReceiveTimeoutCallback = Arc::new(move |_reader_id| {
        fired_in_cb.fetch_add(1, Ordering::Relaxed);
    });
    manager
        .create_monitoring(
            &reader,
            PubSubComponentKind::DataSetReader,
            MonitoringKind::MessageReceiveTimeout,
            callback,
        )
        .await
        .unwrap();
    (reader, fired)
}

#[tokio::test]
async fn timeout_fires_exactly_once_and_clears_the_handle() {
    let (manager, _sessions, _layer) = build_manager().await;
    let (reader, fired) = reader_with_timeout(&manager, Duration::from_millis(50)).await;

    manager.start_monitoring(&reader).await.unwrap();
    let snapshot = manager.find_data_set_reader_by_id(&reader).await.unwrap();
    assert_ne!(snapshot.timer_id, 0);

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(fired.load(Ordering::Relaxed), 1);
    let snapshot = manager.find_data_set_reader_by_id(&reader).await.unwrap();
    assert_eq!(snapshot.timer_id, 0);
}

#[tokio::test]
async fn stop_before_the_timeout_suppresses_the_callback() {
    let (manager, _sessions, _layer) = build_manager().await;
    let (reader, fired) = reader_with_timeout(&manager, Duration::from_millis(100)).await;

    manager.start_monitoring(&reader).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    manager.stop_monitoring(&reader).await.unwrap();

    let snapshot = manager.find_data_set_reader_by_id(&reader).await.unwrap();
    assert_eq!(snapshot.timer_id, 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fired.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn rearming_fires_once_per_arming() {
    let (manager, _sessions, _layer) = build_manager().await;
    let (reader, fired) = reader_with_timeout(&manager, Duration::from_millis(40)).await;

    manager.start_monitoring(&reader).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(fired.load(Ordering::Relaxed), 1);

    manager.start_monitoring(&reader).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(fired.load(Ordering::Relaxed), 2);

    let snapshot = manager.find_data_set_reader_by_id(&reader).await.unwrap();
    assert_eq!(snapshot.timer_id, 0);
}

#[tokio::test]
async fn update_interval_reschedules_the_armed_timer() {
    let (manager, _sessions, _layer) = build_manager().await;
    let (reader, fired) = reader_with_timeout(&manager, Duration::from_millis(500)).await;

    manager.start_monitoring(&reader).await.unwrap();
    manager.update_monitoring_interval(&reader).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    // Still armed with the (unchanged) 500 ms interval.
    assert_eq!(fired.load(Ordering::Relaxed), 0);
    manager.stop_monitoring(&reader).await.unwrap();
}

#[tokio::test]
async fn update_interval_on_an_unarmed_reader_surfaces_the_timer_error() {
    let (manager, _sessions, _layer) = build_manager().await;
    let (reader, _fired) = reader_with_timeout(&manager, Duration::from_millis(50)).await;

    let err = manager.update_monitoring_interval(&reader).await.unwrap_err();
    assert!(matches!(err, PubSubError::NotFound(_)));
}

#[tokio::test]
async fn monitoring_is_only_supported_for_readers() {
    let (manager, _sessions, _layer) = build_manager().await;
    let (reader, _fired) = reader_with_timeout(&manager, Duration::from_millis(50)).await;

    let callback: ReceiveTimeoutCallback = Arc::new(|_| {});
    let err = manager
        .create_monitoring(
            &reader,
            PubSubComponentKind::WriterGroup,
            MonitoringKind::MessageReceiveTimeout,
            callback,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PubSubError::NotSupported(_)));
}

#[tokio::test]
async fn removing_an_armed_reader_releases_the_timer() {
    let (manager, _sessions, _layer) = build_manager().await;
    let (reader, fired) = reader_with_timeout(&manager, Duration::from_millis(60)).await;

    manager.start_monitoring(&reader).await.unwrap();
    manager.remove_data_set_reader(&reader).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fired.load(Ordering::Relaxed), 0);
    assert!(manager.find_data_set_reader_by_id(&reader).await.is_none());
}

#[tokio::test]
async fn delete_monitoring_is_informational() {
    let (manager, _sessions, _layer) = build_manager().await;
    let (reader, fired) = reader_with_timeout(&manager, Duration::from_millis(50)).await;

    manager.start_monitoring(&reader).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(fired.load(Ordering::Relaxed), 1);

    manager.delete_monitoring(&reader).await.unwrap();
    let snapshot = manager.find_data_set_reader_by_id(&reader).await.unwrap();
    assert_eq!(snapshot.timer_id, 0);
}
