// Tests for the transcription connection leaf and the listener registry.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{chunk, CountingCredentials, RecordingTransport};
use voxquery::{
    ConnectOptions, ConnectionEvent, ConnectionEventKind, ConnectionState, ListenerTable,
    TranscriptionConnection, VoiceError,
};

fn connection(
    transport: Arc<RecordingTransport>,
    credentials: Arc<CountingCredentials>,
) -> TranscriptionConnection {
    TranscriptionConnection::new(transport, credentials)
}

#[tokio::test]
async fn test_connect_opens_after_backend_ack() {
    let transport = Arc::new(RecordingTransport::new());
    let mut conn = connection(Arc::clone(&transport), Arc::new(CountingCredentials::new()));

    assert_eq!(conn.state(), ConnectionState::Closed);
    conn.connect(&ConnectOptions::default()).await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Open);

    conn.send(chunk(7, 4, 0)).await.unwrap();
    for _ in 0..100 {
        if transport.sent_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(transport.sent_count(), 1);

    conn.finish().await;
}

#[tokio::test]
async fn test_send_while_closed_is_a_programming_error() {
    let transport = Arc::new(RecordingTransport::new());
    let conn = connection(transport, Arc::new(CountingCredentials::new()));

    let result = conn.send(chunk(1, 4, 0)).await;
    assert!(matches!(result, Err(VoiceError::InvalidState(_))));
}

#[tokio::test]
async fn test_rejected_connect_leaves_nothing_half_open() {
    let transport = Arc::new(RecordingTransport::rejecting());
    let mut conn = connection(transport, Arc::new(CountingCredentials::new()));

    let result = conn.connect(&ConnectOptions::default()).await;
    assert!(matches!(result, Err(VoiceError::ConnectionAuthFailed(_))));
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(conn.audio_feed().is_err());
    assert!(conn.send(chunk(1, 4, 0)).await.is_err());
}

#[tokio::test]
async fn test_credential_fetched_fresh_per_connect() {
    let transport = Arc::new(RecordingTransport::new());
    let credentials = Arc::new(CountingCredentials::new());
    let mut conn = connection(Arc::clone(&transport), Arc::clone(&credentials));

    conn.connect(&ConnectOptions::default()).await.unwrap();
    conn.finish().await;
    conn.connect(&ConnectOptions::default()).await.unwrap();
    conn.finish().await;

    assert_eq!(credentials.fetched.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_listeners_are_additive_and_removed_by_exact_handle() {
    let transport = Arc::new(RecordingTransport::new());
    let mut conn = connection(Arc::clone(&transport), Arc::new(CountingCredentials::new()));
    conn.connect(&ConnectOptions::default()).await.unwrap();

    let (first_handle, mut first_rx) = conn.add_listener(ConnectionEventKind::Transcript).await;
    let (_second_handle, mut second_rx) = conn.add_listener(ConnectionEventKind::Transcript).await;
    assert_eq!(conn.listener_count().await, 2);

    transport
        .latest_tap()
        .send(ConnectionEvent::Transcript {
            text: "hello".into(),
            is_final: false,
        })
        .unwrap();

    // Both listeners see the event.
    let event = tokio::time::timeout(Duration::from_secs(1), first_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, ConnectionEvent::Transcript { .. }));
    let event = tokio::time::timeout(Duration::from_secs(1), second_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, ConnectionEvent::Transcript { .. }));

    // Removing the first leaves the second untouched.
    conn.remove_listener(first_handle).await;
    assert_eq!(conn.listener_count().await, 1);

    transport
        .latest_tap()
        .send(ConnectionEvent::Transcript {
            text: "again".into(),
            is_final: true,
        })
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), second_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        event,
        ConnectionEvent::Transcript { is_final: true, .. }
    ));
    // The removed listener's channel is closed, not leaked.
    assert!(first_rx.recv().await.is_none());

    conn.finish().await;
}

#[tokio::test]
async fn test_finish_closes_and_discards_outbound() {
    let transport = Arc::new(RecordingTransport::new());
    let mut conn = connection(Arc::clone(&transport), Arc::new(CountingCredentials::new()));

    conn.connect(&ConnectOptions::default()).await.unwrap();
    conn.finish().await;

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(matches!(
        conn.send(chunk(1, 4, 0)).await,
        Err(VoiceError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_backend_error_event_marks_connection_closed() {
    let transport = Arc::new(RecordingTransport::new());
    let mut conn = connection(Arc::clone(&transport), Arc::new(CountingCredentials::new()));
    conn.connect(&ConnectOptions::default()).await.unwrap();

    let (_handle, mut error_rx) = conn.add_listener(ConnectionEventKind::Error).await;
    transport
        .latest_tap()
        .send(ConnectionEvent::Error {
            cause: "socket reset".into(),
        })
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), error_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, ConnectionEvent::Error { .. }));
    assert_eq!(conn.state(), ConnectionState::Closed);
}

#[test]
fn test_listener_table_dispatch_by_kind() {
    let mut table: ListenerTable<ConnectionEventKind, ConnectionEvent> = ListenerTable::new();
    let (_open_handle, mut open_rx) = table.add(ConnectionEventKind::Open);
    let (_error_handle, mut error_rx) = table.add(ConnectionEventKind::Error);

    table.dispatch(ConnectionEventKind::Open, ConnectionEvent::Open);

    assert!(matches!(open_rx.try_recv(), Ok(ConnectionEvent::Open)));
    assert!(error_rx.try_recv().is_err(), "wrong-kind listener stays quiet");
}

#[test]
fn test_listener_table_remove_is_exact() {
    let mut table: ListenerTable<ConnectionEventKind, ConnectionEvent> = ListenerTable::new();
    let (first, _first_rx) = table.add(ConnectionEventKind::Transcript);
    let (second, _second_rx) = table.add(ConnectionEventKind::Transcript);
    assert_eq!(table.len(), 2);

    assert!(table.remove(first));
    assert_eq!(table.len(), 1);
    assert!(table.remove(second));
    assert!(table.is_empty());
}
