use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use frames::ClientFrame;
use serde_json::json;

use crate::test_support::{FakeConnector, settle};

const ENDPOINT: &str = "ws://edu.test/api/v1/ws/live-class/7";

fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&count);
    (count, move || {
        inner.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test(start_paused = true)]
async fn refused_server_gets_five_reconnects_on_doubling_schedule() {
    let connector = FakeConnector::refusing();
    let conn = Connection::new(ENDPOINT, ReconnectPolicy::default(), connector.clone());

    let result = conn.connect_and_wait("tok").await;
    assert!(matches!(result, Err(TransportError::ReconnectExhausted { attempts: 5 })));
    assert_eq!(conn.status(), ConnectionStatus::Failed);

    let calls = connector.calls();
    let start = calls[0].1;
    let offsets: Vec<u64> = calls
        .iter()
        .map(|(_, at)| u64::try_from(at.duration_since(start).as_millis()).expect("fits"))
        .collect();
    assert_eq!(offsets, vec![0, 1_000, 3_000, 7_000, 15_000, 31_000]);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(connector.call_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnect() {
    let connector = FakeConnector::refusing();
    let conn = Connection::new(ENDPOINT, ReconnectPolicy::default(), connector.clone());

    conn.connect("tok");
    settle().await;
    assert_eq!(connector.call_count(), 1);

    conn.disconnect();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(connector.call_count(), 1);
    assert_eq!(conn.status(), ConnectionStatus::Closed);
}

#[tokio::test(start_paused = true)]
async fn wait_open_fails_when_disconnected_first() {
    let connector = FakeConnector::refusing();
    let conn = Connection::new(ENDPOINT, ReconnectPolicy::default(), connector);
    conn.connect("tok");
    conn.disconnect();
    assert!(matches!(conn.wait_open().await, Err(TransportError::WsClosed)));
}

#[tokio::test]
async fn token_is_url_encoded_into_query() {
    let (connector, mut peers) = FakeConnector::accepting();
    let conn = Connection::new(ENDPOINT, ReconnectPolicy::default(), connector);

    conn.connect_and_wait("a b&c=d").await.expect("open");
    let peer = peers.recv().await.expect("peer");
    assert_eq!(peer.url, format!("{ENDPOINT}?token=a%20b%26c%3Dd"));
    assert!(conn.is_connected());
}

#[tokio::test]
async fn frames_reach_typed_and_wildcard_handlers_and_bad_json_is_dropped() {
    let (connector, mut peers) = FakeConnector::accepting();
    let conn = Connection::new(ENDPOINT, ReconnectPolicy::default(), connector);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let typed = Arc::clone(&seen);
    conn.on(
        "chat_message",
        handler(move |frame| typed.lock().expect("lock").push(format!("chat:{}", frame["message"]))),
    );
    let any = Arc::clone(&seen);
    conn.on(
        WILDCARD,
        handler(move |frame| any.lock().expect("lock").push(format!("any:{}", frame["type"]))),
    );

    conn.connect_and_wait("tok").await.expect("open");
    let peer = peers.recv().await.expect("peer");
    peer.push(&json!({"type": "chat_message", "message": "hi"}));
    peer.push_text("{not json");
    peer.push(&json!({"type": "user_left", "user_id": 3}));
    settle().await;

    assert_eq!(
        *seen.lock().expect("lock"),
        vec![r#"chat:"hi""#, r#"any:"chat_message""#, r#"any:"user_left""#]
    );
    assert!(conn.is_connected());
}

#[tokio::test]
async fn off_removes_one_registration_on_a_live_connection() {
    let (connector, mut peers) = FakeConnector::accepting();
    let conn = Connection::new(ENDPOINT, ReconnectPolicy::default(), connector);

    let hits = Arc::new(AtomicUsize::new(0));
    let h_hits = Arc::clone(&hits);
    let h = handler(move |_| {
        h_hits.fetch_add(1, Ordering::SeqCst);
    });
    let o_hits = Arc::new(AtomicUsize::new(0));
    let o_inner = Arc::clone(&o_hits);
    conn.on("reaction", Arc::clone(&h));
    conn.on(
        "reaction",
        handler(move |_| {
            o_inner.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert!(conn.off("reaction", &h));

    conn.connect_and_wait("tok").await.expect("open");
    let peer = peers.recv().await.expect("peer");
    peer.push(&json!({"type": "reaction"}));
    settle().await;

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(o_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn send_writes_json_when_open_and_drops_otherwise() {
    let (connector, mut peers) = FakeConnector::accepting();
    let conn = Connection::new(ENDPOINT, ReconnectPolicy::default(), connector);

    assert!(!conn.send(&ClientFrame::Typing));

    conn.connect_and_wait("tok").await.expect("open");
    let mut peer = peers.recv().await.expect("peer");
    assert!(conn.send(&ClientFrame::ChatMessage { message: "hello".to_owned() }));
    assert_eq!(peer.recv().await, Some(json!({"type": "chat_message", "message": "hello"})));

    conn.disconnect();
    assert!(!conn.is_connected());
    assert!(!conn.send(&ClientFrame::StopTyping));
}

#[tokio::test]
async fn second_connect_tears_down_first_socket_silently() {
    let (connector, mut peers) = FakeConnector::accepting();
    let conn = Connection::new(ENDPOINT, ReconnectPolicy::default(), connector.clone());
    let (connects, on_connect) = counter();
    let (disconnects, on_disconnect) = counter();
    conn.on_connect(on_connect);
    conn.on_disconnect(on_disconnect);

    conn.connect_and_wait("first").await.expect("open");
    let first = peers.recv().await.expect("first peer");

    conn.connect_and_wait("second").await.expect("open again");
    let second = peers.recv().await.expect("second peer");
    settle().await;

    assert!(first.is_closed());
    assert!(!second.is_closed());
    assert!(second.url.ends_with("token=second"));
    assert_eq!(connects.load(Ordering::SeqCst), 2);
    assert_eq!(disconnects.load(Ordering::SeqCst), 0);
    assert_eq!(connector.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn server_close_reconnects_with_stored_token_and_resets_backoff() {
    let (connector, mut peers) = FakeConnector::accepting();
    let conn = Connection::new(ENDPOINT, ReconnectPolicy::default(), connector.clone());
    let (connects, on_connect) = counter();
    let (disconnects, on_disconnect) = counter();
    conn.on_connect(on_connect);
    conn.on_disconnect(on_disconnect);

    conn.connect_and_wait("tok").await.expect("open");
    peers.recv().await.expect("peer").close();
    settle().await;
    assert!(!conn.is_connected());
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);

    let again = peers.recv().await.expect("reconnect peer");
    assert!(again.url.ends_with("?token=tok"));
    conn.wait_open().await.expect("reopened");
    assert_eq!(connects.load(Ordering::SeqCst), 2);
    assert_eq!(conn.reconnect_attempts(), 0);

    let calls = connector.calls();
    assert_eq!(calls[1].1.duration_since(calls[0].1), Duration::from_secs(1));
}

#[tokio::test]
async fn disconnect_fires_handlers_once_and_does_not_reconnect() {
    let (connector, mut peers) = FakeConnector::accepting();
    let conn = Connection::new(ENDPOINT, ReconnectPolicy::default(), connector.clone());
    let (disconnects, on_disconnect) = counter();
    conn.on_disconnect(on_disconnect);

    conn.connect_and_wait("tok").await.expect("open");
    let peer = peers.recv().await.expect("peer");
    conn.disconnect();
    settle().await;

    assert!(peer.is_closed());
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(conn.status(), ConnectionStatus::Closed);
    conn.disconnect();
    assert_eq!(connector.call_count(), 1);
}

#[tokio::test]
async fn non_websocket_endpoint_is_logged_and_ignored() {
    let connector = FakeConnector::refusing();
    let conn = Connection::new("http://edu.test/ws", ReconnectPolicy::default(), connector.clone());
    conn.connect("tok");
    settle().await;
    assert_eq!(connector.call_count(), 0);
    assert_eq!(conn.status(), ConnectionStatus::Disconnected);
}

#[test]
fn connect_outside_runtime_is_logged_and_ignored() {
    let connector = FakeConnector::refusing();
    let conn = Connection::new(ENDPOINT, ReconnectPolicy::default(), connector.clone());
    conn.connect("tok");
    assert_eq!(connector.call_count(), 0);
    assert_eq!(conn.status(), ConnectionStatus::Disconnected);
}
