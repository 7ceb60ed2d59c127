use super::*;
use serde_json::json;

use crate::config::RealtimeConfig;
use crate::test_support::{FakeConnector, settle};

fn note(id: i64, priority: Priority, read: bool) -> Notification {
    Notification {
        id: Id::from(id),
        title: format!("n{id}"),
        message: "body".to_owned(),
        category: None,
        priority,
        action_url: None,
        created_at: None,
        read,
    }
}

#[derive(Default)]
struct CapturingSink(Mutex<Vec<Alert>>);

impl AlertSink for CapturingSink {
    fn show(&self, alert: &Alert) {
        self.0.lock().expect("lock").push(alert.clone());
    }
}

#[test]
fn receive_prepends_and_counts_unread() {
    let mut inbox = NotificationInbox::default();
    inbox.receive(note(1, Priority::Normal, false));
    inbox.receive(note(2, Priority::Normal, true));
    let ids: Vec<_> = inbox.items().iter().map(|n| n.id.to_string()).collect();
    assert_eq!(ids, vec!["2", "1"]);
    assert_eq!(inbox.unread_count(), 2);
}

#[test]
fn mark_as_read_is_clamped_and_idempotent() {
    let mut inbox = NotificationInbox::default();
    inbox.receive(note(1, Priority::Normal, false));
    assert!(inbox.mark_as_read(&Id::from(1)));
    assert!(!inbox.mark_as_read(&Id::from(1)));
    assert!(!inbox.mark_as_read(&Id::from(99)));
    assert_eq!(inbox.unread_count(), 0);
    assert!(inbox.items()[0].read);
}

#[test]
fn mark_all_as_read_zeroes_counter_from_any_state() {
    let mut inbox = NotificationInbox::default();
    inbox.seed(vec![note(3, Priority::Low, false), note(2, Priority::High, true), note(1, Priority::Urgent, false)]);
    assert_eq!(inbox.unread_count(), 2);
    inbox.receive(note(4, Priority::Normal, false));

    inbox.mark_all_as_read();
    assert_eq!(inbox.unread_count(), 0);
    assert!(inbox.items().iter().all(|n| n.read));

    inbox.mark_all_as_read();
    assert_eq!(inbox.unread_count(), 0);
}

#[test]
fn clear_decrements_only_for_unread_records() {
    let mut inbox = NotificationInbox::default();
    inbox.receive(note(1, Priority::Normal, false));
    inbox.receive(note(2, Priority::Normal, false));
    inbox.mark_as_read(&Id::from(2));
    assert_eq!(inbox.unread_count(), 1);

    assert!(inbox.clear(&Id::from(2)).is_some());
    assert_eq!(inbox.unread_count(), 1);
    assert!(inbox.clear(&Id::from(1)).is_some());
    assert_eq!(inbox.unread_count(), 0);
    assert!(inbox.clear(&Id::from(1)).is_none());
}

#[test]
fn alert_style_follows_priority() {
    assert_eq!(AlertStyle::for_priority(Priority::Urgent), AlertStyle::Urgent);
    assert_eq!(AlertStyle::for_priority(Priority::High), AlertStyle::Warning);
    assert_eq!(AlertStyle::for_priority(Priority::Normal), AlertStyle::Info);
    assert_eq!(AlertStyle::for_priority(Priority::Low), AlertStyle::Quiet);
    assert!(AlertStyle::Urgent.is_prominent());
    assert!(AlertStyle::Warning.is_prominent());
    assert!(!AlertStyle::Info.is_prominent());
    assert!(!AlertStyle::Quiet.is_prominent());
}

#[test]
fn empty_action_url_is_not_an_action() {
    let mut n = note(1, Priority::High, false);
    n.action_url = Some(String::new());
    assert_eq!(Alert::from(&n).action_url, None);
    n.action_url = Some("/courses/7".to_owned());
    assert_eq!(Alert::from(&n).action_url.as_deref(), Some("/courses/7"));
}

#[tokio::test]
async fn live_frames_fill_inbox_and_raise_alerts() {
    let (connector, mut peers) = FakeConnector::accepting();
    let factory = ChannelFactory::new(&RealtimeConfig::default(), connector).expect("factory");
    let sink = Arc::new(CapturingSink::default());
    let center = NotificationCenter::new(factory, sink.clone());

    assert!(center.start(Some("u-1"), Some("tok")));
    center.wait_connected().await.expect("open");
    let peer = peers.recv().await.expect("peer");
    assert!(peer.url.contains("/api/v1/ws/notifications/u-1?token=tok"));

    peer.push(&json!({
        "type": "notification",
        "data": {"id": 10, "title": "Class starts", "message": "in 5 min", "priority": "urgent", "action_url": "/live/42"}
    }));
    peer.push(&json!({"type": "notification", "id": 11, "title": "Digest", "message": "weekly", "priority": "low"}));
    peer.push(&json!({"type": "heartbeat"}));
    settle().await;

    assert_eq!(center.unread_count(), 2);
    let titles: Vec<_> = center.notifications().into_iter().map(|n| n.title).collect();
    assert_eq!(titles, vec!["Digest", "Class starts"]);

    let alerts = sink.0.lock().expect("lock").clone();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].style, AlertStyle::Urgent);
    assert_eq!(alerts[0].action_url.as_deref(), Some("/live/42"));
    assert_eq!(alerts[1].style, AlertStyle::Quiet);

    let shared = center.clone();
    shared.mark_as_read(&Id::from(10));
    assert_eq!(center.unread_count(), 1);

    center.stop();
    settle().await;
    assert!(!center.is_connected());
    assert!(peer.is_closed());
}

#[tokio::test]
async fn switching_user_resets_inbox() {
    let (connector, _peers) = FakeConnector::accepting();
    let factory = ChannelFactory::new(&RealtimeConfig::default(), connector).expect("factory");
    let center = NotificationCenter::new(factory, Arc::new(LogAlertSink));

    center.start(Some("u-1"), Some("tok"));
    center.seed(vec![note(1, Priority::Normal, false)]);
    center.start(Some("u-1"), Some("tok"));
    assert_eq!(center.unread_count(), 1);

    center.start(Some("u-2"), Some("tok"));
    assert_eq!(center.unread_count(), 0);
    assert!(center.notifications().is_empty());
}
