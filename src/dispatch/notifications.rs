//! Per-user notification stream with an in-memory inbox and unread counter.
//!
//! DESIGN
//! ======
//! [`NotificationInbox`] is plain state: most-recent-first list plus an
//! unread counter that only moves when a record's read flag actually flips.
//! [`NotificationCenter`] binds the inbox to the user's notification channel
//! and raises an [`Alert`] through an [`AlertSink`] for every live frame.
//!
//! One center exists per logged-in user. It is created once by
//! [`Realtime`](crate::realtime::Realtime) and shared by cloning the handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use frames::{Id, Notification, NotificationEvent, Priority};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::binding::{ChannelBinding, Dispatch};
use crate::channels::{ChannelFactory, ChannelKind};
use crate::transport::TransportError;

// =============================================================================
// INBOX
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NotificationInbox {
    items: Vec<Notification>,
    unread: usize,
}

impl NotificationInbox {
    #[must_use]
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.unread
    }

    /// Prepend a live notification. Live frames always count as unread.
    pub fn receive(&mut self, mut notification: Notification) {
        notification.read = false;
        self.items.insert(0, notification);
        self.unread += 1;
    }

    /// Replace the inbox with a fetched backlog, newest first.
    pub fn seed(&mut self, backlog: Vec<Notification>) {
        self.unread = backlog.iter().filter(|n| !n.read).count();
        self.items = backlog;
    }

    /// Returns whether a record flipped from unread to read.
    pub fn mark_as_read(&mut self, id: &Id) -> bool {
        let Some(n) = self.items.iter_mut().find(|n| &n.id == id && !n.read) else {
            return false;
        };
        n.read = true;
        self.unread = self.unread.saturating_sub(1);
        true
    }

    pub fn mark_all_as_read(&mut self) {
        for n in &mut self.items {
            n.read = true;
        }
        self.unread = 0;
    }

    /// Remove a record; the counter drops only if it was unread.
    pub fn clear(&mut self, id: &Id) -> Option<Notification> {
        let index = self.items.iter().position(|n| &n.id == id)?;
        let removed = self.items.remove(index);
        if !removed.read {
            self.unread = self.unread.saturating_sub(1);
        }
        Some(removed)
    }
}

// =============================================================================
// ALERTS
// =============================================================================

/// Presentation style for a notification toast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertStyle {
    Urgent,
    Warning,
    Info,
    Quiet,
}

impl AlertStyle {
    #[must_use]
    pub fn for_priority(priority: Priority) -> Self {
        match priority {
            Priority::Urgent => Self::Urgent,
            Priority::High => Self::Warning,
            Priority::Normal => Self::Info,
            Priority::Low => Self::Quiet,
        }
    }

    /// High and urgent alerts are set apart from the rest.
    #[must_use]
    pub fn is_prominent(self) -> bool {
        matches!(self, Self::Urgent | Self::Warning)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Alert {
    pub style: AlertStyle,
    pub title: String,
    pub message: String,
    /// Where the alert's action navigates, when the notification has one.
    pub action_url: Option<String>,
}

impl From<&Notification> for Alert {
    fn from(n: &Notification) -> Self {
        Self {
            style: AlertStyle::for_priority(n.priority),
            title: n.title.clone(),
            message: n.message.clone(),
            action_url: n.action_url.clone().filter(|u| !u.is_empty()),
        }
    }
}

/// Shows alerts to the user.
pub trait AlertSink: Send + Sync + 'static {
    fn show(&self, alert: &Alert);
}

/// Writes alerts to the log. Prominent alerts log at `warn`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn show(&self, alert: &Alert) {
        let action = alert.action_url.as_deref().unwrap_or("");
        if alert.style.is_prominent() {
            warn!(style = ?alert.style, title = %alert.title, action, "{}", alert.message);
        } else {
            info!(style = ?alert.style, title = %alert.title, action, "{}", alert.message);
        }
    }
}

// =============================================================================
// CENTER
// =============================================================================

pub struct NotificationState {
    inbox: Mutex<NotificationInbox>,
    sink: Arc<dyn AlertSink>,
}

impl NotificationState {
    fn inbox(&self) -> MutexGuard<'_, NotificationInbox> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Dispatch for NotificationState {
    fn dispatch(&self, frame: &Value) {
        match NotificationEvent::decode(frame) {
            Ok(NotificationEvent::Notification(n)) => {
                let alert = Alert::from(&n);
                self.inbox().receive(n);
                self.sink.show(&alert);
            }
            Ok(NotificationEvent::Unknown { kind }) => debug!(%kind, "notifications: ignoring unknown frame"),
            Err(e) => warn!(error = %e, "notifications: dropping undecodable frame"),
        }
    }
}

/// Shared handle to the user's notification stream.
#[derive(Clone)]
pub struct NotificationCenter {
    binding: Arc<Mutex<ChannelBinding<NotificationState>>>,
    state: Arc<NotificationState>,
}

impl NotificationCenter {
    pub fn new(factory: ChannelFactory, sink: Arc<dyn AlertSink>) -> Self {
        let state = Arc::new(NotificationState {
            inbox: Mutex::new(NotificationInbox::default()),
            sink,
        });
        let binding = ChannelBinding::new(factory, ChannelKind::Notifications, Arc::clone(&state));
        Self { binding: Arc::new(Mutex::new(binding)), state }
    }

    fn lock_binding(&self) -> MutexGuard<'_, ChannelBinding<NotificationState>> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect the stream for `user_id`, replacing any previous user's.
    pub fn start(&self, user_id: Option<&str>, token: Option<&str>) -> bool {
        let mut binding = self.lock_binding();
        if binding.resource_id() != user_id {
            *self.state.inbox() = NotificationInbox::default();
        }
        binding.mount(user_id, token)
    }

    pub fn stop(&self) {
        self.lock_binding().unmount();
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock_binding().is_connected()
    }

    /// # Errors
    ///
    /// See [`ChannelBinding::wait_connected`].
    pub async fn wait_connected(&self) -> Result<(), TransportError> {
        let connection = self.lock_binding().connection().cloned();
        match connection {
            Some(c) => c.wait_open().await,
            None => Err(TransportError::WsClosed),
        }
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.state.inbox().items().to_vec()
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.state.inbox().unread_count()
    }

    pub fn seed(&self, backlog: Vec<Notification>) {
        self.state.inbox().seed(backlog);
    }

    pub fn mark_as_read(&self, id: &Id) -> bool {
        self.state.inbox().mark_as_read(id)
    }

    pub fn mark_all_as_read(&self) {
        self.state.inbox().mark_all_as_read();
    }

    pub fn clear_notification(&self, id: &Id) -> Option<Notification> {
        self.state.inbox().clear(id)
    }
}

#[cfg(test)]
#[path = "notifications_test.rs"]
mod tests;
