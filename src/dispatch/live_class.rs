//! Live-class room: presence, chat, typing and the poll/question/reaction
//! update stream for one class.
//!
//! PRESENCE
//! ========
//! The online list is a cache. `user_joined` appends (no dedup by id),
//! `user_left` removes every entry with that id, and `online_users` replaces
//! the whole list. Whichever frame arrives last wins.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use frames::{ChatMessage, ClientFrame, Id, LiveClassEvent, LiveClassUpdate, OnlineUser};
use serde_json::Value;
use tracing::{debug, warn};

use super::binding::{ChannelBinding, Dispatch};
use super::typing::TypingIndicator;
use crate::channels::{ChannelFactory, ChannelKind};
use crate::transport::TransportError;

/// Callbacks for live-class events. Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait LiveClassListener: Send + Sync + 'static {
    fn poll_created(&self, poll: &Value) {}
    fn poll_updated(&self, poll: &Value) {}
    fn poll_status_changed(&self, poll: &Value) {}
    fn new_question(&self, question: &Value) {}
    fn question_answered(&self, question: &Value) {}
    fn question_upvoted(&self, question: &Value) {}
    fn reaction(&self, reaction: &Value) {}
    fn chat_message(&self, message: &ChatMessage) {}
    fn presence_changed(&self, users: &[OnlineUser]) {}
    fn typing_changed(&self, users: &[OnlineUser]) {}
    fn connection_changed(&self, connected: bool) {}
}

impl LiveClassListener for () {}

pub struct LiveClassState<L: LiveClassListener> {
    listener: Arc<L>,
    online: Mutex<Vec<OnlineUser>>,
    typing: TypingIndicator,
}

impl<L: LiveClassListener> LiveClassState<L> {
    fn new(listener: Arc<L>, typing_timeout: Duration) -> Self {
        let typing_listener = Arc::clone(&listener);
        Self {
            listener,
            online: Mutex::new(Vec::new()),
            typing: TypingIndicator::new(typing_timeout, move |users| typing_listener.typing_changed(users)),
        }
    }

    fn update_presence(&self, f: impl FnOnce(&mut Vec<OnlineUser>)) {
        let snapshot = {
            let mut online = self.online.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut online);
            online.clone()
        };
        self.listener.presence_changed(&snapshot);
    }

    fn reset(&self) {
        self.online.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.typing.clear();
    }

    fn apply(&self, event: LiveClassEvent) {
        match event {
            LiveClassEvent::Update(update) => self.apply_update(update),
            LiveClassEvent::ChatMessage(message) => self.listener.chat_message(&message),
            LiveClassEvent::UserJoined(user) => self.update_presence(|online| online.push(user)),
            LiveClassEvent::UserLeft { user_id } => {
                self.update_presence(|online| online.retain(|u| u.user_id != user_id));
            }
            LiveClassEvent::OnlineUsers(users) => self.update_presence(|online| *online = users),
            LiveClassEvent::UserTyping(user) => self.typing.start(user),
            LiveClassEvent::UserStoppedTyping { user_id } => self.typing.stop(&user_id),
            LiveClassEvent::Unknown { kind } => debug!(%kind, "live-class: ignoring unknown frame"),
        }
    }

    fn apply_update(&self, update: LiveClassUpdate) {
        let l = &self.listener;
        match update {
            LiveClassUpdate::PollCreated(v) => l.poll_created(&v),
            LiveClassUpdate::PollUpdated(v) => l.poll_updated(&v),
            LiveClassUpdate::PollStatusChanged(v) => l.poll_status_changed(&v),
            LiveClassUpdate::NewQuestion(v) => l.new_question(&v),
            LiveClassUpdate::QuestionAnswered(v) => l.question_answered(&v),
            LiveClassUpdate::QuestionUpvoted(v) => l.question_upvoted(&v),
            LiveClassUpdate::Reaction(v) => l.reaction(&v),
            LiveClassUpdate::Unknown { update_type } => {
                debug!(%update_type, "live-class: ignoring unknown update");
            }
        }
    }
}

impl<L: LiveClassListener> Dispatch for LiveClassState<L> {
    fn dispatch(&self, frame: &Value) {
        match LiveClassEvent::decode(frame) {
            Ok(event) => self.apply(event),
            Err(e) => warn!(error = %e, "live-class: dropping undecodable frame"),
        }
    }

    fn connection_changed(&self, connected: bool) {
        self.listener.connection_changed(connected);
    }
}

/// One live-class membership. Join a class, observe it through the listener,
/// leave or drop to disconnect.
pub struct LiveClassRoom<L: LiveClassListener = ()> {
    binding: ChannelBinding<LiveClassState<L>>,
}

impl<L: LiveClassListener> LiveClassRoom<L> {
    pub fn new(factory: ChannelFactory, listener: L, typing_timeout: Duration) -> Self {
        let state = Arc::new(LiveClassState::new(Arc::new(listener), typing_timeout));
        Self { binding: ChannelBinding::new(factory, ChannelKind::LiveClass, state) }
    }

    /// Connect to `class_id`, leaving any previous class first. Local
    /// presence and typing state start empty.
    pub fn join(&mut self, class_id: Option<&str>, token: Option<&str>) -> bool {
        self.binding.unmount();
        self.binding.dispatcher().reset();
        self.binding.mount(class_id, token)
    }

    pub fn leave(&mut self) {
        self.binding.unmount();
        self.binding.dispatcher().reset();
    }

    #[must_use]
    pub fn class_id(&self) -> Option<&str> {
        self.binding.resource_id()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.binding.is_connected()
    }

    /// Wait for the class connection to open.
    ///
    /// # Errors
    ///
    /// See [`ChannelBinding::wait_connected`].
    pub async fn wait_connected(&self) -> Result<(), TransportError> {
        self.binding.wait_connected().await
    }

    #[must_use]
    pub fn listener(&self) -> &L {
        &self.binding.dispatcher().listener
    }

    #[must_use]
    pub fn online_users(&self) -> Vec<OnlineUser> {
        self.binding.dispatcher().online.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn typing_users(&self) -> Vec<OnlineUser> {
        self.binding.dispatcher().typing.users()
    }

    #[must_use]
    pub fn is_typing(&self, user_id: &Id) -> bool {
        self.binding.dispatcher().typing.is_typing(user_id)
    }

    pub fn send_chat_message(&self, message: &str) -> bool {
        self.binding.send(&ClientFrame::ChatMessage { message: message.to_owned() })
    }

    pub fn start_typing(&self) -> bool {
        self.binding.send(&ClientFrame::Typing)
    }

    pub fn stop_typing(&self) -> bool {
        self.binding.send(&ClientFrame::StopTyping)
    }
}

#[cfg(test)]
#[path = "live_class_test.rs"]
mod tests;
