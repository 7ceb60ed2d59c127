//! Discussion-thread room: reply stream and typing indicators for one thread.

use std::sync::Arc;
use std::time::Duration;

use frames::{ClientFrame, DiscussionEvent, Id, OnlineUser};
use serde_json::Value;
use tracing::{debug, warn};

use super::binding::{ChannelBinding, Dispatch};
use super::typing::TypingIndicator;
use crate::channels::{ChannelFactory, ChannelKind};
use crate::transport::TransportError;

#[allow(unused_variables)]
pub trait DiscussionListener: Send + Sync + 'static {
    fn new_reply(&self, reply: &Value) {}
    fn reply_updated(&self, reply: &Value) {}
    fn reply_deleted(&self, reply_id: &Id) {}
    fn thread_updated(&self, thread: &Value) {}
    fn typing_changed(&self, users: &[OnlineUser]) {}
    fn connection_changed(&self, connected: bool) {}
}

impl DiscussionListener for () {}

pub struct DiscussionState<L: DiscussionListener> {
    listener: Arc<L>,
    typing: TypingIndicator,
}

impl<L: DiscussionListener> Dispatch for DiscussionState<L> {
    fn dispatch(&self, frame: &Value) {
        let event = match DiscussionEvent::decode(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "discussion: dropping undecodable frame");
                return;
            }
        };
        let l = &self.listener;
        match event {
            DiscussionEvent::NewReply(reply) => l.new_reply(&reply),
            DiscussionEvent::ReplyUpdated(reply) => l.reply_updated(&reply),
            DiscussionEvent::ReplyDeleted { reply_id } => l.reply_deleted(&reply_id),
            DiscussionEvent::ThreadUpdated(thread) => l.thread_updated(&thread),
            DiscussionEvent::UserTyping(user) => self.typing.start(user),
            DiscussionEvent::UserStoppedTyping { user_id } => self.typing.stop(&user_id),
            DiscussionEvent::Unknown { kind } => debug!(%kind, "discussion: ignoring unknown frame"),
        }
    }

    fn connection_changed(&self, connected: bool) {
        self.listener.connection_changed(connected);
    }
}

pub struct DiscussionRoom<L: DiscussionListener = ()> {
    binding: ChannelBinding<DiscussionState<L>>,
}

impl<L: DiscussionListener> DiscussionRoom<L> {
    pub fn new(factory: ChannelFactory, listener: L, typing_timeout: Duration) -> Self {
        let listener = Arc::new(listener);
        let typing_listener = Arc::clone(&listener);
        let state = DiscussionState {
            listener,
            typing: TypingIndicator::new(typing_timeout, move |users| typing_listener.typing_changed(users)),
        };
        Self { binding: ChannelBinding::new(factory, ChannelKind::Discussion, Arc::new(state)) }
    }

    /// Follow `thread_id`, leaving any previously open thread.
    pub fn open(&mut self, thread_id: Option<&str>, token: Option<&str>) -> bool {
        self.binding.unmount();
        self.binding.dispatcher().typing.clear();
        self.binding.mount(thread_id, token)
    }

    pub fn close(&mut self) {
        self.binding.unmount();
        self.binding.dispatcher().typing.clear();
    }

    #[must_use]
    pub fn thread_id(&self) -> Option<&str> {
        self.binding.resource_id()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.binding.is_connected()
    }

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
    pub fn typing_users(&self) -> Vec<OnlineUser> {
        self.binding.dispatcher().typing.users()
    }

    pub fn start_typing(&self) -> bool {
        self.binding.send(&ClientFrame::Typing)
    }

    pub fn stop_typing(&self) -> bool {
        self.binding.send(&ClientFrame::StopTyping)
    }
}

#[cfg(test)]
#[path = "discussion_test.rs"]
mod tests;
