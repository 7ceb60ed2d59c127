//! Channel consumers: decode frames into typed callbacks and keep the small
//! amount of derived state a UI needs (presence, typing, inbox).

mod binding;
mod discussion;
mod live_class;
mod notifications;
mod typing;

pub use binding::{ChannelBinding, Dispatch};
pub use discussion::{DiscussionListener, DiscussionRoom, DiscussionState};
pub use live_class::{LiveClassListener, LiveClassRoom, LiveClassState};
pub use notifications::{
    Alert, AlertSink, AlertStyle, LogAlertSink, NotificationCenter, NotificationInbox, NotificationState,
};
pub use typing::TypingIndicator;
