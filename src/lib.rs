//! Realtime client layer for the classroom platform.
//!
//! ARCHITECTURE
//! ============
//! - [`transport`]: one reconnecting WebSocket per [`transport::Connection`],
//!   JSON frames dispatched by `type` to registered handlers.
//! - [`channels`]: endpoint templates per server resource.
//! - [`dispatch`]: typed consumers (live class, discussion, notifications)
//!   bound to a channel through a mount/unmount lifecycle.
//! - [`progress`]: resumable session checkpoints with debounced autosave.
//! - [`realtime`]: the context object tying the above to one configuration.
//! - [`api`]: the few REST calls the notification inbox needs.

pub mod api;
pub mod channels;
pub mod config;
pub mod dispatch;
pub mod progress;
pub mod realtime;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use frames;
