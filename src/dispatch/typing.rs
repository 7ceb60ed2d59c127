//! Ephemeral "is typing" set with timed expiry.
//!
//! A user enters the set on a typing frame and leaves it on an explicit stop
//! frame or when the timeout elapses without a fresh typing frame. Every
//! typing frame restarts that user's timer, so a continuous typist stays in
//! the set.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use frames::{Id, OnlineUser};
use tokio::task::JoinHandle;
use tracing::debug;

type ChangeFn = Box<dyn Fn(&[OnlineUser]) + Send + Sync>;

pub struct TypingIndicator {
    inner: Arc<Inner>,
}

struct Inner {
    timeout: Duration,
    on_change: ChangeFn,
    state: Mutex<TypingState>,
}

#[derive(Default)]
struct TypingState {
    users: Vec<OnlineUser>,
    timers: HashMap<Id, (u64, JoinHandle<()>)>,
    next_timer: u64,
}

impl TypingIndicator {
    /// `on_change` receives the full set after every membership change.
    pub fn new<F>(timeout: Duration, on_change: F) -> Self
    where
        F: Fn(&[OnlineUser]) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                timeout,
                on_change: Box::new(on_change),
                state: Mutex::new(TypingState::default()),
            }),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Record a typing frame from `user` and (re)start its expiry timer.
    pub fn start(&self, user: OnlineUser) {
        let changed = {
            let mut state = self.inner.lock();
            let changed = if state.users.iter().any(|u| u.user_id == user.user_id) {
                false
            } else {
                state.users.push(user.clone());
                true
            };

            state.next_timer = state.next_timer.wrapping_add(1);
            let timer_id = state.next_timer;
            if let Some((_, old)) = state.timers.remove(&user.user_id) {
                old.abort();
            }
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let weak = Arc::downgrade(&self.inner);
                    let user_id = user.user_id.clone();
                    let timeout = self.inner.timeout;
                    let handle = runtime.spawn(async move {
                        tokio::time::sleep(timeout).await;
                        expire(&weak, &user_id, timer_id);
                    });
                    state.timers.insert(user.user_id, (timer_id, handle));
                }
                Err(_) => debug!(user_id = %user.user_id, "typing: no runtime, expiry timer not scheduled"),
            }
            changed.then(|| state.users.clone())
        };
        if let Some(users) = changed {
            (self.inner.on_change)(&users);
        }
    }

    /// Remove `user_id` now. A stop for a user not in the set is a no-op.
    pub fn stop(&self, user_id: &Id) {
        let changed = self.inner.remove(user_id, None);
        if let Some(users) = changed {
            (self.inner.on_change)(&users);
        }
    }

    /// Snapshot of users currently typing, in arrival order.
    #[must_use]
    pub fn users(&self) -> Vec<OnlineUser> {
        self.inner.lock().users.clone()
    }

    #[must_use]
    pub fn is_typing(&self, user_id: &Id) -> bool {
        self.inner.lock().users.iter().any(|u| &u.user_id == user_id)
    }

    /// Empty the set and cancel every timer without notifying.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.users.clear();
        for (_, (_, handle)) in state.timers.drain() {
            handle.abort();
        }
    }
}

fn expire(weak: &Weak<Inner>, user_id: &Id, timer_id: u64) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    if let Some(users) = inner.remove(user_id, Some(timer_id)) {
        debug!(user_id = %user_id, "typing: indicator expired");
        (inner.on_change)(&users);
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, TypingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove a user. With `timer_id`, only if that timer is still current.
    /// Returns the new set when membership changed.
    fn remove(&self, user_id: &Id, timer_id: Option<u64>) -> Option<Vec<OnlineUser>> {
        let mut state = self.lock();
        if let Some(expected) = timer_id {
            match state.timers.get(user_id) {
                Some((current, _)) if *current == expected => {}
                _ => return None,
            }
        }
        if let Some((_, handle)) = state.timers.remove(user_id) {
            if timer_id.is_none() {
                handle.abort();
            }
        }
        let before = state.users.len();
        state.users.retain(|u| &u.user_id != user_id);
        (state.users.len() != before).then(|| state.users.clone())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, (_, handle)) in state.timers.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "typing_test.rs"]
mod tests;
