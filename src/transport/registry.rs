//! Message-type → handler table.
//!
//! Handlers are stored as `Arc`s so removal can match by identity, the same
//! way a callback reference is matched. Registering a handler twice stores it
//! twice and it runs twice.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// Type key that receives every inbound frame.
pub const WILDCARD: &str = "*";

/// Callback invoked with each matching inbound frame.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Wrap a closure as a [`Handler`]. Keep the returned `Arc` to remove it later.
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Default)]
pub(crate) struct HandlerRegistry {
    by_type: HashMap<String, Vec<Handler>>,
}

impl HandlerRegistry {
    pub(crate) fn on(&mut self, kind: &str, handler: Handler) {
        self.by_type.entry(kind.to_owned()).or_default().push(handler);
    }

    /// Remove the first registration of `handler` under `kind`.
    pub(crate) fn off(&mut self, kind: &str, handler: &Handler) -> bool {
        let Some(handlers) = self.by_type.get_mut(kind) else {
            return false;
        };
        let Some(index) = handlers.iter().position(|h| Arc::ptr_eq(h, handler)) else {
            return false;
        };
        handlers.remove(index);
        if handlers.is_empty() {
            self.by_type.remove(kind);
        }
        true
    }

    /// Snapshot of handlers for a frame: type-specific ones in registration
    /// order, then wildcard ones. Frames without a type only reach wildcards.
    pub(crate) fn matching(&self, kind: Option<&str>) -> Vec<Handler> {
        let typed = kind
            .filter(|k| *k != WILDCARD)
            .and_then(|k| self.by_type.get(k))
            .into_iter()
            .flatten();
        let wildcard = self.by_type.get(WILDCARD).into_iter().flatten();
        typed.chain(wildcard).cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.by_type.clear();
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
