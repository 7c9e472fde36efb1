//! The callback-facing side of a run.

use serde_json::Value;
use tokio::sync::mpsc;

use as_domain::error::Result;
use as_domain::{Chunk, Operation};

use crate::cancel::CancelSignal;
use crate::proxy::{SharedManager, StateProxy};

/// Handed to the run callback.  Cloneable, so helpers and spawned
/// sub-tasks can mutate state too; all writes still funnel through the
/// run's single state manager.
#[derive(Clone)]
pub struct RunController {
    manager: SharedManager,
    chunks: mpsc::UnboundedSender<Chunk>,
    cancel: CancelSignal,
}

impl RunController {
    pub(crate) fn new(
        manager: SharedManager,
        chunks: mpsc::UnboundedSender<Chunk>,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            manager,
            chunks,
            cancel,
        }
    }

    /// Mutable view of the whole state tree.
    pub fn state(&self) -> StateProxy {
        StateProxy::new(self.manager.clone(), Vec::new())
    }

    /// Snapshot of the value at `path`.
    pub fn get(&self, path: &[String]) -> Result<Value> {
        self.manager.lock().get(path).cloned()
    }

    pub fn set_at(&self, path: Vec<String>, value: impl Into<Value>) -> Result<()> {
        self.add_operations([Operation::set(path, value)])
    }

    pub fn append_text_at(&self, path: Vec<String>, text: impl Into<String>) -> Result<()> {
        self.add_operations([Operation::append_text(path, text)])
    }

    /// Submit pre-built operations, in order.
    pub fn add_operations(&self, operations: impl IntoIterator<Item = Operation>) -> Result<()> {
        self.manager.lock().apply_and_queue(operations)
    }

    /// Emit a `text-delta` chunk right away.
    ///
    /// Text deltas are not part of the state tree and are never batched.
    pub fn append_text(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::trace!(len = text.len(), "text delta");
        if self.chunks.send(Chunk::text_delta(text)).is_err() {
            tracing::trace!("text delta dropped: run output already closed");
        }
    }

    /// Read-only, awaitable cancellation flag.
    pub fn cancelled_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use as_domain::path;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::Notify;

    use crate::cancel::CancelToken;
    use crate::manager::StateManager;

    fn controller(
        initial: Value,
    ) -> (RunController, mpsc::UnboundedReceiver<Chunk>, CancelToken) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Mutex::new(StateManager::new(
            initial,
            Arc::new(Notify::new()),
            Box::new(|_| {}),
        )));
        let token = CancelToken::new();
        (RunController::new(manager, tx, token.signal()), rx, token)
    }

    #[test]
    fn append_text_sends_delta_immediately() {
        let (c, mut rx, _) = controller(json!({}));
        c.append_text("hi");
        assert_eq!(rx.try_recv().unwrap(), Chunk::text_delta("hi"));
    }

    #[test]
    fn append_text_after_close_is_silent() {
        let (c, rx, _) = controller(json!({}));
        drop(rx);
        c.append_text("lost");
    }

    #[test]
    fn writes_are_visible_on_return() {
        let (c, _, _) = controller(json!({"a": {"b": "x"}}));
        c.append_text_at(path(["a", "b"]), "y").unwrap();
        assert_eq!(c.get(&path(["a", "b"])).unwrap(), json!("xy"));
        c.set_at(path(["a", "c"]), 1).unwrap();
        assert_eq!(c.state().at("a").get().unwrap(), json!({"b": "xy", "c": 1}));
    }

    #[test]
    fn cancellation_is_read_only_snapshot() {
        let (c, _, token) = controller(json!({}));
        let signal = c.cancelled_signal();
        assert!(!c.is_cancelled());
        token.cancel();
        assert!(c.is_cancelled());
        assert!(signal.is_cancelled());
    }
}
