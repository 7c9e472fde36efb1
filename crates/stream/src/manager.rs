//! Batching state manager.
//!
//! Operations are applied to the tree as soon as they are submitted and
//! queued for the next flush.  The first submission after a flush asks the
//! [`FlushScheduler`] for exactly one deferred flush; everything submitted
//! before that flush runs lands in the same [`UpdateChunk`].

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Notify;

use as_domain::error::Result;
use as_domain::{Operation, UpdateChunk};

use crate::tree::StateTree;

/// Receives each drained batch.
pub type UpdateSink = Box<dyn FnMut(UpdateChunk) + Send>;

/// Arranges for [`StateManager::flush`] to run on the owning scheduler
/// at some later point.  Called at most once per flush cycle.
pub trait FlushScheduler: Send + Sync {
    fn schedule_flush(&self);
}

impl FlushScheduler for Notify {
    fn schedule_flush(&self) {
        self.notify_one();
    }
}

pub struct StateManager {
    tree: StateTree,
    pending: Vec<Operation>,
    flush_scheduled: bool,
    scheduler: Arc<dyn FlushScheduler>,
    sink: UpdateSink,
}

impl StateManager {
    pub fn new(initial: Value, scheduler: Arc<dyn FlushScheduler>, sink: UpdateSink) -> Self {
        Self {
            tree: StateTree::new(initial),
            pending: Vec::new(),
            flush_scheduled: false,
            scheduler,
            sink,
        }
    }

    pub fn tree(&self) -> &StateTree {
        &self.tree
    }

    pub fn get(&self, path: &[String]) -> Result<&Value> {
        self.tree.get(path)
    }

    /// Operations waiting for the next flush.
    pub fn pending(&self) -> &[Operation] {
        &self.pending
    }

    pub fn is_flush_scheduled(&self) -> bool {
        self.flush_scheduled
    }

    /// Apply each operation to the tree, then queue it.
    ///
    /// Stops at the first operation that fails.  Operations before it stay
    /// applied and queued, so the emitted batch always matches the tree.
    pub fn apply_and_queue(
        &mut self,
        operations: impl IntoIterator<Item = Operation>,
    ) -> Result<()> {
        let mut outcome = Ok(());
        let mut queued = 0usize;
        for operation in operations {
            if let Err(e) = self.tree.apply(&operation) {
                outcome = Err(e);
                break;
            }
            self.pending.push(operation);
            queued += 1;
        }

        if queued > 0 && !self.flush_scheduled {
            self.flush_scheduled = true;
            self.scheduler.schedule_flush();
        }
        outcome
    }

    /// Drain the pending batch into the sink as one chunk.
    ///
    /// Returns the number of operations emitted.  Always clears the
    /// scheduled flag so the next submission schedules a fresh flush.
    pub fn flush(&mut self) -> usize {
        let count = self.pending.len();
        if count > 0 {
            let operations = std::mem::take(&mut self.pending);
            (self.sink)(UpdateChunk { operations });
            tracing::debug!(operations = count, "state batch flushed");
        }
        self.flush_scheduled = false;
        count
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use as_domain::error::Error;
    use as_domain::path;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct CountingScheduler {
        calls: AtomicUsize,
    }

    impl FlushScheduler for CountingScheduler {
        fn schedule_flush(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager(
        initial: Value,
    ) -> (StateManager, Arc<CountingScheduler>, Arc<Mutex<Vec<UpdateChunk>>>) {
        let scheduler = Arc::new(CountingScheduler::default());
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let sink_emitted = emitted.clone();
        let m = StateManager::new(
            initial,
            scheduler.clone(),
            Box::new(move |chunk| sink_emitted.lock().push(chunk)),
        );
        (m, scheduler, emitted)
    }

    #[test]
    fn mutation_visible_before_flush() {
        let (mut m, _, emitted) = manager(json!({}));
        m.apply_and_queue([Operation::set(path(["a"]), 1)]).unwrap();
        assert_eq!(m.get(&path(["a"])).unwrap(), &json!(1));
        assert!(emitted.lock().is_empty());
        assert_eq!(m.pending().len(), 1);
    }

    #[test]
    fn many_submissions_schedule_one_flush() {
        let (mut m, scheduler, emitted) = manager(json!({"n": ""}));
        for i in 0..10 {
            m.apply_and_queue([Operation::append_text(path(["n"]), i.to_string())])
                .unwrap();
        }
        assert_eq!(scheduler.calls.load(Ordering::SeqCst), 1);
        assert!(m.is_flush_scheduled());

        assert_eq!(m.flush(), 10);
        let emitted = emitted.lock();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].operations.len(), 10);
    }

    #[test]
    fn batch_preserves_submission_order() {
        let (mut m, _, emitted) = manager(json!({}));
        let ops = vec![
            Operation::set(path(["a"]), 1),
            Operation::set(path(["b"]), "x"),
            Operation::append_text(path(["b"]), "y"),
            Operation::set(path(["a"]), 2),
        ];
        m.apply_and_queue(ops.clone()).unwrap();
        m.flush();
        assert_eq!(emitted.lock()[0].operations, ops);
    }

    #[test]
    fn flush_clears_flag_and_allows_rescheduling() {
        let (mut m, scheduler, emitted) = manager(json!({}));
        m.apply_and_queue([Operation::set(path(["a"]), 1)]).unwrap();
        m.flush();
        assert!(!m.is_flush_scheduled());

        m.apply_and_queue([Operation::set(path(["b"]), 2)]).unwrap();
        assert_eq!(scheduler.calls.load(Ordering::SeqCst), 2);
        m.flush();
        assert_eq!(emitted.lock().len(), 2);
    }

    #[test]
    fn empty_flush_emits_nothing() {
        let (mut m, _, emitted) = manager(json!({}));
        assert_eq!(m.flush(), 0);
        assert!(emitted.lock().is_empty());
    }

    #[test]
    fn failed_operation_is_not_queued() {
        let (mut m, scheduler, _) = manager(json!({"count": 1}));
        let err = m
            .apply_and_queue([Operation::append_text(path(["count"]), "x")])
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(m.pending().is_empty());
        assert_eq!(scheduler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(m.tree().root(), &json!({"count": 1}));
    }

    #[test]
    fn failure_mid_batch_keeps_earlier_operations() {
        let (mut m, _, _) = manager(json!({}));
        let err = m
            .apply_and_queue([
                Operation::set(path(["a"]), 1),
                Operation::set(path(["missing", "b"]), 2),
                Operation::set(path(["c"]), 3),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::PathNotFound { .. }));
        assert_eq!(m.pending(), [Operation::set(path(["a"]), 1)]);
        assert_eq!(m.tree().root(), &json!({"a": 1}));
    }

    #[test]
    fn replaying_a_batch_reproduces_the_tree() {
        let initial = json!({"messages": [], "title": ""});
        let (mut m, _, emitted) = manager(initial.clone());
        m.apply_and_queue([
            Operation::set(path(["messages", "0"]), json!({"role": "user", "parts": []})),
            Operation::set(path(["messages", "0", "parts", "0"]), json!({"text": "a"})),
            Operation::append_text(path(["messages", "0", "parts", "0", "text"]), "b"),
            Operation::append_text(path(["title"]), "t"),
        ])
        .unwrap();
        m.flush();

        let mut replay = StateTree::new(initial);
        for op in &emitted.lock()[0].operations {
            replay.apply(op).unwrap();
        }
        assert_eq!(&replay, m.tree());
    }
}
