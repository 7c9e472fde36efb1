//! Run cancellation: an owner-side token and a read-only signal.
//!
//! The orchestrator holds the [`CancelToken`] and is the only party that
//! can trip it.  The callback sees a [`CancelSignal`], which can be polled
//! with [`CancelSignal::is_cancelled`] or awaited with
//! [`CancelSignal::cancelled`].  Once tripped, the flag never resets.

use tokio_util::sync::CancellationToken;

/// Owner side of a run's cancellation flag.
pub(crate) struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub(crate) fn new() -> Self {
        Self {
            inner: CancellationToken::new(),
        }
    }

    /// Signal cancellation.  Idempotent.
    pub(crate) fn cancel(&self) {
        self.inner.cancel();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// A read-only view for the callback.
    pub(crate) fn signal(&self) -> CancelSignal {
        CancelSignal {
            inner: self.inner.clone(),
        }
    }
}

/// Read-only view of a run's cancellation flag.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    inner: CancellationToken,
}

impl CancelSignal {
    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once cancellation has been requested (immediately if it
    /// already has been).
    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }
}
