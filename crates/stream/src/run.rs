//! Run orchestration. Bridges a background callback task to a
//! pull-driven [`RunStream`] of chunks.
//!
//! Lifecycle: `Running → (Completing | Cancelling) → Closed`.  Setup
//! happens inside [`create_run_with`], so a returned stream is already
//! running.
//!
//! - The callback runs inside one spawned task together with the flush
//!   loop.  The loop only flushes when the callback yields, so every
//!   mutation made between two suspension points lands in one batch.
//! - Normal return forces a last flush, then sends `finish` (or `error`
//!   when the callback failed or panicked).
//! - [`RunStream::close`] before completion trips the cancellation signal,
//!   waits up to the grace window, then aborts the task and waits for it
//!   to unwind.  When `close` returns, the task is gone.
//! - The grace window (`run.cancel_grace_ms`) is the callback's bounded
//!   opportunity to stop on its own; a callback that stops checking the
//!   signal cannot extend it.
//! - The join handle stays owned by the stream until the task has been
//!   joined, so an interrupted `close` leaves it for a later `close` or
//!   for `Drop` to reap.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use futures_core::stream::{FusedStream, Stream};
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tokio::task::{JoinError, JoinHandle};
use tracing::Instrument;
use uuid::Uuid;

use as_domain::config::RunConfig;
use as_domain::Chunk;

use crate::cancel::CancelToken;
use crate::controller::RunController;
use crate::manager::StateManager;
use crate::proxy::SharedManager;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Options & phase
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Chunks are flowing.
    Running,
    /// The terminal chunk has been delivered; the next pull joins the task.
    Completing,
    /// `close()` is stopping the task.
    Cancelling,
    /// Nothing more will be produced.
    Closed,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Seed for the state tree.  Defaults to an empty mapping.
    pub initial_state: Option<Value>,
    /// Window between the cancellation signal and forced abort.
    pub cancel_grace: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from(&RunConfig::default())
    }
}

impl From<&RunConfig> for RunOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            initial_state: None,
            cancel_grace: config.cancel_grace(),
        }
    }
}

impl RunOptions {
    pub fn with_state(mut self, state: Value) -> Self {
        self.initial_state = Some(state);
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// create_run
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Start a run with default options.  Must be called inside a Tokio runtime.
pub fn create_run<F, Fut>(callback: F) -> RunStream
where
    F: FnOnce(RunController) -> Fut,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    create_run_with(RunOptions::default(), callback)
}

/// Start a run: build the state manager and controller, then spawn the
/// callback as a background task.
pub fn create_run_with<F, Fut>(options: RunOptions, callback: F) -> RunStream
where
    F: FnOnce(RunController) -> Fut,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let run_id = Uuid::new_v4();
    let (tx, rx) = mpsc::unbounded_channel::<Chunk>();
    let wake = Arc::new(Notify::new());

    let sink_tx = tx.clone();
    let initial = options
        .initial_state
        .unwrap_or_else(|| Value::Object(Default::default()));
    let manager: SharedManager = Arc::new(Mutex::new(StateManager::new(
        initial,
        wake.clone(),
        Box::new(move |update| {
            let _ = sink_tx.send(Chunk::UpdateState(update));
        }),
    )));

    let cancel = CancelToken::new();
    let controller = RunController::new(manager.clone(), tx.clone(), cancel.signal());
    let callback = callback(controller);
    let returned = Arc::new(AtomicBool::new(false));

    let span = tracing::info_span!("run", %run_id);
    let driver = drive(callback, manager, wake, tx, returned.clone());
    let task = tokio::spawn(driver.instrument(span));

    RunStream {
        run_id,
        rx,
        task: Some(task),
        cancel,
        returned,
        cancel_grace: options.cancel_grace,
        phase: RunPhase::Running,
    }
}

/// Poll the callback and flush whenever it yields with a batch pending.
async fn drive<Fut>(
    callback: Fut,
    manager: SharedManager,
    wake: Arc<Notify>,
    chunks: mpsc::UnboundedSender<Chunk>,
    returned: Arc<AtomicBool>,
) where
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    tracing::debug!("run started");
    let callback = AssertUnwindSafe(callback).catch_unwind();
    tokio::pin!(callback);

    let outcome = loop {
        tokio::select! {
            biased;
            outcome = &mut callback => break outcome,
            () = wake.notified() => {
                manager.lock().flush();
            }
        }
    };
    returned.store(true, Ordering::Release);

    manager.lock().flush();

    let terminal = match outcome {
        Ok(Ok(())) => {
            tracing::debug!("run completed");
            Chunk::Finish
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "run callback failed");
            Chunk::error(format!("{e:#}"))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::warn!(error = %message, "run callback panicked");
            Chunk::error(message)
        }
    };
    let _ = chunks.send(terminal);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("callback panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("callback panicked: {s}")
    } else {
        "callback panicked".to_owned()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RunStream
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Forward-only, single-consumer sequence of a run's chunks.
///
/// Call [`close`](Self::close) to stop early.  Dropping the stream without
/// closing it still cancels the run, but cannot wait for the task.
pub struct RunStream {
    run_id: Uuid,
    rx: mpsc::UnboundedReceiver<Chunk>,
    task: Option<JoinHandle<()>>,
    cancel: CancelToken,
    /// Set by the driver once the callback has returned (or panicked).
    returned: Arc<AtomicBool>,
    cancel_grace: Duration,
    phase: RunPhase,
}

impl RunStream {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Stop the run and release its resources.
    ///
    /// If the callback is still running it is asked to stop via the
    /// cancellation signal, and aborted once the grace window elapses.
    /// Returns only after the background task has terminated.  Closing
    /// a closed run does nothing.
    pub async fn close(&mut self) {
        if self.phase == RunPhase::Closed {
            return;
        }

        if let Some(task) = self.task.as_mut() {
            if self.returned.load(Ordering::Acquire) {
                log_join(self.run_id, task.await);
            } else {
                self.phase = RunPhase::Cancelling;
                self.cancel.cancel();
                stop(self.run_id, task, self.cancel_grace).await;
            }
            self.task = None;
        }

        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        self.phase = RunPhase::Closed;
    }
}

/// Wait out the grace window, then abort and wait for the unwind.
async fn stop(run_id: Uuid, task: &mut JoinHandle<()>, grace: Duration) {
    match tokio::time::timeout(grace, &mut *task).await {
        Ok(joined) => {
            tracing::debug!(%run_id, "run stopped cooperatively");
            log_join(run_id, joined);
        }
        Err(_) => {
            tracing::info!(
                %run_id,
                grace_ms = grace.as_millis() as u64,
                "callback ignored cancellation, aborting"
            );
            task.abort();
            log_join(run_id, task.await);
        }
    }
}

fn log_join(run_id: Uuid, joined: Result<(), JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => tracing::debug!(%run_id, "run task aborted"),
        // Panics raised while unwinding under abort are absorbed here.
        Err(e) => tracing::warn!(%run_id, error = %e, "run task panicked during shutdown"),
    }
}

impl Stream for RunStream {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Chunk>> {
        let this = &mut *self;
        loop {
            match this.phase {
                RunPhase::Closed | RunPhase::Cancelling => return Poll::Ready(None),
                RunPhase::Completing => {
                    if let Some(task) = this.task.as_mut() {
                        let joined = ready!(Pin::new(task).poll(cx));
                        log_join(this.run_id, joined);
                        this.task = None;
                    }
                    this.rx.close();
                    this.phase = RunPhase::Closed;
                    return Poll::Ready(None);
                }
                RunPhase::Running => {}
            }

            match ready!(this.rx.poll_recv(cx)) {
                Some(chunk) => {
                    if chunk.is_terminal() {
                        this.phase = RunPhase::Completing;
                    }
                    return Poll::Ready(Some(chunk));
                }
                None => this.phase = RunPhase::Completing,
            }
        }
    }
}

impl FusedStream for RunStream {
    fn is_terminated(&self) -> bool {
        self.phase == RunPhase::Closed
    }
}

impl Drop for RunStream {
    fn drop(&mut self) {
        let Some(mut task) = self.task.take() else {
            return;
        };
        // A returned callback needs no signal; the driver is about to exit.
        if task.is_finished() || self.returned.load(Ordering::Acquire) {
            return;
        }
        self.cancel.cancel();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(run_id = %self.run_id, "run stream dropped without close");
                let (run_id, grace) = (self.run_id, self.cancel_grace);
                handle.spawn(async move { stop(run_id, &mut task, grace).await });
            }
            Err(_) => task.abort(),
        }
    }
}

impl std::fmt::Debug for RunStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunStream")
            .field("run_id", &self.run_id)
            .field("phase", &self.phase)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
