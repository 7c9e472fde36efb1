//! `as-stream`: streaming state synchronization for assistant runs.
//!
//! A run executes a callback against a fresh state tree.  The callback
//! mutates state through a [`RunController`]; mutations apply immediately
//! and are batched into `update-state` chunks, one per scheduler tick.
//! The consumer pulls chunks from the returned [`RunStream`] and may close
//! it early, which cancels the callback (cooperatively, then by force).
//!
//! # Usage
//!
//! ```rust,ignore
//! use as_stream::{create_run_with, RunOptions};
//! use futures_util::StreamExt;
//!
//! let options = RunOptions::default().with_state(json!({ "messages": [] }));
//! let mut run = create_run_with(options, |controller| async move {
//!     controller.state().at("messages").push(json!({ "role": "user" }))?;
//!     controller.append_text("hello");
//!     Ok(())
//! });
//!
//! while let Some(chunk) = run.next().await {
//!     println!("{}", chunk.kind());
//! }
//! ```

pub mod cancel;
pub mod controller;
pub mod data_stream;
pub mod manager;
pub mod proxy;
pub mod run;
pub mod tree;

// Re-exports for convenience.
pub use cancel::CancelSignal;
pub use controller::RunController;
pub use manager::{FlushScheduler, StateManager, UpdateSink};
pub use proxy::StateProxy;
pub use run::{create_run, create_run_with, RunOptions, RunPhase, RunStream};
pub use tree::StateTree;
