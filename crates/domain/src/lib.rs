//! `as-domain`: shared types for the assistant-stream workspace.
//!
//! - [`operation`]: path-addressed state mutations (`Set`, `AppendText`).
//! - [`chunk`]: the units of a run's output sequence.
//! - [`config`]: TOML configuration tree.
//! - [`error`]: the shared error type.

pub mod chunk;
pub mod config;
pub mod error;
pub mod operation;
pub mod stream;

pub use chunk::{Chunk, UpdateChunk};
pub use error::{Error, Result};
pub use operation::{path, Operation};
