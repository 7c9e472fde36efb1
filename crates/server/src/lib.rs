//! `as-server`: HTTP transport backend for assistant-stream runs.
//!
//! Mounts a run on `POST /assistant` and streams its chunks back in the
//! data-stream wire encoding.

pub mod api;
pub mod cli;
pub mod state;

pub use state::AppState;
