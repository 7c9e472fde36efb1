//! Path-addressed state mutations.
//!
//! A path is an ordered list of string keys; the empty path is the tree root.
//! Sequence elements are addressed by their decimal index (`"0"`, `"1"`, ...).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single mutation of the state tree.
///
/// Serialized as `{"type":"set",...}` / `{"type":"append-text",...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Operation {
    /// Unconditionally assign `value` at `path`.
    Set { path: Vec<String>, value: Value },

    /// Concatenate `value` onto the existing string at `path`.
    AppendText { path: Vec<String>, value: String },
}

impl Operation {
    pub fn set(path: Vec<String>, value: impl Into<Value>) -> Self {
        Self::Set {
            path,
            value: value.into(),
        }
    }

    pub fn append_text(path: Vec<String>, value: impl Into<String>) -> Self {
        Self::AppendText {
            path,
            value: value.into(),
        }
    }

    pub fn path(&self) -> &[String] {
        match self {
            Self::Set { path, .. } | Self::AppendText { path, .. } => path,
        }
    }
}

/// Build an owned path from anything that yields string-ish segments.
///
/// ```
/// use as_domain::path;
/// assert_eq!(path(["messages", "0"]), vec!["messages".to_string(), "0".to_string()]);
/// ```
pub fn path<I, S>(segments: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    segments.into_iter().map(Into::into).collect()
}
