//! Path-rooted mutable view over a run's state.
//!
//! Every write goes through [`StateManager::apply_and_queue`], so the order
//! of emitted operations is exactly the order of calls made on proxies.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use as_domain::error::{Error, Result};
use as_domain::Operation;

use crate::manager::StateManager;

pub(crate) type SharedManager = Arc<Mutex<StateManager>>;

/// A view of the state tree rooted at [`StateProxy::path`].
///
/// Proxies are cheap to clone and narrow with [`at`](Self::at) /
/// [`index`](Self::index); nothing is resolved until a read or write.
#[derive(Clone)]
pub struct StateProxy {
    manager: SharedManager,
    path: Vec<String>,
}

impl StateProxy {
    pub(crate) fn new(manager: SharedManager, path: Vec<String>) -> Self {
        Self { manager, path }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Narrow to a mapping key.
    pub fn at(&self, key: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(key.into());
        Self::new(self.manager.clone(), path)
    }

    /// Narrow to a sequence element.
    pub fn index(&self, index: usize) -> Self {
        self.at(index.to_string())
    }

    /// Narrow to the current last element of the sequence at this path.
    pub fn last(&self) -> Result<Self> {
        match self.len()? {
            0 => Err(Error::path_not_found(&self.path, "last")),
            n => Ok(self.index(n - 1)),
        }
    }

    /// Snapshot of the value at this path.
    pub fn get(&self) -> Result<Value> {
        self.manager.lock().get(&self.path).cloned()
    }

    pub fn exists(&self) -> bool {
        self.manager.lock().get(&self.path).is_ok()
    }

    /// Element count of a sequence or mapping, or char count of a string.
    pub fn len(&self) -> Result<usize> {
        let manager = self.manager.lock();
        match manager.get(&self.path)? {
            Value::Array(items) => Ok(items.len()),
            Value::Object(map) => Ok(map.len()),
            Value::String(s) => Ok(s.chars().count()),
            _ => Err(Error::type_mismatch(&self.path, "sequence, mapping or string")),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        self.submit(Operation::set(self.path.clone(), value))
    }

    pub fn append_text(&self, text: impl Into<String>) -> Result<()> {
        self.submit(Operation::append_text(self.path.clone(), text))
    }

    /// Assign `value` at `relative` below this proxy's path.
    pub fn set_at<I, S>(&self, relative: I, value: impl Into<Value>) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.submit(Operation::set(self.join(relative), value))
    }

    /// Append `text` to the string at `relative` below this proxy's path.
    pub fn append_text_at<I, S>(&self, relative: I, text: impl Into<String>) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.submit(Operation::append_text(self.join(relative), text))
    }

    /// Append `value` to the sequence at this path.
    ///
    /// Emitted as a `Set` at index `len`, so consumers replaying the batch
    /// need no extra operation kind.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let mut manager = self.manager.lock();
        let len = match manager.get(&self.path)? {
            Value::Array(items) => items.len(),
            _ => return Err(Error::type_mismatch(&self.path, "sequence")),
        };
        let mut path = self.path.clone();
        path.push(len.to_string());
        manager.apply_and_queue([Operation::set(path, value)])
    }

    fn submit(&self, operation: Operation) -> Result<()> {
        self.manager.lock().apply_and_queue([operation])
    }

    fn join<I, S>(&self, relative: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = self.path.clone();
        path.extend(relative.into_iter().map(Into::into));
        path
    }
}

impl std::fmt::Debug for StateProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateProxy").field("path", &self.path).finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
