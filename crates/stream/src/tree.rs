//! Path-qualified state tree.
//!
//! Writes never create missing parents and never leave a partial update
//! behind: every intermediate key is resolved before the single leaf
//! assignment is made, and the updater runs before that assignment.

use serde_json::Value;

use as_domain::error::{Error, Result};
use as_domain::Operation;

/// The nested JSON value a run mutates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateTree {
    root: Value,
}

impl StateTree {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    /// Value at `path`; the empty path is the root.
    pub fn get(&self, path: &[String]) -> Result<&Value> {
        let mut current = &self.root;
        for key in path {
            current = child(current, key).ok_or_else(|| Error::path_not_found(path, key))?;
        }
        Ok(current)
    }

    /// Replace the value at `path` with `updater(current)`.
    ///
    /// The updater receives `None` when the leaf key is absent.  Returning
    /// `Value::Null` for an absent leaf is a no-op: the key is not created.
    pub fn set<F>(&mut self, path: &[String], updater: F) -> Result<()>
    where
        F: FnOnce(Option<&Value>) -> Result<Value>,
    {
        match path.split_first() {
            None => {
                self.root = updater(Some(&self.root))?;
                Ok(())
            }
            Some((key, rest)) => update_in(&mut self.root, key, rest, path, updater),
        }
    }

    pub fn apply(&mut self, operation: &Operation) -> Result<()> {
        match operation {
            Operation::Set { path, value } => self.set(path, |_| Ok(value.clone())),
            Operation::AppendText { path, value } => self.set(path, |current| match current {
                Some(Value::String(existing)) => {
                    let mut joined = String::with_capacity(existing.len() + value.len());
                    joined.push_str(existing);
                    joined.push_str(value);
                    Ok(Value::String(joined))
                }
                _ => Err(Error::type_mismatch(path, "string")),
            }),
        }
    }
}

/// Resolve `key` in `node`, then either write the leaf or recurse into the
/// child with the remaining path.
fn update_in<F>(
    node: &mut Value,
    key: &str,
    rest: &[String],
    full: &[String],
    updater: F,
) -> Result<()>
where
    F: FnOnce(Option<&Value>) -> Result<Value>,
{
    let Some((next, tail)) = rest.split_first() else {
        return write_leaf(node, key, full, updater);
    };
    let child = child_mut(node, key).ok_or_else(|| Error::path_not_found(full, key))?;
    update_in(child, next, tail, full, updater)
}

fn write_leaf<F>(node: &mut Value, key: &str, full: &[String], updater: F) -> Result<()>
where
    F: FnOnce(Option<&Value>) -> Result<Value>,
{
    match node {
        Value::Object(map) => {
            match map.get_mut(key) {
                Some(slot) => *slot = updater(Some(&*slot))?,
                None => {
                    let value = updater(None)?;
                    if !value.is_null() {
                        map.insert(key.to_owned(), value);
                    }
                }
            }
            Ok(())
        }
        Value::Array(items) => {
            let index = parse_index(key).ok_or_else(|| Error::path_not_found(full, key))?;
            if let Some(slot) = items.get_mut(index) {
                *slot = updater(Some(&*slot))?;
            } else if index == items.len() {
                let value = updater(None)?;
                if !value.is_null() {
                    items.push(value);
                }
            } else {
                return Err(Error::path_not_found(full, key));
            }
            Ok(())
        }
        _ => Err(Error::path_not_found(full, key)),
    }
}

fn child<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(key),
        Value::Array(items) => parse_index(key).and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(key),
        Value::Array(items) => parse_index(key).and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// Canonical decimal indices only: `"01"` and `"+1"` are not indices.
fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }
    key.parse().ok()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use as_domain::path;
    use serde_json::json;

    fn tree() -> StateTree {
        StateTree::new(json!({
            "messages": [{"role": "user", "parts": [{"text": "hi"}]}],
            "count": 3,
            "title": "draft",
        }))
    }

    #[test]
    fn get_nested_through_sequences() {
        let t = tree();
        assert_eq!(
            t.get(&path(["messages", "0", "parts", "0", "text"])).unwrap(),
            "hi"
        );
        assert_eq!(t.get(&[]).unwrap(), t.root());
    }

    #[test]
    fn get_missing_key_fails() {
        let err = tree().get(&path(["nope"])).unwrap_err();
        assert!(matches!(err, Error::PathNotFound { ref key, .. } if key == "nope"));
    }

    #[test]
    fn get_through_scalar_fails() {
        let err = tree().get(&path(["count", "x"])).unwrap_err();
        assert!(matches!(err, Error::PathNotFound { .. }));
    }

    #[test]
    fn empty_path_replaces_root() {
        let mut t = tree();
        t.set(&[], |_| Ok(json!([1, 2]))).unwrap();
        assert_eq!(t.root(), &json!([1, 2]));
    }

    #[test]
    fn single_segment_inserts_new_key() {
        let mut t = tree();
        t.apply(&Operation::set(path(["provider"]), "completed")).unwrap();
        assert_eq!(t.get(&path(["provider"])).unwrap(), "completed");
    }

    #[test]
    fn absent_key_with_null_updater_is_not_materialized() {
        let mut t = tree();
        let before = t.clone();
        t.set(&path(["ghost"]), |current| {
            assert!(current.is_none());
            Ok(Value::Null)
        })
        .unwrap();
        assert_eq!(t, before);
        assert!(t.root().get("ghost").is_none());
    }

    #[test]
    fn present_key_can_be_set_to_null() {
        let mut t = tree();
        t.apply(&Operation::set(path(["title"]), Value::Null)).unwrap();
        assert_eq!(t.root()["title"], Value::Null);
        assert!(t.root().as_object().unwrap().contains_key("title"));
    }

    #[test]
    fn missing_parent_fails_and_leaves_tree_unchanged() {
        let mut t = tree();
        let before = t.clone();
        let err = t
            .apply(&Operation::set(path(["settings", "theme"]), "dark"))
            .unwrap_err();
        assert!(matches!(err, Error::PathNotFound { ref key, .. } if key == "settings"));
        assert_eq!(t, before);
    }

    #[test]
    fn deep_failure_leaves_tree_unchanged() {
        let mut t = tree();
        let before = t.clone();
        let err = t
            .apply(&Operation::set(path(["messages", "0", "meta", "x"]), 1))
            .unwrap_err();
        assert!(matches!(err, Error::PathNotFound { ref key, .. } if key == "meta"));
        assert_eq!(t, before);
    }

    #[test]
    fn sequence_index_len_appends() {
        let mut t = tree();
        t.apply(&Operation::set(path(["messages", "1"]), json!({"role": "assistant"})))
            .unwrap();
        assert_eq!(t.root()["messages"].as_array().unwrap().len(), 2);
        assert_eq!(t.get(&path(["messages", "1", "role"])).unwrap(), "assistant");
    }

    #[test]
    fn sequence_index_past_end_fails() {
        let mut t = tree();
        let before = t.clone();
        let err = t
            .apply(&Operation::set(path(["messages", "5"]), json!({})))
            .unwrap_err();
        assert!(matches!(err, Error::PathNotFound { .. }));
        assert_eq!(t, before);
    }

    #[test]
    fn non_canonical_index_is_rejected() {
        let t = tree();
        assert!(t.get(&path(["messages", "00"])).is_err());
        assert!(t.get(&path(["messages", "-1"])).is_err());
    }

    #[test]
    fn append_text_concatenates() {
        let mut t = tree();
        t.apply(&Operation::append_text(path(["title"]), " v2")).unwrap();
        assert_eq!(t.get(&path(["title"])).unwrap(), "draft v2");
    }

    #[test]
    fn append_text_on_number_is_type_mismatch() {
        let mut t = tree();
        let before = t.clone();
        let err = t
            .apply(&Operation::append_text(path(["count"]), "x"))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { expected: "string", .. }));
        assert_eq!(t, before);
    }

    #[test]
    fn append_text_on_absent_key_is_type_mismatch() {
        let mut t = tree();
        let before = t.clone();
        let err = t
            .apply(&Operation::append_text(path(["missing"]), "x"))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert_eq!(t, before);
    }

    #[test]
    fn set_on_scalar_root_fails() {
        let mut t = StateTree::new(json!(42));
        let err = t.apply(&Operation::set(path(["a"]), 1)).unwrap_err();
        assert!(matches!(err, Error::PathNotFound { .. }));
        assert_eq!(t.root(), &json!(42));
    }
}
