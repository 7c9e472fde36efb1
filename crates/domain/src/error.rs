/// Shared error type used across all assistant-stream crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A traversed key is absent, or an intermediate value is not a container.
    #[error("path not found: [{}] (missing key {key:?})", .path.join(", "))]
    PathNotFound { path: Vec<String>, key: String },

    /// The value at `path` has the wrong type for the requested operation.
    #[error("expected {expected} at path [{}]", .path.join(", "))]
    TypeMismatch {
        path: Vec<String>,
        expected: &'static str,
    },

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn path_not_found(path: &[String], key: &str) -> Self {
        Self::PathNotFound {
            path: path.to_vec(),
            key: key.to_owned(),
        }
    }

    pub fn type_mismatch(path: &[String], expected: &'static str) -> Self {
        Self::TypeMismatch {
            path: path.to_vec(),
            expected,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_not_found_message_lists_path() {
        let err = Error::path_not_found(&["a".into(), "b".into()], "a");
        assert_eq!(err.to_string(), "path not found: [a, b] (missing key \"a\")");
    }

    #[test]
    fn type_mismatch_message() {
        let err = Error::type_mismatch(&["count".into()], "string");
        assert_eq!(err.to_string(), "expected string at path [count]");
    }
}
