use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// One drained batch of state operations, in submission order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateChunk {
    pub operations: Vec<Operation>,
}

/// One unit of a run's output sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Chunk {
    /// Incremental text content.
    #[serde(rename = "text-delta")]
    TextDelta {
        #[serde(rename = "textDelta")]
        text_delta: String,
    },

    /// An ordered batch of state operations.
    #[serde(rename = "update-state")]
    UpdateState(UpdateChunk),

    /// The run callback returned normally.
    #[serde(rename = "finish")]
    Finish,

    /// The run callback failed.
    #[serde(rename = "error")]
    Error { error: String },
}

impl Chunk {
    pub fn text_delta(text: impl Into<String>) -> Self {
        Self::TextDelta {
            text_delta: text.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Wire name of this chunk kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text-delta",
            Self::UpdateState(_) => "update-state",
            Self::Finish => "finish",
            Self::Error { .. } => "error",
        }
    }

    /// `Finish` and `Error` end a run's sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish | Self::Error { .. })
    }
}

impl From<UpdateChunk> for Chunk {
    fn from(update: UpdateChunk) -> Self {
        Self::UpdateState(update)
    }
}
