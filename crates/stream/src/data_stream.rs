//! Data-stream wire encoding.
//!
//! Each chunk becomes one `<code>:<json>\n` line:
//!
//! | chunk          | line                              |
//! |----------------|-----------------------------------|
//! | `text-delta`   | `0:"<text>"`                      |
//! | `update-state` | `aui-state:[<operations>]`        |
//! | `finish`       | `d:{"finishReason":"stop"}`       |
//! | `error`        | `3:"<message>"`                   |

use futures_core::Stream;
use futures_util::StreamExt;

use as_domain::error::{Error, Result};
use as_domain::stream::BoxStream;
use as_domain::{Chunk, UpdateChunk};

const TEXT_DELTA: &str = "0";
const ERROR: &str = "3";
const FINISH_MESSAGE: &str = "d";
const UPDATE_STATE: &str = "aui-state";

/// Encode one chunk as a newline-terminated data-stream line.
pub fn encode_chunk(chunk: &Chunk) -> Result<String> {
    let payload = match chunk {
        Chunk::TextDelta { text_delta } => (TEXT_DELTA, serde_json::to_string(text_delta)?),
        Chunk::UpdateState(update) => (UPDATE_STATE, serde_json::to_string(&update.operations)?),
        Chunk::Finish => (
            FINISH_MESSAGE,
            serde_json::json!({ "finishReason": "stop" }).to_string(),
        ),
        Chunk::Error { error } => (ERROR, serde_json::to_string(error)?),
    };
    Ok(format!("{}:{}\n", payload.0, payload.1))
}

/// Parse one data-stream line back into a chunk.
pub fn decode_line(line: &str) -> Result<Chunk> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let (code, payload) = line
        .split_once(':')
        .ok_or_else(|| Error::Other(format!("malformed data-stream line: {line:?}")))?;

    match code {
        TEXT_DELTA => Ok(Chunk::text_delta(serde_json::from_str::<String>(payload)?)),
        UPDATE_STATE => Ok(Chunk::UpdateState(UpdateChunk {
            operations: serde_json::from_str(payload)?,
        })),
        FINISH_MESSAGE => Ok(Chunk::Finish),
        ERROR => Ok(Chunk::error(serde_json::from_str::<String>(payload)?)),
        other => Err(Error::Other(format!("unknown data-stream code {other:?}"))),
    }
}

/// Map a chunk stream to its wire lines.
pub fn encode<S>(chunks: S) -> BoxStream<'static, Result<String>>
where
    S: Stream<Item = Chunk> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        futures_util::pin_mut!(chunks);
        while let Some(chunk) = chunks.next().await {
            yield encode_chunk(&chunk);
        }
    })
}
