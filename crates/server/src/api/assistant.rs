use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use as_stream::{create_run_with, data_stream, RunController, RunOptions};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request body
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct AssistantRequest {
    #[serde(default)]
    pub commands: Vec<AssistantCommand>,
    /// Client-held state to continue from.  Defaults to `{"messages": []}`.
    #[serde(default)]
    pub state: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AssistantCommand {
    AddMessage { message: Value },
    AddToolResult { result: Value },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /assistant: stream a mock assistant reply
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn assistant(
    State(state): State<AppState>,
    Json(body): Json<AssistantRequest>,
) -> Response {
    let initial = match body.state {
        Some(value) if !value.is_null() => value,
        _ => json!({ "messages": [] }),
    };
    let delay = Duration::from_millis(state.config.server.mock_step_delay_ms);
    let options = RunOptions::from(&state.config.run).with_state(initial);
    let commands = body.commands;
    let command_count = commands.len();

    let run = create_run_with(options, move |controller| async move {
        if let Err(e) = mock_reply(&controller, &commands, delay).await {
            tracing::warn!(error = %e, "assistant reply failed");
            controller.state().at("provider").set("error")?;
            controller.append_text(format!("Error: {e}"));
        }
        Ok(())
    });

    tracing::info!(run_id = %run.run_id(), commands = command_count, "assistant run started");

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(data_stream::encode(run)),
    )
        .into_response()
}

/// Sleep for `delay`, waking early on cancellation.  Returns `false` once
/// the run has been cancelled.
async fn pause(controller: &RunController, delay: Duration) -> bool {
    if !delay.is_zero() {
        let signal = controller.cancelled_signal();
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = signal.cancelled() => {}
        }
    }
    !controller.is_cancelled()
}

async fn mock_reply(
    controller: &RunController,
    commands: &[AssistantCommand],
    delay: Duration,
) -> as_domain::Result<()> {
    if !pause(controller, delay).await {
        return Ok(());
    }

    for command in commands {
        apply_command(controller, command)?;
    }

    if !pause(controller, delay).await {
        return Ok(());
    }

    let messages = controller.state().at("messages");
    messages.push(json!({
        "role": "assistant",
        "parts": [
            { "type": "text", "text": "Hello from assistant-stream! (mock response)" },
        ],
    }))?;

    let parts = messages.last()?.at("parts");
    parts.push(json!({
        "type": "tool-call",
        "toolCallId": format!("tool_{}", uuid::Uuid::new_v4().simple()),
        "toolName": "get_weather",
        "argsText": "",
        "done": false,
    }))?;

    if !pause(controller, delay).await {
        return Ok(());
    }

    let tool_call = parts.last()?;
    tool_call.at("argsText").set(r#"{"location": "SF""#)?;

    if !pause(controller, delay).await {
        return Ok(());
    }

    tool_call.at("argsText").append_text("}")?;
    tool_call.at("done").set(true)?;
    controller.state().at("provider").set("completed")?;
    Ok(())
}

fn apply_command(controller: &RunController, command: &AssistantCommand) -> as_domain::Result<()> {
    let messages = controller.state().at("messages");
    match command {
        AssistantCommand::AddMessage { message } => messages.push(message.clone()),
        AssistantCommand::AddToolResult { result } => {
            // Attach to the most recent part of the most recent message.
            let target = messages.last().and_then(|m| m.at("parts").last());
            match target {
                Ok(part) => part.at("result").set(result.clone()),
                Err(e) => {
                    tracing::debug!(error = %e, "tool result has no target part, ignoring");
                    Ok(())
                }
            }
        }
    }
}
