//! Route handlers.

use std::convert::Infallible;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream;
use serde_json::json;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::router::AppState;
use crate::types::{
    ChatChoice, ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    ChunkChoice, Delta, MODEL_ID, ModelInfo, ModelsResponse, Usage,
};

/// Characters per streamed content delta.
pub const STREAM_CHUNK_CHARS: usize = 20;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn list_models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        object: "list".to_string(),
        data: vec![ModelInfo {
            id: MODEL_ID.to_string(),
            object: "model".to_string(),
            created: chrono::Utc::now().timestamp(),
            owned_by: "local".to_string(),
        }],
    })
}

pub async fn chat_completions(
    State(state): State<AppState>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    let question = request.question();
    info!("Chat completion (stream: {})", request.stream);
    debug!("Question: {question}");

    let answer = state.engine.ask(&question).await?;
    let content = answer.with_citations();

    let id = format!("chatcmpl-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
    let created = chrono::Utc::now().timestamp();

    if request.stream {
        let events = stream_events(&id, created, &content)
            .into_iter()
            .map(Ok::<_, Infallible>);
        return Ok(Sse::new(stream::iter(events)).into_response());
    }

    Ok(Json(ChatCompletionResponse {
        id,
        object: "chat.completion".to_string(),
        created,
        model: MODEL_ID.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage::new("assistant", content.clone()),
            finish_reason: "stop".to_string(),
        }],
        usage: Usage::estimate(&question, &content),
    })
    .into_response())
}

/// The full event sequence for a streamed answer: role, content pieces,
/// stop, then `[DONE]`.
fn stream_events(id: &str, created: i64, content: &str) -> Vec<Event> {
    let chunk = |delta: Delta, finish_reason: Option<&str>| ChatCompletionChunk {
        id: id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created,
        model: MODEL_ID.to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta,
            finish_reason: finish_reason.map(str::to_string),
        }],
    };

    let mut chunks = vec![chunk(
        Delta {
            role: Some("assistant".to_string()),
            content: None,
        },
        None,
    )];
    chunks.extend(split_chars(content, STREAM_CHUNK_CHARS).into_iter().map(|piece| {
        chunk(
            Delta {
                role: None,
                content: Some(piece),
            },
            None,
        )
    }));
    chunks.push(chunk(Delta::default(), Some("stop")));

    let mut events: Vec<Event> = chunks
        .iter()
        .filter_map(|chunk| serde_json::to_string(chunk).ok())
        .map(|data| Event::default().data(data))
        .collect();
    events.push(Event::default().data("[DONE]"));
    events
}

/// Split `text` into pieces of at most `size` characters.
fn split_chars(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|piece| piece.iter().collect())
        .collect()
}
