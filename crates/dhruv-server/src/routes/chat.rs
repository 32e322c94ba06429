//! Chat endpoints.
//!
//! `POST /api/chat` starts a turn and streams it as Server-Sent Events. The
//! turn itself runs in a spawned task that publishes into a
//! [`ResumableStream`], so a client that disconnects does not stop generation
//! and can reattach with `GET /api/chat?chatId=`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::{Duration, Utc};
use futures::{Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use dhruv_agent::{
    Agent, RequestHints, StreamChunk, SystemPromptBuilder, ToolContext, TurnTranscript,
    UserDetails, generate_title, history_messages,
};
use dhruv_llm::Message;
use dhruv_store::{Chat, IstDay, Store, StoredMessage, User};
use dhruv_types::{ChatRole, Visibility, config_defaults};

use crate::error::{Result, ServerError};
use crate::state::AppState;
use crate::stream::{ResumableStream, StreamContext};

const INVALID_BODY: &str = "Invalid request body";
const MAX_TEXT_CHARS: usize = 2000;
const IMAGE_TYPES: &[&str] = &["image/png", "image/jpg", "image/jpeg"];
/// Shown to the client in place of upstream model errors.
const GENERATION_FAILED: &str = "Oops, an error occurred!";

/// Geolocation headers set by the edge proxy.
pub const LATITUDE_HEADER: &str = "x-vercel-ip-latitude";
pub const LONGITUDE_HEADER: &str = "x-vercel-ip-longitude";
pub const CITY_HEADER: &str = "x-vercel-ip-city";
pub const COUNTRY_HEADER: &str = "x-vercel-ip-country";

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

/// Which model answers the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatModelId {
    #[serde(rename = "chat-model")]
    Chat,
    #[serde(rename = "chat-model-reasoning")]
    Reasoning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePart {
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    pub name: String,
    pub content_type: String,
}

/// The new user message as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    pub id: Uuid,
    pub parts: Vec<MessagePart>,
    #[serde(default)]
    pub experimental_attachments: Vec<Attachment>,
}

impl ClientMessage {
    fn into_stored(self, chat_id: Uuid) -> Result<StoredMessage> {
        let parts = serde_json::to_value(&self.parts)?;
        let attachments = serde_json::to_value(&self.experimental_attachments)?;
        Ok(StoredMessage::new(self.id, chat_id, ChatRole::User, parts).with_attachments(attachments))
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Chat id; a new chat is created when unknown.
    pub id: Uuid,
    pub message: ClientMessage,
    pub selected_chat_model: ChatModelId,
    pub selected_visibility_type: Visibility,
}

impl ChatRequest {
    /// Parse and validate a request body.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let request: ChatRequest =
            serde_json::from_slice(body).map_err(|_| ServerError::bad_request(INVALID_BODY))?;
        request.validate()?;
        Ok(request)
    }

    fn validate(&self) -> Result<()> {
        let parts_ok = !self.message.parts.is_empty()
            && self.message.parts.iter().all(|part| match part {
                MessagePart::Text { text } => (1..=MAX_TEXT_CHARS).contains(&text.chars().count()),
            });
        let attachments_ok = self.message.experimental_attachments.iter().all(|a| {
            a.name.chars().count() <= MAX_TEXT_CHARS && IMAGE_TYPES.contains(&a.content_type.as_str())
        });

        if parts_ok && attachments_ok {
            Ok(())
        } else {
            Err(ServerError::bad_request(INVALID_BODY))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeQuery {
    pub chat_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/chat - start a streamed turn.
pub async fn chat_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let request = ChatRequest::parse(&body)?;
    let chat_id = request.id;

    let allowance = state.config.entitlements.max_messages_per_day(user.kind);
    let sent = state.store.count_user_messages(user.id, Duration::hours(24))?;
    if sent > allowance {
        info!(user_id = %user.id, sent, allowance, "Daily message entitlement exceeded");
        return Err(ServerError::RateLimitExceeded);
    }

    let user_message = request.message.into_stored(chat_id)?;
    let text = user_message.text();

    match state.store.get_chat(chat_id)? {
        Some(chat) if chat.user_id != user.id => return Err(ServerError::Forbidden),
        Some(_) => {}
        None => {
            let title_model = &state.models.title;
            let title = generate_title(&title_model.backend, &title_model.model, &text).await;
            let chat = Chat::new(chat_id, user.id, title, request.selected_visibility_type);
            state.store.save_chat(&chat)?;
            info!(chat_id = %chat_id, user_id = %user.id, title = %chat.title, "Created chat");
        }
    }

    state.store.save_messages(&[user_message])?;

    if let Some(pipeline) = &state.memory {
        pipeline.spawn(user.id, text);
    }

    let system_prompt = system_prompt_for(&state.store, &user, request_hints(&headers))?;
    let history = history_messages(&state.store.messages_for_chat(chat_id)?);

    let stream_id = Uuid::new_v4();
    state.store.create_stream(stream_id, chat_id)?;

    let agent = match request.selected_chat_model {
        ChatModelId::Chat => state.chat_agent(system_prompt),
        ChatModelId::Reasoning => state.reasoning_agent(system_prompt),
    };

    let stream = ResumableStream::new(stream_id);
    if let Some(streams) = &state.streams {
        streams.register(stream.clone());
    }

    spawn_generation(Generation {
        store: state.store.clone(),
        streams: state.streams.clone(),
        agent,
        history,
        ctx: ToolContext::new(user.id).with_chat(chat_id),
        stream: stream.clone(),
    });

    Ok(chunk_sse(stream.subscribe()))
}

/// GET /api/chat?chatId= - reattach to the latest generation of a chat.
pub async fn resume_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ResumeQuery>,
) -> Result<Response> {
    let requested_at = Utc::now();

    let Some(streams) = state.streams.clone() else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let chat_id = query
        .chat_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ServerError::bad_request("id is required"))?;
    let chat_id =
        Uuid::parse_str(chat_id.trim()).map_err(|_| ServerError::not_found("Not found"))?;

    let chat = state
        .store
        .get_chat(chat_id)?
        .ok_or_else(|| ServerError::not_found("Not found"))?;
    if chat.visibility == Visibility::Private && chat.user_id != user.id {
        return Err(ServerError::Forbidden);
    }

    let latest = state
        .store
        .stream_ids(chat_id)?
        .last()
        .copied()
        .ok_or_else(|| ServerError::not_found("No streams found"))?;

    if let Some(live) = streams.resume(latest) {
        debug!(chat_id = %chat_id, stream_id = %latest, "Resuming live stream");
        return Ok(chunk_sse(live));
    }

    // Generation already finished: hand back a just-saved reply, if any.
    let recent = state.store.latest_message(chat_id)?.filter(|m| {
        m.role == ChatRole::Assistant
            && (requested_at - m.created_at).num_seconds() <= config_defaults::RESUME_WINDOW_SECS
    });
    debug!(chat_id = %chat_id, restored = recent.is_some(), "Stream already concluded");

    Ok(event_sse(stream::iter(recent.map(|m| append_message_event(&m)))))
}

/// DELETE /api/chat?id= - delete a chat with its messages and streams.
pub async fn delete_chat_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Chat>> {
    let not_found = || ServerError::not_found("Not Found");

    let id = query
        .id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id.trim()).ok())
        .ok_or_else(not_found)?;

    let chat = state.store.get_chat(id)?.ok_or_else(not_found)?;
    if chat.user_id != user.id {
        return Err(ServerError::Forbidden);
    }

    let deleted = state.store.delete_chat(id)?.ok_or_else(not_found)?;
    info!(chat_id = %id, user_id = %user.id, "Deleted chat");
    Ok(Json(deleted))
}

// ─────────────────────────────────────────────────────────────────────────────
// Turn Assembly
// ─────────────────────────────────────────────────────────────────────────────

/// Geo hints from the proxy headers. Missing headers stay empty.
pub fn request_hints(headers: &HeaderMap) -> RequestHints {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    RequestHints {
        latitude: header(LATITUDE_HEADER),
        longitude: header(LONGITUDE_HEADER),
        city: header(CITY_HEADER),
        country: header(COUNTRY_HEADER),
    }
}

fn system_prompt_for(store: &Store, user: &User, hints: RequestHints) -> Result<String> {
    let profile = store.user_profile(user.id)?.unwrap_or_default();
    let custom_prompt = store.user_prompt(&user.email)?;

    Ok(SystemPromptBuilder::new()
        .with_hints(hints)
        .with_user_details(UserDetails::from_profile(&profile, IstDay::today().date))
        .with_custom_prompt(custom_prompt.as_deref())
        .build())
}

/// Everything a detached generation needs.
struct Generation {
    store: Arc<Store>,
    streams: Option<Arc<StreamContext>>,
    agent: Agent,
    history: Vec<Message>,
    ctx: ToolContext,
    stream: Arc<ResumableStream>,
}

/// Run the turn to completion regardless of who is listening, then persist
/// the assistant message.
fn spawn_generation(generation: Generation) -> JoinHandle<()> {
    let Generation {
        store,
        streams,
        agent,
        history,
        ctx,
        stream,
    } = generation;

    tokio::spawn(async move {
        let chat_id = ctx.chat_id;
        let mut turn = agent.turn_stream(history, ctx);
        let mut transcript = TurnTranscript::new();

        while let Some(chunk) = turn.next().await {
            transcript.record(&chunk);
            match chunk {
                StreamChunk::Error { .. } => stream.publish(StreamChunk::error(GENERATION_FAILED)),
                chunk => stream.publish(chunk),
            }
        }

        if let Some(message) = transcript.error() {
            error!(chat_id = ?chat_id, stream_id = %stream.id(), error = %message, "Generation failed");
        } else if transcript.is_finished()
            && let Some(chat_id) = chat_id
        {
            let message = StoredMessage::new(
                Uuid::new_v4(),
                chat_id,
                ChatRole::Assistant,
                transcript.parts(),
            );
            match store.save_messages(&[message]) {
                Ok(()) => debug!(chat_id = %chat_id, stream_id = %stream.id(), "Saved assistant message"),
                Err(e) => error!(chat_id = %chat_id, error = %e, "Failed to save chat"),
            }
        }

        stream.finish();
        if let Some(streams) = streams {
            streams.remove(stream.id());
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE
// ─────────────────────────────────────────────────────────────────────────────

fn chunk_event(chunk: &StreamChunk) -> Event {
    Event::default()
        .event(chunk.event_name())
        .json_data(chunk)
        .unwrap_or_else(|_| Event::default())
}

fn append_message_event(message: &StoredMessage) -> Event {
    Event::default()
        .event("append-message")
        .json_data(json!({ "type": "append-message", "message": message }))
        .unwrap_or_else(|_| Event::default())
}

fn chunk_sse(chunks: impl Stream<Item = StreamChunk> + Send + 'static) -> Response {
    event_sse(chunks.map(|chunk| chunk_event(&chunk)))
}

fn event_sse(events: impl Stream<Item = Event> + Send + 'static) -> Response {
    Sse::new(events.map(Ok::<_, Infallible>))
        .keep_alive(KeepAlive::default())
        .into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
