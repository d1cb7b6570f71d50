//! `GET /ws`: the session channel spec.md §6 specifies as JSON frames
//! over a persistent connection. The teacher drives this protocol with a
//! raw `tokio_tungstenite` accept loop (`beagle-server::websocket::sync`);
//! this server instead takes Axum's own `WebSocketUpgrade` extractor,
//! since the connection already needs the same JWT/rate-limit layers as
//! every HTTP route and Axum can share them without a second listener.
//! The per-connection read/write loop and its `tokio::select!` shape are
//! kept from the teacher's pattern.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use kin_consciousness::ConsciousnessError;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::auth::Claims;
use crate::state::AppState;

/// How often the session is polled for an unprompted thing to say while
/// otherwise idle (spec.md §9's proactive-speech Open Question).
const PROACTIVE_POLL_INTERVAL_SECS: u64 = 30;
/// How long a salient working-memory item must sit uncommitted to a
/// reply before it is worth surfacing on its own.
const PROACTIVE_IDLE_SECS: i64 = 120;

/// Wire messages follow spec.md §6 literally, including the field naming
/// quirk that `voice` replies key the transcript as `text` while `text`
/// replies key it as `content`, and every server frame carries a
/// `timestamp` (epoch millis).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Text { content: String, #[serde(default)] timestamp: Option<i64> },
    Voice { audio: String, format: String, #[serde(default)] timestamp: Option<i64> },
    Control { action: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Connected { timestamp: i64 },
    Text { content: String, emotion: String, timestamp: i64 },
    Voice { text: String, audio: String, emotion: String, timestamp: i64 },
    Proactive { content: String, emotion: String, timestamp: i64 },
    Error { message: String, timestamp: i64 },
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Releases the single-session slot when a connection ends, however it
/// ends (clean close, transport error, or panic unwinding).
struct SessionGuard<'a>(&'a AppState);

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.0.release_session();
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

/// Rejects a second concurrent connection with a busy error rather than
/// queuing it (spec.md §5: "the persona has one principal"). The slot is
/// claimed here, before the upgrade completes, so a rejected attempt never
/// touches session state.
async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>, _claims: Claims) -> impl IntoResponse {
    if !state.try_claim_session() {
        return ws.on_upgrade(|socket| async move {
            let (mut sink, _) = socket.split();
            let _ = send(&mut sink, &ServerMessage::Error {
                message: "busy: a session is already active".to_string(),
                timestamp: now_millis(),
            })
            .await;
            let _ = sink.send(Message::Close(None)).await;
        });
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[instrument(skip(socket, state), name = "websocket.session")]
async fn handle_socket(socket: WebSocket, state: AppState) {
    let _session_guard = SessionGuard(&state);
    let (mut sink, mut stream) = socket.split();

    if send(&mut sink, &ServerMessage::Connected { timestamp: now_millis() }).await.is_err() {
        return;
    }

    let mut proactive_tick = tokio::time::interval(Duration::from_secs(PROACTIVE_POLL_INTERVAL_SECS));
    proactive_tick.tick().await; // first tick fires immediately, discard it

    loop {
        tokio::select! {
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(payload))) => {
                        if handle_client_message(&payload, &state, &mut sink).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!("client closed the session");
                        break;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Binary(_))) => {
                        warn!("unexpected binary frame on the session channel, ignoring");
                    }
                    Some(Err(err)) => {
                        warn!(%err, "websocket transport error");
                        break;
                    }
                    None => break,
                }
            }
            _ = proactive_tick.tick() => {
                if !state.is_awake() {
                    continue;
                }
                if let Some((content, emotion)) = state.consciousness.proactive_candidate(PROACTIVE_IDLE_SECS).await {
                    if send(&mut sink, &ServerMessage::Proactive { content, emotion, timestamp: now_millis() }).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

async fn handle_client_message(
    payload: &str,
    state: &AppState,
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
) -> Result<(), axum::Error> {
    let message: ClientMessage = match serde_json::from_str(payload) {
        Ok(message) => message,
        Err(err) => {
            return send(sink, &ServerMessage::Error { message: format!("malformed message: {err}"), timestamp: now_millis() }).await;
        }
    };

    match message {
        ClientMessage::Control { action } => handle_control(&action, state, sink).await,
        ClientMessage::Text { content, .. } => {
            if !state.is_awake() {
                return send(sink, &ServerMessage::Text {
                    content: "I'm resting right now.".to_string(),
                    emotion: "neutral".to_string(),
                    timestamp: now_millis(),
                })
                .await;
            }
            match state.consciousness.process_input(Some(content), None, true).await {
                Ok(outcome) => {
                    send(sink, &ServerMessage::Text {
                        content: outcome.text,
                        emotion: outcome.emotion_tag,
                        timestamp: now_millis(),
                    })
                    .await
                }
                Err(err) => send_turn_error(sink, err).await,
            }
        }
        ClientMessage::Voice { audio, format, .. } => {
            if !state.is_awake() {
                return send(sink, &ServerMessage::Text {
                    content: "I'm resting right now.".to_string(),
                    emotion: "neutral".to_string(),
                    timestamp: now_millis(),
                })
                .await;
            }
            let bytes = match BASE64.decode(audio.as_bytes()) {
                Ok(bytes) => bytes,
                Err(err) => {
                    return send(sink, &ServerMessage::Error {
                        message: format!("invalid base64 audio: {err}"),
                        timestamp: now_millis(),
                    })
                    .await;
                }
            };
            match state.consciousness.process_input(None, Some((&bytes, format.as_str())), true).await {
                Ok(outcome) => {
                    send(sink, &ServerMessage::Voice {
                        text: outcome.text,
                        audio: BASE64.encode(&outcome.audio),
                        emotion: outcome.emotion_tag,
                        timestamp: now_millis(),
                    })
                    .await
                }
                Err(err) => send_turn_error(sink, err).await,
            }
        }
    }
}

async fn handle_control(
    action: &str,
    state: &AppState,
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
) -> Result<(), axum::Error> {
    match action {
        "sleep" | "pause" => {
            state.set_awake(false);
            send(sink, &ServerMessage::Connected { timestamp: now_millis() }).await
        }
        "resume" => {
            state.set_awake(true);
            send(sink, &ServerMessage::Connected { timestamp: now_millis() }).await
        }
        "shutdown" => {
            sink.send(Message::Close(None)).await
        }
        other => {
            send(sink, &ServerMessage::Error { message: format!("unknown control action: {other}"), timestamp: now_millis() }).await
        }
    }
}

async fn send_turn_error(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    err: ConsciousnessError,
) -> Result<(), axum::Error> {
    send(sink, &ServerMessage::Error { message: err.to_string(), timestamp: now_millis() }).await
}

async fn send(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(message).expect("ServerMessage always serializes");
    sink.send(Message::Text(payload)).await
}
