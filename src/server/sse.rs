// image-convert/src/server/sse.rs
//! MCP over server-sent events: `GET /mcp` opens a session stream and
//! `POST /messages?session_id=..` feeds it.

use super::mcp::McpServer;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Router,
};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

type Sessions = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Value>>>>;

#[derive(Clone)]
struct SseState {
    server: Arc<McpServer>,
    sessions: Sessions,
}

#[derive(Deserialize)]
struct SessionQuery {
    session_id: String,
}

/// Removes the session once its stream is dropped.
struct SessionGuard {
    id: String,
    sessions: Sessions,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        lock(&self.sessions).remove(&self.id);
        log::info!("SSE session {} closed", self.id);
    }
}

fn lock(
    sessions: &Sessions,
) -> std::sync::MutexGuard<'_, HashMap<String, mpsc::UnboundedSender<Value>>> {
    sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn router(server: Arc<McpServer>) -> Router {
    let state = SseState {
        server,
        sessions: Arc::new(Mutex::new(HashMap::new())),
    };

    Router::new()
        .route("/mcp", get(open_stream))
        .route("/messages", post(post_message))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(host: &str, port: u16, server: Arc<McpServer>) -> std::io::Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    log::info!("MCP SSE endpoint at http://{}/mcp", listener.local_addr()?);
    axum::serve(listener, router(server)).await
}

async fn open_stream(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::unbounded_channel();
    lock(&state.sessions).insert(session_id.clone(), tx);
    log::info!("SSE session {} opened", session_id);

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages?session_id={}", session_id));
    let guard = SessionGuard {
        id: session_id,
        sessions: Arc::clone(&state.sessions),
    };

    let messages = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let message = rx.recv().await?;
        let event = Event::default().event("message").data(message.to_string());
        Some((Ok(event), (rx, guard)))
    });

    Sse::new(stream::once(async move { Ok(endpoint) }).chain(messages))
        .keep_alive(KeepAlive::default())
}

async fn post_message(
    State(state): State<SseState>,
    Query(query): Query<SessionQuery>,
    body: String,
) -> Response {
    let sender = lock(&state.sessions).get(&query.session_id).cloned();
    let Some(sender) = sender else {
        return (StatusCode::NOT_FOUND, "Unknown session").into_response();
    };

    let server = Arc::clone(&state.server);
    tokio::spawn(async move {
        if let Some(response) = server.handle_message(&body).await {
            if sender.send(response).is_err() {
                log::debug!("SSE session closed before the response was ready");
            }
        }
    });

    StatusCode::ACCEPTED.into_response()
}
