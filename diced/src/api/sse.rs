//! Server-Sent Events transport
//!
//! A client opens `GET /sse` and receives an `endpoint` event naming the URL
//! to post requests to. Each request posted there is answered with a
//! `message` event on the same stream.

use std::collections::HashMap;
use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tracing::{debug, info, warn};

use super::limits::CallerId;
use super::AppState;

/// Events buffered per session before senders wait
const SESSION_BUFFER: usize = 32;

/// Registry of open event streams
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, mpsc::Sender<Event>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session and return its id with the receiving half
    pub async fn open(&self) -> (String, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        let session_id = uuid::Uuid::new_v4().to_string();
        self.sessions.write().await.insert(session_id.clone(), tx);
        (session_id, rx)
    }

    pub async fn close(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Push an event to a session.
    ///
    /// Returns false when the session is unknown or its stream has gone away,
    /// in which case the session is dropped.
    pub async fn send(&self, session_id: &str, event: Event) -> bool {
        let sender = self.sessions.read().await.get(session_id).cloned();
        let Some(sender) = sender else {
            return false;
        };
        if sender.send(event).await.is_err() {
            warn!("SSE session {} went away", session_id);
            self.close(session_id).await;
            return false;
        }
        true
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Drop the session once its receiving half is gone
    async fn reap_when_closed(&self, session_id: &str) {
        let sender = self.sessions.read().await.get(session_id).cloned();
        if let Some(sender) = sender {
            sender.closed().await;
            self.close(session_id).await;
            info!("SSE disconnected: {}", session_id);
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub session_id: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Open an event stream
pub async fn sse_handler(
    State(state): State<AppState>,
    caller: CallerId,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Response> {
    state
        .limiter
        .open_stream(&caller)
        .map_err(IntoResponse::into_response)?;

    let (session_id, rx) = state.sessions.open().await;
    info!("SSE connected: {} ({})", session_id, caller.0);

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages?session_id={}", session_id));
    state.sessions.send(&session_id, endpoint).await;

    let sessions = state.sessions.clone();
    let limiter = state.limiter.clone();
    let reap_id = session_id.clone();
    tokio::spawn(async move {
        sessions.reap_when_closed(&reap_id).await;
        limiter.close_stream(&caller);
    });

    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Accept a request for an open session; the reply arrives on its stream
pub async fn message_handler(
    State(state): State<AppState>,
    caller: CallerId,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    if !state.sessions.contains(&query.session_id).await {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("unknown session {}", query.session_id),
            }),
        )
            .into_response();
    }
    if let Err(e) = state.limiter.check(&caller) {
        return e.into_response();
    }

    let text = String::from_utf8_lossy(&body).into_owned();
    let Some(response) = state.handler.handle_blocking(text).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    let event = Event::default().event("message").data(response.to_line());
    if state.sessions.send(&query.session_id, event).await {
        debug!("SSE reply queued for {}", query.session_id);
        StatusCode::ACCEPTED.into_response()
    } else {
        (
            StatusCode::GONE,
            Json(ErrorResponse {
                error: "session closed".to_string(),
            }),
        )
            .into_response()
    }
}
