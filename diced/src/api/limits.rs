//! Per-caller rate limiting
//!
//! Checked before a request reaches the dice service:
//! - consecutive requests from one caller must be `min_interval` apart
//! - at most `max_clients` distinct callers are tracked; callers idle longer
//!   than `idle` with no open stream are forgotten
//! - one caller holds at most `MAX_STREAMS_PER_CALLER` event streams

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;

/// Header a caller may use to identify itself
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Identity used for rate limiting: the `x-client-id` header, else the peer IP
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(CLIENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(id) = header {
            return Ok(CallerId(id.to_string()));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(CallerId(peer.unwrap_or_else(|| "anonymous".to_string())))
    }
}

/// Most event streams one caller may hold open
pub const MAX_STREAMS_PER_CALLER: usize = 4;

/// Why a request was turned away
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("too many requests, retry in {}ms", .retry_after.as_millis())]
    TooSoon { retry_after: Duration },

    #[error("server is at its limit of {max} clients")]
    TooManyClients { max: usize },

    #[error("caller already has {max} open streams")]
    TooManyStreams { max: usize },
}

#[derive(Serialize)]
struct LimitResponse {
    error: String,
}

impl IntoResponse for LimitError {
    fn into_response(self) -> Response {
        let body = Json(LimitResponse {
            error: self.to_string(),
        });
        match self {
            LimitError::TooSoon { retry_after } => {
                let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, secs.to_string())],
                    body,
                )
                    .into_response()
            }
            LimitError::TooManyStreams { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, body).into_response()
            }
            LimitError::TooManyClients { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
            }
        }
    }
}

#[derive(Debug)]
struct ClientEntry {
    /// Last request that passed the spacing rule
    last_request: Option<Instant>,
    last_active: Instant,
    open_streams: usize,
}

impl ClientEntry {
    fn new(now: Instant) -> Self {
        Self {
            last_request: None,
            last_active: now,
            open_streams: 0,
        }
    }
}

/// Tracks each caller's last request and open event streams.
///
/// A caller with an open stream is never forgotten, so it keeps its slot
/// under `max_clients` for as long as the stream lives.
pub struct RateLimiter {
    min_interval: Duration,
    max_clients: usize,
    idle: Duration,
    clients: Mutex<HashMap<String, ClientEntry>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, max_clients: usize, idle: Duration) -> Self {
        Self {
            min_interval,
            max_clients,
            idle,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.min_request_interval(),
            config.max_clients,
            config.client_idle(),
        )
    }

    /// Admit a request, enforcing spacing and the caller cap
    pub fn check(&self, caller: &CallerId) -> Result<(), LimitError> {
        self.check_at(caller, Instant::now())
    }

    /// Admit a long-lived stream; only the caller cap and stream limit apply.
    ///
    /// Every successful call must be paired with [`RateLimiter::close_stream`].
    pub fn open_stream(&self, caller: &CallerId) -> Result<(), LimitError> {
        self.open_stream_at(caller, Instant::now())
    }

    pub fn close_stream(&self, caller: &CallerId) {
        self.close_stream_at(caller, Instant::now())
    }

    /// Number of callers currently tracked
    pub fn tracked(&self) -> usize {
        self.clients.lock().len()
    }

    fn check_at(&self, caller: &CallerId, now: Instant) -> Result<(), LimitError> {
        let mut clients = self.clients.lock();
        let entry = self.entry_at(&mut clients, caller, now)?;

        if let Some(last) = entry.last_request {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.min_interval {
                return Err(LimitError::TooSoon {
                    retry_after: self.min_interval - elapsed,
                });
            }
        }
        entry.last_request = Some(now);
        entry.last_active = now;
        Ok(())
    }

    fn open_stream_at(&self, caller: &CallerId, now: Instant) -> Result<(), LimitError> {
        let mut clients = self.clients.lock();
        let entry = self.entry_at(&mut clients, caller, now)?;

        if entry.open_streams >= MAX_STREAMS_PER_CALLER {
            return Err(LimitError::TooManyStreams {
                max: MAX_STREAMS_PER_CALLER,
            });
        }
        entry.open_streams += 1;
        entry.last_active = now;
        Ok(())
    }

    fn close_stream_at(&self, caller: &CallerId, now: Instant) {
        if let Some(entry) = self.clients.lock().get_mut(&caller.0) {
            entry.open_streams = entry.open_streams.saturating_sub(1);
            entry.last_active = now;
        }
    }

    /// Forget idle callers, then find or register `caller` within the cap
    fn entry_at<'a>(
        &self,
        clients: &'a mut HashMap<String, ClientEntry>,
        caller: &CallerId,
        now: Instant,
    ) -> Result<&'a mut ClientEntry, LimitError> {
        clients.retain(|_, entry| {
            entry.open_streams > 0 || now.saturating_duration_since(entry.last_active) < self.idle
        });

        if !clients.contains_key(&caller.0) && clients.len() >= self.max_clients {
            return Err(LimitError::TooManyClients {
                max: self.max_clients,
            });
        }
        Ok(clients
            .entry(caller.0.clone())
            .or_insert_with(|| ClientEntry::new(now)))
    }
}
