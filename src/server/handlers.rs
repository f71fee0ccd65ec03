use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::test_page;
use crate::error::TunnelError;
use crate::tunnel::{ChannelWriter, Dispatcher, TunnelForm};

/// Content type the desktop client expects for the binary body.
pub const TUNNEL_CONTENT_TYPE: &str = "text/plain; charset=x-user-defined";

/// Encoded units buffered between the database worker and the HTTP body.
const BODY_CHANNEL_DEPTH: usize = 32;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// GET: the diagnostic page, when allowed.
///
/// Below the runtime floor every request is refused in the binary protocol, GET included.
pub async fn tunnel_page_handler(
    State(state): State<AppState>,
) -> Result<Response, TunnelError> {
    if !state.dispatcher.runtime_supported() {
        return stream_response(state.dispatcher.clone(), TunnelForm::default());
    }
    if state.dispatcher.config().allow_test_menu {
        Ok(Html(test_page::render(&state.dispatcher)).into_response())
    } else {
        Ok((StatusCode::FORBIDDEN, "Access denied").into_response())
    }
}

/// POST: run the tunnel request and stream the binary response.
pub async fn tunnel_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, TunnelError> {
    let form = TunnelForm::parse(&body).unwrap_or_else(|e| {
        tracing::debug!("Unreadable form body: {}", e);
        TunnelForm::default()
    });

    if state.dispatcher.wants_test_page(&form) {
        return Ok(Html(test_page::render(&state.dispatcher)).into_response());
    }

    stream_response(state.dispatcher.clone(), form)
}

fn stream_response(
    dispatcher: Arc<Dispatcher>,
    form: TunnelForm,
) -> Result<Response, TunnelError> {
    let (tx, mut rx) = mpsc::channel::<Bytes>(BODY_CHANNEL_DEPTH);

    // The database driver is blocking; the worker owns the session until the batch ends.
    tokio::task::spawn_blocking(move || {
        if let Err(e) = dispatcher.handle(form, ChannelWriter::new(tx)) {
            tracing::warn!("Tunnel response aborted: {}", e);
        }
    });

    let stream = async_stream::stream! {
        while let Some(chunk) = rx.recv().await {
            yield Ok::<_, std::io::Error>(chunk);
        }
    };

    Response::builder()
        .header(header::CONTENT_TYPE, TUNNEL_CONTENT_TYPE)
        .body(Body::from_stream(stream))
        .map_err(|e| TunnelError::Internal(format!("Failed to build response: {}", e)))
}
