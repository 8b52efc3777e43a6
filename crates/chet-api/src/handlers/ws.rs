//! WebSocket upgrade handler.

use std::net::IpAddr;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chet_core::error::AppError;
use chet_realtime::OutboundFrame;

use crate::error::ApiError;
use crate::extractors::ClientOrigin;
use crate::state::AppState;

/// How long the writer may take to flush after the Session ends.
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// GET /ws: WebSocket upgrade
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ClientOrigin(origin): ClientOrigin,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    if state.hub.shutdown_token().is_cancelled() {
        return Err(AppError::unavailable("Hub is shutting down").into());
    }

    let max_frame = state.config.hub.max_frame_bytes;
    Ok(ws
        .max_message_size(max_frame)
        .max_frame_size(max_frame)
        .on_upgrade(move |socket| handle_ws_connection(state, origin, socket)))
}

/// Handles an established WebSocket connection.
async fn handle_ws_connection(state: AppState, origin: IpAddr, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (handle, mut outbound_rx) = state.hub.connect(origin);
    let conn_id = handle.id;
    let closed = handle.closed_token();

    // Outbound forwarder: drains the Session queue until Close or end.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            match frame {
                OutboundFrame::Text(text) => {
                    if ws_tx.send(Message::Text(text.as_ref().into())).await.is_err() {
                        break;
                    }
                }
                OutboundFrame::Close => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    if handle.is_alive() {
        info!(conn_id = %conn_id, origin = %origin, "WebSocket connection established");

        loop {
            tokio::select! {
                _ = closed.cancelled() => break,
                next = ws_rx.next() => match next {
                    Some(Ok(Message::Text(text))) => state.hub.handle_text(&conn_id, text.as_str()),
                    Some(Ok(Message::Binary(_))) => {
                        debug!(conn_id = %conn_id, "Ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                        break;
                    }
                },
            }
        }
    }

    // Cleanup
    handle.close();
    state.hub.disconnect(&conn_id);
    drop(handle);
    if !finish_writer(writer, WRITER_FLUSH_TIMEOUT).await {
        warn!(conn_id = %conn_id, "Writer did not flush in time, aborted");
    }

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Waits up to `limit` for the writer task; aborts it on timeout.
/// Returns whether it finished on its own.
async fn finish_writer(mut writer: JoinHandle<()>, limit: Duration) -> bool {
    if tokio::time::timeout(limit, &mut writer).await.is_ok() {
        return true;
    }
    writer.abort();
    false
}
