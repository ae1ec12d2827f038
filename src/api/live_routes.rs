use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};
use warp::{Filter, Rejection, Reply};

use super::filters::with_state;
use crate::auth::decode_token;
use crate::error::AttendanceError;
use crate::realtime::{Connection, ProtocolError, ServerEvent};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LiveQuery {
    pub token: Option<String>,
}

/// `GET /ws?token=...` upgrades to the live attendance channel
pub fn live_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::query::<LiveQuery>())
        .and(with_state(state))
        .map(|ws: warp::ws::Ws, query: LiveQuery, state: AppState| {
            ws.on_upgrade(move |websocket| handle_live_socket(websocket, query.token, state))
        })
}

pub async fn handle_live_socket(websocket: WebSocket, token: Option<String>, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = websocket.split();

    let claims = token
        .as_deref()
        .ok_or(AttendanceError::MissingToken)
        .and_then(|t| decode_token(t, &state.auth));

    let claims = match claims {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected live connection");
            let rejection = ServerEvent::error(ProtocolError::Unauthorized.to_string());
            if let Ok(text) = serde_json::to_string(&rejection) {
                let _ = ws_sender.send(Message::text(text)).await;
            }
            let _ = ws_sender.close().await;
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::debug!(error = %e, "Failed to send live message");
                break;
            }
        }
    });

    let live = state.live.clone();
    let connection = Connection::new(claims.user_id, claims.role, tx);
    live.registry().register(connection.clone()).await;

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => {
                if message.is_close() {
                    break;
                }
                if let Ok(text) = message.to_str() {
                    live.handle_text(&connection, text).await;
                } else if message.is_binary() {
                    live.registry().unicast(
                        &connection,
                        &ServerEvent::error(ProtocolError::InvalidFormat.to_string()),
                    );
                }
            }
            Err(e) => {
                tracing::warn!(connection_id = %connection.id, error = %e, "Live socket error");
                break;
            }
        }
    }

    live.registry().unregister(&connection.id).await;
    sender_task.abort();
    tracing::info!(connection_id = %connection.id, user_id = %connection.user_id, "Live connection closed");
}
