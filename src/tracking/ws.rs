use std::sync::Arc;

use axum::debug_handler;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{self, TokenVerifier};
use crate::db::{Identity, Role};

use super::dispatch;
use super::events::{self, ClientEvent};
use super::hub::{ConnectionHandle, Hub, RoomId};

#[derive(Deserialize)]
pub(crate) struct TrackingQuery {
    token: Option<String>,
}

/// Handshake: the bearer token is verified before the upgrade, so an
/// unauthenticated connection never gets a socket to speak on.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn tracking_ws(
    Query(TrackingQuery { token }): Query<TrackingQuery>,
    State(db_pool): State<SqlitePool>,
    State(hub): State<Arc<Hub>>,
    State(verifier): State<TokenVerifier>,

    ws: WebSocketUpgrade,
) -> Response {
    let identity = match auth::authenticate(&db_pool, &verifier, token.as_deref()).await {
        Ok(identity) => identity,
        Err(err) => {
            warn!(error = %err, "handshake rejected");
            return (StatusCode::UNAUTHORIZED, "authentication failed").into_response();
        }
    };

    ws.on_upgrade(move |stream| handle_connection(stream, db_pool, hub, identity))
}

async fn handle_connection(stream: WebSocket, db_pool: SqlitePool, hub: Arc<Hub>, identity: Identity) {
    let conn_id = Uuid::now_v7();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = ConnectionHandle::new(conn_id, identity, tx);

    hub.register(conn.clone()).await;
    if conn.identity.role == Role::Admin {
        hub.join(RoomId::Admin, conn_id).await;
    }
    info!(%conn_id, user = %conn.identity.name, role = conn.identity.role.as_str(), "client connected");

    let (mut sender, mut receiver) = stream.split();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let Message::Text(text) = msg else { continue };

        match serde_json::from_str::<ClientEvent>(&text) {
            Ok(event) => dispatch::dispatch(&db_pool, &hub, &conn, event).await,
            Err(err) => {
                warn!(%conn_id, error = %err, "unrecognized frame");
                conn.send(&events::frame(
                    events::ERROR,
                    json!({ "message": "Unrecognized event" }),
                ));
            }
        }
    }

    writer.abort();
    hub.unregister(conn_id).await;
    info!(%conn_id, "client disconnected");
}
