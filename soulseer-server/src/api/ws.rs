//! soulseer-server/src/api/ws.rs
//!
//! `/ws` transport over the ChannelManager. One task drains the connection's
//! outbound queue into the socket; the request task reads client frames.

use std::collections::HashSet;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use soulseer_core::realtime::{ConnectionHandle, RealtimeEvent};

use super::error::ApiError;
use super::{AppState, CurrentUser};

/// Client-to-server frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    Join { session_id: Uuid },

    /// Without `sessionId`, goes to the most recently joined session.
    #[serde(rename_all = "camelCase")]
    Typing {
        #[serde(default)]
        session_id: Option<Uuid>,
        is_typing: bool,
    },

    Leave,
}

/// Sessions this connection has been admitted to.
#[derive(Debug, Default)]
pub struct Joined {
    sessions: HashSet<Uuid>,
    last: Option<Uuid>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let (conn, mut outbound) = state.channels.connect(Some(user_id));
    let (mut sink, mut stream) = socket.split();
    info!("Realtime connection {} opened for user {}", conn.id, user_id);

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sink.send(WsMessage::Text(frame.to_string().into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut joined = Joined::default();
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => {
                handle_frame(&state, &conn, &mut joined, text.as_str()).await;
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Realtime connection {} read error: {:?}", conn.id, e);
                break;
            }
        }
    }

    state.channels.leave(&conn).await;
    writer.abort();
    info!("Realtime connection {} closed", conn.id);
}

fn send_error(conn: &ConnectionHandle, message: String) {
    conn.send(&RealtimeEvent::Error { message });
}

/// Applies one client frame. Failures are reported back on the same
/// connection and never close it.
pub async fn handle_frame(state: &AppState, conn: &ConnectionHandle, joined: &mut Joined, text: &str) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            send_error(conn, format!("Unrecognized frame: {}", e));
            return;
        }
    };
    let Some(user_id) = conn.user_id else {
        send_error(conn, "Sign in to continue.".into());
        return;
    };

    match frame {
        ClientFrame::Join { session_id } => {
            // Only the session's two participants may subscribe.
            match state.metering.get_session(user_id, session_id).await {
                Ok(_) => {
                    state.channels.join(session_id, conn).await;
                    joined.sessions.insert(session_id);
                    joined.last = Some(session_id);
                }
                Err(e) => send_error(conn, ApiError::from(e).message),
            }
        }
        ClientFrame::Typing { session_id, is_typing } => {
            match session_id.or(joined.last).filter(|id| joined.sessions.contains(id)) {
                Some(session_id) => {
                    state.channels.relay_typing(session_id, conn, is_typing).await;
                }
                None => send_error(conn, "Join the session before sending typing updates.".into()),
            }
        }
        ClientFrame::Leave => {
            state.channels.leave(conn).await;
            *joined = Joined::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::Value;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use soulseer_core::clock::SystemClock;
    use soulseer_core::models::SessionType;
    use soulseer_core::repositories::Stores;
    use soulseer_core::seed::{seed_demo, DemoAccounts};
    use soulseer_core::MeteringConfig;

    use crate::context::ServerContext;

    async fn setup() -> (AppState, DemoAccounts, Uuid) {
        let ctx = Arc::new(ServerContext::from_parts(
            Stores::in_memory(),
            None,
            Arc::new(SystemClock),
            MeteringConfig::default(),
        ));
        let demo = seed_demo(&ctx.stores).await.unwrap().unwrap();
        let luna = &demo.readers[0];
        let session = ctx
            .metering
            .start_session(demo.client.user_id, luna.reader_id, SessionType::Chat, luna.chat_rate)
            .await
            .unwrap();
        (ctx, demo, session.session_id)
    }

    async fn next_frame(rx: &mut mpsc::Receiver<Arc<str>>) -> Value {
        let frame = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("channel closed");
        serde_json::from_str(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_only_participants_can_join() {
        let (ctx, demo, session_id) = setup().await;
        let join = format!(r#"{{"type":"join","sessionId":"{session_id}"}}"#);

        let (outsider, mut outsider_rx) = ctx.channels.connect(Some(demo.readers[1].user_id));
        handle_frame(&ctx, &outsider, &mut Joined::default(), &join).await;
        let frame = next_frame(&mut outsider_rx).await;
        assert_eq!(frame["type"], "error");
        assert_eq!(ctx.channels.subscriber_count(session_id).await, 0);

        let (client, _client_rx) = ctx.channels.connect(Some(demo.client.user_id));
        handle_frame(&ctx, &client, &mut Joined::default(), &join).await;
        assert_eq!(ctx.channels.subscriber_count(session_id).await, 1);
    }

    #[tokio::test]
    async fn test_typing_reaches_the_other_side_only() {
        let (ctx, demo, session_id) = setup().await;
        let join = format!(r#"{{"type":"join","sessionId":"{session_id}"}}"#);

        let (client, mut client_rx) = ctx.channels.connect(Some(demo.client.user_id));
        let mut client_joined = Joined::default();
        handle_frame(&ctx, &client, &mut client_joined, &join).await;

        let (reader, mut reader_rx) = ctx.channels.connect(Some(demo.readers[0].user_id));
        let mut reader_joined = Joined::default();
        handle_frame(&ctx, &reader, &mut reader_joined, &join).await;

        handle_frame(&ctx, &client, &mut client_joined, r#"{"type":"typing","isTyping":true}"#).await;
        let frame = next_frame(&mut reader_rx).await;
        assert_eq!(frame["type"], "typing");
        assert_eq!(frame["isTyping"], true);
        assert!(client_rx.try_recv().is_err());

        // Leaving clears the indicator for whoever is still there.
        handle_frame(&ctx, &client, &mut client_joined, r#"{"type":"leave"}"#).await;
        let frame = next_frame(&mut reader_rx).await;
        assert_eq!(frame["isTyping"], false);
        assert_eq!(ctx.channels.subscriber_count(session_id).await, 1);
    }

    #[tokio::test]
    async fn test_typing_requires_a_joined_session() {
        let (ctx, demo, session_id) = setup().await;
        let (client, mut client_rx) = ctx.channels.connect(Some(demo.client.user_id));

        let typing = format!(r#"{{"type":"typing","sessionId":"{session_id}","isTyping":true}}"#);
        handle_frame(&ctx, &client, &mut Joined::default(), &typing).await;
        assert_eq!(next_frame(&mut client_rx).await["type"], "error");

        handle_frame(&ctx, &client, &mut Joined::default(), "not json").await;
        assert_eq!(next_frame(&mut client_rx).await["type"], "error");
    }
}
