//! WebSocket upgrade handler and message dispatch

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::util::rate_limit::PeerRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::PeerHandle;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let peer_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMsg>();
    let peer = PeerHandle::new(peer_id, tx);
    state.peers.insert(peer_id, peer.clone());

    info!(peer_id = %peer_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Writer task: outbound channel -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(peer_id = %peer_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> dispatch
    let rate_limiter = PeerRateLimiter::new();
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(peer_id = %peer_id, "Rate limited message dropped");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => handle_client_msg(&state, &peer, msg),
                    Err(e) => {
                        // Malformed messages are dropped; the session continues
                        warn!(peer_id = %peer_id, error = %e, "Dropping malformed message");
                    }
                }
            }
            Ok(Message::Close(_)) => {
                info!(peer_id = %peer_id, "Client initiated close");
                break;
            }
            Ok(_) => {
                debug!(peer_id = %peer_id, "Ignoring non-text frame");
            }
            Err(e) => {
                error!(peer_id = %peer_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
    handle_disconnect(&state, peer_id);

    info!(peer_id = %peer_id, "WebSocket connection closed");
}

/// Dispatch one parsed message from a peer.
///
/// Every arm is fire-and-forget: relay and queue mutations never block the
/// reader loop waiting on the remote peer.
pub fn handle_client_msg(state: &AppState, peer: &PeerHandle, msg: ClientMsg) {
    match msg {
        ClientMsg::QueueJoin => state.matchmaker.enqueue(peer.clone()),
        ClientMsg::QueueLeave => state.matchmaker.remove(peer.id),
        ClientMsg::Input {
            session_id,
            state: input,
        } => {
            state
                .rooms
                .relay(session_id, peer.id, ServerMsg::OpponentInput { state: input });
        }
        ClientMsg::Goal {
            session_id,
            conceding_side,
        } => {
            state
                .rooms
                .relay(session_id, peer.id, ServerMsg::OpponentGoal { conceding_side });
        }
    }
}

/// Clean up after a dropped connection: leave the queue if still waiting and
/// tear down any session the peer belonged to, notifying the remaining
/// member. Gated on the peers map so it runs at most once per connection,
/// even when an explicit leave races the transport close.
pub fn handle_disconnect(state: &AppState, peer_id: Uuid) {
    if state.peers.remove(&peer_id).is_none() {
        return;
    }

    state.matchmaker.remove(peer_id);

    if let Some(session_id) = state.rooms.session_of(peer_id) {
        state.rooms.teardown(session_id, Some(peer_id));
    }

    info!(peer_id = %peer_id, "Peer disconnected");
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
