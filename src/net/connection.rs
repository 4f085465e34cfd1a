use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::net::protocol::decode_message;
use crate::room::{PlayerId, RoomCommand, RoomTx};

/// Split a connected WebSocket into a reader task (frames -> room) and a
/// writer task (room -> frames), mirroring the teacher's read/write split
/// via `futures_util::{SinkExt, StreamExt}` joined with `tokio::select!`.
///
/// `outbound_rx` is the bounded, per-connection send queue; the Room decides
/// when a slow reader has fallen behind for too long (§4.10) and disconnects
/// it from its own side, so this task only needs to forward frames.
pub async fn handle_connection(
    socket: WebSocket,
    player_id: PlayerId,
    room_tx: RoomTx,
    mut outbound_rx: mpsc::Receiver<Message>,
) {
    let (mut ws_write, mut ws_read) = socket.split();

    let room_tx_clone = room_tx.clone();
    let player_id_clone = player_id.clone();
    let read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_read.next().await {
            match msg {
                Message::Text(_) => match decode_message(&msg) {
                    Ok(envelope) => {
                        let _ = room_tx_clone.send(RoomCommand::Inbound {
                            player_id: player_id_clone.clone(),
                            envelope,
                        });
                    }
                    Err(e) => {
                        warn!(player_id = %player_id_clone, "dropping malformed message: {e}");
                    }
                },
                Message::Close(_) => break,
                _ => {} // ping/pong/binary: this protocol is text-only
            }
        }
    });

    let write_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if ws_write.send(msg).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = read_task => {}
        _ = write_task => {}
    }

    let _ = room_tx.send(RoomCommand::Disconnect {
        player_id: player_id.clone(),
    });

    info!(player_id = %player_id, "connection closed");
}
