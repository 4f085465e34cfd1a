mod clock;
mod config;
mod msg;
mod net;
mod room;

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

use clock::{Clock, SystemClock};
use net::connection::handle_connection;
use room::{RoomCommand, RoomRegistry};

#[derive(Clone)]
struct AppState {
    registry: Arc<RoomRegistry>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = RoomRegistry::new(clock);
    let state = AppState { registry };

    let app = Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_upgrade))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config::PORT);
    let listener = TcpListener::bind(&addr).await.expect("failed to bind");

    info!("skirmish server listening on ws://{addr}/ws");
    info!(
        "tick rate: {} Hz ({}ms), broadcast every {} ticks",
        config::TICK_RATE,
        config::TICK_INTERVAL_MS,
        config::BROADCAST_EVERY_N_TICKS
    );

    axum::serve(listener, app).await.expect("server error");
}

async fn health() -> impl IntoResponse {
    "OK"
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Assigns the new connection to a room (creating one if needed), wires up
/// its bounded outbound queue (§4.10, §5), and hands the socket off to the
/// reader/writer split in `net::connection`.
async fn handle_socket(socket: axum::extract::ws::WebSocket, state: AppState) {
    let (room_tx, player_id) = state.registry.assign();
    let (outbound_tx, outbound_rx) = mpsc::channel::<Message>(config::SEND_QUEUE_SIZE);

    if room_tx
        .send(RoomCommand::Join {
            player_id: player_id.clone(),
            sender: outbound_tx,
        })
        .is_err()
    {
        return;
    }

    handle_connection(socket, player_id, room_tx, outbound_rx).await;
}
